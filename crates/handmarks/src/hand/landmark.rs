//! Hand landmark regression.

use std::path::Path;

use anyhow::Context;
use nalgebra::{Rotation2, Vector2};
use tract_onnx::prelude::tract_ndarray::Ix2;

use crate::{
    image::{AspectRatio, Image, Resolution},
    landmark::{Handedness, Landmark, LandmarkSet},
    nn::{Cnn, CnnInputShape, ColorMapper, NeuralNetwork, Outputs},
    rect::{RotatedRect, Vec2f},
};

pub const NUM_LANDMARKS: usize = 21;

/// Names for the hand pose landmarks.
///
/// # Terminology
///
/// - **CMC**: [Carpometacarpal joint], the lowest joint of the thumb, located near the wrist.
/// - **MCP**: [Metacarpophalangeal joint], the lower joint forming the knuckles near the palm of
///   the hand.
/// - **PIP**: Proximal Interphalangeal joint, the joint between the MCP and DIP.
/// - **DIP**: Distal Interphalangeal joint, the highest joint of a finger.
/// - **Tip**: This landmark is just placed on the tip of the finger, above the DIP.
///
/// [Carpometacarpal joint]: https://en.wikipedia.org/wiki/Carpometacarpal_joint
/// [Metacarpophalangeal joint]: https://en.wikipedia.org/wiki/Metacarpophalangeal_joint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LandmarkIdx {
    Wrist,
    ThumbCmc,
    ThumbMcp,
    ThumbIp,
    ThumbTip,
    IndexFingerMcp,
    IndexFingerPip,
    IndexFingerDip,
    IndexFingerTip,
    MiddleFingerMcp,
    MiddleFingerPip,
    MiddleFingerDip,
    MiddleFingerTip,
    RingFingerMcp,
    RingFingerPip,
    RingFingerDip,
    RingFingerTip,
    PinkyMcp,
    PinkyPip,
    PinkyDip,
    PinkyTip,
}

/// Which part of the hand a landmark or connection belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandPart {
    Palm,
    Thumb,
    IndexFinger,
    MiddleFinger,
    RingFinger,
    Pinky,
}

impl LandmarkIdx {
    pub const ALL: [LandmarkIdx; NUM_LANDMARKS] = {
        use LandmarkIdx::*;
        [
            Wrist,
            ThumbCmc,
            ThumbMcp,
            ThumbIp,
            ThumbTip,
            IndexFingerMcp,
            IndexFingerPip,
            IndexFingerDip,
            IndexFingerTip,
            MiddleFingerMcp,
            MiddleFingerPip,
            MiddleFingerDip,
            MiddleFingerTip,
            RingFingerMcp,
            RingFingerPip,
            RingFingerDip,
            RingFingerTip,
            PinkyMcp,
            PinkyPip,
            PinkyDip,
            PinkyTip,
        ]
    };

    /// Returns the landmark with index `index`, if there is one.
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Returns the part of the hand this landmark is drawn as part of.
    ///
    /// The wrist and the MCP joints of the four fingers make up the palm.
    pub fn part(self) -> HandPart {
        use LandmarkIdx::*;
        match self {
            Wrist | ThumbCmc | IndexFingerMcp | MiddleFingerMcp | RingFingerMcp | PinkyMcp => {
                HandPart::Palm
            }
            ThumbMcp | ThumbIp | ThumbTip => HandPart::Thumb,
            IndexFingerPip | IndexFingerDip | IndexFingerTip => HandPart::IndexFinger,
            MiddleFingerPip | MiddleFingerDip | MiddleFingerTip => HandPart::MiddleFinger,
            RingFingerPip | RingFingerDip | RingFingerTip => HandPart::RingFinger,
            PinkyPip | PinkyDip | PinkyTip => HandPart::Pinky,
        }
    }
}

/// The connection graph of the 21 hand landmarks.
///
/// The first 6 entries outline the palm, followed by 3 connections per finger, from thumb to pinky.
pub const HAND_CONNECTIONS: &[(usize, usize)] = &[
    // Palm:
    (0, 1),
    (0, 5),
    (9, 13),
    (13, 17),
    (5, 9),
    (0, 17),
    // Thumb:
    (1, 2),
    (2, 3),
    (3, 4),
    // Index:
    (5, 6),
    (6, 7),
    (7, 8),
    // Middle:
    (9, 10),
    (10, 11),
    (11, 12),
    // Ring:
    (13, 14),
    (14, 15),
    (15, 16),
    // Pinky:
    (17, 18),
    (18, 19),
    (19, 20),
];

/// Number of leading [`HAND_CONNECTIONS`] entries that outline the palm.
pub const PALM_CONNECTIONS: usize = 6;

/// Landmarks whose bounding box is used to track the hand into the next frame.
///
/// Fingertips and the upper finger joints move too much to give a stable region.
const TRACKING_LANDMARKS: &[LandmarkIdx] = {
    use LandmarkIdx::*;
    &[
        Wrist,
        ThumbCmc,
        ThumbMcp,
        ThumbIp,
        IndexFingerMcp,
        IndexFingerPip,
        MiddleFingerMcp,
        MiddleFingerPip,
        RingFingerMcp,
        RingFingerPip,
        PinkyMcp,
        PinkyPip,
    ]
};

/// Scale factor from the tracking landmarks' bounding box to the next frame's region of interest.
const TRACKING_ROI_SCALE: f32 = 2.0;

/// The hand landmarks estimated for one region of interest.
#[derive(Debug, Clone)]
pub struct HandLandmarks {
    /// Positions in frame pixel coordinates. `z` uses the same scale as `x`.
    positions: [[f32; 3]; NUM_LANDMARKS],
    presence: f32,
    raw_handedness: f32,
}

impl HandLandmarks {
    /// Returns a landmark's position in frame pixel coordinates.
    pub fn position(&self, idx: LandmarkIdx) -> [f32; 3] {
        self.positions[idx as usize]
    }

    /// Returns the network's confidence that a hand is present in the region of interest.
    pub fn presence(&self) -> f32 {
        self.presence
    }

    /// Returns the estimated handedness.
    ///
    /// Only meaningful if [`HandLandmarks::presence`] is high enough.
    pub fn handedness(&self) -> Handedness {
        if self.raw_handedness > 0.5 {
            Handedness::Right
        } else {
            Handedness::Left
        }
    }

    /// Computes the clockwise rotation of the palm compared to an upright position.
    ///
    /// A rotation of 0° means that fingers are pointed upwards.
    pub fn rotation_radians(&self) -> f32 {
        let [fx, fy, _] = self.position(LandmarkIdx::MiddleFingerMcp);
        let [wx, wy, _] = self.position(LandmarkIdx::Wrist);
        let rel = Vector2::new(wx - fx, wy - fy);
        Rotation2::rotation_between(&Vector2::y(), &rel).angle()
    }

    /// Computes the region of interest to look for this hand in the next frame.
    ///
    /// Returns [`None`] if the landmarks are degenerate (not finite).
    pub fn tracking_roi(&self) -> Option<RotatedRect> {
        let points = TRACKING_LANDMARKS.iter().map(|&idx| {
            let [x, y, _] = self.position(idx);
            Vec2f::new(x, y)
        });
        let radians = self.rotation_radians();
        if !radians.is_finite() {
            return None;
        }

        let bounds = RotatedRect::bounding(radians, points)?;
        let height = bounds.rect().height();
        let roi = bounds.shift_local([0.0, -0.1 * height]).map(|rect| {
            rect.grow_to_fit_aspect(AspectRatio::SQUARE)
                .scale(TRACKING_ROI_SCALE)
        });
        Some(roi)
    }

    /// Converts the landmarks to a [`LandmarkSet`] normalized to a frame of resolution `res`.
    pub fn to_landmark_set(&self, res: Resolution) -> LandmarkSet {
        let (w, h) = (res.width() as f32, res.height() as f32);
        let landmarks = self
            .positions
            .iter()
            .map(|&[x, y, z]| Landmark::new(x / w, y / h, z / w))
            .collect();

        LandmarkSet::new(landmarks, HAND_CONNECTIONS)
            .with_presence(self.presence)
            .with_handedness(self.handedness())
    }
}

/// The full-size hand landmark network.
///
/// Takes a 224x224 crop of the hand, rotated so that the fingers point up.
#[derive(Clone)]
pub struct LandmarkNetwork {
    cnn: Cnn,
}

impl LandmarkNetwork {
    /// Loads the hand landmark network from an ONNX file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let nn = NeuralNetwork::from_path(path)?;
        let cnn = Cnn::new(nn, CnnInputShape::NCHW, ColorMapper::linear(0.0..=1.0))
            .with_context(|| format!("{} is not a hand landmark network", path.display()))?;
        Ok(Self { cnn })
    }

    /// Estimates the landmarks of the hand inside `roi`.
    pub fn estimate(&self, image: &Image, roi: &RotatedRect) -> anyhow::Result<HandLandmarks> {
        let outputs = self.cnn.estimate(image, roi)?;
        let mut estimate = extract(&outputs)?;

        let scale = self.cnn.input_scale(roi);
        for pos in &mut estimate.positions {
            let mapped = self.cnn.map_to_image(roi, pos[0], pos[1]);
            *pos = [mapped.x, mapped.y, pos[2] * scale.x];
        }

        Ok(estimate)
    }
}

/// Reads the raw network outputs. Positions are in network input coordinates.
fn extract(outputs: &Outputs) -> anyhow::Result<HandLandmarks> {
    let screen_landmarks = outputs.get_shaped::<Ix2>(0, &[1, NUM_LANDMARKS * 3])?;
    let presence = outputs.get_shaped::<Ix2>(1, &[1, 1])?;
    let handedness = outputs.get_shaped::<Ix2>(2, &[1, 1])?;
    // Metric world landmarks, only the shape is checked.
    outputs.get_shaped::<Ix2>(3, &[1, NUM_LANDMARKS * 3])?;

    let mut positions = [[0.0; 3]; NUM_LANDMARKS];
    for i in 0..NUM_LANDMARKS {
        for c in 0..3 {
            positions[i][c] = screen_landmarks[[0, i * 3 + c]];
        }
    }

    Ok(HandLandmarks {
        positions,
        presence: presence[[0, 0]],
        raw_handedness: handedness[[0, 0]],
    })
}
