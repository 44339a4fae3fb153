//! Palm detection.

use std::path::Path;

use anyhow::Context;
use tract_onnx::prelude::tract_ndarray::Ix3;

use crate::{
    detection::{
        nms::NonMaxSuppression,
        ssd::{Anchor, Anchors, LayerInfo},
        Detection,
    },
    image::Image,
    nn::{Cnn, CnnInputShape, ColorMapper, NeuralNetwork, Outputs},
    num::sigmoid,
    rect::{Rect, RotatedRect},
};

/// A keypoint of a palm [`Detection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keypoint {
    Wrist = 0,
    IndexFingerMcp = 1,
    MiddleFingerMcp = 2,
    RingFingerMcp = 3,
    PinkyMcp = 4,
    ThumbCmc = 5,
    ThumbMcp = 6,
}

const NUM_KEYPOINTS: usize = 7;

/// Number of values the network outputs per anchor: 4 box parameters, then 2 per keypoint.
const BOX_PARAMS: usize = 4 + NUM_KEYPOINTS * 2;

const LAYERS: &[LayerInfo] = &[LayerInfo::new(2, 24, 24), LayerInfo::new(6, 12, 12)];

/// Raw scores are clipped to this range before applying the sigmoid.
const SCORE_CLIP: f32 = 100.0;

/// Detects palms in full frames.
///
/// The frame is letterboxed to the square network input; detections are returned in frame
/// coordinates, with their angle describing the clockwise rotation of the hand (0 means fingers
/// pointing up).
pub struct PalmDetector {
    cnn: Cnn,
    anchors: Anchors,
    nms: NonMaxSuppression,
    thresh: f32,
}

impl PalmDetector {
    /// The default detection confidence threshold.
    pub const DEFAULT_THRESHOLD: f32 = 0.5;

    /// Loads the palm detection network from an ONNX file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let nn = NeuralNetwork::from_path(path)?;
        let cnn = Cnn::new(nn, CnnInputShape::NCHW, ColorMapper::linear(0.0..=1.0))
            .with_context(|| format!("{} is not a palm detection network", path.display()))?;
        Ok(Self::new(cnn))
    }

    pub fn new(cnn: Cnn) -> Self {
        Self {
            cnn,
            anchors: Anchors::calculate(LAYERS),
            nms: NonMaxSuppression::new(),
            thresh: Self::DEFAULT_THRESHOLD,
        }
    }

    /// Sets the minimum confidence a detection needs to be reported.
    pub fn set_threshold(&mut self, thresh: f32) {
        self.thresh = thresh;
    }

    /// Detects palms in `image`, returning them in order of descending confidence.
    pub fn detect(&mut self, image: &Image) -> anyhow::Result<Vec<Detection>> {
        let input_res = self.cnn.input_resolution();
        let aspect = input_res
            .aspect_ratio()
            .context("palm detection network has an empty input")?;
        let roi = RotatedRect::from(image.rect().grow_to_fit_aspect(aspect));

        let outputs = self.cnn.estimate(image, &roi)?;
        let mut detections = extract_outputs(
            &self.anchors,
            (input_res.width() as f32, input_res.height() as f32),
            &outputs,
            self.thresh,
        )?;
        log::trace!("palm detector: {} raw detections", detections.len());

        let scale = self.cnn.input_scale(&roi);
        for det in &mut detections {
            det.map_positions(scale, |x, y| self.cnn.map_to_image(&roi, x, y));
            det.set_angle_from_keypoints(
                Keypoint::Wrist as usize,
                Keypoint::MiddleFingerMcp as usize,
            );
        }

        Ok(self.nms.process(&mut detections))
    }
}

/// Decodes the network's `[1, anchors, 18]` boxes and `[1, anchors, 1]` scores.
///
/// Positions are in network input coordinates.
fn extract_outputs(
    anchors: &Anchors,
    input_size: (f32, f32),
    outputs: &Outputs,
    thresh: f32,
) -> anyhow::Result<Vec<Detection>> {
    let num_anchors = anchors.anchor_count();
    let boxes = outputs.get_shaped::<Ix3>(0, &[1, num_anchors, BOX_PARAMS])?;
    let scores = outputs.get_shaped::<Ix3>(1, &[1, num_anchors, 1])?;

    let mut detections = Vec::new();
    for index in 0..num_anchors {
        let conf = sigmoid(scores[[0, index, 0]].clamp(-SCORE_CLIP, SCORE_CLIP));
        if conf < thresh {
            continue;
        }

        let mut params = [0.0; BOX_PARAMS];
        for (i, param) in params.iter_mut().enumerate() {
            *param = boxes[[0, index, i]];
        }
        detections.push(extract_detection(&anchors[index], input_size, &params, conf));
    }

    Ok(detections)
}

fn extract_detection(
    anchor: &Anchor,
    (input_w, input_h): (f32, f32),
    box_params: &[f32; BOX_PARAMS],
    confidence: f32,
) -> Detection {
    let offset_x = anchor.x_center() * input_w;
    let offset_y = anchor.y_center() * input_h;

    let xc = box_params[0] + offset_x;
    let yc = box_params[1] + offset_y;
    let w = box_params[2];
    let h = box_params[3];

    let keypoints = box_params[4..]
        .chunks_exact(2)
        .map(|xy| crate::detection::Keypoint::new(xy[0] + offset_x, xy[1] + offset_y))
        .collect();

    Detection::with_keypoints(confidence, Rect::from_center(xc, yc, w, h), keypoints)
}
