//! Object detection results and post-processing.

pub mod nms;
pub mod ssd;

use nalgebra::{Rotation2, Vector2};

use crate::rect::{Rect, RotatedRect};

/// A detected object.
///
/// A [`Detection`] consists of a [`Rect`] enclosing the detected object, a confidence value, an
/// optional rotation angle of the object, and a possibly empty set of located keypoints.
#[derive(Debug, Clone)]
pub struct Detection {
    confidence: f32,
    angle: f32,
    rect: Rect,
    keypoints: Vec<Keypoint>,
}

impl Detection {
    /// Creates a new [`Detection`] from a confidence score and a bounding rectangle.
    pub fn new(confidence: f32, rect: Rect) -> Self {
        Self {
            confidence,
            angle: 0.0,
            rect,
            keypoints: Vec::new(),
        }
    }

    /// Creates a new [`Detection`] that includes a list of keypoints.
    pub fn with_keypoints(confidence: f32, rect: Rect, keypoints: Vec<Keypoint>) -> Self {
        Self {
            confidence,
            angle: 0.0,
            rect,
            keypoints,
        }
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    /// Returns the clockwise rotation of the detected object in radians.
    ///
    /// An angle of 0 means the object is upright.
    pub fn angle(&self) -> f32 {
        self.angle
    }

    pub fn set_angle(&mut self, angle: f32) {
        self.angle = angle;
    }

    /// Sets the angle so that the object points from keypoint `from` towards keypoint `to`, with
    /// an upright object pointing towards the top of the image.
    ///
    /// # Panics
    ///
    /// This method panics if `from` or `to` are out of bounds.
    pub fn set_angle_from_keypoints(&mut self, from: usize, to: usize) {
        let (a, b) = (&self.keypoints[from], &self.keypoints[to]);
        let rel = Vector2::new(a.x - b.x, a.y - b.y);
        self.angle = Rotation2::rotation_between(&Vector2::y(), &rel).angle();
    }

    /// Returns the axis-aligned bounding rectangle containing the detected object.
    pub fn bounding_rect(&self) -> Rect {
        self.rect
    }

    /// Returns the bounding rectangle rotated by the object's [`angle`](Self::angle).
    pub fn rotated_rect(&self) -> RotatedRect {
        RotatedRect::new(self.rect, self.angle)
    }

    pub fn keypoints(&self) -> &[Keypoint] {
        &self.keypoints
    }

    /// Applies `f` to the bounding rectangle's center and every keypoint, and scales the rectangle
    /// by `scale`.
    ///
    /// This is used to map detections from network input coordinates back to image coordinates.
    pub fn map_positions(
        &mut self,
        scale: Vector2<f32>,
        mut f: impl FnMut(f32, f32) -> Vector2<f32>,
    ) {
        let center = f(self.rect.center().x, self.rect.center().y);
        self.rect = Rect::from_center(
            center.x,
            center.y,
            self.rect.width() * scale.x,
            self.rect.height() * scale.y,
        );
        for kp in &mut self.keypoints {
            let pos = f(kp.x, kp.y);
            kp.x = pos.x;
            kp.y = pos.y;
        }
    }
}

/// A 2D keypoint produced as part of a [`Detection`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
}

impl Keypoint {
    #[inline]
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}
