//! Landmark sets and the detector interface.

use crate::{
    image::{Image, Resolution},
    timer::Timer,
};

/// A landmark in normalized frame coordinates.
///
/// `x` and `y` are relative to the frame's width and height, so that the frame covers `[0, 1]` on
/// both axes. `z` is the depth relative to the set's root landmark, using roughly the same scale as
/// `x`; smaller values are closer to the camera.
#[derive(Debug, PartialEq, Clone, Copy)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Returns whether the landmark lies within the frame.
    pub fn is_inside_frame(&self) -> bool {
        (0.0..=1.0).contains(&self.x) && (0.0..=1.0).contains(&self.y)
    }

    /// Converts the landmark to pixel coordinates in a frame of resolution `res`.
    ///
    /// Coordinates are truncated towards zero.
    pub fn to_pixel(&self, res: Resolution) -> (i32, i32) {
        (
            (self.x * res.width() as f32) as i32,
            (self.y * res.height() as f32) as i32,
        )
    }
}

/// Which hand a [`LandmarkSet`] belongs to, as seen from the person in the (mirrored) frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handedness {
    Left,
    Right,
}

/// One detected object's landmarks, plus the graph of which of them are connected.
#[derive(Debug, Clone, PartialEq)]
pub struct LandmarkSet {
    landmarks: Vec<Landmark>,
    connections: &'static [(usize, usize)],
    presence: f32,
    handedness: Option<Handedness>,
}

impl LandmarkSet {
    /// Creates a landmark set.
    ///
    /// # Panics
    ///
    /// This will panic if a connection refers to a landmark index that `landmarks` does not have.
    pub fn new(landmarks: Vec<Landmark>, connections: &'static [(usize, usize)]) -> Self {
        for &(a, b) in connections {
            assert!(
                a < landmarks.len() && b < landmarks.len(),
                "connection ({a}, {b}) out of range for {} landmarks",
                landmarks.len(),
            );
        }

        Self {
            landmarks,
            connections,
            presence: 1.0,
            handedness: None,
        }
    }

    pub fn with_presence(self, presence: f32) -> Self {
        Self { presence, ..self }
    }

    pub fn with_handedness(self, handedness: Handedness) -> Self {
        Self {
            handedness: Some(handedness),
            ..self
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.landmarks.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.landmarks.is_empty()
    }

    pub fn get(&self, index: usize) -> Landmark {
        self.landmarks[index]
    }

    pub fn landmarks(&self) -> &[Landmark] {
        &self.landmarks
    }

    /// Returns the index pairs of connected landmarks.
    pub fn connections(&self) -> &'static [(usize, usize)] {
        self.connections
    }

    /// Returns the detector's confidence that the object is actually present.
    pub fn presence(&self) -> f32 {
        self.presence
    }

    pub fn handedness(&self) -> Option<Handedness> {
        self.handedness
    }
}

/// A collaborator that finds landmark sets in frames.
///
/// Frames passed to [`LandmarkDetector::detect`] are RGBA; converting them to whatever input layout
/// the underlying model expects is up to the detector.
pub trait LandmarkDetector {
    /// Detects all landmark sets in `frame`.
    ///
    /// Returns an empty list if nothing was found. An error means that detection itself failed.
    fn detect(&mut self, frame: &Image) -> anyhow::Result<Vec<LandmarkSet>>;

    /// Returns profiling timers to report along with the frame rate.
    fn timers(&self) -> Vec<&Timer> {
        Vec::new()
    }
}

impl<D: LandmarkDetector + ?Sized> LandmarkDetector for Box<D> {
    fn detect(&mut self, frame: &Image) -> anyhow::Result<Vec<LandmarkSet>> {
        (**self).detect(frame)
    }

    fn timers(&self) -> Vec<&Timer> {
        (**self).timers()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static LINE: &[(usize, usize)] = &[(0, 1), (1, 2)];

    #[test]
    fn inside_frame() {
        assert!(Landmark::new(0.0, 1.0, -3.0).is_inside_frame());
        assert!(!Landmark::new(-0.01, 0.5, 0.0).is_inside_frame());
        assert!(!Landmark::new(0.5, 1.01, 0.0).is_inside_frame());
    }

    #[test]
    fn to_pixel() {
        let res = Resolution::new(640, 480);
        assert_eq!(Landmark::new(0.5, 0.25, 0.0).to_pixel(res), (320, 120));
        assert_eq!(Landmark::new(0.0, 0.0, 0.0).to_pixel(res), (0, 0));
    }

    #[test]
    fn set_accessors() {
        let set = LandmarkSet::new(vec![Landmark::new(0.0, 0.0, 0.0); 3], LINE)
            .with_presence(0.75)
            .with_handedness(Handedness::Left);
        assert_eq!(set.len(), 3);
        assert_eq!(set.connections(), LINE);
        assert_eq!(set.presence(), 0.75);
        assert_eq!(set.handedness(), Some(Handedness::Left));
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn connection_out_of_range() {
        LandmarkSet::new(vec![Landmark::new(0.0, 0.0, 0.0); 2], LINE);
    }
}
