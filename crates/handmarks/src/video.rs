//! Video input.

use crate::{image::Image, timer::Timer};

pub mod webcam;

/// A collaborator that produces frames.
pub trait FrameSource {
    /// Reads the next frame, blocking until one is available.
    ///
    /// An error means the source can not produce any more frames.
    fn read(&mut self) -> anyhow::Result<Image>;

    /// Returns profiling timers to report along with the frame rate.
    fn timers(&self) -> Vec<&Timer> {
        Vec::new()
    }
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn read(&mut self) -> anyhow::Result<Image> {
        (**self).read()
    }

    fn timers(&self) -> Vec<&Timer> {
        (**self).timers()
    }
}
