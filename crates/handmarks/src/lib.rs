//! Webcam hand landmark viewer.
//!
//! Frames are pulled from a [`FrameSource`], mirrored, handed to a [`LandmarkDetector`] and shown
//! on a [`Display`] together with the measured frame rate. The loop in [`app`] only talks to these
//! traits; the binary plugs in a V4L2 [`Webcam`], the two-stage [`HandLandmarker`] and a
//! winit/wgpu [`Gui`].
//!
//! # Coordinates
//!
//! Image coordinates have their origin in the top left corner, with X pointing right and Y
//! pointing *down*. Rotation angles are measured in radians, clockwise as seen on screen.
//! [`Landmark`]s use coordinates normalized to the frame size, so `(0.0, 0.0)` is the top left and
//! `(1.0, 1.0)` the bottom right corner of the frame.
//!
//! # Environment Variables
//!
//! * `HANDMARKS_JPEG_BACKEND`: Configures the JPEG image decoder to use. Allowed values are:
//!   * `jpeg-decoder` (the default): uses the [jpeg-decoder] crate via `image`.
//!   * `zune-jpeg`: uses the [zune-jpeg] crate.
//! * `RUST_LOG`: standard [`env_logger`] filter, applied on top of the defaults set by
//!   [`init_logger!`].
//!
//! [jpeg-decoder]: https://github.com/image-rs/jpeg-decoder/
//! [zune-jpeg]: https://github.com/etemesi254/zune-jpeg
//! [`FrameSource`]: video::FrameSource
//! [`LandmarkDetector`]: landmark::LandmarkDetector
//! [`Landmark`]: landmark::Landmark
//! [`Display`]: gui::Display
//! [`Webcam`]: video::webcam::Webcam
//! [`HandLandmarker`]: hand::HandLandmarker
//! [`Gui`]: gui::Gui

use log::LevelFilter;

pub mod app;
pub mod config;
pub mod detection;
pub mod filter;
pub mod gui;
pub mod hand;
pub mod image;
pub mod landmark;
pub mod nn;
pub mod num;
pub mod overlay;
pub mod rect;
pub mod timer;
pub mod video;

/// macro-use only, not part of public API.
#[doc(hidden)]
pub fn init_logger(calling_crate: &'static str) {
    let log_level = LevelFilter::Debug;
    env_logger::Builder::new()
        .filter(Some(calling_crate), log_level)
        .filter(Some(env!("CARGO_PKG_NAME")), log_level)
        .filter(Some("wgpu"), LevelFilter::Warn)
        .parse_default_env()
        .try_init()
        .ok();
}

/// Initializes logging to *stderr*.
///
/// The calling crate and this library log at *debug* level, `wgpu` at *warn* level. `RUST_LOG` is
/// applied on top of that.
///
/// If a global logger is already registered, this macro will do nothing.
#[macro_export]
macro_rules! init_logger {
    () => {
        $crate::init_logger(env!("CARGO_CRATE_NAME"))
    };
}
