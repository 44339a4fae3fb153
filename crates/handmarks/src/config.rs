//! Command line configuration.
//!
//! [`Args`] is what `clap` parses; it is validated once into a [`Config`], which is what the rest
//! of the program consumes.

use std::{fmt, num::NonZeroU32, path::PathBuf};

use anyhow::{anyhow, bail, Result};
use clap::Parser;

use crate::{
    image::Resolution,
    video::webcam::{ParamPreference, WebcamOptions},
};

/// Raw command line arguments.
///
/// Flag names keep their historical camelCase spelling.
#[derive(Debug, Parser)]
#[command(name = "handmarks", about = "Shows hand landmarks detected in a webcam stream")]
pub struct Args {
    /// Hand landmarker model bundle (a directory with the palm detection and hand landmark ONNX
    /// networks).
    #[arg(long = "model", value_name = "PATH", default_value = "hand_landmarker")]
    pub model: PathBuf,
    /// Maximum number of hands to detect.
    #[arg(long = "numHands", value_name = "N", default_value_t = 1)]
    pub num_hands: u32,
    /// Minimum palm detection score for a hand to be considered detected.
    #[arg(long = "minHandDetectionConfidence", value_name = "SCORE", default_value_t = 0.5)]
    pub min_hand_detection_confidence: f32,
    /// Minimum hand presence score of the landmark network for a result to be reported.
    #[arg(long = "minHandPresenceConfidence", value_name = "SCORE", default_value_t = 0.5)]
    pub min_hand_presence_confidence: f32,
    /// Minimum hand presence score for a hand to be tracked into the next frame.
    #[arg(long = "minTrackingConfidence", value_name = "SCORE", default_value_t = 0.5)]
    pub min_tracking_confidence: f32,
    /// Index of the camera (`/dev/video<N>`).
    #[arg(long = "cameraId", value_name = "N", default_value_t = 0)]
    pub camera_id: u32,
    /// Width of the frames to capture from the camera.
    #[arg(long = "frameWidth", value_name = "PX", default_value_t = 640)]
    pub frame_width: u32,
    /// Height of the frames to capture from the camera.
    #[arg(long = "frameHeight", value_name = "PX", default_value_t = 480)]
    pub frame_height: u32,
    /// Desired capture frame rate. Defaults to the fastest rate at the chosen resolution.
    #[arg(long = "fps", value_name = "HZ")]
    pub fps: Option<u32>,
    /// Keep the frame rate rather than the resolution when the camera cannot deliver both.
    #[arg(long = "preferFramerate")]
    pub prefer_framerate: bool,
    /// Number of frames over which the displayed FPS value is averaged.
    #[arg(long = "fpsWindow", value_name = "FRAMES", default_value_t = 10)]
    pub fps_window: u32,
}

/// A score in the range `[0, 1]`.
#[derive(Clone, Copy, PartialEq, PartialOrd)]
pub struct Confidence(f32);

impl Confidence {
    /// Returns `None` if `value` lies outside of `[0, 1]` (or is NaN).
    pub fn new(value: f32) -> Option<Self> {
        (0.0..=1.0).contains(&value).then_some(Self(value))
    }

    #[inline]
    pub fn get(self) -> f32 {
        self.0
    }
}

impl fmt::Debug for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Validated program configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub model: PathBuf,
    pub num_hands: NonZeroU32,
    pub min_hand_detection_confidence: Confidence,
    pub min_hand_presence_confidence: Confidence,
    pub min_tracking_confidence: Confidence,
    pub camera_id: u32,
    pub frame_width: NonZeroU32,
    pub frame_height: NonZeroU32,
    pub fps: Option<NonZeroU32>,
    pub prefer: ParamPreference,
    pub fps_window: NonZeroU32,
}

impl Config {
    /// Returns the requested capture resolution.
    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.frame_width.get(), self.frame_height.get())
    }

    /// Returns the options the webcam is opened with.
    pub fn webcam_options(&self) -> WebcamOptions {
        let options = WebcamOptions::default()
            .index(self.camera_id)
            .resolution(self.resolution())
            .prefer(self.prefer);
        match self.fps {
            Some(fps) => options.fps(fps.get()),
            None => options,
        }
    }
}

fn confidence(flag: &str, value: f32) -> Result<Confidence> {
    Confidence::new(value).ok_or_else(|| anyhow!("--{flag} must be within [0, 1], got {value}"))
}

fn nonzero(flag: &str, value: u32) -> Result<NonZeroU32> {
    match NonZeroU32::new(value) {
        Some(value) => Ok(value),
        None => bail!("--{flag} must be at least 1"),
    }
}

impl TryFrom<Args> for Config {
    type Error = anyhow::Error;

    fn try_from(args: Args) -> Result<Self> {
        Ok(Self {
            model: args.model,
            num_hands: nonzero("numHands", args.num_hands)?,
            min_hand_detection_confidence: confidence(
                "minHandDetectionConfidence",
                args.min_hand_detection_confidence,
            )?,
            min_hand_presence_confidence: confidence(
                "minHandPresenceConfidence",
                args.min_hand_presence_confidence,
            )?,
            min_tracking_confidence: confidence(
                "minTrackingConfidence",
                args.min_tracking_confidence,
            )?,
            camera_id: args.camera_id,
            frame_width: nonzero("frameWidth", args.frame_width)?,
            frame_height: nonzero("frameHeight", args.frame_height)?,
            fps: args.fps.map(|fps| nonzero("fps", fps)).transpose()?,
            prefer: if args.prefer_framerate {
                ParamPreference::Framerate
            } else {
                ParamPreference::Resolution
            },
            fps_window: nonzero("fpsWindow", args.fps_window)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Config> {
        let args = Args::try_parse_from(std::iter::once("handmarks").chain(args.iter().copied()))?;
        Config::try_from(args)
    }

    #[test]
    fn defaults() {
        let config = parse(&[]).unwrap();
        assert_eq!(config.model, PathBuf::from("hand_landmarker"));
        assert_eq!(config.num_hands.get(), 1);
        assert_eq!(config.min_hand_detection_confidence.get(), 0.5);
        assert_eq!(config.min_hand_presence_confidence.get(), 0.5);
        assert_eq!(config.min_tracking_confidence.get(), 0.5);
        assert_eq!(config.camera_id, 0);
        assert_eq!(config.resolution(), Resolution::new(640, 480));
        assert_eq!(config.fps_window.get(), 10);
        assert_eq!(config.fps, None);
        assert_eq!(config.prefer, ParamPreference::Resolution);
        assert_eq!(
            config.webcam_options(),
            WebcamOptions::default().resolution(Resolution::new(640, 480))
        );
    }

    #[test]
    fn capture_rate_options() {
        let config = parse(&["--cameraId", "1", "--fps", "60", "--preferFramerate"]).unwrap();
        assert_eq!(config.fps.map(NonZeroU32::get), Some(60));
        assert_eq!(config.prefer, ParamPreference::Framerate);
        assert_eq!(
            config.webcam_options(),
            WebcamOptions::default()
                .index(1)
                .resolution(Resolution::new(640, 480))
                .fps(60)
                .prefer(ParamPreference::Framerate)
        );
    }

    #[test]
    fn camel_case_flags() {
        let config = parse(&[
            "--model",
            "models/hands",
            "--numHands",
            "2",
            "--minHandDetectionConfidence",
            "0.25",
            "--minTrackingConfidence",
            "1",
            "--cameraId",
            "3",
            "--frameWidth",
            "1280",
            "--frameHeight=720",
        ])
        .unwrap();
        assert_eq!(config.model, PathBuf::from("models/hands"));
        assert_eq!(config.num_hands.get(), 2);
        assert_eq!(config.min_hand_detection_confidence.get(), 0.25);
        assert_eq!(config.min_tracking_confidence.get(), 1.0);
        assert_eq!(config.camera_id, 3);
        assert_eq!(config.resolution(), Resolution::new(1280, 720));
    }

    #[test]
    fn rejects_out_of_range_confidence() {
        let err = parse(&["--minHandPresenceConfidence", "1.5"]).unwrap_err();
        assert!(err.to_string().contains("minHandPresenceConfidence"), "{err}");
        assert!(parse(&["--minTrackingConfidence", "NaN"]).is_err());
        assert!(parse(&["--minHandDetectionConfidence=-0.1"]).is_err());
    }

    #[test]
    fn rejects_zero_sizes() {
        assert!(parse(&["--frameWidth", "0"]).is_err());
        assert!(parse(&["--frameHeight", "0"]).is_err());
        assert!(parse(&["--numHands", "0"]).is_err());
        assert!(parse(&["--fpsWindow", "0"]).is_err());
        assert!(parse(&["--fps", "0"]).is_err());
    }

    #[test]
    fn rejects_negative_camera() {
        assert!(parse(&["--cameraId", "-1"]).is_err());
    }

    #[test]
    fn confidence_bounds() {
        assert!(Confidence::new(0.0).is_some());
        assert!(Confidence::new(1.0).is_some());
        assert!(Confidence::new(1.0001).is_none());
        assert!(Confidence::new(f32::NAN).is_none());
    }
}
