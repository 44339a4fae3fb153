//! Hand detection and landmark estimation.
//!
//! This uses the two-stage approach of MediaPipe's hand tracking solution: a palm detector finds
//! hands in the full frame, then a landmark network computes 21 landmarks in a rotated region
//! around each hand. Hands with confident landmarks are tracked into the next frame without running
//! the (much slower) palm detector again.

use std::path::{Path, PathBuf};

use anyhow::bail;

pub mod detection;
pub mod landmark;
mod tracker;

pub use tracker::HandLandmarker;

/// File name of the palm detection network inside a model bundle.
pub const PALM_DETECTION_MODEL: &str = "palm_detection_full.onnx";
/// File name of the hand landmark network inside a model bundle.
pub const HAND_LANDMARK_MODEL: &str = "hand_landmark_full.onnx";

/// Paths to the networks used by the [`HandLandmarker`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelBundle {
    pub palm_detection: PathBuf,
    pub hand_landmark: PathBuf,
}

impl ModelBundle {
    /// Locates the networks of the bundle at `path`.
    ///
    /// `path` is either a directory containing [`PALM_DETECTION_MODEL`] and
    /// [`HAND_LANDMARK_MODEL`], or the landmark network's `.onnx` file itself, in which case the
    /// palm detection network is expected next to it.
    pub fn locate(path: &Path) -> anyhow::Result<Self> {
        let bundle = if path.is_dir() {
            Self {
                palm_detection: path.join(PALM_DETECTION_MODEL),
                hand_landmark: path.join(HAND_LANDMARK_MODEL),
            }
        } else if path.is_file() && path.extension().map_or(false, |ext| ext == "onnx") {
            let dir = path.parent().unwrap_or_else(|| Path::new("."));
            Self {
                palm_detection: dir.join(PALM_DETECTION_MODEL),
                hand_landmark: path.to_path_buf(),
            }
        } else {
            bail!(
                "model bundle '{}' not found (expected a directory containing {} and {})",
                path.display(),
                PALM_DETECTION_MODEL,
                HAND_LANDMARK_MODEL,
            );
        };

        for file in [&bundle.palm_detection, &bundle.hand_landmark] {
            if !file.is_file() {
                bail!("model bundle is missing '{}'", file.display());
            }
        }

        Ok(bundle)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn scratch_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("handmarks-bundle-{}", fastrand::u64(..)));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn locate_directory() {
        let dir = scratch_dir();
        assert!(ModelBundle::locate(&dir).is_err());

        fs::write(dir.join(PALM_DETECTION_MODEL), b"").unwrap();
        let err = ModelBundle::locate(&dir).unwrap_err();
        assert!(err.to_string().contains(HAND_LANDMARK_MODEL), "{err}");

        fs::write(dir.join(HAND_LANDMARK_MODEL), b"").unwrap();
        let bundle = ModelBundle::locate(&dir).unwrap();
        assert_eq!(bundle.palm_detection, dir.join(PALM_DETECTION_MODEL));
        assert_eq!(bundle.hand_landmark, dir.join(HAND_LANDMARK_MODEL));

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn locate_landmark_file() {
        let dir = scratch_dir();
        let custom = dir.join("my_landmarks.onnx");
        fs::write(&custom, b"").unwrap();
        fs::write(dir.join(PALM_DETECTION_MODEL), b"").unwrap();

        let bundle = ModelBundle::locate(&custom).unwrap();
        assert_eq!(bundle.hand_landmark, custom);
        assert_eq!(bundle.palm_detection, dir.join(PALM_DETECTION_MODEL));

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn locate_missing() {
        assert!(ModelBundle::locate(Path::new("/nonexistent/hand_landmarker")).is_err());
    }
}
