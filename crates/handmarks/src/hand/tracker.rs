use crate::{
    config::Config,
    detection::Detection,
    image::{AspectRatio, Image},
    landmark::{LandmarkDetector, LandmarkSet},
    rect::RotatedRect,
    timer::Timer,
};

use super::{detection::PalmDetector, landmark::LandmarkNetwork, ModelBundle};

/// Palm regions are enlarged by this factor to cover the whole hand.
const PALM_ROI_SCALE: f32 = 2.6;

/// Regions overlapping by at least this much are considered to contain the same hand.
const DUPLICATE_IOU: f32 = 0.3;

/// Detects and tracks hands, producing 21 landmarks per hand.
///
/// The palm detector only runs while fewer than the maximum number of hands are tracked. A hand
/// stays tracked as long as the landmark network's presence score is at least the tracking
/// threshold.
pub struct HandLandmarker {
    palm: PalmDetector,
    landmarks: LandmarkNetwork,
    max_hands: usize,
    presence_thresh: f32,
    tracking_thresh: f32,
    tracked: Vec<RotatedRect>,
    t_palm: Timer,
    t_landmarks: Timer,
}

impl HandLandmarker {
    /// Loads the networks from the configured model bundle and applies the configured thresholds.
    pub fn load(config: &Config) -> anyhow::Result<Self> {
        let bundle = ModelBundle::locate(&config.model)?;
        log::info!(
            "loading hand landmarker from {} and {}",
            bundle.palm_detection.display(),
            bundle.hand_landmark.display(),
        );

        let mut palm = PalmDetector::load(&bundle.palm_detection)?;
        palm.set_threshold(config.min_hand_detection_confidence.get());
        let landmarks = LandmarkNetwork::load(&bundle.hand_landmark)?;

        let mut this = Self::new(palm, landmarks);
        this.set_max_hands(config.num_hands.get() as usize);
        this.set_presence_threshold(config.min_hand_presence_confidence.get());
        this.set_tracking_threshold(config.min_tracking_confidence.get());
        Ok(this)
    }

    pub fn new(palm: PalmDetector, landmarks: LandmarkNetwork) -> Self {
        Self {
            palm,
            landmarks,
            max_hands: 1,
            presence_thresh: 0.5,
            tracking_thresh: 0.5,
            tracked: Vec::new(),
            t_palm: Timer::new("palm detection"),
            t_landmarks: Timer::new("hand landmarks"),
        }
    }

    pub fn set_max_hands(&mut self, max_hands: usize) {
        self.max_hands = max_hands;
    }

    /// Sets the minimum presence score of a hand to be reported.
    pub fn set_presence_threshold(&mut self, thresh: f32) {
        self.presence_thresh = thresh;
    }

    /// Sets the minimum presence score of a hand to be tracked into the next frame.
    pub fn set_tracking_threshold(&mut self, thresh: f32) {
        self.tracking_thresh = thresh;
    }
}

impl LandmarkDetector for HandLandmarker {
    fn detect(&mut self, frame: &Image) -> anyhow::Result<Vec<LandmarkSet>> {
        let mut rois = std::mem::take(&mut self.tracked);

        if rois.len() < self.max_hands {
            let detections = self.t_palm.time(|| self.palm.detect(frame))?;
            for det in &detections {
                if rois.len() >= self.max_hands {
                    break;
                }
                let roi = palm_roi(det);
                if !overlaps_any(&rois, &roi) {
                    rois.push(roi);
                }
            }
        }

        let mut sets = Vec::with_capacity(rois.len());
        for roi in &rois {
            let hand = self.t_landmarks.time(|| self.landmarks.estimate(frame, roi))?;
            if hand.presence() < self.presence_thresh {
                log::trace!("hand presence {} too low, dropping", hand.presence());
                continue;
            }

            if hand.presence() >= self.tracking_thresh {
                if let Some(next) = hand.tracking_roi() {
                    if !overlaps_any(&self.tracked, &next) {
                        self.tracked.push(next);
                    }
                }
            }

            sets.push(hand.to_landmark_set(frame.resolution()));
        }

        Ok(sets)
    }

    fn timers(&self) -> Vec<&Timer> {
        vec![&self.t_palm, &self.t_landmarks]
    }
}

/// Computes the region that the landmark network should look at for a palm detection.
fn palm_roi(det: &Detection) -> RotatedRect {
    let height = det.bounding_rect().height();
    det.rotated_rect()
        .shift_local([0.0, -0.5 * height])
        .map(|rect| rect.grow_to_fit_aspect(AspectRatio::SQUARE).scale(PALM_ROI_SCALE))
}

/// Returns whether `roi` likely contains a hand already covered by one of `rois`.
///
/// Compares the unrotated rectangles, which is good enough to catch duplicates.
fn overlaps_any(rois: &[RotatedRect], roi: &RotatedRect) -> bool {
    rois.iter()
        .any(|other| other.rect().iou(roi.rect()) >= DUPLICATE_IOU)
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use crate::rect::Rect;

    use super::*;

    #[test]
    fn palm_roi_covers_fingers() {
        // Upright palm: the region is moved up, towards the fingers.
        let det = Detection::new(0.9, Rect::from_center(100.0, 100.0, 20.0, 10.0));
        let roi = palm_roi(&det);
        assert_relative_eq!(roi.rect().width(), 52.0);
        assert_relative_eq!(roi.rect().height(), 52.0);
        assert_relative_eq!(roi.center().x, 100.0);
        assert_relative_eq!(roi.center().y, 95.0);

        // Fingers pointing right: the region is moved right instead.
        let mut det = det;
        det.set_angle(std::f32::consts::FRAC_PI_2);
        let roi = palm_roi(&det);
        assert_relative_eq!(roi.center().x, 105.0, epsilon = 1e-4);
        assert_relative_eq!(roi.center().y, 100.0, epsilon = 1e-4);
        assert_relative_eq!(roi.rotation_radians(), std::f32::consts::FRAC_PI_2);
    }

    #[test]
    fn duplicates() {
        let a = RotatedRect::from(Rect::from_center(50.0, 50.0, 40.0, 40.0));
        let near = RotatedRect::from(Rect::from_center(55.0, 50.0, 40.0, 40.0));
        let far = RotatedRect::from(Rect::from_center(150.0, 50.0, 40.0, 40.0));

        assert!(!overlaps_any(&[], &a));
        assert!(overlaps_any(&[a], &near));
        assert!(!overlaps_any(&[a], &far));
    }
}
