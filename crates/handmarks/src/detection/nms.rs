//! Non-Maximum Averaging.
//!
//! Single-Shot MultiBox Detectors (SSD) produce duplicate detections for individual objects.
//! Non-Maximum Suppression (NMS) filters these duplicates out, leaving only a single detection
//! for each object. The variant implemented here computes a confidence-weighted average of the
//! overlapping detections instead of discarding them, which reduces jitter between frames.

use crate::{num::TotalF32, rect::Rect};

use super::{Detection, Keypoint};

/// A non-maximum suppression algorithm that averages overlapping detections.
pub struct NonMaxSuppression {
    avg_buf: Vec<Detection>,
}

impl NonMaxSuppression {
    /// The intersection-over-union threshold at which two detections are considered overlapping.
    pub const IOU_THRESH: f32 = 0.3;

    pub fn new() -> Self {
        Self {
            avg_buf: Vec::new(),
        }
    }

    /// Performs non-maximum averaging on `detections`.
    ///
    /// `detections` is drained in the process. The filtered detections are returned in order of
    /// descending confidence.
    pub fn process(&mut self, detections: &mut Vec<Detection>) -> Vec<Detection> {
        let mut out = Vec::new();

        // Sort by ascending confidence, process highest confidence first by starting at the back.
        detections.sort_unstable_by_key(|det| TotalF32(det.confidence()));

        while let Some(seed) = detections.pop() {
            self.avg_buf.clear();
            let mut i = 0;
            while i < detections.len() {
                let iou = seed.bounding_rect().iou(&detections[i].bounding_rect());
                if iou >= Self::IOU_THRESH {
                    self.avg_buf.push(detections.swap_remove(i));
                } else {
                    i += 1;
                }
            }
            // `swap_remove` shuffles the tail, restore the ordering.
            detections.sort_unstable_by_key(|det| TotalF32(det.confidence()));

            out.push(average(&seed, &self.avg_buf));
        }

        self.avg_buf.clear();
        out
    }
}

/// Computes the confidence-weighted average of `seed` and `overlapping`.
///
/// The result keeps the seed's confidence.
fn average(seed: &Detection, overlapping: &[Detection]) -> Detection {
    let mut acc_rect = [0.0; 4];
    let mut acc_angle = 0.0;
    let mut acc_keypoints = vec![Keypoint::new(0.0, 0.0); seed.keypoints().len()];
    let mut divisor = 0.0;
    for det in std::iter::once(seed).chain(overlapping) {
        let factor = det.confidence();
        divisor += factor;
        for (acc, kp) in acc_keypoints.iter_mut().zip(det.keypoints()) {
            acc.x += kp.x * factor;
            acc.y += kp.y * factor;
        }
        let rect = det.bounding_rect();
        acc_rect[0] += rect.center().x * factor;
        acc_rect[1] += rect.center().y * factor;
        acc_rect[2] += rect.width() * factor;
        acc_rect[3] += rect.height() * factor;
        acc_angle += det.angle() * factor;
    }

    if divisor <= 0.0 {
        return seed.clone();
    }

    for kp in &mut acc_keypoints {
        kp.x /= divisor;
        kp.y /= divisor;
    }
    let [x, y, w, h] = acc_rect.map(|v| v / divisor);

    let mut acc =
        Detection::with_keypoints(seed.confidence(), Rect::from_center(x, y, w, h), acc_keypoints);
    acc.set_angle(acc_angle / divisor);
    acc
}

impl Default for NonMaxSuppression {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn nms_ignores_nonoverlapping() {
        let mut nms = NonMaxSuppression::new();

        let a = Detection::new(0.7, Rect::from_center(0.0, 0.0, 1.0, 1.0));
        let b = Detection::new(0.9, Rect::from_center(5.0, 0.0, 1.0, 1.0));

        let detections = nms.process(&mut vec![a, b]);
        assert_eq!(detections.len(), 2);
        assert_eq!(detections[0].confidence(), 0.9);
        assert_eq!(detections[1].confidence(), 0.7);
    }

    #[test]
    fn nma_averages_detections() {
        let mut nms = NonMaxSuppression::new();

        let rect = Rect::from_center(-1.0, 3.0, 1.0, 1.0);
        let mut a = Detection::with_keypoints(1.0, rect, vec![Keypoint::new(0.0, 0.0)]);
        a.set_angle(0.3);
        let b = Detection::with_keypoints(0.5, rect.scale(1.5), vec![Keypoint::new(3.0, 6.0)]);
        let detections = nms.process(&mut vec![a, b]);
        assert_eq!(detections.len(), 1);

        let d = &detections[0];
        assert_eq!(d.confidence(), 1.0);
        let averaged = d.bounding_rect();
        assert_relative_eq!(averaged.center().x, -1.0);
        assert_relative_eq!(averaged.center().y, 3.0);
        assert_relative_eq!(averaged.width(), 1.75 / 1.5, max_relative = 1e-5);
        assert_relative_eq!(averaged.height(), 1.75 / 1.5, max_relative = 1e-5);
        assert_relative_eq!(d.keypoints()[0].x, 1.0, max_relative = 1e-5);
        assert_relative_eq!(d.keypoints()[0].y, 2.0, max_relative = 1e-5);
        assert_relative_eq!(d.angle(), 0.2, max_relative = 1e-5);
    }

    #[test]
    fn nma_keeps_separate_clusters() {
        let mut nms = NonMaxSuppression::new();

        let left = Rect::from_center(0.0, 0.0, 10.0, 10.0);
        let right = Rect::from_center(100.0, 0.0, 10.0, 10.0);
        let mut detections = vec![
            Detection::new(0.8, left),
            Detection::new(0.95, right),
            Detection::new(0.6, left.scale(1.1)),
            Detection::new(0.7, right.scale(0.9)),
        ];
        let out = nms.process(&mut detections);
        assert!(detections.is_empty());
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].confidence(), 0.95);
        assert!(out[0].bounding_rect().center().x > 90.0);
        assert_eq!(out[1].confidence(), 0.8);
        assert!(out[1].bounding_rect().center().x < 10.0);
    }
}
