//! Non-Maximum Suppression and Averaging.
//!
//! Typical Single-Shot MultiBox Detectors (SSD) produce duplicate detections for individual
//! objects. Non-Maximum Suppression (NMS) filters these duplicates out, leaving only a single
//! detection with high confidence for each object.
//!
//! The variant implemented here is Non-Maximum Averaging: instead of discarding overlapping
//! detections with lower confidence, it computes a confidence-weighted average of them, which
//! reduces jitter of the tracked hand regions between frames.

use crate::{image::rect::Rect, num::TotalF32};

use super::{Detection, Keypoint};

/// A non-maximum suppression algorithm.
pub struct NonMaxSuppression {
    iou_thresh: f32,
    avg_buf: Vec<Detection>,
    out_buf: Vec<Detection>,
}

impl NonMaxSuppression {
    /// The default intersection-over-union threshold used to determine if two detections overlap.
    pub const DEFAULT_IOU_THRESH: f32 = 0.3;

    /// Creates a new non-maximum suppressor using [`Self::DEFAULT_IOU_THRESH`].
    pub fn new() -> Self {
        Self {
            iou_thresh: Self::DEFAULT_IOU_THRESH,
            avg_buf: Vec::new(),
            out_buf: Vec::new(),
        }
    }

    /// Sets the intersection-over-union threshold to consider two detections as overlapping.
    pub fn set_iou_thresh(&mut self, iou_thresh: f32) {
        self.iou_thresh = iou_thresh;
    }

    /// Performs non-maximum suppression on `detections`.
    ///
    /// `detections` is drained in the process. The filtered detections are returned as an
    /// iterator, highest confidence first.
    pub fn process(
        &mut self,
        detections: &mut Vec<Detection>,
    ) -> impl Iterator<Item = Detection> + '_ {
        self.out_buf.clear();

        // Sort by ascending confidence, process highest confidence first by starting at the back.
        detections.sort_unstable_by_key(|det| TotalF32(det.confidence));

        while let Some(seed) = detections.pop() {
            let overlaps =
                |other: &Detection| seed.bounding_rect().iou(&other.bounding_rect()) >= self.iou_thresh;
            self.avg_buf.clear();
            let mut i = 0;
            while i < detections.len() {
                if overlaps(&detections[i]) {
                    self.avg_buf.push(detections.remove(i));
                } else {
                    i += 1;
                }
            }
            let averaged = average(&seed, &self.avg_buf);
            self.out_buf.push(averaged);
        }

        self.avg_buf.clear();
        self.out_buf.drain(..)
    }
}

/// Computes the confidence-weighted average of `seed` and the detections overlapping it.
///
/// The result keeps the confidence of `seed`. Angles are averaged as unit vectors, so detections
/// on either side of the ±π wrap point average to an angle near π instead of 0.
fn average(seed: &Detection, others: &[Detection]) -> Detection {
    let mut keypoints = vec![Keypoint::new(0.0, 0.0); seed.keypoints().len()];
    let (mut x, mut y, mut w, mut h) = (0.0, 0.0, 0.0, 0.0);
    let (mut sin, mut cos) = (0.0f32, 0.0f32);
    let mut divisor = 0.0;
    for det in std::iter::once(seed).chain(others) {
        debug_assert_eq!(
            det.keypoints().len(),
            keypoints.len(),
            "keypoint count must be constant"
        );

        let factor = det.confidence;
        divisor += factor;
        for (acc, kp) in keypoints.iter_mut().zip(&det.keypoints) {
            acc.x += kp.x * factor;
            acc.y += kp.y * factor;
        }
        let rect = det.bounding_rect();
        x += rect.x_center() * factor;
        y += rect.y_center() * factor;
        w += rect.width() * factor;
        h += rect.height() * factor;
        sin += det.angle.sin() * factor;
        cos += det.angle.cos() * factor;
    }

    if divisor <= 0.0 {
        return seed.clone();
    }
    for kp in &mut keypoints {
        kp.x /= divisor;
        kp.y /= divisor;
    }

    let rect = Rect::from_center(x / divisor, y / divisor, w / divisor, h / divisor);
    let mut acc = Detection::with_keypoints(seed.confidence(), rect, keypoints);
    acc.set_angle(sin.atan2(cos));
    acc
}

impl Default for NonMaxSuppression {
    fn default() -> Self {
        Self::new()
    }
}
