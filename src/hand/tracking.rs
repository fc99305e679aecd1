//! Multi-hand tracking.
//!
//! [`HandTracker`] combines the palm detector and the landmark network. The expensive palm
//! detector only runs while fewer hands are tracked than configured; a hand that is already being
//! tracked gets its region of interest for the next frame from the landmarks of the current one.

use std::path::Path;

use anyhow::{bail, ensure};

use crate::detection::{Detection, Detector};
use crate::image::rect::{Rect, RotatedRect};
use crate::image::{AspectRatio, ChannelOrder, Frame, Resolution};
use crate::timer::Timer;

use super::detection::PalmNetwork;
use super::landmark::{Landmark, LandmarkNetwork, LandmarkSet};
use super::LandmarkDetector;

/// Hand tracking configuration.
///
/// Created with [`TrackerConfig::default`] and adjusted with the builder methods; validated when
/// passed to [`HandTracker::new`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackerConfig {
    min_detection_confidence: f32,
    min_tracking_confidence: f32,
    max_hands: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            min_detection_confidence: 0.7,
            min_tracking_confidence: 0.5,
            max_hands: 2,
        }
    }
}

impl TrackerConfig {
    /// Sets the confidence a hand needs to be picked up for the first time.
    ///
    /// This is used both as the palm detection score threshold and as the minimum landmark
    /// presence for a newly detected hand. Default: 0.7.
    #[must_use]
    pub fn min_detection_confidence(mut self, confidence: f32) -> Self {
        self.min_detection_confidence = confidence;
        self
    }

    /// Sets the presence confidence below which a tracked hand is considered lost.
    ///
    /// Default: 0.5.
    #[must_use]
    pub fn min_tracking_confidence(mut self, confidence: f32) -> Self {
        self.min_tracking_confidence = confidence;
        self
    }

    /// Sets the maximum number of hands to track at once. Default: 2.
    #[must_use]
    pub fn max_hands(mut self, max_hands: usize) -> Self {
        self.max_hands = max_hands;
        self
    }

    /// Checks that both confidence thresholds are in range 0.0 to 1.0.
    pub fn validate(&self) -> anyhow::Result<()> {
        for (name, value) in [
            ("min_detection_confidence", self.min_detection_confidence),
            ("min_tracking_confidence", self.min_tracking_confidence),
        ] {
            ensure!(
                (0.0..=1.0).contains(&value),
                "{name} must be between 0.0 and 1.0, got {value}"
            );
        }
        Ok(())
    }
}

/// Intersection-over-union at which a palm detection is considered to be an already tracked hand.
const IOU_THRESH: f32 = 0.3;

/// Relative padding added to every side of the landmarks' bounding box to get the next region.
const ROI_PADDING: f32 = 0.3;

/// Palm -> hand region: shift towards the fingers by half the palm height, then enlarge.
const PALM_SHIFT_Y: f32 = -0.5;
const PALM_SCALE: f32 = 2.6;

/// Locates palms in a whole frame.
trait PalmStage {
    fn palms(&mut self, frame: &Frame) -> anyhow::Result<&[Detection]>;
    fn timers(&self) -> Vec<&Timer>;
}

impl PalmStage for Detector {
    fn palms(&mut self, frame: &Frame) -> anyhow::Result<&[Detection]> {
        self.detect(frame)
    }

    fn timers(&self) -> Vec<&Timer> {
        Detector::timers(self).collect()
    }
}

/// Estimates the landmarks of a single hand inside a region of a frame.
trait LandmarkStage {
    fn estimate(&self, frame: &Frame, roi: &RotatedRect) -> anyhow::Result<LandmarkSet>;
    fn timers(&self) -> Vec<&Timer>;
}

impl LandmarkStage for LandmarkNetwork {
    fn estimate(&self, frame: &Frame, roi: &RotatedRect) -> anyhow::Result<LandmarkSet> {
        LandmarkNetwork::estimate(self, frame, roi)
    }

    fn timers(&self) -> Vec<&Timer> {
        vec![self.timer()]
    }
}

/// Tracks up to [`TrackerConfig::max_hands`] hands across frames.
pub struct HandTracker {
    config: TrackerConfig,
    palms: Box<dyn PalmStage>,
    landmarks: Box<dyn LandmarkStage>,
    hands: Vec<TrackedHand>,
    t_track: Timer,
}

struct TrackedHand {
    roi: RotatedRect,
}

impl HandTracker {
    /// Creates a hand tracker from already loaded networks.
    pub fn new(
        config: TrackerConfig,
        palm: PalmNetwork,
        landmarker: LandmarkNetwork,
    ) -> anyhow::Result<Self> {
        config.validate()?;

        let mut palm_detector = Detector::new(palm);
        palm_detector.set_threshold(config.min_detection_confidence);
        Ok(Self::from_stages(config, Box::new(palm_detector), Box::new(landmarker)))
    }

    fn from_stages(
        config: TrackerConfig,
        palms: Box<dyn PalmStage>,
        landmarks: Box<dyn LandmarkStage>,
    ) -> Self {
        Self {
            config,
            palms,
            landmarks,
            hands: Vec::new(),
            t_track: Timer::new("track"),
        }
    }

    /// Loads both networks from `model_dir` and creates a hand tracker.
    pub fn load(config: TrackerConfig, model_dir: impl AsRef<Path>) -> anyhow::Result<Self> {
        let dir = model_dir.as_ref();
        let palm = PalmNetwork::load(dir.join(PalmNetwork::FILE_NAME))?;
        let landmarker = LandmarkNetwork::load(dir.join(LandmarkNetwork::FILE_NAME))?;
        Self::new(config, palm, landmarker)
    }

    /// Tracks hands in `frame`, returning their landmarks in pixel coordinates.
    fn track(&mut self, frame: &Frame) -> anyhow::Result<Vec<LandmarkSet>> {
        let _guard = self.t_track.start();
        let mut results = Vec::with_capacity(self.hands.len());

        // Re-estimate every tracked hand in the region predicted by the last frame.
        let mut kept = Vec::with_capacity(self.hands.len());
        for hand in std::mem::take(&mut self.hands) {
            let set = self.landmarks.estimate(frame, &hand.roi)?;
            if set.presence() < self.config.min_tracking_confidence {
                log::debug!(
                    "tracking lost (presence {:.2} < {:.2})",
                    set.presence(),
                    self.config.min_tracking_confidence,
                );
                continue;
            }

            let roi = landmark_roi(&set);
            if overlaps_any(&roi, &kept) {
                log::trace!("dropping duplicate hand at {:?}", roi);
                continue;
            }
            kept.push(TrackedHand { roi });
            results.push(set);
        }
        self.hands = kept;

        if self.hands.len() < self.config.max_hands {
            let detections = self.palms.palms(frame)?;
            log::trace!("{} palm detections", detections.len());

            for det in detections {
                if self.hands.len() >= self.config.max_hands {
                    break;
                }
                let roi = palm_roi(det);
                if overlaps_any(&roi, &self.hands) {
                    continue;
                }

                let set = self.landmarks.estimate(frame, &roi)?;
                if set.presence() < self.config.min_detection_confidence {
                    log::trace!("rejecting palm with hand presence {:.2}", set.presence());
                    continue;
                }

                log::debug!(
                    "new {:?} hand at {:?} (palm confidence {:.2})",
                    set.handedness(),
                    roi,
                    det.confidence(),
                );
                self.hands.push(TrackedHand {
                    roi: landmark_roi(&set),
                });
                results.push(set);
            }
        }

        Ok(results)
    }
}

impl LandmarkDetector for HandTracker {
    fn channel_order(&self) -> ChannelOrder {
        ChannelOrder::Rgb
    }

    fn detect(&mut self, frame: &Frame) -> anyhow::Result<Vec<LandmarkSet>> {
        if frame.order() != self.channel_order() {
            bail!(
                "hand tracker needs {:?} frames, got {:?}",
                self.channel_order(),
                frame.order()
            );
        }

        let res = frame.resolution();
        let mut sets = self.track(frame)?;
        for set in &mut sets {
            normalize(set, res);
        }
        Ok(sets)
    }

    fn timers(&self) -> Vec<&Timer> {
        let mut timers = self.palms.timers();
        timers.extend(self.landmarks.timers());
        timers.push(&self.t_track);
        timers
    }
}

fn overlaps_any(roi: &RotatedRect, hands: &[TrackedHand]) -> bool {
    let rect = roi.bounding_rect();
    hands
        .iter()
        .any(|hand| hand.roi.bounding_rect().iou(&rect) >= IOU_THRESH)
}

/// Computes the region the landmark network should look at for a detected palm.
fn palm_roi(det: &Detection) -> RotatedRect {
    let palm = RotatedRect::new(det.bounding_rect(), det.angle());
    let height = palm.rect().height();
    palm.shift(0.0, PALM_SHIFT_Y * height)
        .map(|rect| rect.scale(PALM_SCALE))
        .grow_to_fit_aspect(AspectRatio::SQUARE)
}

/// Computes the region to track a hand in during the next frame, from its current landmarks.
fn landmark_roi(set: &LandmarkSet) -> RotatedRect {
    let bounds = RotatedRect::bounding(set.rotation_radians(), set.landmarks().iter().copied())
        .unwrap_or_else(|| Rect::from_center(0.0, 0.0, 0.0, 0.0).into());
    bounds.grow_rel(ROI_PADDING)
}

/// Converts pixel coordinates to coordinates relative to the frame size.
///
/// Z is divided by the width, which keeps it at roughly the same scale as X.
fn normalize(set: &mut LandmarkSet, res: Resolution) {
    let (w, h) = (res.width() as f32, res.height() as f32);
    set.map_landmarks(|lm| Landmark::new(lm.x() / w, lm.y() / h, lm.z() / w));
}
