//! Hand detection and landmark estimation.
//!
//! Hands are found in two stages: a palm detector locates (rotated) palm regions in the whole
//! frame, and a landmark network then estimates 21 landmarks per hand inside a region derived from
//! the palm. Once a hand is found, the landmarks of one frame predict the region to look at in the
//! next one, so the palm detector only needs to run while hands are missing. [`tracking`] ties both
//! stages together.

pub mod detection;
pub mod landmark;
pub mod tracking;

use crate::image::{ChannelOrder, Frame};
use crate::timer::Timer;

use self::landmark::LandmarkSet;

/// Finds hands in camera frames.
///
/// This is the only contract the frame pipeline relies on; [`tracking::HandTracker`] is the
/// network-backed implementation.
pub trait LandmarkDetector {
    /// Returns the channel order that frames passed to [`LandmarkDetector::detect`] must use.
    fn channel_order(&self) -> ChannelOrder {
        ChannelOrder::Rgb
    }

    /// Detects all hands in `frame`.
    ///
    /// Returns one [`LandmarkSet`] per hand, with landmark coordinates normalized to the frame's
    /// dimensions. An empty list means that no hand is visible, which is not an error.
    fn detect(&mut self, frame: &Frame) -> anyhow::Result<Vec<LandmarkSet>>;

    /// Returns the profiling timers of the detection stages.
    fn timers(&self) -> Vec<&Timer> {
        Vec::new()
    }
}

impl<D: LandmarkDetector + ?Sized> LandmarkDetector for Box<D> {
    fn channel_order(&self) -> ChannelOrder {
        (**self).channel_order()
    }

    fn detect(&mut self, frame: &Frame) -> anyhow::Result<Vec<LandmarkSet>> {
        (**self).detect(frame)
    }

    fn timers(&self) -> Vec<&Timer> {
        (**self).timers()
    }
}
