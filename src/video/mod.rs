//! Video capture.

pub mod webcam;

use crate::image::Frame;
use crate::timer::Timer;

/// A source of camera frames.
///
/// Sources hold on to their capture device until they are dropped, which is the only way to
/// release it.
pub trait FrameSource {
    /// Captures the next frame.
    ///
    /// Returns `None` if no frame could be captured this time. A failed read does not end the
    /// stream, so callers are free to try again.
    fn read(&mut self) -> Option<Frame>;

    /// Returns the profiling timers of the capture stages.
    fn timers(&self) -> Vec<&Timer> {
        Vec::new()
    }
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn read(&mut self) -> Option<Frame> {
        (**self).read()
    }

    fn timers(&self) -> Vec<&Timer> {
        (**self).timers()
    }
}
