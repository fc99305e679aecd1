//! The frame loop.

use std::time::Duration;

use crate::gesture::{draw_scissors_label, is_scissors};
use crate::gui::FrameSink;
use crate::hand::LandmarkDetector;
use crate::image::{convert, Frame};
use crate::timer::{FpsCounter, Timer};
use crate::video::FrameSource;

/// Typing this character into the window ends the loop.
pub const QUIT_KEY: char = 'q';

/// How long each iteration waits for a key press.
pub const KEY_POLL_TIMEOUT: Duration = Duration::from_millis(5);

/// Whether the loop should keep going after a [`Pipeline::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Runs camera frames through hand detection and shows the annotated result.
///
/// A [`Pipeline`] owns its frame source and sink. Both are released when the pipeline is dropped,
/// which [`Pipeline::run`] does on every exit path.
pub struct Pipeline<S, D, K> {
    source: S,
    detector: D,
    sink: K,
    fps: FpsCounter,
    t_show: Timer,
}

impl<S: FrameSource, D: LandmarkDetector, K: FrameSink> Pipeline<S, D, K> {
    pub fn new(source: S, detector: D, sink: K) -> Self {
        Self {
            source,
            detector,
            sink,
            fps: FpsCounter::new("pipeline"),
            t_show: Timer::new("show"),
        }
    }

    /// Processes a single frame.
    ///
    /// If the source fails to deliver a frame, a diagnostic is logged and [`Flow::Continue`] is
    /// returned without touching the sink. Otherwise the frame is annotated, shown, and the sink is
    /// polled for up to [`KEY_POLL_TIMEOUT`]; [`Flow::Quit`] is returned if [`QUIT_KEY`] was typed.
    ///
    /// Errors are only returned by the sink. A failing detector is logged and the frame is shown
    /// without annotations.
    pub fn step(&mut self) -> anyhow::Result<Flow> {
        let Some(mut frame) = self.source.read() else {
            log::warn!("no frame captured, skipping");
            return Ok(Flow::Continue);
        };

        self.annotate(&mut frame);
        self.t_show.time(|| self.sink.show(&frame))?;
        let timers = self.source.timers().into_iter().chain(self.detector.timers());
        self.fps.tick_with(timers.chain([&self.t_show]));

        match self.sink.poll_key(KEY_POLL_TIMEOUT)? {
            Some(QUIT_KEY) => Ok(Flow::Quit),
            Some(key) => {
                log::trace!("ignoring key {key:?}");
                Ok(Flow::Continue)
            }
            None => Ok(Flow::Continue),
        }
    }

    fn annotate(&mut self, frame: &mut Frame) {
        let input = convert(frame, self.detector.channel_order());
        let hands = match self.detector.detect(&input) {
            Ok(hands) => hands,
            Err(e) => {
                log::error!("hand detection failed: {e:#}");
                return;
            }
        };

        for hand in &hands {
            hand.draw(frame);
        }
        if hands.iter().any(is_scissors) {
            draw_scissors_label(frame);
        }
    }

    /// Steps until [`QUIT_KEY`] is typed or the sink fails.
    ///
    /// Consumes the pipeline, so that the frame source and sink are dropped (and thereby released)
    /// exactly once when this returns.
    pub fn run(mut self) -> anyhow::Result<()> {
        loop {
            if self.step()? == Flow::Quit {
                log::info!("'{QUIT_KEY}' pressed, exiting");
                return Ok(());
            }
        }
    }
}
