use std::{
    cell::{Cell, RefCell},
    collections::VecDeque,
    rc::Rc,
    thread,
    time::Duration,
};

use anyhow::bail;
use scissors::{
    gesture::is_scissors,
    gui::FrameSink,
    hand::{
        landmark::{Landmark, LandmarkIdx, LandmarkSet, CONNECTIVITY, NUM_LANDMARKS},
        LandmarkDetector,
    },
    image::{ChannelOrder, Color, Frame, Resolution},
    pipeline::{Flow, Pipeline, KEY_POLL_TIMEOUT},
    timer::Timer,
    video::FrameSource,
};

const RES: Resolution = Resolution::new(400, 400);

fn black_frame() -> Frame {
    Frame::new(RES, ChannelOrder::Bgr)
}

/// Profiling timers of the camera and detector doubles.
struct StageTimers {
    read: Timer,
    detect: Timer,
}

impl Default for StageTimers {
    fn default() -> Self {
        Self {
            read: Timer::new("read"),
            detect: Timer::new("detect"),
        }
    }
}

/// Returns `None` for the first `failures` reads, then black frames.
struct Camera {
    failures: usize,
    reads: Rc<Cell<usize>>,
    drops: Rc<Cell<usize>>,
    timers: Rc<StageTimers>,
}

impl FrameSource for Camera {
    fn read(&mut self) -> Option<Frame> {
        let _guard = self.timers.read.start();
        self.reads.set(self.reads.get() + 1);
        if self.failures > 0 {
            self.failures -= 1;
            return None;
        }
        Some(black_frame())
    }

    fn timers(&self) -> Vec<&Timer> {
        vec![&self.timers.read]
    }
}

impl Drop for Camera {
    fn drop(&mut self) {
        self.drops.set(self.drops.get() + 1);
    }
}

/// Returns the same hands for every frame, or fails if there are none.
struct CannedDetector {
    hands: Option<Vec<LandmarkSet>>,
    orders: Rc<RefCell<Vec<ChannelOrder>>>,
    timers: Rc<StageTimers>,
}

impl LandmarkDetector for CannedDetector {
    fn timers(&self) -> Vec<&Timer> {
        vec![&self.timers.detect]
    }

    fn detect(&mut self, frame: &Frame) -> anyhow::Result<Vec<LandmarkSet>> {
        let _guard = self.timers.detect.start();
        self.orders.borrow_mut().push(frame.order());
        match &self.hands {
            Some(hands) => Ok(hands.clone()),
            None => bail!("model exploded"),
        }
    }
}

/// Records shown frames and replays scripted key presses. Runs out of keys by failing.
struct Window {
    keys: VecDeque<Option<char>>,
    fail_show: bool,
    shown: Rc<RefCell<Vec<Frame>>>,
    drops: Rc<Cell<usize>>,
}

impl FrameSink for Window {
    fn show(&mut self, frame: &Frame) -> anyhow::Result<()> {
        if self.fail_show {
            bail!("display lost");
        }
        self.shown.borrow_mut().push(frame.clone());
        Ok(())
    }

    fn poll_key(&mut self, timeout: Duration) -> anyhow::Result<Option<char>> {
        assert_eq!(timeout, KEY_POLL_TIMEOUT);
        match self.keys.pop_front() {
            Some(key) => Ok(key),
            None => bail!("no more keys scripted"),
        }
    }
}

impl Drop for Window {
    fn drop(&mut self) {
        self.drops.set(self.drops.get() + 1);
    }
}

#[derive(Default)]
struct Harness {
    failures: usize,
    hands: Option<Vec<LandmarkSet>>,
    keys: Vec<Option<char>>,
    fail_show: bool,

    reads: Rc<Cell<usize>>,
    camera_drops: Rc<Cell<usize>>,
    window_drops: Rc<Cell<usize>>,
    orders: Rc<RefCell<Vec<ChannelOrder>>>,
    shown: Rc<RefCell<Vec<Frame>>>,
    timers: Rc<StageTimers>,
}

impl Harness {
    fn pipeline(&self) -> Pipeline<Camera, CannedDetector, Window> {
        Pipeline::new(
            Camera {
                failures: self.failures,
                reads: self.reads.clone(),
                drops: self.camera_drops.clone(),
                timers: self.timers.clone(),
            },
            CannedDetector {
                hands: self.hands.clone(),
                orders: self.orders.clone(),
                timers: self.timers.clone(),
            },
            Window {
                keys: self.keys.iter().copied().collect(),
                fail_show: self.fail_show,
                shown: self.shown.clone(),
                drops: self.window_drops.clone(),
            },
        )
    }
}

/// A hand whose landmarks form a diagonal line; `rising` puts fingertips above their joints.
fn diagonal_hand(rising: bool) -> LandmarkSet {
    let mut set = LandmarkSet::default();
    for idx in LandmarkIdx::ALL {
        let i = idx.index() as f32;
        let y = if rising { 0.8 - 0.03 * i } else { 0.2 + 0.03 * i };
        set.set(idx, Landmark::new(0.3 + 0.02 * i, y, 0.0));
    }
    set
}

fn count(frame: &Frame, color: Color) -> usize {
    let mut n = 0;
    for y in 0..frame.height() {
        for x in 0..frame.width() {
            if frame.get(x, y) == color {
                n += 1;
            }
        }
    }
    n
}

#[test]
fn failed_reads_are_skipped() {
    let harness = Harness {
        failures: 100,
        hands: Some(Vec::new()),
        keys: vec![None],
        ..Default::default()
    };
    let mut pipeline = harness.pipeline();

    for _ in 0..100 {
        assert_eq!(pipeline.step().unwrap(), Flow::Continue);
    }
    assert!(harness.shown.borrow().is_empty());
    assert!(harness.orders.borrow().is_empty());

    assert_eq!(pipeline.step().unwrap(), Flow::Continue);
    assert_eq!(harness.reads.get(), 101);
    assert_eq!(harness.shown.borrow().len(), 1);
    assert_eq!(harness.shown.borrow()[0], black_frame());
}

#[test]
fn only_quit_key_quits() {
    let harness = Harness {
        hands: Some(Vec::new()),
        keys: vec![None, Some('x'), Some('Q'), Some('q')],
        ..Default::default()
    };
    let mut pipeline = harness.pipeline();

    assert_eq!(pipeline.step().unwrap(), Flow::Continue);
    assert_eq!(pipeline.step().unwrap(), Flow::Continue);
    assert_eq!(pipeline.step().unwrap(), Flow::Continue);
    assert_eq!(pipeline.step().unwrap(), Flow::Quit);
}

#[test]
fn detector_receives_rgb_frames() {
    let harness = Harness {
        hands: Some(Vec::new()),
        keys: vec![None],
        ..Default::default()
    };
    harness.pipeline().step().unwrap();
    assert_eq!(*harness.orders.borrow(), [ChannelOrder::Rgb]);
    assert_eq!(harness.shown.borrow()[0].order(), ChannelOrder::Bgr);
}

#[test]
fn scissors_hand_is_labeled() {
    let hand = diagonal_hand(true);
    assert!(is_scissors(&hand));

    let harness = Harness {
        hands: Some(vec![hand]),
        keys: vec![None],
        ..Default::default()
    };
    harness.pipeline().step().unwrap();

    let shown = harness.shown.borrow();
    let frame = &shown[0];
    // Wrist marker.
    assert_eq!(frame.get(120, 320), Color::RED);
    assert!(count(frame, Color::GREEN) > 0);
    for y in 51..frame.height() {
        for x in 0..frame.width() {
            assert_ne!(frame.get(x, y), Color::GREEN, "label pixel at {x},{y}");
        }
    }
}

#[test]
fn other_hands_are_drawn_without_label() {
    let hand = diagonal_hand(false);
    assert!(!is_scissors(&hand));

    let harness = Harness {
        hands: Some(vec![hand]),
        keys: vec![None],
        ..Default::default()
    };
    harness.pipeline().step().unwrap();

    let shown = harness.shown.borrow();
    assert_eq!(shown[0].get(120, 80), Color::RED);
    assert_eq!(count(&shown[0], Color::GREEN), 0);
}

#[test]
fn detector_failure_still_shows_frame() {
    let harness = Harness {
        hands: None,
        keys: vec![Some('q')],
        ..Default::default()
    };
    let mut pipeline = harness.pipeline();
    assert_eq!(pipeline.step().unwrap(), Flow::Quit);
    assert_eq!(harness.shown.borrow()[0], black_frame());
}

#[test]
fn resources_released_once_on_quit() {
    let harness = Harness {
        failures: 3,
        hands: Some(vec![diagonal_hand(true)]),
        keys: vec![None, Some('a'), Some('q')],
        ..Default::default()
    };
    harness.pipeline().run().unwrap();

    assert_eq!(harness.reads.get(), 6);
    assert_eq!(harness.shown.borrow().len(), 3);
    assert_eq!(harness.camera_drops.get(), 1);
    assert_eq!(harness.window_drops.get(), 1);
}

#[test]
fn resources_released_once_on_error() {
    let harness = Harness {
        hands: Some(Vec::new()),
        fail_show: true,
        ..Default::default()
    };
    assert!(harness.pipeline().run().is_err());
    assert_eq!(harness.camera_drops.get(), 1);
    assert_eq!(harness.window_drops.get(), 1);
}

#[test]
fn stage_timers_are_reported() {
    let harness = Harness {
        hands: Some(Vec::new()),
        keys: vec![None, None],
        ..Default::default()
    };
    let mut pipeline = harness.pipeline();

    pipeline.step().unwrap();
    thread::sleep(Duration::from_millis(1100));
    pipeline.step().unwrap();

    // Both steps were measured, and the once-per-second report read (and thereby reset) the
    // averages.
    assert_eq!(harness.timers.read.to_string(), "read: 0x0.0ms");
    assert_eq!(harness.timers.detect.to_string(), "detect: 0x0.0ms");
}

#[test]
fn skeleton_topology() {
    assert_eq!(CONNECTIVITY.len(), 21);
    for (a, b) in CONNECTIVITY {
        assert!(a.index() < NUM_LANDMARKS);
        assert!(b.index() < NUM_LANDMARKS);
    }
    assert_eq!(diagonal_hand(true).segments().count(), CONNECTIVITY.len());
}

#[test]
fn scissors_rule() {
    use LandmarkIdx::*;

    let hand = |index_tip: f32, middle_tip: f32| {
        let mut set = LandmarkSet::default();
        set.set(IndexFingerPip, Landmark::new(0.0, 0.5, 0.0));
        set.set(IndexFingerTip, Landmark::new(0.0, index_tip, 0.0));
        set.set(MiddleFingerPip, Landmark::new(0.0, 0.5, 0.0));
        set.set(MiddleFingerTip, Landmark::new(0.0, middle_tip, 0.0));
        set
    };

    assert!(is_scissors(&hand(0.3, 0.3)));
    assert!(!is_scissors(&hand(0.6, 0.3)));
    assert!(!is_scissors(&hand(0.6, 0.6)));
}
