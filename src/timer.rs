//! Performance measurement tools.

use std::{
    fmt, mem,
    sync::Mutex,
    time::{Duration, Instant},
};

/// Weight of a new measurement in the running average.
const EMA_ALPHA: f32 = 0.3;

/// A timer that can measure and average the time an operation takes.
///
/// Collected timings are averaged and reset when the timer is displayed using `{}`
/// ([`std::fmt::Display`]).
pub struct Timer {
    name: &'static str,
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    /// The current average time, or `None` if nothing has been measured since the last reset.
    avg: Option<f32>,
    /// The number of time measurements that contributed to the current `avg`.
    count: usize,
}

impl Timer {
    /// Creates a new timer.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            state: Mutex::new(State::default()),
        }
    }

    /// Invokes a closure, measuring and recording the time it takes.
    pub fn time<T>(&self, timee: impl FnOnce() -> T) -> T {
        let _guard = self.start();
        timee()
    }

    /// Starts timing an operation using a drop guard.
    ///
    /// When the returned [`TimerGuard`] is dropped, the time between the call to `start` and the
    /// drop is measured and recorded.
    pub fn start(&self) -> TimerGuard<'_> {
        TimerGuard {
            start: Instant::now(),
            timer: self,
        }
    }

    fn record(&self, duration: Duration) {
        let secs = duration.as_secs_f32();
        let mut state = self.lock();
        state.avg = Some(match state.avg {
            Some(avg) => avg + EMA_ALPHA * (secs - avg),
            None => secs,
        });
        state.count += 1;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        // The state stays consistent even if a holder panicked.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Displays the average recorded time and resets it.
impl fmt::Display for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let State { avg, count } = mem::take(&mut *self.lock());
        let avg_ms = avg.unwrap_or(0.0) * 1000.0;

        write!(f, "{}: {count}x{avg_ms:.01}ms", self.name)
    }
}

/// Guard returned by [`Timer::start`]. Stops timing the operation when dropped.
pub struct TimerGuard<'a> {
    start: Instant,
    timer: &'a Timer,
}

impl Drop for TimerGuard<'_> {
    fn drop(&mut self) {
        self.timer.record(self.start.elapsed());
    }
}

/// Logs frames per second, together with a set of [`Timer`]s.
pub struct FpsCounter {
    name: String,
    frames: u32,
    start: Instant,
}

impl FpsCounter {
    pub fn new<N: Into<String>>(name: N) -> Self {
        Self {
            name: name.into(),
            frames: 0,
            start: Instant::now(),
        }
    }

    /// Advances the frame counter by 1 and logs FPS and the `timers` if one second has passed.
    ///
    /// Logging a timer resets its average.
    pub fn tick_with<'a, T>(&mut self, timers: impl IntoIterator<Item = T>)
    where
        T: fmt::Display + 'a,
    {
        self.frames += 1;
        if self.start.elapsed() > Duration::from_secs(1) {
            let extra = timers
                .into_iter()
                .map(|t| t.to_string())
                .collect::<Vec<_>>();
            if extra.is_empty() {
                log::debug!("{}: {} FPS", self.name, self.frames);
            } else {
                log::debug!("{}: {} FPS ({})", self.name, self.frames, extra.join(", "));
            }

            self.frames = 0;
            self.start = Instant::now();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_resets() {
        let timer = Timer::new("t");
        timer.record(Duration::from_millis(10));
        timer.record(Duration::from_millis(10));
        assert_eq!(timer.to_string(), "t: 2x10.0ms");
        assert_eq!(timer.to_string(), "t: 0x0.0ms");
    }

    #[test]
    fn average_moves_towards_new_values() {
        let timer = Timer::new("t");
        timer.record(Duration::from_millis(10));
        timer.record(Duration::from_millis(20));
        // 10 + 0.3 * (20 - 10)
        assert_eq!(timer.to_string(), "t: 2x13.0ms");
    }

    #[test]
    fn time_returns_closure_value() {
        let timer = Timer::new("t");
        assert_eq!(timer.time(|| 42), 42);
        assert!(timer.to_string().starts_with("t: 1x"));
    }
}
