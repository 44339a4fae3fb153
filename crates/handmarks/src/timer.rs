//! Performance measurement tools.

use std::{
    fmt, mem,
    num::NonZeroU32,
    sync::{Mutex, PoisonError},
    time::Instant,
};

use crate::filter::{
    ema::{Ema, EmaState},
    Filter,
};

const EMA_ALPHA: f32 = 0.3;

/// A timer that can measure and average the time an operation takes.
///
/// Collected timings are averaged and reset when the timer is displayed using `{}`
/// ([`std::fmt::Display`]).
pub struct Timer {
    name: &'static str,
    ema: Ema,
    state: Mutex<State>,
}

struct State {
    ema_state: EmaState,
    /// The current average time.
    avg: f32,
    /// The number of time measurements that contributed to the current `avg`.
    count: usize,
}

impl Timer {
    /// Creates a new timer.
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            ema: Ema::new(EMA_ALPHA),
            state: Mutex::new(State {
                ema_state: Default::default(),
                avg: 0.0,
                count: 0,
            }),
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

    fn stop(&self, start: Instant) {
        let duration = start.elapsed();
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let filtered = self
            .ema
            .filter(&mut state.ema_state, duration.as_secs_f32());
        state.avg = filtered;
        state.count += 1;
    }
}

/// Displays the average recorded time and resets it.
impl fmt::Display for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.ema_state = Default::default();

        let avg = mem::replace(&mut state.avg, 0.0);
        let len = mem::replace(&mut state.count, 0);
        let avg_ms = avg * 1000.0;

        write!(f, "{}: {len}x{avg_ms:.01}ms", self.name)
    }
}

/// Guard returned by [`Timer::start`]. Stops timing the operation when dropped.
pub struct TimerGuard<'a> {
    start: Instant,
    timer: &'a Timer,
}

impl Drop for TimerGuard<'_> {
    fn drop(&mut self) {
        self.timer.stop(self.start);
    }
}

/// Number of frames per FPS measurement window used when nothing else is configured.
pub const DEFAULT_FPS_WINDOW: NonZeroU32 = match NonZeroU32::new(10) {
    Some(window) => window,
    None => panic!("FPS window must not be zero"),
};

/// Windowed frames-per-second estimate.
///
/// Every `window` frames, the estimate is recomputed as `window / elapsed`, where `elapsed` is the
/// time since the previous recomputation. Between those boundaries, [`FpsEstimator::fps`] stays
/// unchanged, which keeps the on-screen value readable.
///
/// The very first boundary is hit on the first frame, and is measured against the start instant
/// passed to [`FpsEstimator::starting_at`] (process start, in the binary). That first estimate
/// therefore includes all start-up work and is usually too low. It is corrected by the next
/// window.
#[derive(Debug, Clone)]
pub struct FpsEstimator {
    window: NonZeroU32,
    counter: u64,
    window_start: Instant,
    fps: f32,
}

impl FpsEstimator {
    /// Creates an estimator whose first window starts at `start`.
    pub fn starting_at(window: NonZeroU32, start: Instant) -> Self {
        Self {
            window,
            counter: 0,
            window_start: start,
            fps: 0.0,
        }
    }

    /// Records a processed frame using the monotonic clock.
    ///
    /// Returns whether the estimate was recomputed.
    pub fn tick(&mut self) -> bool {
        self.tick_at(Instant::now())
    }

    /// Records a frame that was processed at `now`.
    ///
    /// Returns whether the estimate was recomputed.
    pub fn tick_at(&mut self, now: Instant) -> bool {
        let window = self.window.get();
        let boundary = self.counter % u64::from(window) == 0;
        if boundary {
            let elapsed = now.saturating_duration_since(self.window_start);
            // Identical timestamps would yield infinity, keep the last estimate instead.
            if !elapsed.is_zero() {
                self.fps = window as f32 / elapsed.as_secs_f32();
            }
            self.window_start = now;
        }
        self.counter += 1;
        boundary
    }

    /// Returns the current estimate in frames per second.
    ///
    /// This is 0.0 until the first frame has been recorded.
    pub fn fps(&self) -> f32 {
        self.fps
    }

    /// Returns the total number of frames recorded so far.
    pub fn frames(&self) -> u64 {
        self.counter
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use approx::assert_relative_eq;

    use super::*;

    fn window(n: u32) -> NonZeroU32 {
        NonZeroU32::new(n).unwrap()
    }

    #[test]
    fn converges_to_frame_rate() {
        for w in 1..=16 {
            let interval = Duration::from_micros(fastrand::u64(1_000..100_000));
            let start = Instant::now();
            let mut est = FpsEstimator::starting_at(window(w), start);
            let mut now = start;
            for _ in 0..w * 3 + 1 {
                now += interval;
                est.tick_at(now);
            }

            let expected = 1.0 / interval.as_secs_f32();
            assert_relative_eq!(est.fps(), expected, max_relative = 1e-3);
        }
    }

    #[test]
    fn recomputes_only_at_window_boundaries() {
        let start = Instant::now();
        let mut est = FpsEstimator::starting_at(window(4), start);
        let mut now = start;
        let mut last = est.fps();
        for frame in 0..40u64 {
            now += Duration::from_millis(fastrand::u64(5..50));
            let recomputed = est.tick_at(now);
            assert_eq!(recomputed, frame % 4 == 0, "frame {frame}");
            if !recomputed {
                assert_eq!(est.fps(), last, "estimate changed mid-window at frame {frame}");
            }
            last = est.fps();
        }
        assert_eq!(est.frames(), 40);
    }

    /// The first window is measured from the start instant, so start-up latency leaks into it.
    #[test]
    fn first_window_measures_startup_time() {
        let start = Instant::now();
        let mut est = FpsEstimator::starting_at(window(10), start);

        // 2 seconds of start-up work, then frames every 10 ms.
        let mut now = start + Duration::from_secs(2);
        est.tick_at(now);
        assert_relative_eq!(est.fps(), 5.0, max_relative = 1e-4);

        for _ in 0..10 {
            now += Duration::from_millis(10);
            est.tick_at(now);
        }
        assert_relative_eq!(est.fps(), 100.0, max_relative = 1e-3);
    }

    #[test]
    fn zero_interval_keeps_previous_estimate() {
        let start = Instant::now();
        let mut est = FpsEstimator::starting_at(window(1), start);
        est.tick_at(start + Duration::from_millis(100));
        assert_relative_eq!(est.fps(), 10.0, max_relative = 1e-4);

        est.tick_at(start + Duration::from_millis(100));
        assert_relative_eq!(est.fps(), 10.0, max_relative = 1e-4);
        assert!(est.fps().is_finite());
    }

    #[test]
    fn starts_at_zero() {
        let est = FpsEstimator::starting_at(DEFAULT_FPS_WINDOW, Instant::now());
        assert_eq!(est.fps(), 0.0);
        assert_eq!(est.frames(), 0);
    }

    #[test]
    fn timer_reports_and_resets() {
        let timer = Timer::new("work");
        assert_eq!(timer.time(|| 42), 42);
        let report = timer.to_string();
        assert!(report.starts_with("work: 1x"), "{report}");
        assert_eq!(timer.to_string(), "work: 0x0.0ms");
    }
}
