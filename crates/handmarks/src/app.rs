//! The capture, detect and display loop.

use std::{
    num::NonZeroU32,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use anyhow::Context;
use itertools::Itertools;

use crate::{
    gui::{Display, Key},
    landmark::LandmarkDetector,
    overlay::{self, HandStyle},
    timer::{FpsEstimator, Timer, DEFAULT_FPS_WINDOW},
    video::FrameSource,
};

/// How long to wait for a key press after presenting a frame, unless configured otherwise.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_millis(1);

/// Why the loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// The quit key was pressed, or the window was closed.
    QuitKey,
    /// The interrupt flag was set (by Ctrl-C, in the binary).
    Interrupted,
}

impl ExitReason {
    /// Returns the process exit status for a loop that stopped for this reason.
    ///
    /// An interrupted run exits with 130 (128 + SIGINT), as shells report it. Runs that end with an
    /// error are not covered here: `main` returns the error, which exits with status 1.
    pub fn exit_code(self) -> i32 {
        match self {
            Self::QuitKey => 0,
            Self::Interrupted => 130,
        }
    }
}

/// Counters collected while the loop ran.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LoopStats {
    /// Number of frames that were read, annotated and shown.
    pub frames: u64,
    /// Total number of landmark sets drawn over all frames.
    pub hands_drawn: u64,
    /// The FPS value drawn onto the last frame.
    pub fps: f32,
}

/// The result of a loop that ended without an error.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Outcome {
    pub reason: ExitReason,
    pub stats: LoopStats,
}

/// Reads frames from a [`FrameSource`], runs a [`LandmarkDetector`] on the mirrored frame, and
/// shows the annotated result on a [`Display`].
///
/// The app owns all three collaborators. They are dropped exactly once when [`App::run`] returns,
/// no matter how it returns.
pub struct App<S, D, W> {
    source: S,
    detector: D,
    display: W,
    fps_window: NonZeroU32,
    fps_start: Instant,
    style: HandStyle,
    poll_timeout: Duration,
    interrupt: Option<Arc<AtomicBool>>,
    t_read: Timer,
    t_detect: Timer,
    t_render: Timer,
}

impl<S, D, W> App<S, D, W>
where
    S: FrameSource,
    D: LandmarkDetector,
    W: Display,
{
    pub fn new(source: S, detector: D, display: W) -> Self {
        Self {
            source,
            detector,
            display,
            fps_window: DEFAULT_FPS_WINDOW,
            fps_start: Instant::now(),
            style: HandStyle::default(),
            poll_timeout: DEFAULT_POLL_TIMEOUT,
            interrupt: None,
            t_read: Timer::new("read"),
            t_detect: Timer::new("detect"),
            t_render: Timer::new("render"),
        }
    }

    /// Sets the number of frames per FPS measurement window.
    pub fn fps_window(mut self, window: NonZeroU32) -> Self {
        self.fps_window = window;
        self
    }

    /// Sets the instant the first FPS window is measured from.
    ///
    /// Defaults to the creation of the [`App`]. The binary passes its own start time, so the first
    /// displayed value includes model loading and device setup.
    pub fn fps_start(mut self, start: Instant) -> Self {
        self.fps_start = start;
        self
    }

    /// Sets how long to wait for a key press after each frame.
    pub fn poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }

    pub fn style(mut self, style: HandStyle) -> Self {
        self.style = style;
        self
    }

    /// Makes the loop stop cleanly once `flag` is set.
    ///
    /// The flag is checked once per frame, after polling for keys.
    pub fn interrupt_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.interrupt = Some(flag);
        self
    }

    /// Runs the loop until the quit key is pressed, the interrupt flag is set, or an error occurs.
    ///
    /// Read failures are fatal and not retried. Errors from the detector and the display are
    /// propagated the same way.
    pub fn run(mut self) -> anyhow::Result<Outcome> {
        let mut stats = LoopStats::default();
        let mut fps = FpsEstimator::starting_at(self.fps_window, self.fps_start);

        loop {
            let mut frame = self
                .t_read
                .time(|| self.source.read())
                .context("unable to read from webcam; please verify your webcam settings")?;
            frame.flip_horizontal_in_place();

            let sets = self
                .t_detect
                .time(|| self.detector.detect(&frame))
                .context("landmark detection failed")?;

            let recomputed = fps.tick();

            self.t_render.time(|| {
                overlay::draw_fps(&mut frame, fps.fps());
                for set in &sets {
                    overlay::draw_landmarks(&mut frame, set, &self.style);
                }
            });

            stats.frames = fps.frames();
            stats.fps = fps.fps();
            stats.hands_drawn += sets.len() as u64;

            if recomputed {
                self.log_timers(fps.fps());
            }

            self.display
                .show(&frame)
                .context("failed to display frame")?;

            let key = self
                .display
                .poll_key(self.poll_timeout)
                .context("failed to poll for input")?;
            if key == Some(Key::Escape) {
                log::debug!("quit key pressed after {} frames", stats.frames);
                return Ok(Outcome {
                    reason: ExitReason::QuitKey,
                    stats,
                });
            }

            if let Some(flag) = &self.interrupt {
                if flag.load(Ordering::Relaxed) {
                    log::debug!("interrupted after {} frames", stats.frames);
                    return Ok(Outcome {
                        reason: ExitReason::Interrupted,
                        stats,
                    });
                }
            }
        }
    }

    fn log_timers(&self, fps: f32) {
        let own = [&self.t_read, &self.t_detect, &self.t_render];
        let timers = own
            .into_iter()
            .chain(self.source.timers())
            .chain(self.detector.timers());
        log::debug!("{:.1} FPS ({})", fps, timers.format(", "));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes() {
        assert_eq!(ExitReason::QuitKey.exit_code(), 0);
        assert_eq!(ExitReason::Interrupted.exit_code(), 130);
    }
}
