//! Minimal frame driver: runs one stimulus at the display refresh rate.
//!
//! Each frame the driver latches the estimator, hands the stimulus its
//! `Tick`, polls background work, and reports the dynamic-state snapshot to
//! an observer. It stops when the stimulus finishes, a time limit is reached,
//! or the shutdown flag is raised.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use stim_traits::Painter;
use stim_traits::clock::{Clock, MonotonicClock};

use crate::error::Result;
use crate::estimate::LatchedEstimator;
use crate::snapshot::StateSnapshot;
use crate::stimulus::{PaintedStimulus, Stimulus, Tick};
use crate::util::frame_period;

/// How frame time advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pacing {
    /// Sleep on the clock until each frame deadline.
    RealTime,
    /// Advance by one period per frame without sleeping.
    Free,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunEnd {
    Finished,
    TimeLimit,
    Shutdown,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub frames: u64,
    pub elapsed: f64,
    /// Frames whose update finished after the next frame was due.
    pub missed_deadlines: u64,
    pub max_lateness: Duration,
    pub end: RunEnd,
}

/// One telemetry record.
#[derive(Debug, Clone, PartialEq)]
pub struct TickRecord {
    pub frame: u64,
    pub tick: Tick,
    pub state: StateSnapshot,
}

pub struct FrameRunner<C: Clock = MonotonicClock> {
    clock: C,
    period: Duration,
    pacing: Pacing,
    max_seconds: Option<f64>,
    latch: Option<Arc<LatchedEstimator>>,
    shutdown: Option<Arc<AtomicBool>>,
}

impl FrameRunner<MonotonicClock> {
    pub fn new(refresh_hz: f64) -> Self {
        Self::with_clock(refresh_hz, MonotonicClock::new())
    }
}

impl<C: Clock> FrameRunner<C> {
    pub fn with_clock(refresh_hz: f64, clock: C) -> Self {
        Self {
            clock,
            period: frame_period(refresh_hz),
            pacing: Pacing::RealTime,
            max_seconds: None,
            latch: None,
            shutdown: None,
        }
    }

    #[must_use]
    pub fn pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }

    /// Stop once stimulus time reaches `seconds` (to within half a frame).
    #[must_use]
    pub fn max_seconds(mut self, seconds: f64) -> Self {
        self.max_seconds = Some(seconds);
        self
    }

    /// Re-latch this estimator at the top of every frame.
    #[must_use]
    pub fn latch(mut self, latch: Arc<LatchedEstimator>) -> Self {
        self.latch = Some(latch);
        self
    }

    #[must_use]
    pub fn shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown = Some(flag);
        self
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Drive a stimulus without a display.
    pub fn run(
        &self,
        stim: &mut dyn Stimulus,
        on_tick: impl FnMut(&TickRecord),
    ) -> Result<RunSummary> {
        self.drive(stim, |_| {}, on_tick)
    }

    /// Drive a stimulus and paint it after every update.
    pub fn run_painted(
        &self,
        stim: &mut dyn PaintedStimulus,
        painter: &mut dyn Painter,
        viewport: (f64, f64),
        on_tick: impl FnMut(&TickRecord),
    ) -> Result<RunSummary> {
        let (w, h) = viewport;
        self.drive(stim, |s| s.paint(painter, w, h), on_tick)
    }

    fn drive<S: Stimulus + ?Sized>(
        &self,
        stim: &mut S,
        mut after_update: impl FnMut(&mut S),
        mut on_tick: impl FnMut(&TickRecord),
    ) -> Result<RunSummary> {
        let period_s = self.period.as_secs_f64();
        stim.start()?;
        tracing::info!(
            name = stim.name(),
            period_us = self.period.as_micros() as u64,
            "run start"
        );

        let epoch = self.clock.now();
        let mut frame: u64 = 0;
        let mut prev = 0.0;
        let mut missed: u64 = 0;
        let mut max_lateness = Duration::ZERO;

        let end = loop {
            if self.shutdown.as_ref().is_some_and(|f| f.load(Ordering::Relaxed)) {
                stim.abort();
                break RunEnd::Shutdown;
            }
            if let Some(latch) = &self.latch {
                latch.latch();
            }

            let elapsed = match self.pacing {
                Pacing::RealTime => self.clock.secs_since(epoch),
                Pacing::Free => frame as f64 * period_s,
            };
            let tick = Tick::new(elapsed - prev, elapsed);
            prev = elapsed;

            stim.update(tick);
            after_update(&mut *stim);
            stim.poll()?;
            on_tick(&TickRecord {
                frame,
                tick,
                state: stim.dynamic_state(),
            });
            frame += 1;

            if stim.finished() {
                break RunEnd::Finished;
            }
            if self.max_seconds.is_some_and(|max| elapsed >= max - period_s / 2.0) {
                stim.abort();
                break RunEnd::TimeLimit;
            }

            if self.pacing == Pacing::RealTime {
                let deadline = epoch + self.period.saturating_mul(frame as u32);
                let now = self.clock.now();
                if now < deadline {
                    self.clock.sleep(deadline - now);
                } else {
                    let late = now - deadline;
                    if !late.is_zero() {
                        missed += 1;
                        max_lateness = max_lateness.max(late);
                    }
                }
            }
        };

        let summary = RunSummary {
            frames: frame,
            elapsed: prev,
            missed_deadlines: missed,
            max_lateness,
            end,
        };
        tracing::info!(
            frames = summary.frames,
            missed = summary.missed_deadlines,
            end = ?summary.end,
            "run complete"
        );
        Ok(summary)
    }
}
