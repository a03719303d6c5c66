//! Stimulus lifecycle and capability traits.
//!
//! A stimulus is driven by an external frame loop: `start()` once, then one
//! `update(tick)` per display refresh. Capabilities a stimulus may add on top
//! of the lifecycle are expressed as separate traits so a concrete type only
//! opts into what it uses.

use std::sync::Arc;

use stim_traits::{Estimator, Painter};

use crate::error::Result;
use crate::raster::{OutputShape, Raster};
use crate::seamless::{Affine, warp_wrap};
use crate::snapshot::StateSnapshot;
use crate::trace::MotionTrace;

/// Shared read-only estimator handle injected at construction.
pub type SharedEstimator = Arc<dyn Estimator + Send + Sync>;

/// Per-frame timing supplied by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Tick {
    /// Seconds since the previous update of this stimulus.
    pub dt: f64,
    /// Seconds since this stimulus was started.
    pub elapsed: f64,
}

impl Tick {
    pub const fn new(dt: f64, elapsed: f64) -> Self {
        Self { dt, elapsed }
    }
}

/// Name, duration and elapsed-time bookkeeping shared by every stimulus.
#[derive(Debug, Clone, PartialEq)]
pub struct Timing {
    name: String,
    duration: f64,
    elapsed: f64,
}

impl Timing {
    pub fn new(name: impl Into<String>, duration: f64) -> Self {
        Self {
            name: name.into(),
            duration,
            elapsed: 0.0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    pub fn reset(&mut self) {
        self.elapsed = 0.0;
    }

    /// Adopt the driver's elapsed time. Elapsed never moves backwards and
    /// non-finite values are ignored.
    pub fn advance(&mut self, tick: Tick) {
        if tick.elapsed.is_finite() && tick.elapsed > self.elapsed {
            self.elapsed = tick.elapsed;
        }
    }

    pub fn is_over(&self) -> bool {
        self.duration > 0.0 && self.elapsed >= self.duration
    }
}

/// Timed lifecycle every stimulus implements.
pub trait Stimulus {
    fn timing(&self) -> &Timing;

    fn name(&self) -> &str {
        self.timing().name()
    }

    /// Seconds; `0` means the stimulus runs until terminated externally.
    fn duration(&self) -> f64 {
        self.timing().duration()
    }

    fn elapsed(&self) -> f64 {
        self.timing().elapsed()
    }

    /// Reset transient state and perform one-time setup.
    fn start(&mut self) -> Result<()>;

    /// Advance one frame. Must not sleep or block.
    fn update(&mut self, tick: Tick);

    /// All logged attributes, in declaration order.
    fn state(&self) -> StateSnapshot;

    /// Names snapshotted every tick for telemetry.
    fn dynamic_parameters(&self) -> &'static [&'static str] {
        &[]
    }

    fn dynamic_state(&self) -> StateSnapshot {
        self.state().select(self.dynamic_parameters())
    }

    fn finished(&self) -> bool {
        self.timing().is_over()
    }

    /// Surface the outcome of any background work started by `start()`.
    fn poll(&mut self) -> Result<()> {
        Ok(())
    }

    /// Stop any background work at the next safe point.
    fn abort(&mut self) {}
}

/// Position looked up from a pre-authored motion trace.
pub trait Interpolatable {
    fn trace(&self) -> &MotionTrace;

    fn position_at(&self, elapsed: f64) -> (f64, f64) {
        self.trace().at(elapsed)
    }
}

/// Raster produced by warping a toroidal background image.
pub trait BackgroundDriven {
    fn background(&self) -> &Raster;
    fn output_shape(&self) -> OutputShape;
    fn transform(&self) -> Affine;

    /// Fresh output buffer for the current state. Never cached.
    fn render(&self) -> Raster {
        warp_wrap(self.background(), &self.transform(), self.output_shape())
    }
}

/// Stimulus reading the tracking estimator.
pub trait EstimatorDriven {
    fn estimator(&self) -> &SharedEstimator;
}

/// Stimulus that paints itself on the display backend's paint context.
pub trait Drawable {
    fn paint(&mut self, painter: &mut dyn Painter, width: f64, height: f64);
}

/// Stimulus that can both be driven and shown.
pub trait PaintedStimulus: Stimulus + Drawable {}

impl<T: Stimulus + Drawable> PaintedStimulus for T {}

/// Paint a raster full-window.
pub(crate) fn paint_raster(painter: &mut dyn Painter, raster: &Raster) {
    painter.draw_pixels(
        0.0,
        0.0,
        raster.width(),
        raster.height(),
        raster.channels(),
        raster.data(),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elapsed_is_monotonic_and_ignores_nan() {
        let mut t = Timing::new("probe", 1.0);
        t.advance(Tick::new(0.1, 0.5));
        t.advance(Tick::new(0.1, 0.2));
        t.advance(Tick::new(0.1, f64::NAN));
        assert_eq!(t.elapsed(), 0.5);
        assert!(!t.is_over());
        t.advance(Tick::new(0.1, 1.0));
        assert!(t.is_over());
        t.reset();
        assert_eq!(t.elapsed(), 0.0);
    }

    #[test]
    fn zero_duration_never_finishes_by_itself() {
        let mut t = Timing::new("open", 0.0);
        t.advance(Tick::new(0.0, 1e6));
        assert!(!t.is_over());
    }
}
