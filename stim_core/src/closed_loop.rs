//! Estimator-driven background stimuli.
//!
//! `ClosedLoop1D` couples the background drift to the subject's swimming
//! vigor; `PerpendicularMotion` keeps a trace-driven background aligned with
//! the subject's heading.

use stim_traits::Painter;

use crate::error::{Result, invalid};
use crate::raster::{OutputShape, Raster};
use crate::seamless::{Affine, Background};
use crate::snapshot::{Field, StateSnapshot, collect};
use crate::stimulus::{
    BackgroundDriven, Drawable, EstimatorDriven, Interpolatable, SharedEstimator, Stimulus, Tick,
    Timing, paint_raster,
};
use crate::trace::{MotionTrace, ScalarTrace};

/// Velocities above this, in mm/s, are treated as a fault and zeroed.
pub const MAX_VELOCITY: f64 = 50.0;

#[derive(Debug, Clone, PartialEq)]
pub struct ClosedLoopParams {
    /// Background velocity while the subject is not swimming.
    pub base_vel: f64,
    /// Closed-loop gain; 1 approximates free swimming.
    pub gain: f64,
    /// Extra delay, in seconds, applied to the estimator's velocity.
    pub lag: f64,
    /// Once a bout ends, cut the subject's influence until `base_vel` is 0.
    pub shunting: bool,
    /// Estimated velocity below which the subject counts as swimming.
    pub swimming_threshold: f64,
    /// Velocity used during bouts instead of the gain law.
    pub fixed_vel: Option<f64>,
}

impl Default for ClosedLoopParams {
    fn default() -> Self {
        Self {
            base_vel: 10.0,
            gain: 1.0,
            lag: 0.0,
            shunting: false,
            swimming_threshold: -6.0,
            fixed_vel: None,
        }
    }
}

impl ClosedLoopParams {
    fn validate(&self) -> Result<()> {
        if !self.base_vel.is_finite() {
            return Err(invalid("base_vel must be finite"));
        }
        if !self.gain.is_finite() {
            return Err(invalid("gain must be finite"));
        }
        if !(self.lag.is_finite() && self.lag >= 0.0) {
            return Err(invalid("lag must be >= 0"));
        }
        if !self.swimming_threshold.is_finite() {
            return Err(invalid("swimming_threshold must be finite"));
        }
        if self.fixed_vel.is_some_and(|v| !v.is_finite()) {
            return Err(invalid("fixed_vel must be finite"));
        }
        Ok(())
    }
}

/// Vigor-based 1D closed loop.
pub struct ClosedLoop1D {
    timing: Timing,
    bg: Background,
    estimator: SharedEstimator,
    params: ClosedLoopParams,
    base_vel_schedule: Option<ScalarTrace>,
    base_vel: f64,
    vel: f64,
    fish_velocity: f64,
    fish_swimming: bool,
    shunted: bool,
    bout_start: Option<f64>,
    bout_stop: Option<f64>,
    clamping: bool,
}

impl ClosedLoop1D {
    const FIELDS: &'static [Field<Self>] = &[
        Field::new("name", |s| s.timing.name().into()),
        Field::new("duration", |s| s.timing.duration().into()),
        Field::new("elapsed", |s| s.timing.elapsed().into()),
        Field::new("x", |s| s.bg.x.into()),
        Field::new("y", |s| s.bg.y.into()),
        Field::new("theta", |s| s.bg.theta.into()),
        Field::new("base_vel", |s| s.base_vel.into()),
        Field::new("gain", |s| s.params.gain.into()),
        Field::new("lag", |s| s.params.lag.into()),
        Field::new("shunting", |s| s.params.shunting.into()),
        Field::new("swimming_threshold", |s| s.params.swimming_threshold.into()),
        Field::new("fixed_velocity", |s| s.params.fixed_vel.into()),
        Field::new("vel", |s| s.vel.into()),
        Field::new("fish_velocity", |s| s.fish_velocity.into()),
        Field::new("fish_swimming", |s| s.fish_swimming.into()),
        Field::new("shunted", |s| s.shunted.into()),
        Field::new("bout_start", |s| s.bout_start.into()),
        Field::new("bout_stop", |s| s.bout_stop.into()),
    ];

    pub fn new(
        bg: Background,
        estimator: SharedEstimator,
        params: ClosedLoopParams,
        duration: f64,
    ) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            timing: Timing::new("closed loop 1D", duration),
            bg,
            estimator,
            base_vel: params.base_vel,
            vel: params.base_vel,
            params,
            base_vel_schedule: None,
            fish_velocity: 0.0,
            fish_swimming: false,
            shunted: false,
            bout_start: None,
            bout_stop: None,
            clamping: false,
        })
    }

    /// Let `base_vel` follow a schedule over elapsed time.
    #[must_use]
    pub fn with_base_vel_schedule(mut self, schedule: ScalarTrace) -> Self {
        self.base_vel_schedule = Some(schedule);
        self
    }

    pub fn set_base_vel(&mut self, base_vel: f64) {
        if base_vel.is_finite() {
            self.base_vel = base_vel;
        }
    }

    pub fn set_gain(&mut self, gain: f64) {
        if gain.is_finite() {
            self.params.gain = gain;
        }
    }

    pub fn vel(&self) -> f64 {
        self.vel
    }

    pub fn x(&self) -> f64 {
        self.bg.x
    }

    pub fn fish_velocity(&self) -> f64 {
        self.fish_velocity
    }

    pub fn is_swimming(&self) -> bool {
        self.fish_swimming
    }

    pub fn is_shunted(&self) -> bool {
        self.shunted
    }

    pub fn bout_start(&self) -> Option<f64> {
        self.bout_start
    }

    pub fn bout_stop(&self) -> Option<f64> {
        self.bout_stop
    }

    fn velocity_law(&self) -> f64 {
        match self.params.fixed_vel {
            None => {
                if self.shunted {
                    0.0
                } else {
                    let swimming = if self.fish_swimming { 1.0 } else { 0.0 };
                    self.base_vel - self.fish_velocity * self.params.gain * swimming
                }
            }
            Some(fixed) => {
                if self.fish_swimming && self.base_vel != 0.0 {
                    fixed
                } else {
                    self.base_vel
                }
            }
        }
    }
}

impl Stimulus for ClosedLoop1D {
    fn timing(&self) -> &Timing {
        &self.timing
    }

    fn start(&mut self) -> Result<()> {
        self.timing.reset();
        self.bg.reset();
        self.base_vel = self.params.base_vel;
        self.vel = self.base_vel;
        self.fish_velocity = 0.0;
        self.fish_swimming = false;
        self.shunted = false;
        self.bout_start = None;
        self.bout_stop = None;
        self.clamping = false;
        tracing::debug!(name = self.timing.name(), base_vel = self.base_vel, "stimulus start");
        Ok(())
    }

    fn update(&mut self, tick: Tick) {
        self.timing.advance(tick);
        let elapsed = self.timing.elapsed();
        if let Some(schedule) = &self.base_vel_schedule {
            let v = schedule.at(elapsed);
            if v.is_finite() {
                self.base_vel = v;
            }
        }

        let measured = self.estimator.get_velocity(self.params.lag);
        if measured.is_finite() {
            self.fish_velocity = measured;
        }

        if self.base_vel == 0.0 {
            self.shunted = false;
            self.fish_swimming = false;
        }

        let threshold = self.params.swimming_threshold;
        if self.params.shunting && self.fish_swimming && self.fish_velocity > threshold {
            self.shunted = true;
        }

        if self.fish_velocity < threshold {
            self.fish_swimming = true;
            if self.bout_start.is_none() {
                self.bout_start = Some(elapsed);
            }
            self.bout_stop = None;
        } else {
            if self.bout_start.take().is_some() {
                self.bout_stop = Some(elapsed);
            }
            self.fish_swimming = false;
        }

        let vel = self.velocity_law();
        if !vel.is_finite() || vel > MAX_VELOCITY {
            if !self.clamping {
                tracing::warn!(vel, max = MAX_VELOCITY, elapsed, "velocity clamped to 0");
            }
            self.clamping = true;
            self.vel = 0.0;
        } else {
            self.clamping = false;
            self.vel = vel;
        }

        if tick.dt.is_finite() {
            self.bg.x += tick.dt * self.vel;
        }
    }

    fn state(&self) -> StateSnapshot {
        collect(self, Self::FIELDS)
    }

    fn dynamic_parameters(&self) -> &'static [&'static str] {
        &["vel", "fish_velocity", "gain"]
    }
}

impl EstimatorDriven for ClosedLoop1D {
    fn estimator(&self) -> &SharedEstimator {
        &self.estimator
    }
}

impl BackgroundDriven for ClosedLoop1D {
    fn background(&self) -> &Raster {
        self.bg.image()
    }
    fn output_shape(&self) -> OutputShape {
        self.bg.shape()
    }
    fn transform(&self) -> Affine {
        self.bg.matrix()
    }
}

impl Drawable for ClosedLoop1D {
    fn paint(&mut self, painter: &mut dyn Painter, _width: f64, _height: f64) {
        paint_raster(painter, &self.render());
    }
}

/// Trace-driven background kept perpendicular to the subject.
pub struct PerpendicularMotion {
    timing: Timing,
    bg: Background,
    estimator: SharedEstimator,
    motion: MotionTrace,
}

impl PerpendicularMotion {
    const FIELDS: &'static [Field<Self>] = &[
        Field::new("name", |s| s.timing.name().into()),
        Field::new("duration", |s| s.timing.duration().into()),
        Field::new("elapsed", |s| s.timing.elapsed().into()),
        Field::new("x", |s| s.bg.x.into()),
        Field::new("y", |s| s.bg.y.into()),
        Field::new("theta", |s| s.bg.theta.into()),
    ];

    pub fn new(
        bg: Background,
        estimator: SharedEstimator,
        motion: MotionTrace,
        duration: f64,
    ) -> Self {
        Self {
            timing: Timing::new("perpendicular motion", duration),
            bg,
            estimator,
            motion,
        }
    }

    pub fn pose(&self) -> (f64, f64, f64) {
        (self.bg.x, self.bg.y, self.bg.theta)
    }
}

impl Stimulus for PerpendicularMotion {
    fn timing(&self) -> &Timing {
        &self.timing
    }

    fn start(&mut self) -> Result<()> {
        self.timing.reset();
        self.bg.reset();
        Ok(())
    }

    fn update(&mut self, tick: Tick) {
        let theta = self.estimator.get_position().theta;
        if theta.is_finite() {
            self.bg.theta = theta;
        }
        self.timing.advance(tick);
        (self.bg.x, self.bg.y) = self.position_at(self.timing.elapsed());
    }

    fn state(&self) -> StateSnapshot {
        collect(self, Self::FIELDS)
    }

    fn dynamic_parameters(&self) -> &'static [&'static str] {
        &["x", "y", "theta"]
    }
}

impl Interpolatable for PerpendicularMotion {
    fn trace(&self) -> &MotionTrace {
        &self.motion
    }
}

impl EstimatorDriven for PerpendicularMotion {
    fn estimator(&self) -> &SharedEstimator {
        &self.estimator
    }
}

impl BackgroundDriven for PerpendicularMotion {
    fn background(&self) -> &Raster {
        self.bg.image()
    }
    fn output_shape(&self) -> OutputShape {
        self.bg.shape()
    }
    fn transform(&self) -> Affine {
        self.bg.matrix()
    }
}

impl Drawable for PerpendicularMotion {
    fn paint(&mut self, painter: &mut dyn Painter, _width: f64, _height: f64) {
        paint_raster(painter, &self.render());
    }
}
