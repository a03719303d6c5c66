//! Drawn stimuli positioned in display coordinates, optionally following
//! the tracked subject.

use stim_traits::{Painter, Rgb};

use crate::error::{Result, invalid};
use crate::flash::color_value;
use crate::snapshot::{Field, StateSnapshot, collect};
use crate::stimulus::{Drawable, EstimatorDriven, SharedEstimator, Stimulus, Tick, Timing};
use crate::trace::MotionTrace;

#[derive(Debug, Clone, PartialEq)]
pub struct CircleParams {
    pub x: f64,
    pub y: f64,
    pub radius: f64,
    pub background_color: Rgb,
    pub circle_color: Rgb,
}

impl Default for CircleParams {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            radius: 10.0,
            background_color: Rgb::BLACK,
            circle_color: Rgb::WHITE,
        }
    }
}

/// Filled disc on a uniform background.
#[derive(Debug, Clone)]
pub struct CircleStimulus {
    timing: Timing,
    params: CircleParams,
    motion: Option<MotionTrace>,
    x: f64,
    y: f64,
}

impl CircleStimulus {
    const FIELDS: &'static [Field<Self>] = &[
        Field::new("name", |s| s.timing.name().into()),
        Field::new("duration", |s| s.timing.duration().into()),
        Field::new("elapsed", |s| s.timing.elapsed().into()),
        Field::new("x", |s| s.x.into()),
        Field::new("y", |s| s.y.into()),
        Field::new("radius", |s| s.params.radius.into()),
        Field::new("background_color", |s| color_value(s.params.background_color)),
        Field::new("circle_color", |s| color_value(s.params.circle_color)),
    ];

    pub fn new(params: CircleParams, duration: f64) -> Result<Self> {
        if !(params.radius.is_finite() && params.radius > 0.0) {
            return Err(invalid("radius must be > 0"));
        }
        Ok(Self {
            timing: Timing::new("circle", duration),
            x: params.x,
            y: params.y,
            params,
            motion: None,
        })
    }

    /// Move the disc along a trace instead of holding it still.
    #[must_use]
    pub fn with_motion(mut self, motion: MotionTrace) -> Self {
        self.motion = Some(motion);
        self
    }

    pub fn position(&self) -> (f64, f64) {
        (self.x, self.y)
    }

    pub(crate) fn set_position(&mut self, x: f64, y: f64) {
        self.x = x;
        self.y = y;
    }

    pub(crate) fn rename(&mut self, name: &str) {
        self.timing = Timing::new(name, self.timing.duration());
    }
}

impl Stimulus for CircleStimulus {
    fn timing(&self) -> &Timing {
        &self.timing
    }

    fn start(&mut self) -> Result<()> {
        self.timing.reset();
        (self.x, self.y) = match &self.motion {
            Some(m) => m.at(0.0),
            None => (self.params.x, self.params.y),
        };
        Ok(())
    }

    fn update(&mut self, tick: Tick) {
        self.timing.advance(tick);
        if let Some(m) = &self.motion {
            (self.x, self.y) = m.at(self.timing.elapsed());
        }
    }

    fn state(&self) -> StateSnapshot {
        collect(self, Self::FIELDS)
    }

    fn dynamic_parameters(&self) -> &'static [&'static str] {
        &["x", "y"]
    }
}

impl Drawable for CircleStimulus {
    fn paint(&mut self, painter: &mut dyn Painter, width: f64, height: f64) {
        painter.fill_rect(0.0, 0.0, width, height, self.params.background_color);
        // No fix yet: leave the background alone.
        if !(self.x.is_finite() && self.y.is_finite()) {
            return;
        }
        let r = self.params.radius;
        painter.fill_ellipse(self.x, self.y, r, r, self.params.circle_color);
    }
}

/// Disc placed on the subject's latest position every frame.
pub struct TrackingStimulus {
    circle: CircleStimulus,
    estimator: SharedEstimator,
}

impl TrackingStimulus {
    pub fn new(params: CircleParams, estimator: SharedEstimator, duration: f64) -> Result<Self> {
        let mut circle = CircleStimulus::new(params, duration)?;
        circle.rename("tracking");
        Ok(Self { circle, estimator })
    }

    pub fn position(&self) -> (f64, f64) {
        self.circle.position()
    }
}

impl Stimulus for TrackingStimulus {
    fn timing(&self) -> &Timing {
        self.circle.timing()
    }

    fn start(&mut self) -> Result<()> {
        self.circle.start()
    }

    fn update(&mut self, tick: Tick) {
        // Overwritten every frame, finite or not; painting skips bad values.
        let pose = self.estimator.get_position();
        self.circle.set_position(pose.x, pose.y);
        self.circle.update(tick);
    }

    fn state(&self) -> StateSnapshot {
        self.circle.state()
    }

    fn dynamic_parameters(&self) -> &'static [&'static str] {
        self.circle.dynamic_parameters()
    }
}

impl EstimatorDriven for TrackingStimulus {
    fn estimator(&self) -> &SharedEstimator {
        &self.estimator
    }
}

impl Drawable for TrackingStimulus {
    fn paint(&mut self, painter: &mut dyn Painter, width: f64, height: f64) {
        self.circle.paint(painter, width, height);
    }
}

/// Shape of the oriented marker drawn by `FishTrackingStimulus`.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerParams {
    /// Extent along the heading, in pixels.
    pub length: f64,
    pub width: f64,
    pub color: Rgb,
    pub background_color: Rgb,
}

impl Default for MarkerParams {
    fn default() -> Self {
        Self {
            length: 40.0,
            width: 10.0,
            color: Rgb::WHITE,
            background_color: Rgb::BLACK,
        }
    }
}

/// Oriented marker locked to the subject's pose.
pub struct FishTrackingStimulus {
    timing: Timing,
    estimator: SharedEstimator,
    marker: MarkerParams,
    x: f64,
    y: f64,
    theta: f64,
}

impl FishTrackingStimulus {
    const FIELDS: &'static [Field<Self>] = &[
        Field::new("name", |s| s.timing.name().into()),
        Field::new("duration", |s| s.timing.duration().into()),
        Field::new("elapsed", |s| s.timing.elapsed().into()),
        Field::new("x", |s| s.x.into()),
        Field::new("y", |s| s.y.into()),
        Field::new("theta", |s| s.theta.into()),
    ];

    pub fn new(marker: MarkerParams, estimator: SharedEstimator, duration: f64) -> Result<Self> {
        if !(marker.length.is_finite() && marker.length > 0.0)
            || !(marker.width.is_finite() && marker.width > 0.0)
        {
            return Err(invalid("marker length and width must be > 0"));
        }
        Ok(Self {
            timing: Timing::new("fish tracking", duration),
            estimator,
            marker,
            x: 0.0,
            y: 0.0,
            theta: 0.0,
        })
    }

    pub fn pose(&self) -> (f64, f64, f64) {
        (self.x, self.y, self.theta)
    }
}

impl Stimulus for FishTrackingStimulus {
    fn timing(&self) -> &Timing {
        &self.timing
    }

    fn start(&mut self) -> Result<()> {
        self.timing.reset();
        self.x = 0.0;
        self.y = 0.0;
        self.theta = 0.0;
        Ok(())
    }

    fn update(&mut self, tick: Tick) {
        let pose = self.estimator.get_position();
        if pose.theta.is_finite() {
            self.x = pose.x;
            self.y = pose.y;
            self.theta = pose.theta;
        }
        self.timing.advance(tick);
    }

    fn state(&self) -> StateSnapshot {
        collect(self, Self::FIELDS)
    }

    fn dynamic_parameters(&self) -> &'static [&'static str] {
        &["x", "y", "theta"]
    }
}

impl EstimatorDriven for FishTrackingStimulus {
    fn estimator(&self) -> &SharedEstimator {
        &self.estimator
    }
}

impl Drawable for FishTrackingStimulus {
    fn paint(&mut self, painter: &mut dyn Painter, width: f64, height: f64) {
        painter.fill_rect(0.0, 0.0, width, height, self.marker.background_color);
        painter.save();
        painter.translate(self.x, self.y);
        painter.rotate(self.theta);
        painter.fill_ellipse(
            0.0,
            0.0,
            self.marker.length / 2.0,
            self.marker.width / 2.0,
            self.marker.color,
        );
        painter.restore();
    }
}
