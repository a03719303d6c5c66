//! Switches between a primary stimulus and a centering stimulus depending
//! on how far the subject is from the middle of the display.

use stim_traits::Painter;

use crate::error::{Result, invalid};
use crate::snapshot::{Field, StateSnapshot, collect};
use crate::stimulus::{
    Drawable, EstimatorDriven, PaintedStimulus, SharedEstimator, Stimulus, Tick, Timing,
};

/// Viewport center assumed until the first paint reports the real size.
pub const DEFAULT_CENTER: (f64, f64) = (320.0, 240.0);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Active {
    Primary,
    Centering,
}

impl Active {
    pub fn as_str(&self) -> &'static str {
        match self {
            Active::Primary => "primary",
            Active::Centering => "centering",
        }
    }
}

pub struct CenteringWrapper {
    timing: Timing,
    primary: Box<dyn PaintedStimulus>,
    centering: Box<dyn PaintedStimulus>,
    estimator: SharedEstimator,
    /// Squared distance from the center beyond which centering takes over.
    margin: f64,
    center: (f64, f64),
    active: Active,
}

impl CenteringWrapper {
    const FIELDS: &'static [Field<Self>] = &[
        Field::new("name", |s| s.timing.name().into()),
        Field::new("duration", |s| s.timing.duration().into()),
        Field::new("elapsed", |s| s.timing.elapsed().into()),
        Field::new("margin", |s| s.margin.into()),
        Field::new("active", |s| s.active.as_str().into()),
    ];

    /// Both children are handed their estimator by the caller before being
    /// wrapped; `margin_px` is a distance in pixels.
    pub fn new(
        primary: Box<dyn PaintedStimulus>,
        centering: Box<dyn PaintedStimulus>,
        estimator: SharedEstimator,
        margin_px: f64,
    ) -> Result<Self> {
        if !(margin_px.is_finite() && margin_px >= 0.0) {
            return Err(invalid("margin must be >= 0"));
        }
        let duration = primary.duration();
        Ok(Self {
            timing: Timing::new("centering wrapper", duration),
            primary,
            centering,
            estimator,
            margin: margin_px * margin_px,
            center: DEFAULT_CENTER,
            active: Active::Primary,
        })
    }

    pub fn active(&self) -> Active {
        self.active
    }

    pub fn center(&self) -> (f64, f64) {
        self.center
    }

    pub fn primary(&self) -> &dyn PaintedStimulus {
        self.primary.as_ref()
    }

    pub fn centering(&self) -> &dyn PaintedStimulus {
        self.centering.as_ref()
    }

    fn active_child(&mut self) -> &mut dyn PaintedStimulus {
        match self.active {
            Active::Primary => self.primary.as_mut(),
            Active::Centering => self.centering.as_mut(),
        }
    }

    fn choose(&self) -> Active {
        let pose = self.estimator.get_position();
        if !(pose.x.is_finite() && pose.y.is_finite()) || pose.x < 0.0 {
            return Active::Centering;
        }
        let (xc, yc) = self.center;
        let d2 = (pose.x - xc).powi(2) + (pose.y - yc).powi(2);
        if d2 > self.margin {
            Active::Centering
        } else {
            Active::Primary
        }
    }
}

impl Stimulus for CenteringWrapper {
    fn timing(&self) -> &Timing {
        &self.timing
    }

    fn start(&mut self) -> Result<()> {
        self.timing.reset();
        self.active = Active::Primary;
        self.primary.start()?;
        self.centering.start()?;
        Ok(())
    }

    fn update(&mut self, tick: Tick) {
        let next = self.choose();
        if next != self.active {
            tracing::debug!(
                from = self.active.as_str(),
                to = next.as_str(),
                elapsed = self.timing.elapsed(),
                "centering switch"
            );
            self.active = next;
        }
        self.timing.advance(tick);
        let child_tick = Tick::new(tick.dt, self.timing.elapsed());
        self.active_child().update(child_tick);
    }

    fn state(&self) -> StateSnapshot {
        collect(self, Self::FIELDS)
    }

    fn dynamic_parameters(&self) -> &'static [&'static str] {
        &["active"]
    }

    /// Wrapper fields followed by the active child's dynamic fields.
    fn dynamic_state(&self) -> StateSnapshot {
        let child: &dyn PaintedStimulus = match self.active {
            Active::Primary => self.primary.as_ref(),
            Active::Centering => self.centering.as_ref(),
        };
        let mut out = self.state().select(self.dynamic_parameters());
        out.extend(child.dynamic_state());
        out
    }

    fn poll(&mut self) -> Result<()> {
        self.primary.poll()?;
        self.centering.poll()
    }

    fn abort(&mut self) {
        self.primary.abort();
        self.centering.abort();
    }
}

impl EstimatorDriven for CenteringWrapper {
    fn estimator(&self) -> &SharedEstimator {
        &self.estimator
    }
}

impl Drawable for CenteringWrapper {
    fn paint(&mut self, painter: &mut dyn Painter, width: f64, height: f64) {
        self.center = (width / 2.0, height / 2.0);
        self.active_child().paint(painter, width, height);
    }
}
