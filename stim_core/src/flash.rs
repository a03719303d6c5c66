//! Whole-field colour stimuli.

use stim_traits::{Painter, Rgb};

use crate::error::Result;
use crate::raster::{OutputShape, Raster};
use crate::snapshot::{Field, StateSnapshot, Value, collect};
use crate::stimulus::{Drawable, Stimulus, Tick, Timing};

pub(crate) fn color_value(c: Rgb) -> Value {
    Value::Text(format!("#{:02x}{:02x}{:02x}", c.0, c.1, c.2))
}

/// Uniform colour over the whole display.
#[derive(Debug, Clone)]
pub struct Flash {
    timing: Timing,
    color: Rgb,
    shape: OutputShape,
}

impl Flash {
    const FIELDS: &'static [Field<Self>] = &[
        Field::new("name", |s| s.timing.name().into()),
        Field::new("duration", |s| s.timing.duration().into()),
        Field::new("elapsed", |s| s.timing.elapsed().into()),
        Field::new("color", |s| color_value(s.color)),
    ];

    pub fn new(color: Rgb, shape: OutputShape, duration: f64) -> Self {
        Self {
            timing: Timing::new("whole field", duration),
            color,
            shape,
        }
    }

    /// Black field, used between stimuli.
    pub fn pause(shape: OutputShape, duration: f64) -> Self {
        Self {
            timing: Timing::new("pause", duration),
            color: Rgb::BLACK,
            shape,
        }
    }

    pub fn color(&self) -> Rgb {
        self.color
    }

    pub fn image(&self) -> Raster {
        Raster::filled(self.shape, self.color)
    }
}

impl Stimulus for Flash {
    fn timing(&self) -> &Timing {
        &self.timing
    }

    fn start(&mut self) -> Result<()> {
        self.timing.reset();
        Ok(())
    }

    fn update(&mut self, tick: Tick) {
        self.timing.advance(tick);
    }

    fn state(&self) -> StateSnapshot {
        collect(self, Self::FIELDS)
    }
}

impl Drawable for Flash {
    fn paint(&mut self, painter: &mut dyn Painter, width: f64, height: f64) {
        painter.fill_rect(0.0, 0.0, width, height, self.color);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::{PaintOp, RecordingPainter};

    #[test]
    fn pause_is_black_and_finishes() {
        let mut p = Flash::pause(OutputShape::new(2, 2), 0.5);
        p.start().unwrap();
        assert!(p.image().data().iter().all(|&v| v == 0));
        p.update(Tick::new(0.5, 0.5));
        assert!(p.finished());
        assert_eq!(p.state().get("color"), Some(&Value::Text("#000000".into())));
    }

    #[test]
    fn flash_paints_full_window() {
        let mut f = Flash::new(Rgb::WHITE, OutputShape::new(2, 2), 1.0);
        let mut painter = RecordingPainter::default();
        f.paint(&mut painter, 640.0, 480.0);
        assert_eq!(
            painter.ops,
            vec![PaintOp::Rect {
                x: 0.0,
                y: 0.0,
                w: 640.0,
                h: 480.0,
                color: Rgb::WHITE
            }]
        );
    }
}
