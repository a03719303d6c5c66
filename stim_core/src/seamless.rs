//! Seamless (toroidal) background stimuli.
//!
//! The background image is treated as tiling the plane. Each frame the
//! current `(x, y, theta)` is turned into a 2x3 affine matrix and the image
//! is resampled through it into a fresh buffer of the configured output
//! shape. Note the matrix puts `y` in the first row's translation and `x` in
//! the second; callers rely on that orientation.

use stim_traits::Painter;

use crate::error::{Result, invalid};
use crate::raster::{OutputShape, Raster};
use crate::snapshot::{Field, StateSnapshot, collect};
use crate::stimulus::{
    BackgroundDriven, Drawable, Interpolatable, Stimulus, Tick, Timing, paint_raster,
};
use crate::trace::MotionTrace;
use crate::util::pixels_per_frame;

/// Row-major 2x3 affine matrix mapping source to destination pixels.
pub type Affine = [[f64; 3]; 2];

pub fn transform_matrix(x: f64, y: f64, theta: f64) -> Affine {
    if theta == 0.0 {
        [[1.0, 0.0, y], [0.0, 1.0, x]]
    } else {
        let (s, c) = theta.sin_cos();
        [[c, -s, y], [s, c, x]]
    }
}

#[inline]
fn wrap(i: i64, n: usize) -> usize {
    i.rem_euclid(n as i64) as usize
}

/// Resample `src` through `m` with wrap-around borders and bilinear
/// filtering. The result always has exactly `shape`; a singular or
/// non-finite matrix yields a blank frame.
pub fn warp_wrap(src: &Raster, m: &Affine, shape: OutputShape) -> Raster {
    let ch = src.channels();
    let mut out = Raster::blank(shape, ch);
    let (sw, sh) = (src.width(), src.height());

    let [[a, b, mut tx], [c, d, mut ty]] = *m;
    let det = a * d - b * c;
    if !det.is_finite() || det == 0.0 || !tx.is_finite() || !ty.is_finite() {
        return out;
    }
    // Pure translations can be reduced to one period without changing the
    // result, which keeps precision for long-running drifts.
    if a == 1.0 && b == 0.0 && c == 0.0 && d == 1.0 {
        tx = tx.rem_euclid(sw as f64);
        ty = ty.rem_euclid(sh as f64);
    }
    let (ia, ib, ic, id) = (d / det, -b / det, -c / det, a / det);

    let data = src.data();
    let mut acc = [0.0f64; 4];
    for oy in 0..shape.height {
        for ox in 0..shape.width {
            let dx = ox as f64 - tx;
            let dy = oy as f64 - ty;
            let sx = ia * dx + ib * dy;
            let sy = ic * dx + id * dy;
            if !sx.is_finite() || !sy.is_finite() {
                continue;
            }
            // Fold into one tile so the integer corners cannot overflow.
            let (sx, sy) = (sx.rem_euclid(sw as f64), sy.rem_euclid(sh as f64));
            let (x0, y0) = (sx.floor(), sy.floor());
            let (fx, fy) = (sx - x0, sy - y0);
            let (x0, y0) = (x0 as i64, y0 as i64);
            let (xa, xb) = (wrap(x0, sw), wrap(x0 + 1, sw));
            let (ya, yb) = (wrap(y0, sh), wrap(y0 + 1, sh));
            let w00 = (1.0 - fx) * (1.0 - fy);
            let w10 = fx * (1.0 - fy);
            let w01 = (1.0 - fx) * fy;
            let w11 = fx * fy;
            let p00 = (ya * sw + xa) * ch;
            let p10 = (ya * sw + xb) * ch;
            let p01 = (yb * sw + xa) * ch;
            let p11 = (yb * sw + xb) * ch;
            for (k, v) in acc.iter_mut().enumerate().take(ch) {
                *v = w00 * f64::from(data[p00 + k])
                    + w10 * f64::from(data[p10 + k])
                    + w01 * f64::from(data[p01 + k])
                    + w11 * f64::from(data[p11 + k]);
            }
            let o = out.index(ox, oy);
            for (px, v) in out.data_mut()[o..o + ch].iter_mut().zip(&acc) {
                *px = v.round().clamp(0.0, 255.0) as u8;
            }
        }
    }
    out
}

/// Background image plus its current displacement.
#[derive(Debug, Clone)]
pub struct Background {
    image: Raster,
    shape: OutputShape,
    pub x: f64,
    pub y: f64,
    pub theta: f64,
}

impl Background {
    pub fn new(image: Raster, shape: OutputShape) -> Result<Self> {
        if shape.width == 0 || shape.height == 0 {
            return Err(invalid("output shape must be > 0"));
        }
        Ok(Self {
            image,
            shape,
            x: 0.0,
            y: 0.0,
            theta: 0.0,
        })
    }

    pub fn image(&self) -> &Raster {
        &self.image
    }

    pub fn shape(&self) -> OutputShape {
        self.shape
    }

    pub fn matrix(&self) -> Affine {
        transform_matrix(self.x, self.y, self.theta)
    }

    pub fn reset(&mut self) {
        self.x = 0.0;
        self.y = 0.0;
        self.theta = 0.0;
    }
}

/// Background following a pre-authored motion trace.
#[derive(Debug, Clone)]
pub struct MovingSeamless {
    timing: Timing,
    bg: Background,
    motion: MotionTrace,
}

impl MovingSeamless {
    const FIELDS: &'static [Field<Self>] = &[
        Field::new("name", |s| s.timing.name().into()),
        Field::new("duration", |s| s.timing.duration().into()),
        Field::new("elapsed", |s| s.timing.elapsed().into()),
        Field::new("x", |s| s.bg.x.into()),
        Field::new("y", |s| s.bg.y.into()),
        Field::new("theta", |s| s.bg.theta.into()),
    ];

    pub fn new(bg: Background, motion: MotionTrace, duration: f64) -> Self {
        Self {
            timing: Timing::new("moving seamless", duration),
            bg,
            motion,
        }
    }

    pub fn position(&self) -> (f64, f64) {
        (self.bg.x, self.bg.y)
    }
}

impl Stimulus for MovingSeamless {
    fn timing(&self) -> &Timing {
        &self.timing
    }

    fn start(&mut self) -> Result<()> {
        self.timing.reset();
        self.bg.reset();
        (self.bg.x, self.bg.y) = self.position_at(0.0);
        Ok(())
    }

    fn update(&mut self, tick: Tick) {
        self.timing.advance(tick);
        (self.bg.x, self.bg.y) = self.position_at(self.timing.elapsed());
    }

    fn state(&self) -> StateSnapshot {
        collect(self, Self::FIELDS)
    }

    fn dynamic_parameters(&self) -> &'static [&'static str] {
        &["x", "y"]
    }
}

impl Interpolatable for MovingSeamless {
    fn trace(&self) -> &MotionTrace {
        &self.motion
    }
}

impl BackgroundDriven for MovingSeamless {
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

impl Drawable for MovingSeamless {
    fn paint(&mut self, painter: &mut dyn Painter, _width: f64, _height: f64) {
        paint_raster(painter, &self.render());
    }
}

/// Drift parameters of `MovingConstantly`, in mm/s.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriftParams {
    pub x_vel: f64,
    pub y_vel: f64,
    pub mm_per_px: f64,
    pub refresh_hz: f64,
}

impl Default for DriftParams {
    fn default() -> Self {
        Self {
            x_vel: 0.0,
            y_vel: 0.0,
            mm_per_px: 1.0,
            refresh_hz: 60.0,
        }
    }
}

/// Background drifting at a constant rate, one fixed step per frame.
#[derive(Debug, Clone)]
pub struct MovingConstantly {
    timing: Timing,
    bg: Background,
    params: DriftParams,
    x_shift_frame: f64,
    y_shift_frame: f64,
}

impl MovingConstantly {
    const FIELDS: &'static [Field<Self>] = &[
        Field::new("name", |s| s.timing.name().into()),
        Field::new("duration", |s| s.timing.duration().into()),
        Field::new("elapsed", |s| s.timing.elapsed().into()),
        Field::new("x", |s| s.bg.x.into()),
        Field::new("y", |s| s.bg.y.into()),
        Field::new("theta", |s| s.bg.theta.into()),
        Field::new("x_vel", |s| s.params.x_vel.into()),
        Field::new("y_vel", |s| s.params.y_vel.into()),
    ];

    pub fn new(bg: Background, params: DriftParams, duration: f64) -> Result<Self> {
        if !(params.mm_per_px.is_finite() && params.mm_per_px > 0.0) {
            return Err(invalid("mm_per_px must be > 0"));
        }
        if !(params.refresh_hz.is_finite() && params.refresh_hz > 0.0) {
            return Err(invalid("refresh_hz must be > 0"));
        }
        if !params.x_vel.is_finite() || !params.y_vel.is_finite() {
            return Err(invalid("drift velocities must be finite"));
        }
        Ok(Self {
            timing: Timing::new("moving constantly", duration),
            bg,
            x_shift_frame: pixels_per_frame(params.x_vel, params.mm_per_px, params.refresh_hz),
            y_shift_frame: pixels_per_frame(params.y_vel, params.mm_per_px, params.refresh_hz),
            params,
        })
    }

    pub fn shift_per_frame(&self) -> (f64, f64) {
        (self.x_shift_frame, self.y_shift_frame)
    }

    pub fn position(&self) -> (f64, f64) {
        (self.bg.x, self.bg.y)
    }
}

impl Stimulus for MovingConstantly {
    fn timing(&self) -> &Timing {
        &self.timing
    }

    fn start(&mut self) -> Result<()> {
        self.timing.reset();
        self.bg.reset();
        Ok(())
    }

    fn update(&mut self, tick: Tick) {
        self.timing.advance(tick);
        self.bg.x += self.x_shift_frame;
        self.bg.y += self.y_shift_frame;
    }

    fn state(&self) -> StateSnapshot {
        collect(self, Self::FIELDS)
    }

    fn dynamic_parameters(&self) -> &'static [&'static str] {
        &["x", "y"]
    }
}

impl BackgroundDriven for MovingConstantly {
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

impl Drawable for MovingConstantly {
    fn paint(&mut self, painter: &mut dyn Painter, _width: f64, _height: f64) {
        paint_raster(painter, &self.render());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(w: usize, h: usize) -> Raster {
        let data = (0..w * h).map(|i| (i % 256) as u8).collect();
        Raster::new(w, h, 1, data).unwrap()
    }

    #[test]
    fn zero_theta_matrix_swaps_axes() {
        assert_eq!(
            transform_matrix(3.0, 7.0, 0.0),
            [[1.0, 0.0, 7.0], [0.0, 1.0, 3.0]]
        );
    }

    #[test]
    fn identity_warp_is_a_copy() {
        let src = ramp(8, 4);
        let out = warp_wrap(&src, &transform_matrix(0.0, 0.0, 0.0), src.shape());
        assert_eq!(out, src);
    }

    #[test]
    fn integer_shift_wraps_around() {
        let src = ramp(4, 1);
        // y translates columns: output column 0 comes from source column 3.
        let out = warp_wrap(&src, &transform_matrix(0.0, 1.0, 0.0), src.shape());
        assert_eq!(out.data(), &[3, 0, 1, 2]);
        let far = warp_wrap(&src, &transform_matrix(0.0, 401.0, 0.0), src.shape());
        assert_eq!(far.data(), out.data());
    }

    #[test]
    fn non_finite_matrix_gives_blank_frame() {
        let src = ramp(4, 4);
        let out = warp_wrap(&src, &transform_matrix(f64::NAN, 0.0, 0.0), OutputShape::new(5, 3));
        assert_eq!(out.shape(), OutputShape::new(5, 3));
        assert!(out.data().iter().all(|&v| v == 0));
    }

    #[test]
    fn constant_drift_steps_per_frame() {
        let bg = Background::new(ramp(4, 4), OutputShape::new(4, 4)).unwrap();
        let params = DriftParams {
            x_vel: 6.0,
            y_vel: -3.0,
            mm_per_px: 0.5,
            refresh_hz: 60.0,
        };
        let mut s = MovingConstantly::new(bg, params, 0.0).unwrap();
        s.start().unwrap();
        assert_eq!(s.shift_per_frame(), (0.2, -0.1));
        for i in 1..=3 {
            s.update(Tick::new(1.0 / 60.0, f64::from(i) / 60.0));
        }
        let (x, y) = s.position();
        assert!((x - 0.6).abs() < 1e-12);
        assert!((y + 0.3).abs() < 1e-12);
    }
}
