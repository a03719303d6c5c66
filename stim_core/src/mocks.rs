//! Test and helper mocks for stim_core

use std::sync::{Mutex, PoisonError};

use stim_traits::{Estimator, Painter, Pose, Rgb};

/// Estimator whose reading is set by hand.
#[derive(Debug)]
pub struct ScriptedEstimator {
    inner: Mutex<(Pose, f64)>,
}

impl ScriptedEstimator {
    pub fn new(pose: Pose, velocity: f64) -> Self {
        Self {
            inner: Mutex::new((pose, velocity)),
        }
    }

    pub fn set_pose(&self, pose: Pose) {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).0 = pose;
    }

    pub fn set_velocity(&self, velocity: f64) {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).1 = velocity;
    }
}

impl Estimator for ScriptedEstimator {
    fn get_position(&self) -> Pose {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).0
    }

    fn get_velocity(&self, _lag_s: f64) -> f64 {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).1
    }
}

/// One recorded paint call.
#[derive(Debug, Clone, PartialEq)]
pub enum PaintOp {
    Save,
    Restore,
    Translate(f64, f64),
    Rotate(f64),
    Rect { x: f64, y: f64, w: f64, h: f64, color: Rgb },
    Ellipse { cx: f64, cy: f64, rx: f64, ry: f64, color: Rgb },
    Pixels { width: usize, height: usize, channels: usize, len: usize },
}

/// Painter that records every call instead of drawing.
#[derive(Debug, Default)]
pub struct RecordingPainter {
    pub ops: Vec<PaintOp>,
}

impl Painter for RecordingPainter {
    fn save(&mut self) {
        self.ops.push(PaintOp::Save);
    }
    fn restore(&mut self) {
        self.ops.push(PaintOp::Restore);
    }
    fn translate(&mut self, dx: f64, dy: f64) {
        self.ops.push(PaintOp::Translate(dx, dy));
    }
    fn rotate(&mut self, theta: f64) {
        self.ops.push(PaintOp::Rotate(theta));
    }
    fn fill_rect(&mut self, x: f64, y: f64, w: f64, h: f64, color: Rgb) {
        self.ops.push(PaintOp::Rect { x, y, w, h, color });
    }
    fn fill_ellipse(&mut self, cx: f64, cy: f64, rx: f64, ry: f64, color: Rgb) {
        self.ops.push(PaintOp::Ellipse { cx, cy, rx, ry, color });
    }
    fn draw_pixels(
        &mut self,
        _x: f64,
        _y: f64,
        width: usize,
        height: usize,
        channels: usize,
        data: &[u8],
    ) {
        self.ops.push(PaintOp::Pixels {
            width,
            height,
            channels,
            len: data.len(),
        });
    }
}
