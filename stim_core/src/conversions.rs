//! `From` implementations bridging `stim_config` types to `stim_core` types.

use crate::closed_loop::ClosedLoopParams;
use crate::error::Result;
use crate::raster::{OutputShape, Raster};
use crate::seamless::DriftParams;
use crate::shock::ShockParams;
use crate::trace::MotionTrace;
use stim_traits::Rgb;

// ── ClosedLoopParams ─────────────────────────────────────────────────────────

impl From<&stim_config::ClosedLoopCfg> for ClosedLoopParams {
    fn from(c: &stim_config::ClosedLoopCfg) -> Self {
        Self {
            base_vel: c.base_vel,
            gain: c.gain,
            lag: c.lag,
            shunting: c.shunting,
            swimming_threshold: c.swimming_threshold,
            fixed_vel: c.fixed_vel,
        }
    }
}

// ── ShockParams ──────────────────────────────────────────────────────────────

impl From<&stim_config::ShockCfg> for ShockParams {
    fn from(c: &stim_config::ShockCfg) -> Self {
        Self {
            burst_freq: c.burst_freq,
            pulse_amp_ma: c.pulse_amp_ma,
            burst_n: c.burst_n,
            pulse_dur_ms: c.pulse_dur_ms,
        }
    }
}

// ── Display ──────────────────────────────────────────────────────────────────

impl From<&stim_config::DisplayCfg> for OutputShape {
    fn from(c: &stim_config::DisplayCfg) -> Self {
        Self::new(c.width as usize, c.height as usize)
    }
}

/// Constant drift from the `[motion]` velocities at the display's scale and rate.
pub fn drift_params(display: &stim_config::DisplayCfg, motion: &stim_config::MotionCfg) -> DriftParams {
    DriftParams {
        x_vel: motion.x_vel,
        y_vel: motion.y_vel,
        mm_per_px: display.mm_per_px,
        refresh_hz: display.refresh_hz,
    }
}

/// Black/white grating sized to the display.
pub fn grating_background(display: &stim_config::DisplayCfg) -> Raster {
    Raster::gratings(
        OutputShape::from(display),
        display.grating_period_px as usize,
        Rgb::BLACK,
        Rgb::WHITE,
    )
}

// ── MotionTrace ──────────────────────────────────────────────────────────────

impl TryFrom<&[stim_config::TraceRow]> for MotionTrace {
    type Error = eyre::Report;
    fn try_from(rows: &[stim_config::TraceRow]) -> Result<Self> {
        Self::new(
            rows.iter().map(|r| r.t).collect(),
            rows.iter().map(|r| r.x).collect(),
            rows.iter().map(|r| r.y).collect(),
        )
    }
}
