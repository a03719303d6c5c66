//! Common time/period helpers for stim_core.

use std::time::Duration;

/// Number of microseconds in one second.
pub const MICROS_PER_SEC: u64 = 1_000_000;
/// Number of milliseconds in one second.
pub const MILLIS_PER_SEC: u64 = 1_000;

/// Frame period for a refresh rate in Hz.
/// - Non-finite or non-positive rates are treated as 1 Hz.
/// - Ensures result is at least 1 microsecond.
#[inline]
pub fn frame_period(hz: f64) -> Duration {
    let hz = if hz.is_finite() && hz > 0.0 { hz } else { 1.0 };
    let us = ((MICROS_PER_SEC as f64) / hz).round() as u64;
    Duration::from_micros(us.max(1))
}

/// Per-frame displacement in pixels for a drift of `vel_mm_s` mm/s.
#[inline]
pub fn pixels_per_frame(vel_mm_s: f64, mm_per_px: f64, refresh_hz: f64) -> f64 {
    (vel_mm_s / mm_per_px) / refresh_hz
}

/// Hold after each pulse, `1/freq - pulse duration`, at microsecond resolution.
///
/// Returns `None` when the pulse does not fit inside one period or the
/// frequency is unusable.
#[inline]
pub fn burst_pause(burst_freq: f64, pulse_dur_ms: u32) -> Option<Duration> {
    if !(burst_freq.is_finite() && burst_freq > 0.0) {
        return None;
    }
    let period_us = ((MICROS_PER_SEC as f64) / burst_freq).round();
    let pause_us = period_us - f64::from(pulse_dur_ms) * (MICROS_PER_SEC / MILLIS_PER_SEC) as f64;
    if pause_us < 0.0 {
        return None;
    }
    Some(Duration::from_micros(pause_us as u64))
}
