//! Pulse-board wire frames.
//!
//! A frame is the ASCII command the board firmware parses:
//! `<kind><dac code><duration ms, 3 digits>`, e.g. `shock218002` for a
//! 3 mA, 2 ms pulse. The DAC is 8-bit with full scale at 3.5 mA.

use stim_traits::{PulseCommand, PulseKind};

use crate::error::{HwError, Result};

/// Output current at DAC code 255.
pub const FULL_SCALE_MA: f64 = 3.5;
/// Largest duration representable in the 3-digit field.
pub const MAX_DURATION_MS: u32 = 999;

/// Map an amplitude in mA to the board's 8-bit DAC code (truncating).
pub fn dac_code(amplitude_ma: f64) -> Result<u8> {
    if !amplitude_ma.is_finite() || !(0.0..=FULL_SCALE_MA).contains(&amplitude_ma) {
        return Err(HwError::Amplitude(amplitude_ma));
    }
    Ok((255.0 * amplitude_ma / FULL_SCALE_MA) as u8)
}

/// Encode a pulse command into its ASCII frame.
pub fn encode(cmd: &PulseCommand) -> Result<String> {
    if cmd.duration_ms > MAX_DURATION_MS {
        return Err(HwError::Duration(cmd.duration_ms));
    }
    let code = dac_code(cmd.amplitude_ma)?;
    Ok(format!("{}{}{:03}", cmd.kind.as_str(), code, cmd.duration_ms))
}

/// Frame that drives the output stage to zero current.
pub fn idle_frame() -> String {
    format!("{}0{:03}", PulseKind::Shock.as_str(), 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shock(amplitude_ma: f64, duration_ms: u32) -> PulseCommand {
        PulseCommand {
            kind: PulseKind::Shock,
            amplitude_ma,
            duration_ms,
        }
    }

    #[test]
    fn default_burst_pulse_matches_firmware_frame() {
        assert_eq!(encode(&shock(3.0, 2)).unwrap(), "shock218002");
    }

    #[test]
    fn full_scale_and_zero() {
        assert_eq!(encode(&shock(3.5, 10)).unwrap(), "shock255010");
        assert_eq!(encode(&shock(0.0, 0)).unwrap(), idle_frame());
    }

    #[test]
    fn rejects_out_of_range() {
        assert!(matches!(encode(&shock(3.6, 2)), Err(HwError::Amplitude(_))));
        assert!(matches!(
            encode(&shock(f64::NAN, 2)),
            Err(HwError::Amplitude(_))
        ));
        assert!(matches!(encode(&shock(1.0, 1000)), Err(HwError::Duration(1000))));
    }
}
