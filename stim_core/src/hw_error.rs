//! Maps `Box<dyn Error>` from trait boundaries to typed `StimError`.
//!
//! The traits in `stim_traits` use `Box<dyn Error + Send + Sync>` so any
//! transport can sit behind a `PulseDevice`; this module converts those to
//! our typed error enum, with an optional feature-gated path for
//! `stim_hardware::HwError` downcasting.

use crate::error::StimError;

/// Map a trait-boundary error to a typed `StimError`.
///
/// Attempts to downcast known hardware error types first, then falls back
/// to string-based heuristics.
pub fn map_hw_error(e: &(dyn std::error::Error + 'static)) -> StimError {
    #[cfg(feature = "hardware-errors")]
    {
        if let Some(hw) = e.downcast_ref::<stim_hardware::error::HwError>() {
            return match hw {
                stim_hardware::error::HwError::Timeout => StimError::DeviceTimeout,
                other => StimError::Hardware(other.to_string()),
            };
        }
    }

    let s = e.to_string();
    if s.to_lowercase().contains("timeout") || s.to_lowercase().contains("timed out") {
        StimError::DeviceTimeout
    } else {
        StimError::Hardware(s)
    }
}
