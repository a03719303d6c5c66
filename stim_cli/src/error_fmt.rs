//! Human-readable error descriptions and structured JSON error formatting.

use stim_core::error::{BuildError, StimError};

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    // Typed matches first
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingDevice => {
                "What happened: No pulse device was provided to the shock stimulus.\nLikely causes: The pulse board failed to open or was not wired into the builder.\nHow to fix: Check [hardware].port, or run without it to use the simulated board.".to_string()
            }
            BuildError::MissingEstimator => {
                "What happened: A closed-loop stimulus was built without an estimator.\nLikely causes: The tracker was not connected before the stimulus was assembled.\nHow to fix: Attach an estimator before building closed-loop or tracking stimuli.".to_string()
            }
            BuildError::MissingTrace => {
                "What happened: This stimulus needs a motion trace but none was given.\nLikely causes: Neither --trace nor [motion].trace is set.\nHow to fix: Pass --trace FILE.csv (headers t,x,y) or set [motion].trace in the config.".to_string()
            }
            BuildError::MissingBackground => {
                "What happened: No background image was available.\nLikely causes: The background raster could not be created.\nHow to fix: Check the [display] size and grating settings.".to_string()
            }
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Missing or out-of-range values in the TOML or on the command line.\nHow to fix: Edit the config file or arguments, then rerun."
            ),
        };
    }

    if let Some(se) = err.downcast_ref::<StimError>() {
        return match se {
            StimError::Cancelled { sent, planned } => format!(
                "What happened: The burst was cancelled after {sent} of {planned} pulses.\nLikely causes: --cancel-after-ms elapsed or Ctrl-C was pressed.\nHow to fix: Nothing to fix if intended; the device was returned to idle."
            ),
            StimError::DeviceCommand { pulse, cause } => format!(
                "What happened: Pulse {pulse} of the burst could not be sent ({cause}).\nLikely causes: Serial link dropped, wrong port, or the board stopped responding.\nHow to fix: Check the cable and [hardware].port/baud; the remaining pulses were not sent."
            ),
            StimError::DeviceTimeout => {
                "What happened: Writing to the pulse board timed out.\nLikely causes: Wrong baud rate, flow control, or an unresponsive board.\nHow to fix: Verify [hardware].baud and consider raising hardware.write_timeout_ms.".to_string()
            }
            StimError::Hardware(msg) => format!(
                "What happened: Pulse hardware error ({msg}).\nLikely causes: The serial port is missing, busy, or not permitted.\nHow to fix: Check the port path and that your user may open it (e.g. the dialout group)."
            ),
            other => format!(
                "What happened: {other}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
    }

    // String-based heuristics for errors coming from config and trace loading
    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    if lower.contains("trace csv must have headers") {
        return "Invalid headers in motion trace CSV. Expected 't,x,y'.".to_string();
    }

    if lower.contains("trace csv") {
        return format!(
            "What happened: The motion trace could not be used ({msg}).\nLikely causes: Non-numeric cells, times not strictly increasing, or an empty file.\nHow to fix: Fix the CSV so that every row is finite and t increases."
        );
    }

    if lower.contains("must be") || lower.contains("invalid configuration") {
        return format!(
            "What happened: Configuration is invalid ({msg}).\nLikely causes: An out-of-range value in the TOML.\nHow to fix: Edit the named key and try again."
        );
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable exit codes for burst outcomes; everything else returns 1.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    match err.downcast_ref::<StimError>() {
        Some(StimError::Cancelled { .. }) => 3,
        Some(StimError::DeviceCommand { .. }) => 4,
        Some(StimError::DeviceTimeout) => 5,
        Some(StimError::Hardware(_)) => 6,
        _ => 1,
    }
}

fn reason_name(err: &eyre::Report) -> &'static str {
    if let Some(se) = err.downcast_ref::<StimError>() {
        return match se {
            StimError::Hardware(_) => "Hardware",
            StimError::DeviceTimeout => "DeviceTimeout",
            StimError::DeviceCommand { .. } => "DeviceCommand",
            StimError::Config(_) => "Config",
            StimError::Cancelled { .. } => "Cancelled",
            StimError::State(_) => "State",
        };
    }
    if err.downcast_ref::<BuildError>().is_some() {
        return "Build";
    }
    "Error"
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;

    let details = match err.downcast_ref::<StimError>() {
        Some(StimError::Cancelled { sent, planned }) => {
            Some(json!({ "sent": sent, "planned": planned }))
        }
        Some(StimError::DeviceCommand { pulse, cause }) => {
            Some(json!({ "pulse": pulse, "cause": cause }))
        }
        _ => None,
    };
    let obj = match details {
        Some(d) => json!({ "reason": reason_name(err), "details": d, "message": humanize(err) }),
        None => json!({ "reason": reason_name(err), "message": humanize(err) }),
    };
    obj.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancelled_burst_maps_to_its_own_exit_code() {
        let err = eyre::Report::new(StimError::Cancelled { sent: 2, planned: 5 });
        assert_eq!(exit_code_for_error(&err), 3);
        assert!(humanize(&err).contains("2 of 5"));
        let v: serde_json::Value = serde_json::from_str(&format_error_json(&err)).unwrap();
        assert_eq!(v["reason"], "Cancelled");
        assert_eq!(v["details"]["planned"], 5);
    }

    #[test]
    fn config_messages_are_recognised() {
        let err = eyre::eyre!("display.refresh_hz must be > 0");
        assert_eq!(exit_code_for_error(&err), 1);
        assert!(humanize(&err).starts_with("What happened: Configuration is invalid"));
    }

    #[test]
    fn missing_trace_explains_both_sources() {
        let err = eyre::Report::new(BuildError::MissingTrace);
        let text = humanize(&err);
        assert!(text.contains("--trace"));
        assert!(text.contains("[motion].trace"));
    }
}
