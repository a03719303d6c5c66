use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum StimError {
    #[error("hardware error: {0}")]
    Hardware(String),
    #[error("pulse device timeout")]
    DeviceTimeout,
    #[error("pulse {pulse} of burst failed: {cause}")]
    DeviceCommand { pulse: u32, cause: String },
    #[error("configuration error: {0}")]
    Config(String),
    #[error("burst cancelled after {sent} of {planned} pulses")]
    Cancelled { sent: u32, planned: u32 },
    #[error("invalid state: {0}")]
    State(String),
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing pulse device")]
    MissingDevice,
    #[error("missing estimator")]
    MissingEstimator,
    #[error("missing motion trace")]
    MissingTrace,
    #[error("missing background image")]
    MissingBackground,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;

/// Wrap a construction failure so callers can downcast it.
pub(crate) fn invalid(msg: &'static str) -> Report {
    Report::new(BuildError::InvalidConfig(msg))
}
