use thiserror::Error;

#[derive(Debug, Error)]
pub enum HwError {
    #[error("serial error: {0}")]
    Serial(String),
    #[error("pulse board write timeout")]
    Timeout,
    #[error("pulse amplitude {0} mA outside 0..=3.5 mA")]
    Amplitude(f64),
    #[error("pulse duration {0} ms does not fit the 3-digit frame field")]
    Duration(u32),
    #[error("injected failure on pulse {0}")]
    Injected(usize),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HwError>;
