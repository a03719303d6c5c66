pub mod error;
pub mod estimator;
pub mod frame;

pub use estimator::{SimBout, SimulatedEstimator};

use std::io::Write;
use std::sync::{Arc, Mutex};

use stim_traits::{PulseCommand, PulseDevice};
use tracing::trace;

use crate::error::HwError;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Simulated pulse board: encodes frames and records them instead of writing.
///
/// Clones share the frame log, so a test can keep one handle while the
/// board itself is moved onto a burst worker thread.
#[derive(Debug, Clone, Default)]
pub struct SimulatedPulseBoard {
    frames: Arc<Mutex<Vec<String>>>,
    fail_on_pulse: Option<usize>,
}

impl SimulatedPulseBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the pulse with the given zero-based index (failure injection).
    pub fn failing_on(mut self, pulse_index: usize) -> Self {
        self.fail_on_pulse = Some(pulse_index);
        self
    }

    /// Every frame written so far, idle frames included.
    pub fn frames(&self) -> Vec<String> {
        self.frames.lock().map(|f| f.clone()).unwrap_or_default()
    }

    /// Number of non-idle pulse frames written so far.
    pub fn pulse_count(&self) -> usize {
        let idle = frame::idle_frame();
        self.frames().iter().filter(|f| **f != idle).count()
    }

    fn push(&self, frame: String) -> Result<(), HwError> {
        self.frames
            .lock()
            .map_err(|_| HwError::Serial("frame log poisoned".into()))?
            .push(frame);
        Ok(())
    }
}

impl PulseDevice for SimulatedPulseBoard {
    fn pulse(&mut self, cmd: &PulseCommand) -> Result<(), BoxError> {
        let index = self.pulse_count();
        if self.fail_on_pulse == Some(index) {
            return Err(Box::new(HwError::Injected(index)));
        }
        let frame = frame::encode(cmd)?;
        trace!(%frame, index, "simulated pulse");
        self.push(frame)?;
        Ok(())
    }

    fn idle(&mut self) -> Result<(), BoxError> {
        self.push(frame::idle_frame())?;
        Ok(())
    }
}

/// Pulse board reached through any byte sink (serial port, pipe, file).
pub struct WriterPulseBoard<W: Write> {
    out: W,
}

impl<W: Write> WriterPulseBoard<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_frame(&mut self, frame: &str) -> Result<(), HwError> {
        self.out.write_all(frame.as_bytes()).map_err(map_io)?;
        self.out.flush().map_err(map_io)?;
        trace!(%frame, "pulse frame written");
        Ok(())
    }
}

fn map_io(e: std::io::Error) -> HwError {
    if e.kind() == std::io::ErrorKind::TimedOut {
        HwError::Timeout
    } else {
        HwError::Io(e)
    }
}

impl<W: Write> PulseDevice for WriterPulseBoard<W> {
    fn pulse(&mut self, cmd: &PulseCommand) -> Result<(), BoxError> {
        let frame = frame::encode(cmd)?;
        self.write_frame(&frame)?;
        Ok(())
    }

    fn idle(&mut self) -> Result<(), BoxError> {
        self.write_frame(&frame::idle_frame())?;
        Ok(())
    }
}

#[cfg(feature = "hardware")]
pub type SerialPulseBoard = WriterPulseBoard<Box<dyn serialport::SerialPort>>;

/// Open the pulse board on a serial port.
#[cfg(feature = "hardware")]
pub fn open_serial_board(
    port: &str,
    baud: u32,
    write_timeout: std::time::Duration,
) -> error::Result<SerialPulseBoard> {
    let sp = serialport::new(port, baud)
        .timeout(write_timeout)
        .open()
        .map_err(|e| HwError::Serial(format!("open {port}: {e}")))?;
    tracing::info!(port, baud, "pulse board opened");
    Ok(WriterPulseBoard::new(sp))
}

#[cfg(test)]
mod tests {
    use super::*;
    use stim_traits::PulseKind;

    const CMD: PulseCommand = PulseCommand {
        kind: PulseKind::Shock,
        amplitude_ma: 3.0,
        duration_ms: 2,
    };

    #[test]
    fn test_simulated_board_records_frames() {
        let board = SimulatedPulseBoard::new();
        let mut dev = board.clone();
        dev.pulse(&CMD).unwrap();
        dev.pulse(&CMD).unwrap();
        dev.idle().unwrap();
        assert_eq!(board.pulse_count(), 2);
        assert_eq!(
            board.frames(),
            vec!["shock218002", "shock218002", "shock0000"]
        );
    }

    #[test]
    fn test_simulated_board_failure_injection() {
        let mut dev = SimulatedPulseBoard::new().failing_on(1);
        dev.pulse(&CMD).unwrap();
        let err = dev.pulse(&CMD).unwrap_err();
        assert!(err.to_string().contains("injected failure on pulse 1"));
    }

    #[test]
    fn test_writer_board_writes_raw_frames() {
        let mut dev = WriterPulseBoard::new(Vec::new());
        dev.pulse(&CMD).unwrap();
        dev.idle().unwrap();
        assert_eq!(dev.into_inner(), b"shock218002shock0000".to_vec());
    }
}
