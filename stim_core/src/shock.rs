//! Hardware-triggered pulse bursts.
//!
//! `start()` hands the pulse device to a dedicated worker thread that emits
//! `burst_n` pulses, each followed by a hold of `1/burst_freq - pulse_dur`.
//! The frame loop keeps running meanwhile and picks up the outcome through
//! `poll()` (or blocks on `wait()`); the device comes back to the stimulus
//! when the worker exits.
//!
//! Safety: the worker checks its cancel flag before every pulse and at least
//! every `HOLD_SLICE` while holding, never in the middle of a pulse. A burst
//! that stops early, whether cancelled or failed, ends with the device
//! commanded to idle.

use crossbeam_channel as xch;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use stim_config::{MAX_PULSE_AMP_MA, MAX_PULSE_DUR_MS};
use stim_traits::clock::{Clock, MonotonicClock};
use stim_traits::{PulseCommand, PulseDevice, PulseKind};

use crate::error::{BuildError, Report, Result, StimError, invalid};
use crate::hw_error::map_hw_error;
use crate::snapshot::{Field, StateSnapshot, collect};
use crate::stimulus::{Stimulus, Tick, Timing};
use crate::util::burst_pause;

pub type BoxedDevice = Box<dyn PulseDevice + Send>;
pub type SharedClock = Arc<dyn Clock + Send + Sync>;

/// Longest uninterrupted sleep while holding between pulses.
pub const HOLD_SLICE: Duration = Duration::from_millis(5);

#[derive(Debug, Clone, PartialEq)]
pub struct ShockParams {
    pub burst_freq: f64,
    pub pulse_amp_ma: f64,
    pub burst_n: u32,
    pub pulse_dur_ms: u32,
}

impl Default for ShockParams {
    fn default() -> Self {
        Self {
            burst_freq: 50.0,
            pulse_amp_ma: 3.0,
            burst_n: 5,
            pulse_dur_ms: 2,
        }
    }
}

impl ShockParams {
    pub fn validate(&self) -> Result<()> {
        if !(self.burst_freq.is_finite() && self.burst_freq > 0.0) {
            return Err(invalid("burst_freq must be > 0"));
        }
        if self.burst_n == 0 {
            return Err(invalid("burst_n must be >= 1"));
        }
        if !(self.pulse_amp_ma.is_finite()
            && (0.0..=MAX_PULSE_AMP_MA).contains(&self.pulse_amp_ma))
        {
            return Err(invalid("pulse_amp_ma must be in [0.0, 3.5]"));
        }
        if self.pulse_dur_ms > MAX_PULSE_DUR_MS {
            return Err(invalid("pulse_dur_ms must be <= 999"));
        }
        if self.pause().is_none() {
            return Err(invalid("pulse_dur_ms must fit inside one burst period"));
        }
        Ok(())
    }

    /// Hold after each pulse.
    pub fn pause(&self) -> Option<Duration> {
        burst_pause(self.burst_freq, self.pulse_dur_ms)
    }

    pub fn command(&self) -> PulseCommand {
        PulseCommand {
            kind: PulseKind::Shock,
            amplitude_ma: self.pulse_amp_ma,
            duration_ms: self.pulse_dur_ms,
        }
    }
}

/// Summary of a burst that emitted every planned pulse.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BurstReport {
    pub pulses: u32,
    /// Wall time from the first pulse to the end of the last hold.
    pub elapsed: Duration,
}

type Outcome = std::result::Result<BurstReport, StimError>;

/// Handle to a running burst worker.
pub struct BurstTask {
    cancel: Arc<AtomicBool>,
    sent: Arc<AtomicU32>,
    rx: xch::Receiver<Outcome>,
    join_handle: Option<JoinHandle<BoxedDevice>>,
}

impl BurstTask {
    pub fn spawn(
        mut device: BoxedDevice,
        params: &ShockParams,
        clock: SharedClock,
    ) -> Result<Self> {
        params.validate()?;
        let pause = params.pause().ok_or_else(|| invalid("pause out of range"))?;
        let cmd = params.command();
        let planned = params.burst_n;

        let (tx, rx) = xch::bounded(1);
        let cancel = Arc::new(AtomicBool::new(false));
        let cancel_clone = cancel.clone();
        let sent = Arc::new(AtomicU32::new(0));
        let sent_clone = sent.clone();

        let join_handle = std::thread::Builder::new()
            .name("stim-burst".into())
            .spawn(move || {
                let outcome = run_burst(
                    device.as_mut(),
                    &cmd,
                    planned,
                    pause,
                    clock.as_ref(),
                    &cancel_clone,
                    &sent_clone,
                );
                // Receiver gone means the stimulus was dropped; nothing to report to.
                let _ = tx.send(outcome);
                tracing::trace!("burst worker exiting cleanly");
                device
            })
            .map_err(|e| Report::new(StimError::State(format!("spawn burst worker: {e}"))))?;

        Ok(Self {
            cancel,
            sent,
            rx,
            join_handle: Some(join_handle),
        })
    }

    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    pub fn pulses_sent(&self) -> u32 {
        self.sent.load(Ordering::Relaxed)
    }

    /// Non-blocking: the outcome if the worker has finished.
    pub fn try_outcome(&self) -> Option<Outcome> {
        self.rx.try_recv().ok()
    }

    /// Block until the worker reports.
    pub fn outcome(&self) -> Outcome {
        self.rx
            .recv()
            .unwrap_or_else(|_| Err(StimError::State("burst worker vanished".into())))
    }

    /// Join the worker and take the device back.
    pub fn join(mut self) -> Option<BoxedDevice> {
        let handle = self.join_handle.take()?;
        match handle.join() {
            Ok(device) => Some(device),
            Err(e) => {
                tracing::warn!(?e, "burst worker panicked");
                None
            }
        }
    }
}

impl Drop for BurstTask {
    fn drop(&mut self) {
        if let Some(handle) = self.join_handle.take() {
            self.cancel.store(true, Ordering::Relaxed);
            if let Err(e) = handle.join() {
                tracing::warn!(?e, "burst worker panicked during shutdown");
            }
        }
    }
}

/// Sleep `total` in slices, giving up early when cancelled.
fn hold(clock: &dyn Clock, total: Duration, cancel: &AtomicBool) {
    let mut left = total;
    while !left.is_zero() {
        if cancel.load(Ordering::Relaxed) {
            return;
        }
        let step = left.min(HOLD_SLICE);
        clock.sleep(step);
        left -= step;
    }
}

fn send_idle(device: &mut dyn PulseDevice) {
    if let Err(e) = device.idle() {
        tracing::error!(error = %map_hw_error(&*e), "failed to idle pulse device");
    }
}

fn run_burst(
    device: &mut dyn PulseDevice,
    cmd: &PulseCommand,
    planned: u32,
    pause: Duration,
    clock: &dyn Clock,
    cancel: &AtomicBool,
    sent: &AtomicU32,
) -> Outcome {
    let t0 = clock.now();
    let mut n = 0;
    while n < planned {
        if cancel.load(Ordering::Relaxed) {
            break;
        }
        if let Err(e) = device.pulse(cmd) {
            let cause = map_hw_error(&*e);
            tracing::error!(pulse = n + 1, planned, error = %cause, "pulse command failed");
            send_idle(device);
            return Err(StimError::DeviceCommand {
                pulse: n + 1,
                cause: cause.to_string(),
            });
        }
        n += 1;
        sent.store(n, Ordering::Relaxed);
        tracing::trace!(pulse = n, planned, "pulse sent");
        hold(clock, pause, cancel);
    }
    if n < planned {
        tracing::warn!(sent = n, planned, "burst cancelled");
        send_idle(device);
        return Err(StimError::Cancelled { sent: n, planned });
    }
    Ok(BurstReport {
        pulses: n,
        elapsed: clock.now().saturating_duration_since(t0),
    })
}

/// Stimulus emitting one pulse burst per `start()`.
pub struct ShockStimulus {
    timing: Timing,
    params: ShockParams,
    clock: SharedClock,
    device: Option<BoxedDevice>,
    task: Option<BurstTask>,
    outcome: Option<Outcome>,
    pulses_sent: u32,
}

impl std::fmt::Debug for ShockStimulus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShockStimulus")
            .field("params", &self.params)
            .field("running", &self.task.is_some())
            .field("outcome", &self.outcome)
            .finish()
    }
}

impl ShockStimulus {
    const FIELDS: &'static [Field<Self>] = &[
        Field::new("name", |s| s.timing.name().into()),
        Field::new("duration", |s| s.timing.duration().into()),
        Field::new("elapsed", |s| s.timing.elapsed().into()),
        Field::new("burst_freq", |s| s.params.burst_freq.into()),
        Field::new("pulse_amp_ma", |s| s.params.pulse_amp_ma.into()),
        Field::new("burst_n", |s| s.params.burst_n.into()),
        Field::new("pulse_dur_ms", |s| s.params.pulse_dur_ms.into()),
        Field::new("pause", |s| {
            s.params.pause().map(|p| p.as_secs_f64()).into()
        }),
        Field::new("pulses_sent", |s| s.pulses_sent().into()),
    ];

    pub fn builder() -> ShockBuilder {
        ShockBuilder::default()
    }

    pub fn params(&self) -> &ShockParams {
        &self.params
    }

    pub fn is_running(&self) -> bool {
        self.task.is_some()
    }

    pub fn pulses_sent(&self) -> u32 {
        self.task
            .as_ref()
            .map_or(self.pulses_sent, BurstTask::pulses_sent)
    }

    /// Outcome of the last burst, once it has ended.
    pub fn outcome(&self) -> Option<&Outcome> {
        self.outcome.as_ref()
    }

    /// Take the device back, e.g. to hand it to another stimulus.
    pub fn into_device(mut self) -> Option<BoxedDevice> {
        if let Some(task) = self.task.take() {
            task.cancel();
            if let Err(e) = task.outcome() {
                tracing::warn!(error = %e, "burst ended early while releasing device");
            }
            return task.join();
        }
        self.device.take()
    }

    /// Block until the running burst ends and return its report.
    pub fn wait(&mut self) -> Result<BurstReport> {
        if let Some(task) = self.task.take() {
            let outcome = task.outcome();
            self.finish(task, outcome);
        }
        match &self.outcome {
            Some(Ok(report)) => Ok(*report),
            Some(Err(e)) => Err(Report::new(e.clone())),
            None => Err(Report::new(StimError::State("no burst has been started".into()))),
        }
    }

    fn collect_outcome(&mut self) {
        let outcome = match &self.task {
            Some(task) => task.try_outcome(),
            None => return,
        };
        if let (Some(outcome), Some(task)) = (outcome, self.task.take()) {
            self.finish(task, outcome);
        }
    }

    fn finish(&mut self, task: BurstTask, outcome: Outcome) {
        self.pulses_sent = task.pulses_sent();
        self.device = task.join();
        match &outcome {
            Ok(report) => tracing::debug!(
                pulses = report.pulses,
                elapsed_ms = report.elapsed.as_millis() as u64,
                "burst complete"
            ),
            Err(e) => tracing::debug!(error = %e, "burst ended early"),
        }
        self.outcome = Some(outcome);
    }
}

impl Stimulus for ShockStimulus {
    fn timing(&self) -> &Timing {
        &self.timing
    }

    fn start(&mut self) -> Result<()> {
        if self.task.is_some() {
            return Err(Report::new(StimError::State("burst already running".into())));
        }
        let device = self
            .device
            .take()
            .ok_or_else(|| Report::new(StimError::State("pulse device unavailable".into())))?;
        self.timing.reset();
        self.outcome = None;
        self.pulses_sent = 0;
        tracing::debug!(
            burst_n = self.params.burst_n,
            burst_freq = self.params.burst_freq,
            pulse_amp_ma = self.params.pulse_amp_ma,
            "burst start"
        );
        self.task = Some(BurstTask::spawn(device, &self.params, self.clock.clone())?);
        Ok(())
    }

    fn update(&mut self, tick: Tick) {
        self.timing.advance(tick);
        self.collect_outcome();
    }

    fn state(&self) -> StateSnapshot {
        collect(self, Self::FIELDS)
    }

    fn dynamic_parameters(&self) -> &'static [&'static str] {
        &["pulses_sent"]
    }

    /// Finished once the burst has ended, however long it took.
    fn finished(&self) -> bool {
        self.outcome.is_some()
    }

    fn poll(&mut self) -> Result<()> {
        self.collect_outcome();
        match &self.outcome {
            Some(Err(e)) => Err(Report::new(e.clone())),
            _ => Ok(()),
        }
    }

    fn abort(&mut self) {
        if let Some(task) = &self.task {
            task.cancel();
        }
    }
}

/// Builder for `ShockStimulus`. The device is required.
#[derive(Default)]
pub struct ShockBuilder {
    device: Option<BoxedDevice>,
    params: Option<ShockParams>,
    clock: Option<SharedClock>,
    name: Option<String>,
}

impl ShockBuilder {
    pub fn with_device(mut self, device: impl PulseDevice + Send + 'static) -> Self {
        self.device = Some(Box::new(device));
        self
    }

    pub fn with_boxed_device(mut self, device: BoxedDevice) -> Self {
        self.device = Some(device);
        self
    }

    pub fn with_params(mut self, params: ShockParams) -> Self {
        self.params = Some(params);
        self
    }

    pub fn with_clock(mut self, clock: impl Clock + Send + Sync + 'static) -> Self {
        self.clock = Some(Arc::new(clock));
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn build(self) -> Result<ShockStimulus> {
        let device = self
            .device
            .ok_or_else(|| Report::new(BuildError::MissingDevice))?;
        let params = self.params.unwrap_or_default();
        params.validate()?;
        Ok(ShockStimulus {
            timing: Timing::new(self.name.unwrap_or_else(|| "shock".into()), 0.0),
            params,
            clock: self.clock.unwrap_or_else(|| Arc::new(MonotonicClock::new())),
            device: Some(device),
            task: None,
            outcome: None,
            pulses_sent: 0,
        })
    }
}
