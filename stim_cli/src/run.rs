//! Stimulus assembly from the typed config, and the `run` / `shock` commands.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use serde_json::{Value as Json, json};
use stim_core::conversions::{drift_params, grating_background};
use stim_core::error::{BuildError, Result};
use stim_core::{
    Background, BurstReport, CenteringWrapper, CircleParams, CircleStimulus, ClosedLoop1D,
    FishTrackingStimulus, FrameRunner, LatchedEstimator, MarkerParams, MotionTrace,
    MovingConstantly, MovingSeamless, OutputShape, PaintedStimulus, PerpendicularMotion, RunEnd,
    RunSummary, SharedEstimator, ShockStimulus, TickRecord, TrackingStimulus, Value,
};
use stim_traits::{Clock, MonotonicClock, Painter, Rgb};

use crate::cli::{RtLock, StimKind};
use crate::rt::setup_rt_once;
use crate::sim::{self, VirtualClock};

/// Shock command polls the burst worker at this rate.
const BURST_POLL_HZ: f64 = 200.0;

/// Resolve the motion trace: the CLI flag wins over `[motion].trace`.
pub fn load_motion(cfg: &stim_config::Config, flag: Option<&Path>) -> Result<Option<MotionTrace>> {
    let path = match (flag, cfg.motion.trace.as_deref()) {
        (Some(p), _) => p.to_path_buf(),
        (None, Some(p)) => Path::new(p).to_path_buf(),
        (None, None) => return Ok(None),
    };
    let rows = stim_config::load_trace_csv(&path)?;
    MotionTrace::try_from(rows.as_slice()).map(Some)
}

fn background(cfg: &stim_config::Config) -> Result<Background> {
    Background::new(grating_background(&cfg.display), OutputShape::from(&cfg.display))
}

fn closed_loop(
    cfg: &stim_config::Config,
    est: SharedEstimator,
    seconds: f64,
) -> Result<ClosedLoop1D> {
    ClosedLoop1D::new(background(cfg)?, est, (&cfg.closed_loop).into(), seconds)
}

/// Assemble one stimulus variant wired to `est`.
pub fn build_stimulus(
    kind: StimKind,
    cfg: &stim_config::Config,
    est: SharedEstimator,
    motion: Option<MotionTrace>,
    seconds: f64,
) -> Result<Box<dyn PaintedStimulus>> {
    let missing_trace = || eyre::Report::new(BuildError::MissingTrace);
    let stim: Box<dyn PaintedStimulus> = match kind {
        StimKind::ClosedLoop => Box::new(closed_loop(cfg, est, seconds)?),
        StimKind::Moving => Box::new(MovingSeamless::new(
            background(cfg)?,
            motion.ok_or_else(missing_trace)?,
            seconds,
        )),
        StimKind::Constant => Box::new(MovingConstantly::new(
            background(cfg)?,
            drift_params(&cfg.display, &cfg.motion),
            seconds,
        )?),
        StimKind::Perpendicular => Box::new(PerpendicularMotion::new(
            background(cfg)?,
            est,
            motion.ok_or_else(missing_trace)?,
            seconds,
        )),
        StimKind::FishTracking => {
            let marker = MarkerParams {
                length: cfg.tracking.marker_length_px,
                width: cfg.tracking.marker_width_px,
                ..MarkerParams::default()
            };
            Box::new(FishTrackingStimulus::new(marker, est, seconds)?)
        }
        StimKind::Tracking => {
            let params = CircleParams {
                radius: cfg.tracking.radius_px,
                ..CircleParams::default()
            };
            Box::new(TrackingStimulus::new(params, est, seconds)?)
        }
        StimKind::Centering => {
            let primary = closed_loop(cfg, est.clone(), seconds)?;
            let spot = CircleParams {
                x: f64::from(cfg.display.width) / 2.0,
                y: f64::from(cfg.display.height) / 2.0,
                radius: cfg.tracking.radius_px,
                ..CircleParams::default()
            };
            let centering = CircleStimulus::new(spot, seconds)?;
            Box::new(CenteringWrapper::new(
                Box::new(primary),
                Box::new(centering),
                est,
                cfg.centering.margin_px,
            )?)
        }
    };
    Ok(stim)
}

/// Paint sink for runs without a display; counts what would be drawn.
#[derive(Debug, Default)]
pub struct HeadlessPainter {
    pub primitives: u64,
    pub pixels: u64,
}

impl Painter for HeadlessPainter {
    fn save(&mut self) {}
    fn restore(&mut self) {}
    fn translate(&mut self, _dx: f64, _dy: f64) {}
    fn rotate(&mut self, _theta: f64) {}
    fn fill_rect(&mut self, _x: f64, _y: f64, _w: f64, _h: f64, _color: Rgb) {
        self.primitives += 1;
    }
    fn fill_ellipse(&mut self, _cx: f64, _cy: f64, _rx: f64, _ry: f64, _color: Rgb) {
        self.primitives += 1;
    }
    fn draw_pixels(
        &mut self,
        _x: f64,
        _y: f64,
        width: usize,
        height: usize,
        _channels: usize,
        _data: &[u8],
    ) {
        self.primitives += 1;
        self.pixels += (width * height) as u64;
    }
}

pub fn value_json(v: &Value) -> Json {
    match v {
        Value::Float(f) => serde_json::Number::from_f64(*f).map_or(Json::Null, Json::Number),
        Value::Bool(b) => Json::Bool(*b),
        Value::Int(i) => json!(i),
        Value::Text(s) => Json::String(s.clone()),
        Value::Missing => Json::Null,
    }
}

pub fn tick_json(rec: &TickRecord) -> Json {
    let state: serde_json::Map<String, Json> = rec
        .state
        .iter()
        .map(|(k, v)| (k.to_string(), value_json(v)))
        .collect();
    json!({
        "frame": rec.frame,
        "elapsed": rec.tick.elapsed,
        "dt": rec.tick.dt,
        "state": state,
    })
}

fn tick_line(rec: &TickRecord) -> String {
    let mut line = format!("frame {:>5} t={:.3}", rec.frame, rec.tick.elapsed);
    for (k, v) in rec.state.iter() {
        line.push_str(&format!(" {k}={v}"));
    }
    line
}

pub fn end_name(end: RunEnd) -> &'static str {
    match end {
        RunEnd::Finished => "finished",
        RunEnd::TimeLimit => "time_limit",
        RunEnd::Shutdown => "shutdown",
    }
}

pub fn summary_json(kind: StimKind, s: &RunSummary, painter: &HeadlessPainter) -> Json {
    json!({
        "summary": {
            "kind": kind.as_str(),
            "frames": s.frames,
            "elapsed": s.elapsed,
            "missed_deadlines": s.missed_deadlines,
            "max_lateness_us": s.max_lateness.as_micros() as u64,
            "end": end_name(s.end),
            "primitives": painter.primitives,
            "pixels": painter.pixels,
        }
    })
}

pub struct RunArgs<'a> {
    pub kind: StimKind,
    pub seconds: f64,
    pub trace: Option<&'a Path>,
    pub fast: bool,
    pub json: bool,
}

pub fn run_stimulus(
    cfg: &stim_config::Config,
    args: &RunArgs<'_>,
    shutdown: Arc<AtomicBool>,
) -> Result<RunSummary> {
    if !(args.seconds.is_finite() && args.seconds > 0.0) {
        eyre::bail!(BuildError::InvalidConfig("--seconds must be > 0"));
    }
    if args.fast {
        drive(cfg, args, VirtualClock::new(), shutdown)
    } else {
        drive(cfg, args, MonotonicClock::new(), shutdown)
    }
}

fn drive<C>(
    cfg: &stim_config::Config,
    args: &RunArgs<'_>,
    clock: C,
    shutdown: Arc<AtomicBool>,
) -> Result<RunSummary>
where
    C: Clock + Clone + Send + Sync + 'static,
{
    let motion = if args.kind.needs_trace() {
        load_motion(cfg, args.trace)?
    } else {
        None
    };
    let raw = sim::estimator(Arc::new(clock.clone()), &cfg.simulation, args.seconds);
    let latch = LatchedEstimator::shared(Arc::new(raw));
    let est: SharedEstimator = latch.clone();
    let mut stim = build_stimulus(args.kind, cfg, est, motion, args.seconds)?;

    let runner = FrameRunner::with_clock(cfg.display.refresh_hz, clock)
        .max_seconds(args.seconds)
        .latch(latch)
        .shutdown_flag(shutdown);
    let viewport = (f64::from(cfg.display.width), f64::from(cfg.display.height));
    let mut painter = HeadlessPainter::default();
    let json = args.json;

    let summary = runner.run_painted(stim.as_mut(), &mut painter, viewport, |rec| {
        if json {
            println!("{}", tick_json(rec));
        } else {
            println!("{}", tick_line(rec));
        }
    })?;

    if json {
        println!("{}", summary_json(args.kind, &summary, &painter));
    } else {
        println!(
            "run complete: {} frames in {:.3} s (end: {}, missed deadlines: {})",
            summary.frames,
            summary.elapsed,
            end_name(summary.end),
            summary.missed_deadlines
        );
    }
    tracing::info!(
        kind = args.kind.as_str(),
        frames = summary.frames,
        missed = summary.missed_deadlines,
        "run finished"
    );
    Ok(summary)
}

/// Real-time knobs for the shock command.
#[derive(Debug, Clone, Copy)]
pub struct RtArgs {
    pub enabled: bool,
    pub prio: Option<i32>,
    pub lock: Option<RtLock>,
    pub cpu: Option<usize>,
}

fn pulse_board(cfg: &stim_config::Config) -> Result<stim_core::shock::BoxedDevice> {
    #[cfg(feature = "hardware")]
    if let Some(port) = cfg.hardware.port.as_deref() {
        let board = stim_hardware::open_serial_board(
            port,
            cfg.hardware.baud,
            Duration::from_millis(cfg.hardware.write_timeout_ms),
        )?;
        return Ok(Box::new(board));
    }
    if cfg.hardware.port.is_some() {
        tracing::warn!("built without the `hardware` feature; using the simulated pulse board");
    }
    let mut board = stim_hardware::SimulatedPulseBoard::new();
    // Failure injection for CLI tests: fail the pulse with this zero-based index.
    if let Some(idx) = std::env::var("STIM_TEST_FAIL_PULSE")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
    {
        board = board.failing_on(idx);
    }
    Ok(Box::new(board))
}

/// Fire one burst and block until it ends, is cancelled, or fails.
pub fn run_shock(
    cfg: &stim_config::Config,
    cancel_after_ms: Option<u64>,
    rt: RtArgs,
    shutdown: Arc<AtomicBool>,
) -> Result<BurstReport> {
    // Applied before the worker is spawned so it inherits the policy.
    #[cfg(target_os = "linux")]
    setup_rt_once(
        rt.enabled,
        rt.prio,
        rt.lock.unwrap_or(RtLock::os_default()),
        rt.cpu,
    );
    #[cfg(target_os = "macos")]
    setup_rt_once(rt.enabled, rt.lock.unwrap_or(RtLock::os_default()));

    let mut stim = ShockStimulus::builder()
        .with_boxed_device(pulse_board(cfg)?)
        .with_params((&cfg.shock).into())
        .build()?;

    let mut runner = FrameRunner::new(BURST_POLL_HZ).shutdown_flag(shutdown);
    if let Some(ms) = cancel_after_ms {
        runner = runner.max_seconds(Duration::from_millis(ms).as_secs_f64());
    }
    let summary = runner.run(&mut stim, |_| {})?;
    tracing::debug!(end = end_name(summary.end), "burst poll loop ended");
    stim.wait()
}

#[cfg(test)]
mod tests {
    use super::*;
    use stim_core::Stimulus;
    use stim_core::mocks::ScriptedEstimator;
    use stim_traits::Pose;

    fn small_cfg() -> stim_config::Config {
        let mut cfg = stim_config::Config::default();
        cfg.display.width = 32;
        cfg.display.height = 24;
        cfg
    }

    fn est() -> SharedEstimator {
        Arc::new(ScriptedEstimator::new(Pose::new(16.0, 12.0, 0.0), 0.0))
    }

    #[test]
    fn every_kind_builds_with_a_trace() {
        let cfg = small_cfg();
        for kind in StimKind::ALL {
            let motion = Some(MotionTrace::stationary(0.0, 0.0));
            let stim = build_stimulus(kind, &cfg, est(), motion, 1.0).unwrap();
            assert_eq!(stim.duration(), 1.0, "{}", kind.as_str());
        }
    }

    #[test]
    fn trace_kinds_require_a_trace() {
        let cfg = small_cfg();
        let err = build_stimulus(StimKind::Moving, &cfg, est(), None, 1.0)
            .err()
            .unwrap();
        assert!(matches!(
            err.downcast_ref::<BuildError>(),
            Some(BuildError::MissingTrace)
        ));
    }

    #[test]
    fn non_finite_floats_serialize_as_null() {
        assert_eq!(value_json(&Value::Float(f64::NAN)), Json::Null);
        assert_eq!(value_json(&Value::Missing), Json::Null);
        assert_eq!(value_json(&Value::Float(1.5)), json!(1.5));
    }
}
