#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schemas and motion-trace parsing for the stimulus engine.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//!   Every section is optional; missing keys take the defaults below.
//! - Motion-trace CSV loader enforces `t,x,y` headers and a strictly
//!   increasing time column.
use serde::Deserialize;

/// Largest pulse amplitude the pulse board can produce (DAC full scale).
pub const MAX_PULSE_AMP_MA: f64 = 3.5;
/// Largest pulse duration representable in a command frame.
pub const MAX_PULSE_DUR_MS: u32 = 999;

/// Motion trace CSV schema.
///
/// Expected headers:
/// t,x,y
///
/// Example:
/// t,x,y
/// 0.0,0.0,0.0
/// 2.0,30.0,0.0
#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
pub struct TraceRow {
    pub t: f64,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DisplayCfg {
    /// Display refresh rate; one stimulus update per refresh.
    pub refresh_hz: f64,
    pub width: u32,
    pub height: u32,
    /// Physical size of one pixel at the subject, in mm.
    pub mm_per_px: f64,
    /// Stripe width of the generated grating background.
    pub grating_period_px: u32,
}

impl Default for DisplayCfg {
    fn default() -> Self {
        Self {
            refresh_hz: 60.0,
            width: 640,
            height: 480,
            mm_per_px: 1.0,
            grating_period_px: 20,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ClosedLoopCfg {
    pub base_vel: f64,
    pub gain: f64,
    /// Extra feedback delay in seconds
    pub lag: f64,
    pub shunting: bool,
    pub swimming_threshold: f64,
    /// Fixed velocity while swimming; absent means use the gain law
    pub fixed_vel: Option<f64>,
}

impl Default for ClosedLoopCfg {
    fn default() -> Self {
        Self {
            base_vel: 10.0,
            gain: 1.0,
            lag: 0.0,
            shunting: false,
            swimming_threshold: -6.0,
            fixed_vel: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CenteringCfg {
    /// Distance from the display center (px) beyond which centering is shown
    pub margin_px: f64,
}

impl Default for CenteringCfg {
    fn default() -> Self {
        Self { margin_px: 200.0 }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ShockCfg {
    pub burst_freq: f64,
    pub pulse_amp_ma: f64,
    pub burst_n: u32,
    pub pulse_dur_ms: u32,
}

impl Default for ShockCfg {
    fn default() -> Self {
        Self {
            burst_freq: 50.0,
            pulse_amp_ma: 3.0,
            burst_n: 5,
            pulse_dur_ms: 2,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HardwareCfg {
    /// Serial port of the pulse board; absent means simulated board
    pub port: Option<String>,
    pub baud: u32,
    pub write_timeout_ms: u64,
}

impl Default for HardwareCfg {
    fn default() -> Self {
        Self {
            port: None,
            baud: 115_200,
            write_timeout_ms: 100,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MotionCfg {
    /// Optional `t,x,y` CSV for trace-driven stimuli
    pub trace: Option<String>,
    /// Constant drift in mm/s
    pub x_vel: f64,
    pub y_vel: f64,
}

impl Default for MotionCfg {
    fn default() -> Self {
        Self {
            trace: None,
            x_vel: 0.0,
            y_vel: 10.0,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TrackingCfg {
    pub radius_px: f64,
    pub marker_length_px: f64,
    pub marker_width_px: f64,
}

impl Default for TrackingCfg {
    fn default() -> Self {
        Self {
            radius_px: 10.0,
            marker_length_px: 40.0,
            marker_width_px: 10.0,
        }
    }
}

/// Scripted subject used when no tracker is attached.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SimulationCfg {
    pub origin_x: f64,
    pub origin_y: f64,
    pub bout_interval_s: f64,
    pub bout_duration_s: f64,
    /// Estimated velocity during a bout (negative while swimming)
    pub bout_vigor: f64,
    /// Forward displacement per bout, px
    pub bout_distance_px: f64,
    /// Heading change per bout, rad
    pub bout_turn_rad: f64,
}

impl Default for SimulationCfg {
    fn default() -> Self {
        Self {
            origin_x: 320.0,
            origin_y: 240.0,
            bout_interval_s: 1.0,
            bout_duration_s: 0.2,
            bout_vigor: -10.0,
            bout_distance_px: 15.0,
            bout_turn_rad: 0.3,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub display: DisplayCfg,
    pub closed_loop: ClosedLoopCfg,
    pub centering: CenteringCfg,
    pub shock: ShockCfg,
    pub hardware: HardwareCfg,
    pub logging: Logging,
    pub motion: MotionCfg,
    pub tracking: TrackingCfg,
    pub simulation: SimulationCfg,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

pub fn load_trace_csv(path: &std::path::Path) -> eyre::Result<Vec<TraceRow>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| eyre::eyre!("open trace CSV {:?}: {}", path, e))?;

    // Enforce exact headers
    let headers = rdr
        .headers()
        .map_err(|e| eyre::eyre!("read CSV headers {:?}: {}", path, e))?
        .clone();
    let expected = ["t", "x", "y"];
    let actual: Vec<String> = headers.iter().map(|s| s.to_string()).collect();
    if actual != expected {
        eyre::bail!(
            "trace CSV must have headers 't,x,y', got: {}",
            actual.join(",")
        );
    }

    let mut rows: Vec<TraceRow> = Vec::new();
    for (idx, rec) in rdr.deserialize::<TraceRow>().enumerate() {
        let row = match rec {
            Ok(row) => row,
            Err(e) => eyre::bail!("invalid CSV row {}: {}", idx + 2, e),
        };
        if !(row.t.is_finite() && row.x.is_finite() && row.y.is_finite()) {
            eyre::bail!("trace CSV row {} has non-finite values", idx + 2);
        }
        if let Some(prev) = rows.last()
            && row.t <= prev.t
        {
            eyre::bail!(
                "trace CSV times must be strictly increasing (row {}: {} after {})",
                idx + 2,
                row.t,
                prev.t
            );
        }
        rows.push(row);
    }
    if rows.is_empty() {
        eyre::bail!("trace CSV {:?} has no rows", path);
    }
    Ok(rows)
}

fn finite(v: f64) -> bool {
    v.is_finite()
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Display
        if !(finite(self.display.refresh_hz) && self.display.refresh_hz > 0.0) {
            eyre::bail!("display.refresh_hz must be > 0");
        }
        if self.display.refresh_hz > 1000.0 {
            eyre::bail!("display.refresh_hz is unreasonably large (>1000)");
        }
        if self.display.width == 0 || self.display.height == 0 {
            eyre::bail!("display.width and display.height must be > 0");
        }
        if !(finite(self.display.mm_per_px) && self.display.mm_per_px > 0.0) {
            eyre::bail!("display.mm_per_px must be > 0");
        }
        if self.display.grating_period_px == 0 {
            eyre::bail!("display.grating_period_px must be >= 1");
        }

        // Closed loop
        let cl = &self.closed_loop;
        if !finite(cl.base_vel) {
            eyre::bail!("closed_loop.base_vel must be finite");
        }
        if !finite(cl.gain) {
            eyre::bail!("closed_loop.gain must be finite");
        }
        if !(finite(cl.lag) && cl.lag >= 0.0) {
            eyre::bail!("closed_loop.lag must be >= 0");
        }
        if !finite(cl.swimming_threshold) {
            eyre::bail!("closed_loop.swimming_threshold must be finite");
        }
        if let Some(v) = cl.fixed_vel
            && !finite(v)
        {
            eyre::bail!("closed_loop.fixed_vel must be finite");
        }

        // Centering
        if !(finite(self.centering.margin_px) && self.centering.margin_px >= 0.0) {
            eyre::bail!("centering.margin_px must be >= 0");
        }

        // Shock
        let sh = &self.shock;
        if !(finite(sh.burst_freq) && sh.burst_freq > 0.0) {
            eyre::bail!("shock.burst_freq must be > 0");
        }
        if !(finite(sh.pulse_amp_ma) && (0.0..=MAX_PULSE_AMP_MA).contains(&sh.pulse_amp_ma)) {
            eyre::bail!("shock.pulse_amp_ma must be in [0.0, 3.5]");
        }
        if sh.burst_n == 0 {
            eyre::bail!("shock.burst_n must be >= 1");
        }
        if sh.pulse_dur_ms > MAX_PULSE_DUR_MS {
            eyre::bail!("shock.pulse_dur_ms must be <= 999");
        }
        if f64::from(sh.pulse_dur_ms) / 1000.0 > 1.0 / sh.burst_freq {
            eyre::bail!("shock.pulse_dur_ms must fit inside one burst period");
        }

        // Hardware
        if self.hardware.baud == 0 {
            eyre::bail!("hardware.baud must be > 0");
        }
        if self.hardware.write_timeout_ms == 0 {
            eyre::bail!("hardware.write_timeout_ms must be >= 1");
        }

        // Logging
        if let Some(r) = self.logging.rotation.as_deref()
            && !matches!(r.to_ascii_lowercase().as_str(), "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never, daily, hourly");
        }

        // Motion
        if !(finite(self.motion.x_vel) && finite(self.motion.y_vel)) {
            eyre::bail!("motion.x_vel and motion.y_vel must be finite");
        }

        // Tracking
        let tr = &self.tracking;
        if !(finite(tr.radius_px) && tr.radius_px > 0.0) {
            eyre::bail!("tracking.radius_px must be > 0");
        }
        if !(finite(tr.marker_length_px) && tr.marker_length_px > 0.0)
            || !(finite(tr.marker_width_px) && tr.marker_width_px > 0.0)
        {
            eyre::bail!("tracking.marker_length_px and tracking.marker_width_px must be > 0");
        }

        // Simulation
        let sim = &self.simulation;
        if !(finite(sim.bout_interval_s) && sim.bout_interval_s > 0.0) {
            eyre::bail!("simulation.bout_interval_s must be > 0");
        }
        if !(finite(sim.bout_duration_s)
            && sim.bout_duration_s > 0.0
            && sim.bout_duration_s <= sim.bout_interval_s)
        {
            eyre::bail!("simulation.bout_duration_s must be in (0, bout_interval_s]");
        }
        if ![
            sim.origin_x,
            sim.origin_y,
            sim.bout_vigor,
            sim.bout_distance_px,
            sim.bout_turn_rad,
        ]
        .iter()
        .all(|v| v.is_finite())
        {
            eyre::bail!("simulation values must be finite");
        }

        Ok(())
    }
}
