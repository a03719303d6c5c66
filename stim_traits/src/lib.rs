//! Seams between the stimulus engine and its external collaborators.
//!
//! Everything the engine talks to but does not own lives behind one of these
//! traits: the clock, the subject-tracking estimator, the pulse device and the
//! paint surface of the display backend.
pub mod clock;

pub use clock::{Clock, MonotonicClock};

/// Pose estimate of the tracked subject in display coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub x: f64,
    pub y: f64,
    /// Heading in radians.
    pub theta: f64,
}

impl Pose {
    /// Sentinel reported by position estimators without a current fix.
    pub const NO_FIX: Pose = Pose {
        x: -1.0,
        y: -1.0,
        theta: 0.0,
    };

    pub const fn new(x: f64, y: f64, theta: f64) -> Self {
        Self { x, y, theta }
    }
}

/// Read-only view of the tracking estimator.
///
/// Both reads may return non-finite values when the estimator has no fix;
/// callers must treat those as "no update" rather than failing.
pub trait Estimator {
    fn get_position(&self) -> Pose;
    /// Signed vigor-derived velocity, delayed by `lag_s` seconds.
    fn get_velocity(&self, lag_s: f64) -> f64;
}

/// Kind of discrete event a pulse device can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PulseKind {
    Shock,
}

impl PulseKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PulseKind::Shock => "shock",
        }
    }
}

/// One pulse request: `{kind, amplitude, duration}`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PulseCommand {
    pub kind: PulseKind,
    pub amplitude_ma: f64,
    pub duration_ms: u32,
}

/// Fire-and-forget pulse generator (e.g. a microcontroller behind a serial port).
pub trait PulseDevice {
    /// Emit one pulse. No acknowledgement is awaited.
    fn pulse(
        &mut self,
        cmd: &PulseCommand,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
    /// Return the output stage to its safe idle level.
    fn idle(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// 8-bit RGB colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const BLACK: Rgb = Rgb(0, 0, 0);
    pub const WHITE: Rgb = Rgb(255, 255, 255);
}

/// Immediate-mode paint context supplied by the display backend.
pub trait Painter {
    fn save(&mut self);
    fn restore(&mut self);
    fn translate(&mut self, dx: f64, dy: f64);
    /// Rotate subsequent primitives by `theta` radians.
    fn rotate(&mut self, theta: f64);
    fn fill_rect(&mut self, x: f64, y: f64, w: f64, h: f64, color: Rgb);
    fn fill_ellipse(&mut self, cx: f64, cy: f64, rx: f64, ry: f64, color: Rgb);
    /// Blit a row-major 8-bit image with its top-left corner at `(x, y)`.
    fn draw_pixels(
        &mut self,
        x: f64,
        y: f64,
        width: usize,
        height: usize,
        channels: usize,
        data: &[u8],
    );
}
