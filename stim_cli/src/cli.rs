//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "stimctl", version, about = "Closed-loop stimulus engine CLI")]
pub struct Cli {
    /// Path to config TOML (typed)
    #[arg(long, value_name = "FILE", default_value = "etc/stim_config.toml")]
    pub config: PathBuf,

    /// Print telemetry and errors as JSON lines
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    pub log_level: String,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

/// Stimulus variants runnable against the simulated estimator.
#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum StimKind {
    /// Grating whose speed follows the subject's swim vigor
    ClosedLoop,
    /// Grating following a motion trace
    Moving,
    /// Grating drifting at the configured `[motion]` velocity
    Constant,
    /// Grating locked to the subject's heading, advancing along a trace
    Perpendicular,
    /// Marker drawn at the subject's pose
    FishTracking,
    /// Disc drawn at the subject's position
    Tracking,
    /// Closed-loop grating that swaps to a centering disc near the edge
    Centering,
}

impl StimKind {
    pub const ALL: [StimKind; 7] = [
        StimKind::ClosedLoop,
        StimKind::Moving,
        StimKind::Constant,
        StimKind::Perpendicular,
        StimKind::FishTracking,
        StimKind::Tracking,
        StimKind::Centering,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StimKind::ClosedLoop => "closed-loop",
            StimKind::Moving => "moving",
            StimKind::Constant => "constant",
            StimKind::Perpendicular => "perpendicular",
            StimKind::FishTracking => "fish-tracking",
            StimKind::Tracking => "tracking",
            StimKind::Centering => "centering",
        }
    }

    pub fn needs_trace(self) -> bool {
        matches!(self, StimKind::Moving | StimKind::Perpendicular)
    }
}

/// Memory locking mode for real-time operation.
#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum RtLock {
    /// Do not lock memory
    None,
    /// Lock currently resident pages
    Current,
    /// Lock current and future pages
    All,
}

impl RtLock {
    #[inline]
    pub fn os_default() -> Self {
        #[cfg(target_os = "linux")]
        {
            return RtLock::Current;
        }
        #[cfg(target_os = "macos")]
        {
            return RtLock::None;
        }
        #[allow(unreachable_code)]
        RtLock::None
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Drive one stimulus against the simulated estimator and print telemetry
    Run {
        /// Stimulus variant to run
        #[arg(long, value_enum)]
        kind: StimKind,
        /// Stimulus duration in seconds
        #[arg(long, value_name = "S", default_value_t = 5.0)]
        seconds: f64,
        /// Motion trace CSV (`t,x,y`); overrides `[motion].trace`
        #[arg(long, value_name = "CSV")]
        trace: Option<PathBuf>,
        /// Replay on a virtual clock instead of waiting for each frame
        #[arg(long, action = ArgAction::SetTrue)]
        fast: bool,
    },
    /// Fire one pulse burst on the configured pulse board
    Shock {
        /// Cancel the burst after this many milliseconds
        #[arg(long, value_name = "MS")]
        cancel_after_ms: Option<u64>,
        /// Enable real-time mode (SCHED_FIFO, affinity, mlockall)
        #[arg(
            long,
            action = ArgAction::SetTrue,
            long_help = "Enable real-time mode on supported OSes before the burst worker starts.\n\nLinux: Attempts SCHED_FIFO priority, pins to one CPU, and calls mlockall to lock the process address space into RAM. The burst worker thread inherits the policy, which tightens inter-pulse timing. May require CAP_SYS_NICE/CAP_IPC_LOCK or root.\n\nmacOS: Only mlockall is applied; SCHED_FIFO/affinity are unavailable."
        )]
        rt: bool,
        /// Real-time priority for SCHED_FIFO on Linux (1..=max); ignored on macOS
        #[arg(
            long,
            value_name = "PRIO",
            long_help = "SCHED_FIFO priority when --rt is enabled (Linux only). Range is platform-defined (usually 1..=99). Defaults to the maximum."
        )]
        rt_prio: Option<i32>,
        /// Select memory locking mode for --rt: none, current, or all
        #[arg(
            long,
            value_enum,
            value_name = "MODE",
            long_help = "Select memory locking mode when --rt is enabled.\n- none: do not lock memory.\n- current: lock currently resident pages (mlockall(MCL_CURRENT)).\n- all: lock current and future pages (mlockall(MCL_CURRENT|MCL_FUTURE)).\nDefault: current on Linux, none on macOS."
        )]
        rt_lock: Option<RtLock>,
        /// CPU index to pin the process to (Linux only). Defaults to 0.
        #[arg(
            long,
            value_name = "CPU",
            long_help = "Select the CPU index to pin the process to when --rt is enabled (Linux only). Defaults to 0. The value must be allowed by the current affinity mask; otherwise affinity is left unchanged and a warning is logged."
        )]
        rt_cpu: Option<usize>,
    },
    /// Validate the config and construct every stimulus kind
    SelfCheck,
}
