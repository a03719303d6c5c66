#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]

mod cli;
mod error_fmt;
mod rt;
mod run;
mod sim;

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;
use eyre::WrapErr;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::MakeWriterExt;

use crate::cli::{Cli, Commands, FILE_GUARD, JSON_MODE, StimKind};
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};
use crate::run::{RtArgs, RunArgs};

fn main() {
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);
    let _ = color_eyre::install();

    if let Err(err) = real_main(cli) {
        if JSON_MODE.get().copied().unwrap_or(false) {
            println!("{}", format_error_json(&err));
        } else {
            eprintln!("{}", humanize(&err));
        }
        std::process::exit(exit_code_for_error(&err));
    }
}

fn real_main(cli: Cli) -> eyre::Result<()> {
    let cfg = load_config(&cli.config)?;
    init_tracing(&cli, &cfg.logging)?;
    tracing::debug!(config = %cli.config.display(), "config loaded");

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let flag = shutdown.clone();
        if let Err(e) = ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed)) {
            tracing::warn!(error = %e, "failed to install Ctrl-C handler");
        }
    }

    match cli.cmd {
        Commands::Run {
            kind,
            seconds,
            trace,
            fast,
        } => {
            let args = RunArgs {
                kind,
                seconds,
                trace: trace.as_deref(),
                fast,
                json: cli.json,
            };
            run::run_stimulus(&cfg, &args, shutdown)?;
        }
        Commands::Shock {
            cancel_after_ms,
            rt,
            rt_prio,
            rt_lock,
            rt_cpu,
        } => {
            let rt = RtArgs {
                enabled: rt,
                prio: rt_prio,
                lock: rt_lock,
                cpu: rt_cpu,
            };
            let report = run::run_shock(&cfg, cancel_after_ms, rt, shutdown)?;
            let elapsed_ms = report.elapsed.as_millis() as u64;
            if cli.json {
                println!(
                    "{}",
                    serde_json::json!({ "burst": { "pulses": report.pulses, "elapsed_ms": elapsed_ms } })
                );
            } else {
                println!("burst complete: {} pulses in {elapsed_ms} ms", report.pulses);
            }
        }
        Commands::SelfCheck => self_check(&cfg, cli.json)?,
    }
    Ok(())
}

fn load_config(path: &Path) -> eyre::Result<stim_config::Config> {
    let text = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("read config {}", path.display()))?;
    let cfg = stim_config::load_toml(&text)
        .wrap_err_with(|| format!("parse config {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Console layer from `--log-level`/`RUST_LOG`, teed into an optional
/// rolling file from `[logging]`. Console logs go to stderr so stdout stays
/// clean for telemetry.
fn init_tracing(cli: &Cli, logging: &stim_config::Logging) -> eyre::Result<()> {
    // An explicit --log-level beats `[logging].level`; RUST_LOG beats both.
    let level = match logging.level.as_deref() {
        Some(cfg_level) if cli.log_level == "info" => cfg_level,
        _ => cli.log_level.as_str(),
    };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .wrap_err_with(|| format!("invalid log level '{level}'"))?;

    let file_writer = logging.file.as_deref().map(|file| {
        let path = Path::new(file);
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        let name = path
            .file_name()
            .map_or_else(|| "stimctl.log".into(), |n| n.to_os_string());
        let appender = match logging.rotation.as_deref() {
            Some("daily") => tracing_appender::rolling::daily(dir, name),
            Some("hourly") => tracing_appender::rolling::hourly(dir, name),
            _ => tracing_appender::rolling::never(dir, name),
        };
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let _ = FILE_GUARD.set(guard);
        writer
    });

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);
    let installed = match (cli.json, file_writer) {
        (true, Some(w)) => builder
            .json()
            .with_writer(std::io::stderr.and(w))
            .try_init(),
        (true, None) => builder.json().with_writer(std::io::stderr).try_init(),
        (false, Some(w)) => builder
            .with_writer(std::io::stderr.and(w))
            .try_init(),
        (false, None) => builder.with_writer(std::io::stderr).try_init(),
    };
    if installed.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
    Ok(())
}

/// Build every stimulus kind and the pulse board without running anything.
fn self_check(cfg: &stim_config::Config, json: bool) -> eyre::Result<()> {
    use stim_core::{MotionTrace, SharedEstimator, Stimulus};

    let clock: Arc<dyn stim_traits::Clock + Send + Sync> =
        Arc::new(stim_traits::MonotonicClock::new());
    let est: SharedEstimator = Arc::new(sim::estimator(clock, &cfg.simulation, 1.0));
    let configured = run::load_motion(cfg, None)?;
    let mut checked = Vec::new();
    for kind in StimKind::ALL {
        let motion = if kind.needs_trace() {
            Some(configured.clone().unwrap_or_else(|| MotionTrace::stationary(0.0, 0.0)))
        } else {
            None
        };
        let stim = run::build_stimulus(kind, cfg, est.clone(), motion, 1.0)
            .wrap_err_with(|| format!("build {}", kind.as_str()))?;
        tracing::debug!(kind = kind.as_str(), name = stim.name(), "stimulus ok");
        checked.push(kind.as_str());
    }
    let shock: stim_core::ShockParams = (&cfg.shock).into();
    shock.validate()?;

    if json {
        println!(
            "{}",
            serde_json::json!({ "self_check": "ok", "kinds": checked, "trace": configured.is_some() })
        );
    } else {
        println!("self-check ok: {} stimulus kinds built", checked.len());
    }
    Ok(())
}
