//! Frame driver: pacing, estimator latching and termination.
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use stim_core::mocks::{RecordingPainter, ScriptedEstimator};
use stim_core::{
    Background, ClosedLoop1D, ClosedLoopParams, Flash, FrameRunner, LatchedEstimator,
    OutputShape, Pacing, Raster, RunEnd, ShockParams, ShockStimulus, SharedEstimator,
};
use stim_hardware::SimulatedPulseBoard;
use stim_traits::clock::test_clock::TestClock;
use stim_traits::{Pose, Rgb};

#[test]
fn free_pacing_runs_until_stimulus_finishes() {
    let mut flash = Flash::new(Rgb::WHITE, OutputShape::new(2, 2), 0.5);
    let runner = FrameRunner::new(10.0).pacing(Pacing::Free);
    let mut elapsed = Vec::new();
    let summary = runner
        .run(&mut flash, |rec| elapsed.push(rec.tick.elapsed))
        .unwrap();
    assert_eq!(summary.end, RunEnd::Finished);
    assert_eq!(summary.frames, 6);
    assert_eq!(elapsed.first(), Some(&0.0));
    assert!((elapsed[5] - 0.5).abs() < 1e-12);
}

#[test]
fn real_time_pacing_on_test_clock_meets_every_deadline() {
    let clock = TestClock::new();
    let mut flash = Flash::new(Rgb::WHITE, OutputShape::new(2, 2), 0.0);
    let runner = FrameRunner::with_clock(100.0, clock.clone()).max_seconds(0.1);
    let summary = runner.run(&mut flash, |_| {}).unwrap();
    assert_eq!(summary.end, RunEnd::TimeLimit);
    assert_eq!(summary.missed_deadlines, 0);
    assert_eq!(summary.frames, 11);
    assert_eq!(clock.offset(), Duration::from_millis(100));
}

#[test]
fn shutdown_flag_stops_before_next_frame() {
    let flag = Arc::new(AtomicBool::new(false));
    let mut flash = Flash::new(Rgb::WHITE, OutputShape::new(2, 2), 0.0);
    let runner = FrameRunner::new(60.0)
        .pacing(Pacing::Free)
        .shutdown_flag(flag.clone());
    let summary = runner
        .run(&mut flash, |rec| {
            if rec.frame == 2 {
                flag.store(true, Ordering::Relaxed);
            }
        })
        .unwrap();
    assert_eq!(summary.end, RunEnd::Shutdown);
    assert_eq!(summary.frames, 3);
}

#[test]
fn estimator_is_latched_once_per_frame() {
    let raw = Arc::new(ScriptedEstimator::new(Pose::NO_FIX, -10.0));
    let latch = LatchedEstimator::shared(raw.clone());
    let shared: SharedEstimator = latch.clone();
    let shape = OutputShape::new(4, 4);
    let bg = Background::new(Raster::blank(shape, 1), shape).unwrap();
    let mut cl = ClosedLoop1D::new(bg, shared, ClosedLoopParams::default(), 0.0).unwrap();

    let runner = FrameRunner::new(100.0)
        .pacing(Pacing::Free)
        .max_seconds(0.05)
        .latch(latch);
    let mut vels = Vec::new();
    runner
        .run(&mut cl, |rec| {
            vels.push(rec.state.get("fish_velocity").and_then(|v| v.as_f64()));
            // Changing the source mid-frame only shows up next frame.
            raw.set_velocity(0.0);
        })
        .unwrap();
    assert_eq!(vels[0], Some(-10.0));
    assert!(vels[1..].iter().all(|v| *v == Some(0.0)));
}

#[test]
fn painted_run_paints_every_frame() {
    let mut flash = Flash::new(Rgb::BLACK, OutputShape::new(2, 2), 0.1);
    let mut painter = RecordingPainter::default();
    let summary = FrameRunner::new(100.0)
        .pacing(Pacing::Free)
        .run_painted(&mut flash, &mut painter, (64.0, 48.0), |_| {})
        .unwrap();
    assert_eq!(painter.ops.len() as u64, summary.frames);
}

#[test]
fn burst_failure_surfaces_through_the_runner() {
    let board = SimulatedPulseBoard::new().failing_on(0);
    let mut s = ShockStimulus::builder()
        .with_device(board)
        .with_params(ShockParams::default())
        .with_clock(TestClock::new())
        .build()
        .unwrap();
    // Real clock: the worker reports long before the first frame deadline.
    let err = FrameRunner::new(60.0)
        .max_seconds(10.0)
        .run(&mut s, |_| {})
        .unwrap_err();
    assert!(err.to_string().contains("pulse 1 of burst failed"));
}
