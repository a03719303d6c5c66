//! Pulse bursts on the worker thread: timing, cancellation and device failure.
//!
//! Timing is checked on the deterministic `TestClock`: each hold advances it
//! by exactly the computed pause, so a burst's simulated duration is exact.
use std::time::{Duration, Instant};

use stim_core::{BuildError, ShockParams, ShockStimulus, StimError, Stimulus, Tick};
use stim_hardware::SimulatedPulseBoard;
use stim_traits::clock::test_clock::TestClock;
use stim_traits::clock::MonotonicClock;

fn shock(board: &SimulatedPulseBoard, params: ShockParams, clock: TestClock) -> ShockStimulus {
    ShockStimulus::builder()
        .with_device(board.clone())
        .with_params(params)
        .with_clock(clock)
        .build()
        .unwrap()
}

#[test]
fn five_pulse_burst_takes_five_pauses() {
    let board = SimulatedPulseBoard::new();
    let clock = TestClock::new();
    let mut s = shock(&board, ShockParams::default(), clock.clone());

    s.start().unwrap();
    let report = s.wait().unwrap();

    assert_eq!(report.pulses, 5);
    assert_eq!(board.frames(), vec!["shock218002"; 5]);
    assert_eq!(report.elapsed, Duration::from_millis(5 * 18));
    assert_eq!(clock.offset(), Duration::from_millis(90));
    assert!(s.finished());
    assert_eq!(s.pulses_sent(), 5);
}

#[test]
fn start_does_not_block_the_frame_loop() {
    let board = SimulatedPulseBoard::new();
    // Real clock, 50 pulses at 10 Hz would block for ~5 s if start() waited.
    let params = ShockParams {
        burst_freq: 10.0,
        burst_n: 50,
        ..ShockParams::default()
    };
    let mut s = ShockStimulus::builder()
        .with_device(board.clone())
        .with_params(params)
        .with_clock(MonotonicClock::new())
        .build()
        .unwrap();

    let t0 = Instant::now();
    s.start().unwrap();
    s.update(Tick::new(0.016, 0.016));
    assert!(t0.elapsed() < Duration::from_secs(1));
    assert!(s.is_running());
    assert!(!s.finished());

    s.abort();
    let err = s.wait().unwrap_err();
    match err.downcast_ref::<StimError>() {
        Some(StimError::Cancelled { sent, planned }) => {
            assert!(*sent < 50);
            assert_eq!(*planned, 50);
        }
        other => panic!("expected Cancelled, got {other:?}"),
    }
    // Cancelled bursts always end with the idle frame.
    assert_eq!(board.frames().last().map(String::as_str), Some("shock0000"));
    assert!(s.finished());
}

#[test]
fn device_failure_aborts_and_idles() {
    let board = SimulatedPulseBoard::new().failing_on(2);
    let mut s = shock(&board, ShockParams::default(), TestClock::new());
    s.start().unwrap();
    let err = s.wait().unwrap_err();

    assert!(matches!(
        err.downcast_ref::<StimError>(),
        Some(StimError::DeviceCommand { pulse: 3, .. })
    ));
    assert_eq!(board.pulse_count(), 2);
    assert_eq!(board.frames().last().map(String::as_str), Some("shock0000"));
    // poll keeps surfacing the failure to the orchestrator.
    assert!(s.poll().is_err());
}

#[test]
fn update_collects_outcome_and_burst_can_restart() {
    let board = SimulatedPulseBoard::new();
    let params = ShockParams {
        burst_n: 2,
        ..ShockParams::default()
    };
    let mut s = shock(&board, params, TestClock::new());
    s.start().unwrap();

    let mut frames = 0;
    while !s.finished() {
        frames += 1;
        s.update(Tick::new(0.016, 0.016 * f64::from(frames)));
        assert!(frames < 100_000, "burst never finished");
        std::thread::yield_now();
    }
    s.poll().unwrap();
    assert_eq!(board.pulse_count(), 2);

    s.start().unwrap();
    s.wait().unwrap();
    assert_eq!(board.pulse_count(), 4);
}

#[test]
fn second_start_while_running_is_rejected() {
    let board = SimulatedPulseBoard::new();
    let params = ShockParams {
        burst_freq: 10.0,
        burst_n: 50,
        ..ShockParams::default()
    };
    let mut s = ShockStimulus::builder()
        .with_device(board)
        .with_params(params)
        .build()
        .unwrap();
    s.start().unwrap();
    let err = s.start().unwrap_err();
    assert!(matches!(err.downcast_ref::<StimError>(), Some(StimError::State(_))));
    s.abort();
    let _ = s.wait();
}

#[test]
fn builder_requires_device() {
    let err = ShockStimulus::builder().build().unwrap_err();
    assert!(matches!(
        err.downcast_ref::<BuildError>(),
        Some(BuildError::MissingDevice)
    ));
}

#[test]
fn builder_rejects_params_the_board_cannot_encode() {
    for params in [
        ShockParams {
            pulse_amp_ma: 4.0,
            ..ShockParams::default()
        },
        ShockParams {
            burst_freq: 0.5,
            pulse_dur_ms: 1000,
            ..ShockParams::default()
        },
    ] {
        let board = SimulatedPulseBoard::new();
        let err = ShockStimulus::builder()
            .with_device(board.clone())
            .with_params(params.clone())
            .build()
            .unwrap_err();
        assert!(
            matches!(
                err.downcast_ref::<BuildError>(),
                Some(BuildError::InvalidConfig(_))
            ),
            "{params:?}: {err}"
        );
        assert!(board.frames().is_empty());
    }
}

#[test]
fn full_scale_amplitude_is_accepted() {
    let board = SimulatedPulseBoard::new();
    let params = ShockParams {
        pulse_amp_ma: 3.5,
        burst_n: 1,
        ..ShockParams::default()
    };
    let mut s = shock(&board, params, TestClock::new());
    s.start().unwrap();
    s.wait().unwrap();
    assert_eq!(board.frames(), vec!["shock255002"]);
}

#[test]
fn state_reports_burst_configuration() {
    let board = SimulatedPulseBoard::new();
    let s = shock(&board, ShockParams::default(), TestClock::new());
    let st = s.state();
    let keys: Vec<_> = st.keys().collect();
    assert_eq!(
        keys,
        [
            "name",
            "duration",
            "elapsed",
            "burst_freq",
            "pulse_amp_ma",
            "burst_n",
            "pulse_dur_ms",
            "pause",
            "pulses_sent"
        ]
    );
    assert_eq!(st.get("pause").and_then(|v| v.as_f64()), Some(0.018));
}

#[test]
fn dropping_a_running_burst_idles_the_device() {
    let board = SimulatedPulseBoard::new();
    let params = ShockParams {
        burst_freq: 10.0,
        burst_n: 50,
        ..ShockParams::default()
    };
    let mut s = ShockStimulus::builder()
        .with_device(board.clone())
        .with_params(params)
        .build()
        .unwrap();
    s.start().unwrap();
    drop(s);
    assert_eq!(board.frames().last().map(String::as_str), Some("shock0000"));
}

#[test]
fn into_device_mid_burst_cancels_and_returns_the_device() {
    let board = SimulatedPulseBoard::new();
    let params = ShockParams {
        burst_freq: 10.0,
        burst_n: 50,
        ..ShockParams::default()
    };
    let mut s = ShockStimulus::builder()
        .with_device(board.clone())
        .with_params(params)
        .build()
        .unwrap();
    s.start().unwrap();

    let t0 = Instant::now();
    let device = s.into_device();
    assert!(device.is_some());
    assert!(t0.elapsed() < Duration::from_secs(1));
    assert!(board.pulse_count() < 50);
    assert_eq!(board.frames().last().map(String::as_str), Some("shock0000"));
}
