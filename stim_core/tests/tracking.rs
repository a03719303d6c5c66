//! Estimator-driven stimuli against the scripted subject.
use std::sync::Arc;
use std::time::Duration;

use stim_core::{
    Background, CenteringWrapper, FishTrackingStimulus, MarkerParams, MotionTrace,
    OutputShape, PerpendicularMotion, Raster, SharedEstimator, Stimulus, Tick,
};
use stim_hardware::{SimBout, SimulatedEstimator};
use stim_traits::clock::test_clock::TestClock;
use stim_traits::{Clock, Pose};

fn subject(clock: &TestClock) -> Arc<SimulatedEstimator> {
    let bouts = vec![SimBout {
        t: 0.5,
        duration: 0.2,
        dx: 300.0,
        dy: 0.0,
        dtheta: 0.5,
        vigor: -10.0,
    }];
    Arc::new(
        SimulatedEstimator::new(Arc::new(clock.clone()), Pose::new(320.0, 240.0, 0.0), bouts)
            .with_dropout(2.0, 3.0),
    )
}

#[test]
fn fish_tracking_follows_bouts_and_holds_through_dropout() {
    let clock = TestClock::new();
    let est: SharedEstimator = subject(&clock);
    let mut s = FishTrackingStimulus::new(MarkerParams::default(), est, 0.0).unwrap();
    s.start().unwrap();

    s.update(Tick::new(0.1, 0.1));
    assert_eq!(s.pose(), (320.0, 240.0, 0.0));

    clock.sleep(Duration::from_secs(1));
    s.update(Tick::new(0.9, 1.0));
    let (x, _, theta) = s.pose();
    assert!((x - 620.0).abs() < 1e-9);
    assert!((theta - 0.5).abs() < 1e-9);

    // Inside the dropout the subject reports no fix: NO_FIX has a finite
    // heading, so the sentinel position is adopted.
    clock.sleep(Duration::from_millis(1500));
    s.update(Tick::new(1.5, 2.5));
    assert_eq!(s.pose(), (Pose::NO_FIX.x, Pose::NO_FIX.y, Pose::NO_FIX.theta));
}

#[test]
fn centering_takes_over_when_subject_leaves_the_margin() {
    let clock = TestClock::new();
    let est: SharedEstimator = subject(&clock);
    let shape = OutputShape::new(8, 8);
    let bg = || Background::new(Raster::blank(shape, 1), shape).unwrap();
    let trace = MotionTrace::stationary(0.0, 0.0);
    let primary = PerpendicularMotion::new(bg(), est.clone(), trace.clone(), 0.0);
    let centering = PerpendicularMotion::new(bg(), est.clone(), trace, 0.0);
    let mut w = CenteringWrapper::new(Box::new(primary), Box::new(centering), est, 200.0).unwrap();
    w.start().unwrap();

    w.update(Tick::new(0.1, 0.1));
    assert_eq!(w.active(), stim_core::Active::Primary);

    clock.sleep(Duration::from_secs(1));
    w.update(Tick::new(0.9, 1.0));
    assert_eq!(w.active(), stim_core::Active::Centering);
}
