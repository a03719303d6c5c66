//! Centering wrapper switching.
use std::sync::Arc;

use stim_core::mocks::{PaintOp, RecordingPainter, ScriptedEstimator};
use stim_core::{
    Active, CenteringWrapper, CircleParams, CircleStimulus, Drawable, Flash, OutputShape,
    Stimulus, Tick,
};
use stim_traits::{Pose, Rgb};

fn wrapper(est: Arc<ScriptedEstimator>) -> CenteringWrapper {
    let primary = CircleStimulus::new(CircleParams::default(), 10.0).unwrap();
    let centering = Flash::new(Rgb::WHITE, OutputShape::new(4, 4), 0.0);
    let mut w = CenteringWrapper::new(Box::new(primary), Box::new(centering), est, 100.0).unwrap();
    w.start().unwrap();
    w
}

#[test]
fn switches_on_squared_distance_and_freezes_inactive_child() {
    let est = Arc::new(ScriptedEstimator::new(Pose::new(320.0, 240.0, 0.0), 0.0));
    let mut w = wrapper(est.clone());

    w.update(Tick::new(0.1, 0.1));
    w.update(Tick::new(0.1, 0.2));
    assert_eq!(w.active(), Active::Primary);
    assert_eq!(w.primary().elapsed(), 0.2);
    assert_eq!(w.centering().elapsed(), 0.0);

    // 101 px from the default center (320, 240): outside a 100 px margin.
    est.set_pose(Pose::new(421.0, 240.0, 0.0));
    w.update(Tick::new(0.1, 0.3));
    w.update(Tick::new(0.1, 0.4));
    assert_eq!(w.active(), Active::Centering);
    assert_eq!(w.centering().elapsed(), 0.4);
    assert_eq!(w.primary().elapsed(), 0.2);

    // Exactly on the margin counts as inside.
    est.set_pose(Pose::new(420.0, 240.0, 0.0));
    w.update(Tick::new(0.1, 0.5));
    assert_eq!(w.active(), Active::Primary);
    assert_eq!(w.primary().elapsed(), 0.5);
    assert_eq!(w.centering().elapsed(), 0.4);
}

#[test]
fn missing_fix_selects_centering() {
    let est = Arc::new(ScriptedEstimator::new(Pose::NO_FIX, 0.0));
    let mut w = wrapper(est.clone());
    w.update(Tick::new(0.1, 0.1));
    assert_eq!(w.active(), Active::Centering);

    est.set_pose(Pose::new(f64::NAN, 240.0, 0.0));
    w.update(Tick::new(0.1, 0.2));
    assert_eq!(w.active(), Active::Centering);
}

#[test]
fn paint_recenters_on_viewport_and_draws_active_child() {
    let est = Arc::new(ScriptedEstimator::new(Pose::new(500.0, 400.0, 0.0), 0.0));
    let mut w = wrapper(est);
    w.update(Tick::new(0.1, 0.1));
    assert_eq!(w.active(), Active::Centering);

    let mut painter = RecordingPainter::default();
    w.paint(&mut painter, 1000.0, 800.0);
    assert_eq!(w.center(), (500.0, 400.0));
    assert!(matches!(
        painter.ops.as_slice(),
        [PaintOp::Rect { color: Rgb::WHITE, .. }]
    ));

    // Same pose is now dead center of the new viewport.
    w.update(Tick::new(0.1, 0.2));
    assert_eq!(w.active(), Active::Primary);
}

#[test]
fn duration_comes_from_primary_and_state_names_active_child() {
    let est = Arc::new(ScriptedEstimator::new(Pose::new(320.0, 240.0, 0.0), 0.0));
    let mut w = wrapper(est);
    assert_eq!(w.duration(), 10.0);
    w.update(Tick::new(0.1, 0.1));
    let s = w.dynamic_state();
    assert_eq!(s.get("active").map(ToString::to_string).as_deref(), Some("primary"));
    assert!(s.get("x").is_some());
    w.update(Tick::new(10.0, 10.0));
    assert!(w.finished());
}
