//! Simulated collaborators for runs without a rig: a virtual frame clock and
//! the scripted estimator built from `[simulation]`.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use stim_config::SimulationCfg;
use stim_hardware::{SimBout, SimulatedEstimator};
use stim_traits::{Clock, Pose};

/// Clock whose time only moves when someone sleeps on it.
///
/// With `--fast` the frame driver and the estimator share one of these, so a
/// run replays frame-exact without waiting on the wall clock.
#[derive(Debug, Clone)]
pub struct VirtualClock {
    origin: Instant,
    offset: Arc<Mutex<Duration>>,
}

impl VirtualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Arc::new(Mutex::new(Duration::ZERO)),
        }
    }
}

impl Clock for VirtualClock {
    fn now(&self) -> Instant {
        let off = self.offset.lock().map(|g| *g).unwrap_or(Duration::ZERO);
        self.origin + off
    }

    fn sleep(&self, d: Duration) {
        if let Ok(mut off) = self.offset.lock() {
            *off = off.saturating_add(d);
        }
    }
}

/// Regular bouts every `bout_interval_s` up to `seconds`, alternating turn
/// direction so the subject meanders instead of circling.
pub fn scripted_bouts(sim: &SimulationCfg, seconds: f64) -> Vec<SimBout> {
    let mut bouts = Vec::new();
    let mut t = sim.bout_interval_s;
    let mut turn = sim.bout_turn_rad;
    while t < seconds {
        bouts.push(SimBout {
            t,
            duration: sim.bout_duration_s,
            dx: sim.bout_distance_px,
            dy: 0.0,
            dtheta: turn,
            vigor: sim.bout_vigor,
        });
        turn = -turn;
        t += sim.bout_interval_s;
    }
    bouts
}

pub fn estimator(
    clock: Arc<dyn Clock + Send + Sync>,
    sim: &SimulationCfg,
    seconds: f64,
) -> SimulatedEstimator {
    let origin = Pose::new(sim.origin_x, sim.origin_y, 0.0);
    SimulatedEstimator::new(clock, origin, scripted_bouts(sim, seconds))
}
