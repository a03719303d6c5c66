//! Scripted estimator used in simulation runs and tests.
//!
//! Replays a list of bouts against a clock. Each bout displaces the
//! simulated subject by `(dx, dy)` rotated into the current heading and turns
//! it by `dtheta`; while a bout is in progress the vigor read-out reports the
//! bout's vigor. Dropout windows make both reads report "no fix".

use std::sync::{Arc, Mutex};
use std::time::Instant;

use stim_traits::{Clock, Estimator, Pose};

/// One scripted swim bout.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimBout {
    /// Onset, seconds after the estimator epoch.
    pub t: f64,
    /// How long the vigor read-out stays active.
    pub duration: f64,
    pub dx: f64,
    pub dy: f64,
    pub dtheta: f64,
    /// Vigor reported during the bout (negative = stronger swim).
    pub vigor: f64,
}

#[derive(Debug)]
struct Replay {
    next_bout: usize,
    x: f64,
    y: f64,
    theta: f64,
}

pub struct SimulatedEstimator {
    clock: Arc<dyn Clock + Send + Sync>,
    epoch: Instant,
    bouts: Vec<SimBout>,
    dropouts: Vec<(f64, f64)>,
    replay: Mutex<Replay>,
}

impl SimulatedEstimator {
    /// Start a replay at `origin`, with bouts sorted by onset.
    pub fn new(
        clock: Arc<dyn Clock + Send + Sync>,
        origin: Pose,
        mut bouts: Vec<SimBout>,
    ) -> Self {
        bouts.sort_by(|a, b| a.t.total_cmp(&b.t));
        let epoch = clock.now();
        Self {
            clock,
            epoch,
            bouts,
            dropouts: Vec::new(),
            replay: Mutex::new(Replay {
                next_bout: 0,
                x: origin.x,
                y: origin.y,
                theta: origin.theta,
            }),
        }
    }

    /// Report no fix between `from` and `to` seconds after the epoch.
    pub fn with_dropout(mut self, from: f64, to: f64) -> Self {
        self.dropouts.push((from, to));
        self
    }

    fn now_s(&self) -> f64 {
        self.clock.secs_since(self.epoch)
    }

    fn in_dropout(&self, t: f64) -> bool {
        self.dropouts.iter().any(|&(a, b)| t >= a && t < b)
    }
}

impl Estimator for SimulatedEstimator {
    fn get_position(&self) -> Pose {
        let t = self.now_s();
        let Ok(mut r) = self.replay.lock() else {
            return Pose::NO_FIX;
        };
        while let Some(bout) = self.bouts.get(r.next_bout) {
            if bout.t > t {
                break;
            }
            let (s, c) = r.theta.sin_cos();
            r.x += c * bout.dx - s * bout.dy;
            r.y += s * bout.dx + c * bout.dy;
            r.theta += bout.dtheta;
            r.next_bout += 1;
        }
        if self.in_dropout(t) {
            return Pose::NO_FIX;
        }
        Pose::new(r.x, r.y, r.theta)
    }

    fn get_velocity(&self, lag_s: f64) -> f64 {
        let t = self.now_s() - lag_s.max(0.0);
        if self.in_dropout(t) {
            return f64::NAN;
        }
        self.bouts
            .iter()
            .find(|b| t >= b.t && t < b.t + b.duration)
            .map_or(0.0, |b| b.vigor)
    }
}
