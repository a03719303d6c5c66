//! Per-tick latching of the tracking estimator.
//!
//! The estimator behind a `SharedEstimator` may change between two reads. The
//! frame driver wraps it in a `LatchedEstimator`, calls `latch()` once at the
//! top of every tick, and hands the latched handle to all stimuli, so every
//! update within a tick sees the same reading.

use std::sync::{Arc, Mutex, PoisonError};

use stim_traits::{Estimator, Pose};

use crate::stimulus::SharedEstimator;

#[derive(Debug, Default)]
struct Reading {
    position: Option<Pose>,
    // Keyed by the bit pattern of the requested lag.
    velocity: Vec<(u64, f64)>,
}

pub struct LatchedEstimator {
    inner: SharedEstimator,
    reading: Mutex<Reading>,
}

impl LatchedEstimator {
    pub fn new(inner: SharedEstimator) -> Self {
        Self {
            inner,
            reading: Mutex::new(Reading::default()),
        }
    }

    pub fn shared(inner: SharedEstimator) -> Arc<Self> {
        Arc::new(Self::new(inner))
    }

    /// Drop the cached reading; the next reads sample the estimator again.
    pub fn latch(&self) {
        let mut r = self.reading.lock().unwrap_or_else(PoisonError::into_inner);
        r.position = None;
        r.velocity.clear();
    }
}

impl Estimator for LatchedEstimator {
    fn get_position(&self) -> Pose {
        let mut r = self.reading.lock().unwrap_or_else(PoisonError::into_inner);
        *r.position.get_or_insert_with(|| self.inner.get_position())
    }

    fn get_velocity(&self, lag_s: f64) -> f64 {
        let key = lag_s.to_bits();
        let mut r = self.reading.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(&(_, v)) = r.velocity.iter().find(|(k, _)| *k == key) {
            return v;
        }
        let v = self.inner.get_velocity(lag_s);
        r.velocity.push((key, v));
        v
    }
}
