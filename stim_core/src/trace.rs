//! Pre-authored time series and their piecewise-linear lookup.

use crate::error::{Result, invalid};

/// Piecewise-linear lookup of `ts -> vs` at `q`, clamped to the end samples.
///
/// `ts` must be strictly increasing. Empty or mismatched columns yield NaN.
pub fn lerp(ts: &[f64], vs: &[f64], q: f64) -> f64 {
    let n = ts.len();
    if n == 0 || vs.len() != n {
        return f64::NAN;
    }
    // Index of the first sample strictly after q.
    let i = ts.partition_point(|&t| t <= q);
    if i == 0 {
        return vs[0];
    }
    if i == n {
        return vs[n - 1];
    }
    let (t0, t1) = (ts[i - 1], ts[i]);
    let (v0, v1) = (vs[i - 1], vs[i]);
    let w = (q - t0) / (t1 - t0);
    v0 + w * (v1 - v0)
}

fn check_times(t: &[f64]) -> Result<()> {
    if t.is_empty() {
        return Err(invalid("trace must have at least one sample"));
    }
    if t.iter().any(|v| !v.is_finite()) {
        return Err(invalid("trace times must be finite"));
    }
    if t.windows(2).any(|w| w[1] <= w[0]) {
        return Err(invalid("trace times must be strictly increasing"));
    }
    Ok(())
}

/// Immutable `(t, x, y)` motion trace.
#[derive(Debug, Clone, PartialEq)]
pub struct MotionTrace {
    t: Vec<f64>,
    x: Vec<f64>,
    y: Vec<f64>,
}

impl MotionTrace {
    pub fn new(t: Vec<f64>, x: Vec<f64>, y: Vec<f64>) -> Result<Self> {
        if t.len() != x.len() || t.len() != y.len() {
            return Err(invalid("trace columns must have equal length"));
        }
        check_times(&t)?;
        Ok(Self { t, x, y })
    }

    /// Build from `(t, x, y)` rows.
    pub fn from_rows(rows: &[(f64, f64, f64)]) -> Result<Self> {
        let t = rows.iter().map(|r| r.0).collect();
        let x = rows.iter().map(|r| r.1).collect();
        let y = rows.iter().map(|r| r.2).collect();
        Self::new(t, x, y)
    }

    /// A single-sample trace that holds `(x, y)` forever.
    pub fn stationary(x: f64, y: f64) -> Self {
        Self {
            t: vec![0.0],
            x: vec![x],
            y: vec![y],
        }
    }

    pub fn at(&self, elapsed: f64) -> (f64, f64) {
        (lerp(&self.t, &self.x, elapsed), lerp(&self.t, &self.y, elapsed))
    }

    pub fn len(&self) -> usize {
        self.t.len()
    }

    pub fn is_empty(&self) -> bool {
        self.t.is_empty()
    }

    /// Time of the last sample.
    pub fn end_time(&self) -> f64 {
        self.t.last().copied().unwrap_or(0.0)
    }
}

/// Immutable `(t, value)` schedule for a single parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarTrace {
    t: Vec<f64>,
    v: Vec<f64>,
}

impl ScalarTrace {
    pub fn new(t: Vec<f64>, v: Vec<f64>) -> Result<Self> {
        if t.len() != v.len() {
            return Err(invalid("schedule columns must have equal length"));
        }
        check_times(&t)?;
        Ok(Self { t, v })
    }

    pub fn at(&self, elapsed: f64) -> f64 {
        lerp(&self.t, &self.v, elapsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn midpoint_is_average() {
        let tr = MotionTrace::from_rows(&[(0.0, 0.0, 10.0), (2.0, 4.0, 20.0)]).unwrap();
        assert_eq!(tr.at(1.0), (2.0, 15.0));
    }

    #[test]
    fn rejects_bad_traces() {
        assert!(MotionTrace::new(vec![], vec![], vec![]).is_err());
        assert!(MotionTrace::new(vec![0.0, 1.0], vec![0.0], vec![0.0, 1.0]).is_err());
        assert!(MotionTrace::from_rows(&[(1.0, 0.0, 0.0), (1.0, 1.0, 1.0)]).is_err());
        assert!(ScalarTrace::new(vec![0.0, f64::NAN], vec![1.0, 2.0]).is_err());
    }

    #[test]
    fn nan_query_does_not_panic() {
        let tr = MotionTrace::from_rows(&[(0.0, 1.0, 2.0), (1.0, 3.0, 4.0)]).unwrap();
        let _ = tr.at(f64::NAN);
    }
}
