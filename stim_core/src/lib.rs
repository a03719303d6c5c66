#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Closed-loop stimulus engine (display- and hardware-agnostic).
//!
//! Every display refresh, a driver calls `Stimulus::update` with the frame's
//! `Tick`; the stimulus derives its next visual state from elapsed time, a
//! motion trace, or the tracking estimator. All external collaborators sit
//! behind the `stim_traits` seams (`Estimator`, `PulseDevice`, `Painter`,
//! `Clock`).
//!
//! ## Architecture
//!
//! - **Lifecycle**: `Stimulus` trait plus capability traits (`stimulus` module)
//! - **Telemetry**: static field tables and ordered snapshots (`snapshot`)
//! - **Interpolation**: clamped piecewise-linear traces (`trace`)
//! - **Backgrounds**: toroidal affine warp and drifting backgrounds (`seamless`)
//! - **Closed loop**: vigor-coupled and heading-locked backgrounds (`closed_loop`)
//! - **Drawn**: whole-field, disc and pose-marker stimuli (`flash`, `tracking`)
//! - **Composition**: primary/centering switch (`wrapper`)
//! - **Hardware**: pulse bursts on a worker thread (`shock`)
//! - **Driver**: per-tick estimator latch and frame loop (`estimate`, `runner`)

pub mod closed_loop;
pub mod conversions;
pub mod error;
pub mod estimate;
pub mod flash;
pub mod hw_error;
pub mod mocks;
pub mod raster;
pub mod runner;
pub mod seamless;
pub mod shock;
pub mod snapshot;
pub mod stimulus;
pub mod trace;
pub mod tracking;
pub mod util;
pub mod wrapper;

pub use closed_loop::{ClosedLoop1D, ClosedLoopParams, MAX_VELOCITY, PerpendicularMotion};
pub use error::{BuildError, Result, StimError};
pub use estimate::LatchedEstimator;
pub use flash::Flash;
pub use raster::{OutputShape, Raster};
pub use runner::{FrameRunner, Pacing, RunEnd, RunSummary, TickRecord};
pub use seamless::{
    Affine, Background, DriftParams, MovingConstantly, MovingSeamless, transform_matrix, warp_wrap,
};
pub use shock::{BurstReport, BurstTask, ShockBuilder, ShockParams, ShockStimulus};
pub use snapshot::{StateSnapshot, Value};
pub use stimulus::{
    BackgroundDriven, Drawable, EstimatorDriven, Interpolatable, PaintedStimulus,
    SharedEstimator, Stimulus, Tick, Timing,
};
pub use trace::{MotionTrace, ScalarTrace};
pub use tracking::{
    CircleParams, CircleStimulus, FishTrackingStimulus, MarkerParams, TrackingStimulus,
};
pub use wrapper::{Active, CenteringWrapper};
