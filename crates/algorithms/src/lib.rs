//! # velgrid algorithms
//!
//! Turns sparse velocity picks into dense velocity grids.
//!
//! ## Available Algorithm Categories
//!
//! - **regression**: linear and logarithmic velocity-time trends, custom or
//!   least-squares fitted
//! - **interpolation**: linear-kernel RBF with smoothing, k-d tree
//! - **two_stage**: per-trace extrapolation followed by a cross-trace fill
//! - **smoothing**: Gaussian blur with NaN-aware borders
//! - **resample**: triangulated linear resampling between grid geometries
//! - **orchestrator**: method dispatch with progress and cancellation
//! - **session**: interpolated/original/output grid lifecycle

pub mod interpolation;
pub(crate) mod maybe_rayon;
pub mod orchestrator;
pub mod regression;
pub mod resample;
pub mod session;
pub mod smoothing;
pub mod two_stage;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::interpolation::{Rbf, RbfModel, RbfParams};
    pub use crate::orchestrator::{run, Method, RunOutcome};
    pub use crate::regression::{
        regression_summary, r_squared, FitMode, LinearModel, LinearRegression, LogarithmicModel,
        LogarithmicRegression, RegressionSummary,
    };
    pub use crate::resample::{align_to_dimensions, resample};
    pub use crate::session::VelocitySession;
    pub use crate::smoothing::{gaussian_blur, kernel_size};
    pub use crate::two_stage::{FillStrategy, TwoStage, TwoStageParams};
    pub use velgrid_core::prelude::*;
}
