//! # velgrid core
//!
//! Data model and I/O for building dense seismic velocity grids from sparse
//! velocity picks.
//!
//! This crate provides:
//! - `PickSet`: sparse (trace, time, velocity) observations
//! - `GridGeometry`: trace and time axes of an output grid
//! - `VelocityGrid` / `PartialGrid`: dense and partially filled grids
//! - `InterpolationConfig`: tunable constants passed into every call
//! - `Checkpoint`: progress reporting with cooperative cancellation
//! - `VelocityModel`: the contract every model builder implements
//! - Pick file reading/writing and grid export

pub mod config;
pub mod error;
pub mod geometry;
pub mod grid;
pub mod io;
pub mod model;
pub mod pick;
pub mod progress;

pub use config::{InterpolationConfig, OutsideHull};
pub use error::{Error, ErrorKind, Result};
pub use geometry::{GridGeometry, SeismicDimensions};
pub use grid::{GridStatistics, PartialGrid, VelocityGrid};
pub use model::{ModelOutput, ModelParams, VelocityModel};
pub use pick::{Pick, PickSet, PickSummary};
pub use progress::{CancelCheck, Checkpoint, NeverCancel, NoProgress, ProgressSink};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::config::{InterpolationConfig, OutsideHull};
    pub use crate::error::{Error, ErrorKind, Result};
    pub use crate::geometry::{GridGeometry, SeismicDimensions};
    pub use crate::grid::{PartialGrid, VelocityGrid};
    pub use crate::io::{SeismicHeader, SeismicVolume};
    pub use crate::model::{ModelOutput, ModelParams, VelocityModel};
    pub use crate::pick::{Pick, PickSet};
    pub use crate::progress::{CancelCheck, Checkpoint, NeverCancel, NoProgress, ProgressSink};
}
