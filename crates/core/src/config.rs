//! Tunable constants for the interpolation pipeline
//!
//! Every algorithm takes an [`InterpolationConfig`] by reference instead of
//! reading module-level constants, so callers (and tests) can vary the
//! physical floor, RBF smoothing and friends per call.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// What the grid resampler does with target cells outside the source extent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutsideHull {
    /// Leave the cell as NaN (no estimate).
    Nan,
    /// Clamp the query onto the source extent, i.e. repeat the edge value.
    #[default]
    Nearest,
    /// Fail the whole resampling call.
    Error,
}

/// Parameters shared by the interpolation, regression and smoothing stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterpolationConfig {
    /// RBF regularisation added to the kernel diagonal. Nonzero turns the
    /// interpolant into a least-squares surface.
    pub rbf_smoothing: f64,
    /// Global physical velocity floor in m/s (approximately water velocity).
    pub velocity_floor: f64,
    /// Lower bound on time before taking the logarithm, in ms.
    pub log_epsilon: f64,
    /// Maximum distance, in trace units, for a pick trace to claim a grid column.
    pub trace_match_tolerance: f64,
    /// Per-trace floor as a fraction of the smallest observed velocity on that trace.
    pub trace_floor_fraction: f64,
    /// Blur strength applied after nearest-neighbour column filling.
    pub nearest_fill_blur: f64,
    /// Blur strength offered by front ends before the user picks one.
    pub default_blur: u32,
    /// Centre count above which the RBF engine switches to local solves.
    pub dense_rbf_limit: usize,
    /// Neighbours per query for local RBF solves.
    pub local_rbf_neighbors: usize,
    /// Resampler behaviour outside the source grid.
    pub outside_hull: OutsideHull,
}

impl Default for InterpolationConfig {
    fn default() -> Self {
        Self {
            rbf_smoothing: 10.0,
            velocity_floor: 1000.0,
            log_epsilon: 0.001,
            trace_match_tolerance: 0.5,
            trace_floor_fraction: 0.5,
            nearest_fill_blur: 25.0,
            default_blur: 1,
            dense_rbf_limit: 4000,
            local_rbf_neighbors: 64,
            outside_hull: OutsideHull::Nearest,
        }
    }
}

impl InterpolationConfig {
    /// Parse a JSON document. Missing keys keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON configuration file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&text)
    }

    /// Serialize to pretty-printed JSON.
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject values the algorithms cannot work with.
    pub fn validate(&self) -> Result<()> {
        let non_negative = [
            ("rbf_smoothing", self.rbf_smoothing),
            ("velocity_floor", self.velocity_floor),
            ("trace_match_tolerance", self.trace_match_tolerance),
            ("trace_floor_fraction", self.trace_floor_fraction),
            ("nearest_fill_blur", self.nearest_fill_blur),
        ];
        for (name, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::invalid_parameter(
                    name,
                    value,
                    "must be finite and non-negative",
                ));
            }
        }
        if !self.log_epsilon.is_finite() || self.log_epsilon <= 0.0 {
            return Err(Error::invalid_parameter(
                "log_epsilon",
                self.log_epsilon,
                "must be finite and positive",
            ));
        }
        if self.local_rbf_neighbors < 3 {
            return Err(Error::invalid_parameter(
                "local_rbf_neighbors",
                self.local_rbf_neighbors,
                "need at least 3 neighbours for a planar tail",
            ));
        }
        Ok(())
    }
}
