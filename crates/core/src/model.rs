//! Common contract for velocity model builders

use serde::{Deserialize, Serialize};

use crate::config::InterpolationConfig;
use crate::error::Result;
use crate::geometry::GridGeometry;
use crate::grid::VelocityGrid;
use crate::pick::PickSet;
use crate::progress::Checkpoint;

/// Fitted or supplied parameters of a model, reported back to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum ModelParams {
    Linear { v0: f64, k: f64, r2: f64 },
    Logarithmic { v0: f64, k: f64, r2: f64 },
    Rbf { smoothing: f64, neighbors: Option<usize> },
    TwoStage {
        filled_columns: usize,
        skipped_traces: usize,
        fill: String,
    },
}

/// Result of a successful model build
#[derive(Debug, Clone)]
pub struct ModelOutput {
    pub grid: VelocityGrid,
    /// One-line human readable summary
    pub description: String,
    pub params: ModelParams,
    /// Non-fatal problems worth surfacing (skipped traces, incomplete fills)
    pub warnings: Vec<String>,
}

impl ModelOutput {
    pub fn new(grid: VelocityGrid, description: impl Into<String>, params: ModelParams) -> Self {
        Self {
            grid,
            description: description.into(),
            params,
            warnings: Vec::new(),
        }
    }

    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings = warnings;
        self
    }

    pub fn geometry(&self) -> &GridGeometry {
        self.grid.geometry()
    }
}

/// Core trait for every velocity model.
///
/// A model turns a pick set into a dense grid on a given geometry. Builders
/// are pure apart from progress reports and must poll the checkpoint between
/// expensive steps.
pub trait VelocityModel {
    /// Short identifier, e.g. `"best_linear"`
    fn name(&self) -> &'static str;

    /// Build a grid on `geometry`.
    fn build(
        &self,
        picks: &PickSet,
        geometry: &GridGeometry,
        config: &InterpolationConfig,
        checkpoint: &mut Checkpoint<'_>,
    ) -> Result<ModelOutput>;
}
