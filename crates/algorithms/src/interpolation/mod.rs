//! Scattered-data interpolation of velocity picks
//!
//! - RBF: linear-kernel radial basis functions with smoothing, global or
//!   neighbourhood solves
//! - k-d tree: nearest-centre queries for the neighbourhood mode

pub mod kdtree;
mod rbf;

pub use kdtree::{KdTree, Neighbor};
pub use rbf::{Rbf, RbfParams};

use tracing::info;
use velgrid_core::{
    Checkpoint, GridGeometry, InterpolationConfig, ModelOutput, ModelParams, PickSet, Result, VelocityGrid,
    VelocityModel,
};

/// Single-shot RBF over every pick in `(trace, time)` space, clamped to the
/// physical velocity floor.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RbfModel {
    /// Overrides `InterpolationConfig::rbf_smoothing`
    pub smoothing: Option<f64>,
}

impl RbfModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_smoothing(smoothing: f64) -> Self {
        Self {
            smoothing: Some(smoothing),
        }
    }
}

impl VelocityModel for RbfModel {
    fn name(&self) -> &'static str {
        "rbf"
    }

    fn build(
        &self,
        picks: &PickSet,
        geometry: &GridGeometry,
        config: &InterpolationConfig,
        checkpoint: &mut Checkpoint<'_>,
    ) -> Result<ModelOutput> {
        checkpoint.milestone(40, "Performing RBF interpolation")?;

        let centres: Vec<[f64; 2]> = picks.iter().map(|p| [p.trace, p.time_ms]).collect();
        let mut params = RbfParams::for_config(config, centres.len());
        if let Some(smoothing) = self.smoothing {
            params.smoothing = smoothing;
        }
        let rbf = Rbf::fit(&centres, &picks.velocities(), params)?;

        checkpoint.milestone(60, "Applying interpolation to the grid")?;
        let values = rbf.evaluate_cancellable(&geometry.mesh(), checkpoint.cancel_source())?;
        let mut grid = VelocityGrid::from_vec(geometry.clone(), values)?;
        grid.clamp_min(config.velocity_floor);
        checkpoint.milestone(90, "RBF interpolation complete")?;

        info!(
            picks = picks.len(),
            shape = ?geometry.shape(),
            neighbors = ?rbf.neighbors(),
            "RBF grid built"
        );
        Ok(ModelOutput::new(
            grid,
            "RBF Interpolation",
            ModelParams::Rbf {
                smoothing: params.smoothing,
                neighbors: rbf.neighbors(),
            },
        ))
    }
}
