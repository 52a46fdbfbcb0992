//! Session state around one interpolated grid
//!
//! A session keeps three copies of the most recent grid: the freshly
//! interpolated one, an untouched original for rollback, and the working
//! output that smoothing rewrites. Loading a seismic volume whose trace or
//! sample count disagrees with the grid resamples all three onto the
//! volume's counts.

use tracing::{debug, info};
use velgrid_core::{
    CancelCheck, InterpolationConfig, ModelOutput, ModelParams, PickSet, ProgressSink, Result, SeismicDimensions,
    VelocityGrid,
};

use crate::orchestrator::{run, Method, RunOutcome};
use crate::resample::align_to_dimensions;
use crate::smoothing::gaussian_blur;

#[derive(Debug, Clone)]
struct Grids {
    interpolated: VelocityGrid,
    original: VelocityGrid,
    output: VelocityGrid,
    description: String,
    params: ModelParams,
}

/// Interpolation results and the seismic dimensions they belong to.
#[derive(Debug, Clone, Default)]
pub struct VelocitySession {
    config: InterpolationConfig,
    dimensions: Option<SeismicDimensions>,
    grids: Option<Grids>,
}

impl VelocitySession {
    pub fn new(config: InterpolationConfig) -> Self {
        Self {
            config,
            dimensions: None,
            grids: None,
        }
    }

    pub fn config(&self) -> &InterpolationConfig {
        &self.config
    }

    pub fn dimensions(&self) -> Option<&SeismicDimensions> {
        self.dimensions.as_ref()
    }

    /// Run `method` against the session's dimensions and keep the grid on success.
    pub fn interpolate(
        &mut self,
        method: &Method,
        picks: &PickSet,
        sink: &mut dyn ProgressSink,
        cancel: &dyn CancelCheck,
    ) -> RunOutcome {
        let outcome = run(method, picks, self.dimensions.as_ref(), &self.config, sink, cancel);
        if let RunOutcome::Success(out) = &outcome {
            self.store(out.clone());
        }
        outcome
    }

    /// Replace the session grids with a model result.
    pub fn store(&mut self, output: ModelOutput) {
        let ModelOutput {
            grid,
            description,
            params,
            ..
        } = output;
        self.grids = Some(Grids {
            original: grid.clone(),
            output: grid.clone(),
            interpolated: grid,
            description,
            params,
        });
    }

    pub fn has_grid(&self) -> bool {
        self.grids.is_some()
    }

    pub fn interpolated(&self) -> Option<&VelocityGrid> {
        self.grids.as_ref().map(|g| &g.interpolated)
    }

    pub fn original(&self) -> Option<&VelocityGrid> {
        self.grids.as_ref().map(|g| &g.original)
    }

    /// Current working grid
    pub fn output(&self) -> Option<&VelocityGrid> {
        self.grids.as_ref().map(|g| &g.output)
    }

    pub fn description(&self) -> Option<&str> {
        self.grids.as_ref().map(|g| g.description.as_str())
    }

    pub fn params(&self) -> Option<&ModelParams> {
        self.grids.as_ref().map(|g| &g.params)
    }

    /// Output ← blur(interpolated). Returns `false` when there is no grid.
    pub fn apply_smoothing(&mut self, blur: f64) -> Result<bool> {
        let Some(grids) = self.grids.as_mut() else {
            return Ok(false);
        };
        grids.output = gaussian_blur(&grids.interpolated, blur)?;
        debug!(blur, "session output smoothed");
        Ok(true)
    }

    /// Output ← original
    pub fn reset_smoothing(&mut self) {
        if let Some(grids) = self.grids.as_mut() {
            grids.output = grids.original.clone();
        }
    }

    /// Whether the grid has the session volume's sample and trace counts.
    /// Trivially true without a grid or without dimensions.
    pub fn matches_dimensions(&self) -> bool {
        match (&self.grids, &self.dimensions) {
            (Some(grids), Some(dims)) => grids.interpolated.shape() == dims.shape(),
            _ => true,
        }
    }

    /// Attach seismic dimensions, resampling an existing grid that does not
    /// match them. Returns whether a resample happened.
    ///
    /// On error the session is left as it was: previous dimensions and grids.
    pub fn set_dimensions(&mut self, dims: SeismicDimensions) -> Result<bool> {
        dims.validate()?;
        let Some(grids) = self.grids.as_ref() else {
            self.dimensions = Some(dims);
            return Ok(false);
        };
        let from = grids.interpolated.shape();
        if from == dims.shape() {
            self.dimensions = Some(dims);
            return Ok(false);
        }

        let policy = self.config.outside_hull;
        let interpolated = align_to_dimensions(&grids.interpolated, &dims, policy)?;
        let original = align_to_dimensions(&grids.original, &dims, policy)?;
        let output = align_to_dimensions(&grids.output, &dims, policy)?;

        if let Some(grids) = self.grids.as_mut() {
            grids.interpolated = interpolated;
            grids.original = original;
            grids.output = output;
        }
        self.dimensions = Some(dims);
        info!(?from, to = ?dims.shape(), "velocity grid aligned to seismic dimensions");
        Ok(true)
    }

    /// Drop all grids. Dimensions and configuration stay.
    pub fn reset(&mut self) {
        self.grids = None;
    }
}
