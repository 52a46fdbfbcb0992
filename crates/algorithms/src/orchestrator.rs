//! Method dispatch, progress milestones and result normalisation
//!
//! [`run`] is the single entry point front ends call. It never returns an
//! error: every outcome is folded into a [`RunOutcome`] so a caller can tell
//! a cancelled run from a failed one and show the failure kind.

use serde::{Deserialize, Serialize};
use tracing::{error, info};
use velgrid_core::{
    CancelCheck, Checkpoint, Error, ErrorKind, GridGeometry, InterpolationConfig, ModelOutput, PickSet,
    ProgressSink, Result, SeismicDimensions, VelocityModel,
};

use crate::interpolation::RbfModel;
use crate::regression::{LinearRegression, LogarithmicRegression};
use crate::two_stage::{TwoStage, TwoStageParams};

/// Velocity gridding method with its parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum Method {
    /// Single 2D RBF over all picks
    Rbf,
    CustomLinear { v0: f64, k: f64 },
    BestLinear,
    CustomLog { v0: f64, k: f64 },
    BestLog,
    TwoStage(TwoStageParams),
}

impl Method {
    /// Model implementing this method
    pub fn model(&self) -> Box<dyn VelocityModel> {
        match *self {
            Method::Rbf => Box::new(RbfModel::new()),
            Method::CustomLinear { v0, k } => Box::new(LinearRegression::custom(v0, k)),
            Method::BestLinear => Box::new(LinearRegression::best_fit()),
            Method::CustomLog { v0, k } => Box::new(LogarithmicRegression::custom(v0, k)),
            Method::BestLog => Box::new(LogarithmicRegression::best_fit()),
            Method::TwoStage(params) => Box::new(TwoStage::new(params)),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Method::Rbf => "rbf",
            Method::CustomLinear { .. } => "custom_linear",
            Method::BestLinear => "best_linear",
            Method::CustomLog { .. } => "custom_log",
            Method::BestLog => "best_log",
            Method::TwoStage(_) => "two_stage",
        }
    }
}

/// How a [`run`] ended
#[derive(Debug)]
pub enum RunOutcome {
    Success(ModelOutput),
    /// The cancellation predicate fired; no grid is produced.
    Cancelled,
    Failure { kind: ErrorKind, message: String },
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Success(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, RunOutcome::Cancelled)
    }

    /// The model output, if the run succeeded
    pub fn output(&self) -> Option<&ModelOutput> {
        match self {
            RunOutcome::Success(out) => Some(out),
            _ => None,
        }
    }

    pub fn into_output(self) -> Option<ModelOutput> {
        match self {
            RunOutcome::Success(out) => Some(out),
            _ => None,
        }
    }
}

impl From<Result<ModelOutput>> for RunOutcome {
    fn from(result: Result<ModelOutput>) -> Self {
        match result {
            Ok(out) => RunOutcome::Success(out),
            Err(Error::Cancelled) => RunOutcome::Cancelled,
            Err(e) => RunOutcome::Failure {
                kind: e.kind(),
                message: e.to_string(),
            },
        }
    }
}

/// Grid `picks` with `method`.
///
/// With `dims`, the grid has exactly the volume's sample and trace counts;
/// otherwise the geometry is derived from the pick extents. Progress is
/// reported to `sink` with non-decreasing percentages ending at 100, and
/// `cancel` is polled before every report.
pub fn run(
    method: &Method,
    picks: &PickSet,
    dims: Option<&SeismicDimensions>,
    config: &InterpolationConfig,
    sink: &mut dyn ProgressSink,
    cancel: &dyn CancelCheck,
) -> RunOutcome {
    let mut checkpoint = Checkpoint::new(sink, cancel);
    let outcome = RunOutcome::from(run_inner(method, picks, dims, config, &mut checkpoint));

    match &outcome {
        RunOutcome::Success(out) => info!(method = method.name(), description = %out.description, "run finished"),
        RunOutcome::Cancelled => info!(method = method.name(), "run cancelled"),
        RunOutcome::Failure { kind, message } => error!(method = method.name(), ?kind, %message, "run failed"),
    }
    outcome
}

fn run_inner(
    method: &Method,
    picks: &PickSet,
    dims: Option<&SeismicDimensions>,
    config: &InterpolationConfig,
    checkpoint: &mut Checkpoint<'_>,
) -> Result<ModelOutput> {
    checkpoint.milestone(5, "Loading inputs")?;
    config.validate()?;
    if let Some(d) = dims {
        checkpoint.milestone(
            10,
            &format!("Processing {} traces and {} samples", d.trace_count, d.sample_count),
        )?;
    } else {
        checkpoint.milestone(10, &format!("Processing {} picks", picks.len()))?;
    }

    checkpoint.milestone(20, "Preparing velocity picks")?;
    if picks.is_empty() {
        return Err(Error::Geometry("no velocity picks to grid".into()));
    }

    checkpoint.milestone(30, "Creating interpolation grid")?;
    let geometry = GridGeometry::from_picks(picks, dims)?;

    let model = method.model();
    let output = model.build(picks, &geometry, config, checkpoint)?;

    checkpoint.milestone(95, "Finalizing")?;
    checkpoint.finish("Interpolation complete")?;
    Ok(output)
}
