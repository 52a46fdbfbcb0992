//! Scalar velocity-time regression models
//!
//! Two global trends of two-way time, fitted to all picks at once or taken
//! from user-supplied coefficients:
//! - Linear: `V(t) = v0 + k·t`
//! - Logarithmic: `V(t) = max(v0 + k·ln(max(t, ε)), V_floor)`
//!
//! The trend is evaluated on the time axis and broadcast across every trace,
//! so each row of the resulting grid is constant.

mod levenberg;

pub use levenberg::{levenberg_marquardt, LmFit, LmOptions};

use tracing::{debug, info};
use velgrid_core::{
    Checkpoint, GridGeometry, InterpolationConfig, ModelOutput, ModelParams, PickSet, Result,
    VelocityGrid, VelocityModel,
};

/// Seed for the linear best fit
pub const LINEAR_SEED: [f64; 2] = [1500.0, 0.5];
/// Seed for the logarithmic best fit
pub const LOGARITHMIC_SEED: [f64; 2] = [1500.0, 1000.0];

/// `V(t) = v0 + k·t`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearModel {
    pub v0: f64,
    pub k: f64,
}

impl LinearModel {
    pub fn new(v0: f64, k: f64) -> Self {
        Self { v0, k }
    }

    #[inline]
    pub fn velocity_at(&self, time_ms: f64) -> f64 {
        self.v0 + self.k * time_ms
    }

    /// Least-squares fit over every pick.
    ///
    /// # Errors
    /// [`Error::Fit`](velgrid_core::Error::Fit) if the solver fails, e.g. when all picks share one time.
    pub fn fit(picks: &PickSet) -> Result<Self> {
        let fit = levenberg_marquardt(
            &picks.times(),
            &picks.velocities(),
            LINEAR_SEED,
            |t, [v0, k]| (v0 + k * t, [1.0, t]),
            LmOptions::default(),
        )?;
        debug!(iterations = fit.iterations, cost = fit.cost, "linear fit converged");
        Ok(Self::new(fit.params[0], fit.params[1]))
    }

    /// R² of this model against all picks
    pub fn r_squared(&self, picks: &PickSet) -> f64 {
        let predicted: Vec<f64> = picks.iter().map(|p| self.velocity_at(p.time_ms)).collect();
        r_squared(&picks.velocities(), &predicted)
    }
}

/// `V(t) = max(v0 + k·ln(max(t, ε)), V_floor)`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogarithmicModel {
    pub v0: f64,
    pub k: f64,
    /// Physical minimum velocity
    pub floor: f64,
    /// Lower bound on time before the logarithm
    pub epsilon: f64,
}

impl LogarithmicModel {
    /// Model with the floor and ε taken from `config`.
    pub fn new(v0: f64, k: f64, config: &InterpolationConfig) -> Self {
        Self {
            v0,
            k,
            floor: config.velocity_floor,
            epsilon: config.log_epsilon,
        }
    }

    #[inline]
    pub fn velocity_at(&self, time_ms: f64) -> f64 {
        self.evaluate(time_ms, [self.v0, self.k]).0
    }

    /// Value and parameter gradient; the gradient vanishes where the floor is active.
    fn evaluate(&self, time_ms: f64, [v0, k]: [f64; 2]) -> (f64, [f64; 2]) {
        let ln_t = time_ms.max(self.epsilon).ln();
        let v = v0 + k * ln_t;
        if v >= self.floor {
            (v, [1.0, ln_t])
        } else {
            (self.floor, [0.0, 0.0])
        }
    }

    /// Least-squares fit of the clamped curve over picks with `t > 0`.
    ///
    /// # Errors
    /// [`Error::Fit`](velgrid_core::Error::Fit) if fewer than two picks have positive time or the
    /// solver fails.
    pub fn fit(picks: &PickSet, config: &InterpolationConfig) -> Result<Self> {
        let (times, velocities) = positive_time_picks(picks);
        let template = Self::new(LOGARITHMIC_SEED[0], LOGARITHMIC_SEED[1], config);
        let fit = levenberg_marquardt(
            &times,
            &velocities,
            LOGARITHMIC_SEED,
            |t, p| template.evaluate(t, p),
            LmOptions::default(),
        )?;
        debug!(iterations = fit.iterations, cost = fit.cost, "logarithmic fit converged");
        Ok(Self::new(fit.params[0], fit.params[1], config))
    }

    /// R² against picks with `t > 0`; 0 when there are none.
    pub fn r_squared(&self, picks: &PickSet) -> f64 {
        let (times, velocities) = positive_time_picks(picks);
        if times.is_empty() {
            return 0.0;
        }
        let predicted: Vec<f64> = times.iter().map(|&t| self.velocity_at(t)).collect();
        r_squared(&velocities, &predicted)
    }
}

fn positive_time_picks(picks: &PickSet) -> (Vec<f64>, Vec<f64>) {
    picks
        .iter()
        .filter(|p| p.time_ms > 0.0)
        .map(|p| (p.time_ms, p.velocity))
        .unzip()
}

/// Coefficient of determination, clipped to `[0, 1]`.
///
/// Returns 0 when the observations have no variance.
pub fn r_squared(observed: &[f64], predicted: &[f64]) -> f64 {
    if observed.is_empty() {
        return 0.0;
    }
    let mean = observed.iter().sum::<f64>() / observed.len() as f64;
    let ss_tot: f64 = observed.iter().map(|y| (y - mean) * (y - mean)).sum();
    if ss_tot == 0.0 {
        return 0.0;
    }
    let ss_res: f64 = observed
        .iter()
        .zip(predicted)
        .map(|(y, f)| (y - f) * (y - f))
        .sum();
    (1.0 - ss_res / ss_tot).clamp(0.0, 1.0)
}

/// Where the coefficients of a regression model come from
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum FitMode {
    /// User-supplied coefficients, no fitting
    Custom { v0: f64, k: f64 },
    /// Least-squares fit to the picks
    #[default]
    BestFit,
}

/// Linear trend model, custom or fitted.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LinearRegression {
    pub mode: FitMode,
}

impl LinearRegression {
    pub fn custom(v0: f64, k: f64) -> Self {
        Self {
            mode: FitMode::Custom { v0, k },
        }
    }

    pub fn best_fit() -> Self {
        Self { mode: FitMode::BestFit }
    }
}

impl VelocityModel for LinearRegression {
    fn name(&self) -> &'static str {
        match self.mode {
            FitMode::Custom { .. } => "custom_linear",
            FitMode::BestFit => "best_linear",
        }
    }

    fn build(
        &self,
        picks: &PickSet,
        geometry: &GridGeometry,
        _config: &InterpolationConfig,
        checkpoint: &mut Checkpoint<'_>,
    ) -> Result<ModelOutput> {
        let (model, label) = match self.mode {
            FitMode::Custom { v0, k } => {
                checkpoint.milestone(40, "Creating custom linear model")?;
                (LinearModel::new(v0, k), "Custom Linear")
            }
            FitMode::BestFit => {
                checkpoint.milestone(40, "Fitting linear model")?;
                let model = LinearModel::fit(picks)?;
                checkpoint.milestone(60, "Evaluating linear model")?;
                (model, "Linear Regression")
            }
        };

        let r2 = model.r_squared(picks);
        let profile: Vec<f64> = geometry.time_axis().iter().map(|&t| model.velocity_at(t)).collect();
        let grid = VelocityGrid::from_profile(geometry.clone(), &profile)?;
        checkpoint.milestone(90, "Linear model evaluated")?;

        let description = format!(
            "{label}: V = {:.1} + {:.4}·TWT (R² = {r2:.4})",
            model.v0, model.k
        );
        info!(%description, "linear model built");
        Ok(ModelOutput::new(
            grid,
            description,
            ModelParams::Linear {
                v0: model.v0,
                k: model.k,
                r2,
            },
        ))
    }
}

/// Logarithmic trend model, custom or fitted.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LogarithmicRegression {
    pub mode: FitMode,
}

impl LogarithmicRegression {
    pub fn custom(v0: f64, k: f64) -> Self {
        Self {
            mode: FitMode::Custom { v0, k },
        }
    }

    pub fn best_fit() -> Self {
        Self { mode: FitMode::BestFit }
    }
}

impl VelocityModel for LogarithmicRegression {
    fn name(&self) -> &'static str {
        match self.mode {
            FitMode::Custom { .. } => "custom_logarithmic",
            FitMode::BestFit => "best_logarithmic",
        }
    }

    fn build(
        &self,
        picks: &PickSet,
        geometry: &GridGeometry,
        config: &InterpolationConfig,
        checkpoint: &mut Checkpoint<'_>,
    ) -> Result<ModelOutput> {
        let model = match self.mode {
            FitMode::Custom { v0, k } => {
                checkpoint.milestone(40, "Creating custom logarithmic model")?;
                LogarithmicModel::new(v0, k, config)
            }
            FitMode::BestFit => {
                checkpoint.milestone(40, "Fitting logarithmic model")?;
                let model = LogarithmicModel::fit(picks, config)?;
                checkpoint.milestone(60, "Evaluating logarithmic model")?;
                model
            }
        };

        let r2 = model.r_squared(picks);
        let profile: Vec<f64> = geometry.time_axis().iter().map(|&t| model.velocity_at(t)).collect();
        let grid = VelocityGrid::from_profile(geometry.clone(), &profile)?;
        checkpoint.milestone(90, "Logarithmic model evaluated")?;

        let description = match self.mode {
            FitMode::Custom { .. } => format!(
                "Custom Logarithmic: V = {:.1} + {:.1}·ln(TWT) (R² = {r2:.4})",
                model.v0, model.k
            ),
            FitMode::BestFit => format!(
                "Logarithmic Regression: V = {:.1} + {:.4}·ln(TWT) (R² = {r2:.4})",
                model.v0, model.k
            ),
        };
        info!(%description, "logarithmic model built");
        Ok(ModelOutput::new(
            grid,
            description,
            ModelParams::Logarithmic {
                v0: model.v0,
                k: model.k,
                r2,
            },
        ))
    }
}

/// Fitted coefficients and goodness of fit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitSummary {
    pub v0: f64,
    pub k: f64,
    pub r2: f64,
}

/// Quick best-fit parameters for a pick set. A model that cannot be fitted
/// is left out.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RegressionSummary {
    pub linear: Option<FitSummary>,
    pub logarithmic: Option<FitSummary>,
}

/// Best linear fit over all picks and best logarithmic fit over picks with
/// positive time (when more than two exist).
pub fn regression_summary(picks: &PickSet, config: &InterpolationConfig) -> RegressionSummary {
    let linear = match LinearModel::fit(picks) {
        Ok(m) => Some(FitSummary {
            v0: m.v0,
            k: m.k,
            r2: m.r_squared(picks),
        }),
        Err(e) => {
            debug!(error = %e, "no linear fit for summary");
            None
        }
    };

    let positive = picks.iter().filter(|p| p.time_ms > 0.0).count();
    let logarithmic = if positive > 2 {
        match LogarithmicModel::fit(picks, config) {
            Ok(m) => Some(FitSummary {
                v0: m.v0,
                k: m.k,
                r2: m.r_squared(picks),
            }),
            Err(e) => {
                debug!(error = %e, "no logarithmic fit for summary");
                None
            }
        }
    } else {
        None
    };

    RegressionSummary { linear, logarithmic }
}
