//! Levenberg–Marquardt least squares for two-parameter curves
//!
//! Minimises `Σ (yᵢ - f(xᵢ; p))²` with Marquardt's diagonal scaling:
//! ```text
//! (JᵀJ + λ·diag(JᵀJ)) δ = Jᵀr
//! ```
//! `λ` shrinks tenfold after an accepted step and grows tenfold after a
//! rejected one. Stopping rules follow MINPACK (relative cost reduction,
//! relative step size, gradient orthogonality).
//!
//! Reference:
//! Moré, J.J. (1978). The Levenberg-Marquardt algorithm: implementation
//! and theory. Numerical Analysis, LNM 630.

use velgrid_core::{Error, Result};

/// Solver tolerances
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LmOptions {
    /// Relative reduction in the cost below which the fit has converged
    pub ftol: f64,
    /// Relative step size below which the fit has converged
    pub xtol: f64,
    /// Cosine between residual and Jacobian columns below which the fit has converged
    pub gtol: f64,
    pub max_iterations: usize,
}

impl Default for LmOptions {
    fn default() -> Self {
        Self {
            ftol: 1.49e-8,
            xtol: 1.49e-8,
            gtol: 0.0,
            max_iterations: 600,
        }
    }
}

/// Converged fit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LmFit {
    pub params: [f64; 2],
    /// Residual sum of squares at `params`
    pub cost: f64,
    pub iterations: usize,
}

/// Fit `model` to `(xs, ys)` starting from `seed`.
///
/// `model(x, p)` returns the curve value and its gradient with respect to `p`.
///
/// # Errors
/// [`Error::Fit`] when there are fewer than two samples, the Jacobian is
/// singular, or the iteration limit is reached.
pub fn levenberg_marquardt<F>(
    xs: &[f64],
    ys: &[f64],
    seed: [f64; 2],
    model: F,
    options: LmOptions,
) -> Result<LmFit>
where
    F: Fn(f64, [f64; 2]) -> (f64, [f64; 2]),
{
    if xs.len() != ys.len() {
        return Err(Error::Fit(format!(
            "{} abscissae but {} observations",
            xs.len(),
            ys.len()
        )));
    }
    if xs.len() < 2 {
        return Err(Error::Fit(format!(
            "need at least 2 samples for a 2-parameter fit, got {}",
            xs.len()
        )));
    }

    let mut params = seed;
    let mut normal = NormalEquations::assemble(xs, ys, params, &model);
    let mut lambda = 1e-3;

    for iteration in 1..=options.max_iterations {
        normal.check_rank()?;

        if normal.cost == 0.0 || normal.gradient_cosine() <= options.gtol {
            return Ok(LmFit {
                params,
                cost: normal.cost,
                iterations: iteration - 1,
            });
        }

        // Inner loop: raise λ until a step lowers the cost
        loop {
            let Some(delta) = normal.damped_step(lambda) else {
                lambda *= 10.0;
                if lambda > 1e16 {
                    return Err(Error::Fit("damped normal equations are singular".into()));
                }
                continue;
            };

            let small_step = (0..2).all(|i| delta[i].abs() <= options.xtol * (params[i].abs() + options.xtol));
            let trial = [params[0] + delta[0], params[1] + delta[1]];
            let trial_normal = NormalEquations::assemble(xs, ys, trial, &model);

            if trial_normal.cost.is_finite() && trial_normal.cost <= normal.cost {
                let reduction = if normal.cost > 0.0 {
                    (normal.cost - trial_normal.cost) / normal.cost
                } else {
                    0.0
                };

                params = trial;
                normal = trial_normal;
                lambda = (lambda / 10.0).max(1e-12);

                if reduction <= options.ftol || small_step {
                    normal.check_rank()?;
                    return Ok(LmFit {
                        params,
                        cost: normal.cost,
                        iterations: iteration,
                    });
                }
                break;
            }

            if small_step {
                // Rounding noise at the minimum
                return Ok(LmFit {
                    params,
                    cost: normal.cost,
                    iterations: iteration,
                });
            }

            lambda *= 10.0;
            if lambda > 1e16 {
                // No descent direction left: the seed sits at a minimum
                // of a flat or clamped region.
                return Err(Error::Fit(format!(
                    "no step reduces the residual from cost {:.6e}",
                    normal.cost
                )));
            }
        }
    }

    Err(Error::Fit(format!(
        "did not converge within {} iterations",
        options.max_iterations
    )))
}

/// `JᵀJ`, `Jᵀr` and the cost at one parameter vector
struct NormalEquations {
    jtj: [[f64; 2]; 2],
    jtr: [f64; 2],
    cost: f64,
}

impl NormalEquations {
    fn assemble<F>(xs: &[f64], ys: &[f64], params: [f64; 2], model: &F) -> Self
    where
        F: Fn(f64, [f64; 2]) -> (f64, [f64; 2]),
    {
        let mut jtj = [[0.0; 2]; 2];
        let mut jtr = [0.0; 2];
        let mut cost = 0.0;

        for (&x, &y) in xs.iter().zip(ys) {
            let (f, grad) = model(x, params);
            let r = y - f;
            cost += r * r;
            for i in 0..2 {
                jtr[i] += grad[i] * r;
                for j in 0..2 {
                    jtj[i][j] += grad[i] * grad[j];
                }
            }
        }

        Self { jtj, jtr, cost }
    }

    /// Fails when the Jacobian columns are (numerically) dependent.
    fn check_rank(&self) -> Result<()> {
        let [[a, b], [_, d]] = self.jtj;
        let det = a * d - b * b;
        if a <= 0.0 || d <= 0.0 || det <= 1e-12 * a * d {
            return Err(Error::Fit(
                "singular Jacobian: the samples do not determine both parameters".into(),
            ));
        }
        Ok(())
    }

    /// Largest cosine between the residual vector and a Jacobian column
    fn gradient_cosine(&self) -> f64 {
        let norm_r = self.cost.sqrt();
        (0..2)
            .map(|i| {
                let norm_j = self.jtj[i][i].sqrt();
                if norm_j > 0.0 && norm_r > 0.0 {
                    (self.jtr[i] / (norm_j * norm_r)).abs()
                } else {
                    0.0
                }
            })
            .fold(0.0, f64::max)
    }

    /// Solve the damped 2x2 system, `None` if it is singular.
    fn damped_step(&self, lambda: f64) -> Option<[f64; 2]> {
        let a = self.jtj[0][0] * (1.0 + lambda);
        let b = self.jtj[0][1];
        let c = self.jtj[1][0];
        let d = self.jtj[1][1] * (1.0 + lambda);

        let det = a * d - b * c;
        if !det.is_finite() || det.abs() <= 1e-300 {
            return None;
        }
        let [g0, g1] = self.jtr;
        Some([(d * g0 - b * g1) / det, (a * g1 - c * g0) / det])
    }
}
