//! Linear-kernel radial basis function interpolation
//!
//! The interpolant has the form:
//! ```text
//! f(x) = Σᵢ wᵢ · φ(‖x - cᵢ‖) + a₀ + Σ_d a_d · x̂_d,     φ(r) = -r
//! ```
//! where `x̂` is `x` shifted to the centre of the data extent and scaled by
//! its half-width. Coefficients solve the augmented system
//! ```text
//! [K + λI  P] [w]   [v]
//! [Pᵀ      0] [a] = [0]
//! ```
//! A nonzero smoothing `λ` turns the exact interpolant into a regularised
//! least-squares surface.
//!
//! Dense solves are O(n³). In neighbourhood mode each query is solved
//! against its `k` nearest centres only; queries that share a neighbour set
//! share one solve.

use std::collections::HashMap;

use velgrid_core::progress::{CancelCheck, NeverCancel};
use velgrid_core::{Error, InterpolationConfig, Result};

use super::kdtree::KdTree;
use crate::maybe_rayon::*;

/// RBF fitting options
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RbfParams {
    /// Added to the kernel diagonal
    pub smoothing: f64,
    /// Solve each query against this many nearest centres instead of all of them
    pub neighbors: Option<usize>,
}

impl Default for RbfParams {
    fn default() -> Self {
        Self {
            smoothing: 10.0,
            neighbors: None,
        }
    }
}

impl RbfParams {
    /// Parameters for `centre_count` centres: global solve up to
    /// `config.dense_rbf_limit`, neighbourhood solves above it.
    pub fn for_config(config: &InterpolationConfig, centre_count: usize) -> Self {
        Self {
            smoothing: config.rbf_smoothing,
            neighbors: (centre_count > config.dense_rbf_limit).then_some(config.local_rbf_neighbors),
        }
    }
}

/// A fitted RBF interpolant over centres in `D` dimensions.
#[derive(Debug)]
pub struct Rbf<const D: usize> {
    centres: Vec<[f64; D]>,
    values: Vec<f64>,
    smoothing: f64,
    mode: Mode<D>,
}

#[derive(Debug)]
enum Mode<const D: usize> {
    Global(Solution<D>),
    Local { k: usize, tree: KdTree<D> },
}

/// Coefficients of one solved system
#[derive(Debug, Clone)]
struct Solution<const D: usize> {
    /// Centre indices the weights belong to
    indices: Vec<usize>,
    weights: Vec<f64>,
    /// Constant term followed by one coefficient per dimension
    poly: Vec<f64>,
    shift: [f64; D],
    scale: [f64; D],
}

/// Linear kernel
#[inline]
fn kernel(r: f64) -> f64 {
    -r
}

impl<const D: usize> Rbf<D> {
    /// Fit an interpolant to `values` sampled at `centres`.
    ///
    /// # Errors
    /// - [`Error::InvalidParameter`] for mismatched inputs, non-finite data or
    ///   negative smoothing
    /// - [`Error::Interpolation`] with fewer than `D + 1` centres (the planar
    ///   tail is underdetermined) or a singular system
    pub fn fit(centres: &[[f64; D]], values: &[f64], params: RbfParams) -> Result<Self> {
        if centres.len() != values.len() {
            return Err(Error::InvalidParameter {
                name: "values",
                value: values.len().to_string(),
                reason: format!("expected one value per centre ({})", centres.len()),
            });
        }
        if !params.smoothing.is_finite() || params.smoothing < 0.0 {
            return Err(Error::InvalidParameter {
                name: "smoothing",
                value: params.smoothing.to_string(),
                reason: "must be finite and non-negative".into(),
            });
        }
        if centres.iter().flatten().chain(values).any(|v| !v.is_finite()) {
            return Err(Error::InvalidParameter {
                name: "centres",
                value: "non-finite".into(),
                reason: "centres and values must be finite".into(),
            });
        }

        let min_points = D + 1;
        if centres.len() < min_points {
            return Err(Error::Interpolation(format!(
                "at least {min_points} data points are required, got {}",
                centres.len()
            )));
        }

        let mode = match params.neighbors {
            Some(k) if k < centres.len() => {
                if k < min_points {
                    return Err(Error::InvalidParameter {
                        name: "neighbors",
                        value: k.to_string(),
                        reason: format!("need at least {min_points} neighbours"),
                    });
                }
                Mode::Local {
                    k,
                    tree: KdTree::build(centres),
                }
            }
            // k covering every centre is the global problem
            _ => {
                let indices: Vec<usize> = (0..centres.len()).collect();
                Mode::Global(solve_system(centres, values, indices, params.smoothing, false)?)
            }
        };

        Ok(Self {
            centres: centres.to_vec(),
            values: values.to_vec(),
            smoothing: params.smoothing,
            mode,
        })
    }

    pub fn len(&self) -> usize {
        self.centres.len()
    }

    pub fn is_empty(&self) -> bool {
        self.centres.is_empty()
    }

    /// Neighbourhood size, if running in local mode
    pub fn neighbors(&self) -> Option<usize> {
        match self.mode {
            Mode::Global(_) => None,
            Mode::Local { k, .. } => Some(k),
        }
    }

    /// Interpolated values at `queries`.
    pub fn evaluate(&self, queries: &[[f64; D]]) -> Result<Vec<f64>> {
        self.evaluate_cancellable(queries, &NeverCancel)
    }

    /// Like [`Rbf::evaluate`], polling `cancel` between blocks of work.
    pub fn evaluate_cancellable(&self, queries: &[[f64; D]], cancel: &dyn CancelCheck) -> Result<Vec<f64>> {
        match &self.mode {
            Mode::Global(solution) => {
                const BLOCK: usize = 1024;
                let blocks: Vec<Vec<f64>> = queries
                    .par_chunks(BLOCK)
                    .map(|block| {
                        if cancel.is_cancelled() {
                            return Err(Error::Cancelled);
                        }
                        Ok(block
                            .iter()
                            .map(|q| solution.eval(&self.centres, q))
                            .collect::<Vec<f64>>())
                    })
                    .collect::<Result<_>>()?;
                Ok(blocks.into_iter().flatten().collect())
            }
            Mode::Local { k, tree } => self.evaluate_local(queries, *k, tree, cancel),
        }
    }

    fn evaluate_local(
        &self,
        queries: &[[f64; D]],
        k: usize,
        tree: &KdTree<D>,
        cancel: &dyn CancelCheck,
    ) -> Result<Vec<f64>> {
        let neighbourhoods: Vec<Vec<usize>> = queries
            .par_iter()
            .map(|q| {
                let mut idx: Vec<usize> = tree.k_nearest(q, k).into_iter().map(|n| n.index).collect();
                idx.sort_unstable();
                idx
            })
            .collect();

        // Group queries sharing a neighbour set, in first-seen order
        let mut groups: HashMap<&[usize], usize> = HashMap::new();
        let mut members: Vec<(Vec<usize>, Vec<usize>)> = Vec::new();
        for (qi, idx) in neighbourhoods.iter().enumerate() {
            let slot = *groups.entry(idx.as_slice()).or_insert_with(|| {
                members.push((idx.clone(), Vec::new()));
                members.len() - 1
            });
            members[slot].1.push(qi);
        }

        let solved: Vec<Vec<(usize, f64)>> = members
            .into_par_iter()
            .map(|(indices, query_ids)| {
                if cancel.is_cancelled() {
                    return Err(Error::Cancelled);
                }
                let local: Vec<[f64; D]> = indices.iter().map(|&i| self.centres[i]).collect();
                let vals: Vec<f64> = indices.iter().map(|&i| self.values[i]).collect();
                let mut solution =
                    solve_system(&local, &vals, (0..indices.len()).collect(), self.smoothing, true)?;
                solution.indices = indices;
                Ok(query_ids
                    .into_iter()
                    .map(|qi| (qi, solution.eval(&self.centres, &queries[qi])))
                    .collect::<Vec<_>>())
            })
            .collect::<Result<_>>()?;

        let mut out = vec![f64::NAN; queries.len()];
        for (qi, v) in solved.into_iter().flatten() {
            out[qi] = v;
        }
        Ok(out)
    }
}

impl<const D: usize> Solution<D> {
    fn eval(&self, centres: &[[f64; D]], x: &[f64; D]) -> f64 {
        let mut val = self.poly[0];
        for d in 0..D {
            val += self.poly[d + 1] * (x[d] - self.shift[d]) / self.scale[d];
        }
        for (&i, &w) in self.indices.iter().zip(&self.weights) {
            let r = super::kdtree::distance_sq(x, &centres[i]).sqrt();
            val += w * kernel(r);
        }
        val
    }
}

/// Build and solve the augmented system for `centres[indices]`.
///
/// With `pin_flat`, a dimension along which every centre has the same
/// coordinate gets a zero tail coefficient instead of making the system
/// singular. Neighbourhoods drawn from a single grid column hit this.
fn solve_system<const D: usize>(
    centres: &[[f64; D]],
    values: &[f64],
    indices: Vec<usize>,
    smoothing: f64,
    pin_flat: bool,
) -> Result<Solution<D>> {
    let n = indices.len();

    // Shift and scale so the polynomial block is well conditioned
    let mut lo = [f64::INFINITY; D];
    let mut hi = [f64::NEG_INFINITY; D];
    for &i in &indices {
        for d in 0..D {
            lo[d] = lo[d].min(centres[i][d]);
            hi[d] = hi[d].max(centres[i][d]);
        }
    }
    let mut shift = [0.0; D];
    let mut scale = [1.0; D];
    for d in 0..D {
        shift[d] = (hi[d] + lo[d]) / 2.0;
        let half = (hi[d] - lo[d]) / 2.0;
        scale[d] = if half == 0.0 { 1.0 } else { half };
    }

    let m = n + D + 1;
    let mut mat = vec![0.0_f64; m * m];
    let mut rhs = vec![0.0_f64; m];

    for (a, &i) in indices.iter().enumerate() {
        for (b, &j) in indices.iter().enumerate() {
            let r = super::kdtree::distance_sq(&centres[i], &centres[j]).sqrt();
            mat[a * m + b] = kernel(r);
        }
        mat[a * m + a] += smoothing;

        // P and Pᵀ
        mat[a * m + n] = 1.0;
        mat[n * m + a] = 1.0;
        for d in 0..D {
            let xhat = (centres[i][d] - shift[d]) / scale[d];
            mat[a * m + n + 1 + d] = xhat;
            mat[(n + 1 + d) * m + a] = xhat;
        }
        rhs[a] = values[i];
    }

    if pin_flat {
        for d in 0..D {
            if hi[d] == lo[d] {
                mat[(n + 1 + d) * m + n + 1 + d] = 1.0;
            }
        }
    }

    let coeffs = gauss_solve(m, &mut mat, &mut rhs)?;

    Ok(Solution {
        indices,
        weights: coeffs[..n].to_vec(),
        poly: coeffs[n..].to_vec(),
        shift,
        scale,
    })
}

/// Solve Ax = b using Gaussian elimination with partial pivoting.
///
/// Modifies `mat` and `rhs` in place. A pivot below `1e-13` times the largest
/// matrix entry is treated as singular.
fn gauss_solve(n: usize, mat: &mut [f64], rhs: &mut [f64]) -> Result<Vec<f64>> {
    let norm = mat.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
    let tolerance = norm * 1e-13;

    // Forward elimination
    for col in 0..n {
        let mut max_val = mat[col * n + col].abs();
        let mut max_row = col;
        for row in (col + 1)..n {
            let val = mat[row * n + col].abs();
            if val > max_val {
                max_val = val;
                max_row = row;
            }
        }

        if max_val <= tolerance {
            return Err(Error::Interpolation(
                "singular RBF system (duplicate or collinear centres)".into(),
            ));
        }

        if max_row != col {
            for j in 0..n {
                mat.swap(col * n + j, max_row * n + j);
            }
            rhs.swap(col, max_row);
        }

        let pivot = mat[col * n + col];
        for row in (col + 1)..n {
            let factor = mat[row * n + col] / pivot;
            if factor == 0.0 {
                continue;
            }
            mat[row * n + col] = 0.0;
            for j in (col + 1)..n {
                mat[row * n + j] -= factor * mat[col * n + j];
            }
            rhs[row] -= factor * rhs[col];
        }
    }

    // Back substitution
    let mut x = vec![0.0_f64; n];
    for col in (0..n).rev() {
        let mut sum = rhs[col];
        for j in (col + 1)..n {
            sum -= mat[col * n + j] * x[j];
        }
        x[col] = sum / mat[col * n + col];
    }

    Ok(x)
}
