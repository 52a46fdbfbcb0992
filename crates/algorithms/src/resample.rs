//! Grid resampling by triangulated linear interpolation
//!
//! Source cell centres sit on a rectilinear lattice, so the triangulation is
//! structured: every lattice cell is split along its lower-left to
//! upper-right diagonal into two triangles, and a target point takes the
//! barycentric blend of the three corners of the triangle containing it.
//! Inside the source extent this is exact linear interpolation; outside it
//! the [`OutsideHull`] policy decides.

use tracing::debug;
use velgrid_core::{Error, GridGeometry, OutsideHull, Result, SeismicDimensions, VelocityGrid};

use crate::maybe_rayon::*;

/// Resample `grid` onto `target`.
///
/// # Errors
/// [`Error::Interpolation`] when a target cell lies outside the source
/// extent and `policy` is [`OutsideHull::Error`].
pub fn resample(grid: &VelocityGrid, target: &GridGeometry, policy: OutsideHull) -> Result<VelocityGrid> {
    let source = grid.geometry();
    let xs = source.trace_axis();
    let ys = source.time_axis();
    let data = grid.data();

    let tx = target.trace_axis();
    let ty = target.time_axis();

    let x_tol = axis_tolerance(xs);
    let y_tol = axis_tolerance(ys);

    let rows: Vec<Vec<f64>> = (0..ty.len())
        .into_par_iter()
        .map(|row| {
            let y = ty[row];
            let mut out = Vec::with_capacity(tx.len());
            for &x in tx {
                let inside = within(xs, x, x_tol) && within(ys, y, y_tol);
                let value = match (inside, policy) {
                    (true, _) => sample(xs, ys, |r, c| data[[r, c]], x, y),
                    (false, OutsideHull::Nan) => f64::NAN,
                    (false, OutsideHull::Nearest) => {
                        sample(xs, ys, |r, c| data[[r, c]], clamp_to(xs, x), clamp_to(ys, y))
                    }
                    (false, OutsideHull::Error) => {
                        return Err(Error::Interpolation(format!(
                            "target point (trace {x}, time {y} ms) lies outside the source grid"
                        )));
                    }
                };
                out.push(value);
            }
            Ok(out)
        })
        .collect::<Result<_>>()?;

    debug!(
        from = ?source.shape(),
        to = ?target.shape(),
        ?policy,
        "resampled velocity grid"
    );
    VelocityGrid::from_vec(target.clone(), rows.into_iter().flatten().collect())
}

/// Resample onto the volume's sample and trace counts, keeping the grid's
/// own trace and time extents.
pub fn align_to_dimensions(
    grid: &VelocityGrid,
    dims: &SeismicDimensions,
    policy: OutsideHull,
) -> Result<VelocityGrid> {
    let target = grid.geometry().resized(dims.trace_count, dims.sample_count)?;
    resample(grid, &target, policy)
}

/// Linear interpolation at `(x, y)` inside the lattice `xs × ys`.
fn sample(xs: &[f64], ys: &[f64], value: impl Fn(usize, usize) -> f64, x: f64, y: f64) -> f64 {
    let (c0, c1, u) = bracket(xs, x);
    let (r0, r1, v) = bracket(ys, y);

    let f00 = value(r0, c0);
    let f10 = value(r0, c1);
    let f01 = value(r1, c0);
    let f11 = value(r1, c1);

    // Unit cell corners: (0,0) f00, (1,0) f10, (0,1) f01, (1,1) f11
    let (a, b, fb, c, fc) = if u >= v {
        ([0.0, 0.0], [1.0, 0.0], f10, [1.0, 1.0], f11)
    } else {
        ([0.0, 0.0], [0.0, 1.0], f01, [1.0, 1.0], f11)
    };
    let (wa, wb, wc) = barycentric([u, v], a, b, c);
    wa * f00 + wb * fb + wc * fc
}

/// Barycentric weights of `p` in triangle `(p0, p1, p2)`.
fn barycentric(p: [f64; 2], p0: [f64; 2], p1: [f64; 2], p2: [f64; 2]) -> (f64, f64, f64) {
    let v0 = [p1[0] - p0[0], p1[1] - p0[1]];
    let v1 = [p2[0] - p0[0], p2[1] - p0[1]];
    let v2 = [p[0] - p0[0], p[1] - p0[1]];

    let dot00 = v0[0] * v0[0] + v0[1] * v0[1];
    let dot01 = v0[0] * v1[0] + v0[1] * v1[1];
    let dot02 = v0[0] * v2[0] + v0[1] * v2[1];
    let dot11 = v1[0] * v1[0] + v1[1] * v1[1];
    let dot12 = v1[0] * v2[0] + v1[1] * v2[1];

    let inv_denom = 1.0 / (dot00 * dot11 - dot01 * dot01);
    let v = (dot11 * dot02 - dot01 * dot12) * inv_denom;
    let w = (dot00 * dot12 - dot01 * dot02) * inv_denom;
    (1.0 - v - w, v, w)
}

/// Lower index, upper index and fractional position of `x` within the axis
/// interval containing it.
fn bracket(axis: &[f64], x: f64) -> (usize, usize, f64) {
    let n = axis.len();
    if n == 1 {
        return (0, 0, 0.0);
    }
    let upper = axis.partition_point(|&a| a <= x).clamp(1, n - 1);
    let lower = upper - 1;
    let width = axis[upper] - axis[lower];
    let t = if width > 0.0 {
        ((x - axis[lower]) / width).clamp(0.0, 1.0)
    } else {
        0.0
    };
    (lower, upper, t)
}

fn within(axis: &[f64], x: f64, tol: f64) -> bool {
    x >= axis[0] - tol && x <= axis[axis.len() - 1] + tol
}

fn clamp_to(axis: &[f64], x: f64) -> f64 {
    x.clamp(axis[0], axis[axis.len() - 1])
}

/// Slack for points that sit on the edge up to rounding
fn axis_tolerance(axis: &[f64]) -> f64 {
    let span = axis[axis.len() - 1] - axis[0];
    span.abs().max(1.0) * 1e-9
}
