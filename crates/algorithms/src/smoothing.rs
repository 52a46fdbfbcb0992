//! Gaussian smoothing of velocity grids
//!
//! Separable 2D blur with an odd kernel of `max(3, ⌊b·10⌋ + 1)` taps (rounded
//! up to odd) for blur strength `b`. The standard deviation follows the
//! usual rule for a kernel size `n`:
//! ```text
//! σ = 0.3 · ((n - 1)/2 - 1) + 0.8
//! ```
//! with the binomial tables for `n ≤ 7`. Borders reflect without repeating
//! the edge cell (`dcb|abcd|cba`). NaN cells stay NaN and are left out of
//! their neighbours' weighted sums, which are renormalised.

use ndarray::Array2;
use velgrid_core::{Error, Result, VelocityGrid};

use crate::maybe_rayon::*;

/// Smallest kernel the operator will use
pub const MIN_KERNEL_SIZE: usize = 3;

/// Odd kernel size for blur strength `blur`.
///
/// # Errors
/// [`Error::InvalidParameter`] for negative or non-finite strengths.
pub fn kernel_size(blur: f64) -> Result<usize> {
    if !blur.is_finite() || blur < 0.0 {
        return Err(Error::InvalidParameter {
            name: "blur",
            value: blur.to_string(),
            reason: "blur strength must be finite and non-negative".into(),
        });
    }
    let size = ((blur * 10.0).floor() as usize + 1).max(MIN_KERNEL_SIZE);
    Ok(if size % 2 == 0 { size + 1 } else { size })
}

/// Normalised 1D Gaussian weights for an odd `size`.
pub fn gaussian_kernel(size: usize) -> Vec<f64> {
    match size {
        1 => return vec![1.0],
        3 => return vec![0.25, 0.5, 0.25],
        5 => return vec![0.0625, 0.25, 0.375, 0.25, 0.0625],
        7 => {
            return vec![0.03125, 0.109375, 0.21875, 0.28125, 0.21875, 0.109375, 0.03125];
        }
        _ => {}
    }

    let sigma = 0.3 * ((size as f64 - 1.0) * 0.5 - 1.0) + 0.8;
    let half = (size / 2) as f64;
    let denom = 2.0 * sigma * sigma;
    let mut kernel: Vec<f64> = (0..size)
        .map(|i| {
            let x = i as f64 - half;
            (-x * x / denom).exp()
        })
        .collect();

    let sum: f64 = kernel.iter().sum();
    for v in &mut kernel {
        *v /= sum;
    }
    kernel
}

/// Blur `grid` with strength `blur`, returning a new grid.
pub fn gaussian_blur(grid: &VelocityGrid, blur: f64) -> Result<VelocityGrid> {
    let size = kernel_size(blur)?;
    grid.with_data(blur_array(grid.data(), size)?)
}

/// Separable blur of `data` with a `size`-tap kernel.
pub fn blur_array(data: &Array2<f64>, size: usize) -> Result<Array2<f64>> {
    let (rows, cols) = data.dim();
    if rows == 0 || cols == 0 {
        return Ok(data.clone());
    }
    let kernel = gaussian_kernel(size);
    let half = (kernel.len() / 2) as isize;

    // Row pass
    let row_smoothed: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            (0..cols)
                .map(|col| {
                    if data[[row, col]].is_nan() {
                        return f64::NAN;
                    }
                    weighted(&kernel, |ki| {
                        let c = reflect_101(col as isize + ki as isize - half, cols);
                        data[[row, c]]
                    })
                })
                .collect::<Vec<f64>>()
        })
        .collect();

    // Column pass
    let col_smoothed: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            (0..cols)
                .map(|col| {
                    if row_smoothed[row * cols + col].is_nan() {
                        return f64::NAN;
                    }
                    weighted(&kernel, |ki| {
                        let r = reflect_101(row as isize + ki as isize - half, rows);
                        row_smoothed[r * cols + col]
                    })
                })
                .collect::<Vec<f64>>()
        })
        .collect();

    Array2::from_shape_vec((rows, cols), col_smoothed).map_err(|e| Error::Interpolation(format!("blur output shape: {e}")))
}

/// Kernel-weighted mean of the non-NaN samples `sample(0..kernel.len())`
#[inline]
fn weighted(kernel: &[f64], sample: impl Fn(usize) -> f64) -> f64 {
    let mut sum = 0.0;
    let mut wsum = 0.0;
    for (ki, &kw) in kernel.iter().enumerate() {
        let v = sample(ki);
        if !v.is_nan() {
            sum += kw * v;
            wsum += kw;
        }
    }
    if wsum > 0.0 { sum / wsum } else { f64::NAN }
}

/// Reflect an out-of-range index back into `0..len` without repeating the edge.
fn reflect_101(mut p: isize, len: usize) -> usize {
    if len == 1 {
        return 0;
    }
    let len = len as isize;
    while p < 0 || p >= len {
        if p < 0 {
            p = -p;
        } else {
            p = 2 * len - 2 - p;
        }
    }
    p as usize
}
