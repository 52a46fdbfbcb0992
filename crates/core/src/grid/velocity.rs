//! Dense velocity grid

use ndarray::{Array2, ArrayView1, ArrayView2, ArrayViewMut2};

use crate::error::{Error, Result};
use crate::geometry::GridGeometry;

/// A 2D velocity surface co-located with its [`GridGeometry`].
///
/// Indexed `(time_index, trace_index)`: rows follow the time axis, columns
/// follow the trace axis. Cells without an estimate hold NaN.
///
/// # Example
///
/// ```ignore
/// use velgrid_core::{GridGeometry, VelocityGrid};
///
/// let geometry = GridGeometry::from_axes(vec![0.0, 1.0], vec![0.0, 100.0, 200.0])?;
/// let grid = VelocityGrid::from_profile(geometry, &[1500.0, 1550.0, 1600.0])?;
/// assert_eq!(grid.get(1, 0)?, 1550.0);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct VelocityGrid {
    /// Values in row-major order (time, trace)
    data: Array2<f64>,
    geometry: GridGeometry,
}

impl VelocityGrid {
    /// Grid on `geometry` with every cell set to `value`
    pub fn filled(geometry: GridGeometry, value: f64) -> Self {
        Self {
            data: Array2::from_elem(geometry.shape(), value),
            geometry,
        }
    }

    /// Wrap an existing array; its shape must match the geometry.
    pub fn from_array(geometry: GridGeometry, data: Array2<f64>) -> Result<Self> {
        let (er, ec) = geometry.shape();
        let (ar, ac) = data.dim();
        if (er, ec) != (ar, ac) {
            return Err(Error::DimensionMismatch { er, ec, ar, ac });
        }
        Ok(Self { data, geometry })
    }

    /// Caller guarantees `data.dim() == geometry.shape()`.
    pub(crate) fn from_parts(geometry: GridGeometry, data: Array2<f64>) -> Self {
        debug_assert_eq!(data.dim(), geometry.shape());
        Self { data, geometry }
    }

    /// Build from row-major values.
    pub fn from_vec(geometry: GridGeometry, values: Vec<f64>) -> Result<Self> {
        let (er, ec) = geometry.shape();
        if values.len() != er * ec {
            return Err(Error::DimensionMismatch {
                er,
                ec,
                ar: values.len() / ec.max(1),
                ac: ec,
            });
        }
        let data = Array2::from_shape_vec((er, ec), values)
            .map_err(|e| Error::Interpolation(e.to_string()))?;
        Ok(Self { data, geometry })
    }

    /// Broadcast one time profile across every trace.
    ///
    /// `profile[i]` becomes the value of every cell in row `i`.
    pub fn from_profile(geometry: GridGeometry, profile: &[f64]) -> Result<Self> {
        let (rows, cols) = geometry.shape();
        if profile.len() != rows {
            return Err(Error::DimensionMismatch {
                er: rows,
                ec: cols,
                ar: profile.len(),
                ac: cols,
            });
        }
        let data = Array2::from_shape_fn((rows, cols), |(r, _)| profile[r]);
        Ok(Self { data, geometry })
    }

    // Dimensions

    /// Number of time samples
    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    /// Number of traces
    pub fn cols(&self) -> usize {
        self.data.ncols()
    }

    /// Dimensions as (samples, traces)
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn geometry(&self) -> &GridGeometry {
        &self.geometry
    }

    // Data access

    /// Value at (row, col)
    pub fn get(&self, row: usize, col: usize) -> Result<f64> {
        self.data
            .get((row, col))
            .copied()
            .ok_or(Error::IndexOutOfBounds {
                row,
                col,
                rows: self.rows(),
                cols: self.cols(),
            })
    }

    /// Set value at (row, col)
    pub fn set(&mut self, row: usize, col: usize, value: f64) -> Result<()> {
        if row >= self.rows() || col >= self.cols() {
            return Err(Error::IndexOutOfBounds {
                row,
                col,
                rows: self.rows(),
                cols: self.cols(),
            });
        }
        self.data[(row, col)] = value;
        Ok(())
    }

    /// Values of one trace, top to bottom
    pub fn column(&self, col: usize) -> Result<ArrayView1<'_, f64>> {
        if col >= self.cols() {
            return Err(Error::IndexOutOfBounds {
                row: 0,
                col,
                rows: self.rows(),
                cols: self.cols(),
            });
        }
        Ok(self.data.column(col))
    }

    /// Values of one time sample across all traces
    pub fn row(&self, row: usize) -> Result<ArrayView1<'_, f64>> {
        if row >= self.rows() {
            return Err(Error::IndexOutOfBounds {
                row,
                col: 0,
                rows: self.rows(),
                cols: self.cols(),
            });
        }
        Ok(self.data.row(row))
    }

    pub fn view(&self) -> ArrayView2<'_, f64> {
        self.data.view()
    }

    pub fn view_mut(&mut self) -> ArrayViewMut2<'_, f64> {
        self.data.view_mut()
    }

    pub fn data(&self) -> &Array2<f64> {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut Array2<f64> {
        &mut self.data
    }

    pub fn into_array(self) -> Array2<f64> {
        self.data
    }

    /// Same geometry, new values
    pub fn with_data(&self, data: Array2<f64>) -> Result<Self> {
        Self::from_array(self.geometry.clone(), data)
    }

    /// Raise every finite value below `floor` to `floor`. NaN cells stay NaN.
    pub fn clamp_min(&mut self, floor: f64) {
        self.data.mapv_inplace(|v| if v < floor { floor } else { v });
    }

    /// Number of cells without an estimate
    pub fn nan_count(&self) -> usize {
        self.data.iter().filter(|v| v.is_nan()).count()
    }

    // Statistics

    /// Min, max and mean over cells that hold a value
    pub fn statistics(&self) -> GridStatistics {
        let mut min: Option<f64> = None;
        let mut max: Option<f64> = None;
        let mut sum = 0.0;
        let mut count = 0usize;

        for &value in self.data.iter() {
            if value.is_nan() {
                continue;
            }
            min = Some(min.map_or(value, |m| m.min(value)));
            max = Some(max.map_or(value, |m| m.max(value)));
            sum += value;
            count += 1;
        }

        GridStatistics {
            min,
            max,
            mean: (count > 0).then(|| sum / count as f64),
            valid_count: count,
            nan_count: self.len() - count,
        }
    }
}

/// Basic statistics for a velocity grid
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridStatistics {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
    pub valid_count: usize,
    pub nan_count: usize,
}
