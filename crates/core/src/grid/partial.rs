//! Grid with explicitly unset cells

use ndarray::Array2;

use crate::error::{Error, Result};
use crate::geometry::GridGeometry;
use crate::grid::VelocityGrid;

/// Working grid whose cells are either set or unset.
///
/// Unset cells are `None` rather than a NaN sentinel, so arithmetic on the
/// grid cannot silently pick them up. NaN only appears once the grid is
/// converted into a [`VelocityGrid`].
#[derive(Debug, Clone, PartialEq)]
pub struct PartialGrid {
    cells: Array2<Option<f64>>,
    geometry: GridGeometry,
}

impl PartialGrid {
    /// Grid on `geometry` with every cell unset
    pub fn new(geometry: GridGeometry) -> Self {
        Self {
            cells: Array2::from_elem(geometry.shape(), None),
            geometry,
        }
    }

    pub fn geometry(&self) -> &GridGeometry {
        &self.geometry
    }

    /// Dimensions as (samples, traces)
    pub fn shape(&self) -> (usize, usize) {
        self.cells.dim()
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        self.cells.get((row, col)).copied().flatten()
    }

    pub fn set(&mut self, row: usize, col: usize, value: f64) -> Result<()> {
        let (rows, cols) = self.shape();
        let cell = self
            .cells
            .get_mut((row, col))
            .ok_or(Error::IndexOutOfBounds { row, col, rows, cols })?;
        *cell = Some(value);
        Ok(())
    }

    /// Overwrite a whole column.
    pub fn set_column(&mut self, col: usize, values: &[f64]) -> Result<()> {
        let (rows, cols) = self.shape();
        if col >= cols {
            return Err(Error::IndexOutOfBounds { row: 0, col, rows, cols });
        }
        if values.len() != rows {
            return Err(Error::DimensionMismatch {
                er: rows,
                ec: 1,
                ar: values.len(),
                ac: 1,
            });
        }
        for (cell, &v) in self.cells.column_mut(col).iter_mut().zip(values) {
            *cell = Some(v);
        }
        Ok(())
    }

    /// Column values when every cell in the column is set.
    pub fn column(&self, col: usize) -> Option<Vec<f64>> {
        if col >= self.shape().1 {
            return None;
        }
        self.cells.column(col).iter().copied().collect()
    }

    /// Whether every cell of `col` is set
    pub fn is_column_filled(&self, col: usize) -> bool {
        col < self.shape().1 && self.cells.column(col).iter().all(Option::is_some)
    }

    /// Indices of fully set columns, ascending
    pub fn filled_columns(&self) -> Vec<usize> {
        (0..self.shape().1)
            .filter(|&c| self.is_column_filled(c))
            .collect()
    }

    pub fn set_count(&self) -> usize {
        self.cells.iter().filter(|c| c.is_some()).count()
    }

    pub fn unset_count(&self) -> usize {
        self.cells.len() - self.set_count()
    }

    pub fn is_complete(&self) -> bool {
        self.cells.iter().all(Option::is_some)
    }

    /// Set cells as `((row, col), value)`, row-major.
    pub fn set_cells(&self) -> impl Iterator<Item = ((usize, usize), f64)> + '_ {
        self.cells
            .indexed_iter()
            .filter_map(|(idx, cell)| cell.map(|v| (idx, v)))
    }

    /// Positions of unset cells, row-major.
    pub fn unset_cells(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.cells
            .indexed_iter()
            .filter_map(|(idx, cell)| cell.is_none().then_some(idx))
    }

    /// Dense grid with NaN in every unset cell.
    pub fn into_velocity_grid(self) -> VelocityGrid {
        let data = self.cells.mapv(|c| c.unwrap_or(f64::NAN));
        VelocityGrid::from_parts(self.geometry, data)
    }
}
