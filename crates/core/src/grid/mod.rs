//! Velocity grids
//!
//! [`VelocityGrid`] is the dense output surface. [`PartialGrid`] is the
//! working state of the two-stage engine, where a cell is either set or not.

mod partial;
mod velocity;

pub use partial::PartialGrid;
pub use velocity::{GridStatistics, VelocityGrid};
