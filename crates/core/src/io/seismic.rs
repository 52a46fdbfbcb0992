//! Seismic volume metadata
//!
//! Reading SEG-Y itself is left to the embedding application; the core only
//! needs the sampling geometry and, for text export, per-trace coordinates.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::geometry::SeismicDimensions;

/// What the core needs to know about a loaded seismic volume.
pub trait SeismicVolume {
    fn sample_count(&self) -> usize;
    fn trace_count(&self) -> usize;
    /// Sample interval in microseconds, as stored in the trace headers
    fn sample_interval_us(&self) -> f64;
    /// Recording delay in milliseconds
    fn start_delay_ms(&self) -> f64;

    /// Source coordinates per trace, if the container carries them
    fn trace_coordinates(&self) -> Option<&[(f64, f64)]> {
        None
    }

    /// Sampling geometry in core units
    fn dimensions(&self) -> SeismicDimensions {
        SeismicDimensions::from_header(
            self.sample_count(),
            self.trace_count(),
            self.sample_interval_us(),
            self.start_delay_ms(),
        )
    }
}

/// In-memory [`SeismicVolume`] built from header values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeismicHeader {
    pub sample_count: usize,
    pub trace_count: usize,
    pub sample_interval_us: f64,
    pub start_delay_ms: f64,
    #[serde(default)]
    pub coordinates: Option<Vec<(f64, f64)>>,
}

impl SeismicHeader {
    pub fn new(sample_count: usize, trace_count: usize, sample_interval_us: f64, start_delay_ms: f64) -> Self {
        Self {
            sample_count,
            trace_count,
            sample_interval_us,
            start_delay_ms,
            coordinates: None,
        }
    }

    /// Attach per-trace `(x, y)` coordinates; one pair per trace.
    pub fn with_coordinates(mut self, coordinates: Vec<(f64, f64)>) -> Result<Self> {
        if coordinates.len() != self.trace_count {
            return Err(Error::DimensionMismatch {
                er: self.trace_count,
                ec: 2,
                ar: coordinates.len(),
                ac: 2,
            });
        }
        self.coordinates = Some(coordinates);
        Ok(self)
    }
}

impl SeismicVolume for SeismicHeader {
    fn sample_count(&self) -> usize {
        self.sample_count
    }

    fn trace_count(&self) -> usize {
        self.trace_count
    }

    fn sample_interval_us(&self) -> f64 {
        self.sample_interval_us
    }

    fn start_delay_ms(&self) -> f64 {
        self.start_delay_ms
    }

    fn trace_coordinates(&self) -> Option<&[(f64, f64)]> {
        self.coordinates.as_deref()
    }
}
