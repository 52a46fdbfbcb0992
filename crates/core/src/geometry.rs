//! Grid geometry: the trace and time axes a velocity grid is sampled on

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::pick::PickSet;

/// Sampling geometry of a seismic volume, in the units the core works in.
///
/// Trace numbering starts at `first_trace` (0 unless the caller says otherwise)
/// and advances by one per trace.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeismicDimensions {
    pub sample_count: usize,
    pub trace_count: usize,
    pub sample_interval_ms: f64,
    pub start_time_ms: f64,
    pub first_trace: f64,
}

impl SeismicDimensions {
    pub fn new(
        sample_count: usize,
        trace_count: usize,
        sample_interval_ms: f64,
        start_time_ms: f64,
    ) -> Self {
        Self {
            sample_count,
            trace_count,
            sample_interval_ms,
            start_time_ms,
            first_trace: 0.0,
        }
    }

    /// Build from header values as a seismic reader reports them
    /// (sample interval in microseconds).
    pub fn from_header(
        sample_count: usize,
        trace_count: usize,
        sample_interval_us: f64,
        start_delay_ms: f64,
    ) -> Self {
        Self::new(
            sample_count,
            trace_count,
            sample_interval_us / 1000.0,
            start_delay_ms,
        )
    }

    pub fn with_first_trace(mut self, first_trace: f64) -> Self {
        self.first_trace = first_trace;
        self
    }

    /// Time of the last sample
    pub fn end_time_ms(&self) -> f64 {
        self.start_time_ms + self.sample_count.saturating_sub(1) as f64 * self.sample_interval_ms
    }

    /// Inclusive trace range covered by the volume
    pub fn trace_range(&self) -> (f64, f64) {
        (
            self.first_trace,
            self.first_trace + self.trace_count.saturating_sub(1) as f64,
        )
    }

    /// Shape of a grid matching this volume, as (samples, traces)
    pub fn shape(&self) -> (usize, usize) {
        (self.sample_count, self.trace_count)
    }

    /// Reject empty volumes and non-finite or non-positive sampling.
    pub fn validate(&self) -> Result<()> {
        if self.sample_count == 0 || self.trace_count == 0 {
            return Err(Error::Geometry(format!(
                "seismic volume has {} samples x {} traces",
                self.sample_count, self.trace_count
            )));
        }
        if !self.sample_interval_ms.is_finite() || self.sample_interval_ms <= 0.0 {
            return Err(Error::Geometry(format!(
                "sample interval must be positive, got {} ms",
                self.sample_interval_ms
            )));
        }
        if !self.start_time_ms.is_finite() || !self.first_trace.is_finite() {
            return Err(Error::Geometry("start time and first trace must be finite".into()));
        }
        Ok(())
    }
}

/// Immutable pair of axes describing where grid cells sit.
///
/// Rows of a velocity grid follow `time_axis`, columns follow `trace_axis`.
/// Both axes are non-decreasing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridGeometry {
    trace_axis: Vec<f64>,
    time_axis: Vec<f64>,
    sample_interval_ms: f64,
    start_time_ms: f64,
}

impl GridGeometry {
    /// Build from explicit axes.
    pub fn from_axes(trace_axis: Vec<f64>, time_axis: Vec<f64>) -> Result<Self> {
        check_axis("trace", &trace_axis)?;
        check_axis("time", &time_axis)?;
        let start_time_ms = time_axis[0];
        let sample_interval_ms = if time_axis.len() > 1 {
            time_axis[1] - time_axis[0]
        } else {
            0.0
        };
        Ok(Self {
            trace_axis,
            time_axis,
            sample_interval_ms,
            start_time_ms,
        })
    }

    /// Derive the output geometry for a pick set.
    ///
    /// With seismic dimensions the axes have exactly `trace_count` and
    /// `sample_count` entries: traces span the union of the volume's trace
    /// range and the pick range, times run from the volume start time at the
    /// volume sample interval. Without them, traces step by 1.0 and times by
    /// `min(5 ms, time range / 200)` across the pick extents.
    pub fn from_picks(picks: &PickSet, dims: Option<&SeismicDimensions>) -> Result<Self> {
        let (Some(trace_range), Some(time_range)) = (picks.trace_extent(), picks.time_extent())
        else {
            return Err(Error::Geometry("pick set is empty".into()));
        };

        match dims {
            Some(dims) => Self::for_dimensions(dims, trace_range),
            None => Self::from_extents(trace_range, time_range),
        }
    }

    /// Geometry for a seismic volume, widened to cover `pick_traces`.
    pub fn for_dimensions(dims: &SeismicDimensions, pick_traces: (f64, f64)) -> Result<Self> {
        dims.validate()?;
        let (vol_min, vol_max) = dims.trace_range();
        let min_trace = vol_min.min(pick_traces.0);
        let max_trace = vol_max.max(pick_traces.1);
        if dims.trace_count > 1 && min_trace >= max_trace {
            return Err(Error::Geometry(format!(
                "degenerate trace range [{min_trace}, {max_trace}]"
            )));
        }

        let trace_axis = linspace(min_trace, max_trace, dims.trace_count);
        let time_axis = linspace(dims.start_time_ms, dims.end_time_ms(), dims.sample_count);

        Ok(Self {
            trace_axis,
            time_axis,
            sample_interval_ms: dims.sample_interval_ms,
            start_time_ms: dims.start_time_ms,
        })
    }

    /// Heuristic geometry covering the given extents.
    pub fn from_extents(trace_range: (f64, f64), time_range: (f64, f64)) -> Result<Self> {
        let (min_trace, max_trace) = trace_range;
        let (min_time, max_time) = time_range;
        if !(min_trace < max_trace) {
            return Err(Error::Geometry(format!(
                "trace range [{min_trace}, {max_trace}] is empty; picks must span at least two traces"
            )));
        }
        if !(min_time < max_time) {
            return Err(Error::Geometry(format!(
                "time range [{min_time}, {max_time}] ms is empty; picks must span at least two times"
            )));
        }

        let trace_step = 1.0;
        let time_step = f64::min(5.0, (max_time - min_time) / 200.0);

        Ok(Self {
            trace_axis: arange(min_trace, max_trace + trace_step, trace_step),
            time_axis: arange(min_time, max_time + time_step, time_step),
            sample_interval_ms: time_step,
            start_time_ms: min_time,
        })
    }

    /// Same extents, different sample counts.
    pub fn resized(&self, trace_count: usize, sample_count: usize) -> Result<Self> {
        if trace_count == 0 || sample_count == 0 {
            return Err(Error::Geometry(format!(
                "cannot resize to {sample_count} samples x {trace_count} traces"
            )));
        }
        let (t0, t1) = self.trace_extent();
        let (s0, s1) = self.time_extent();
        let time_axis = linspace(s0, s1, sample_count);
        let sample_interval_ms = if sample_count > 1 {
            time_axis[1] - time_axis[0]
        } else {
            self.sample_interval_ms
        };
        Ok(Self {
            trace_axis: linspace(t0, t1, trace_count),
            time_axis,
            sample_interval_ms,
            start_time_ms: s0,
        })
    }

    // Dimensions

    pub fn trace_axis(&self) -> &[f64] {
        &self.trace_axis
    }

    pub fn time_axis(&self) -> &[f64] {
        &self.time_axis
    }

    pub fn trace_count(&self) -> usize {
        self.trace_axis.len()
    }

    pub fn sample_count(&self) -> usize {
        self.time_axis.len()
    }

    /// Grid shape as (samples, traces)
    pub fn shape(&self) -> (usize, usize) {
        (self.sample_count(), self.trace_count())
    }

    pub fn sample_interval_ms(&self) -> f64 {
        self.sample_interval_ms
    }

    pub fn start_time_ms(&self) -> f64 {
        self.start_time_ms
    }

    pub fn trace_extent(&self) -> (f64, f64) {
        (self.trace_axis[0], self.trace_axis[self.trace_axis.len() - 1])
    }

    pub fn time_extent(&self) -> (f64, f64) {
        (self.time_axis[0], self.time_axis[self.time_axis.len() - 1])
    }

    /// Whether a grid on this geometry already has the volume's trace and sample counts
    pub fn matches(&self, dims: &SeismicDimensions) -> bool {
        self.shape() == dims.shape()
    }

    /// Column whose trace value is closest to `trace` (first one on ties).
    pub fn nearest_trace_index(&self, trace: f64) -> usize {
        nearest_index(&self.trace_axis, trace)
    }

    /// Cell centres in row-major order as `[trace, time]`.
    pub fn mesh(&self) -> Vec<[f64; 2]> {
        self.time_axis
            .iter()
            .flat_map(|&t| self.trace_axis.iter().map(move |&x| [x, t]))
            .collect()
    }
}

/// Index of the element closest to `value`; the first one wins ties.
pub fn nearest_index(axis: &[f64], value: f64) -> usize {
    let mut best = 0;
    let mut best_dist = f64::INFINITY;
    for (i, &a) in axis.iter().enumerate() {
        let d = (a - value).abs();
        if d < best_dist {
            best_dist = d;
            best = i;
        }
    }
    best
}

/// `n` evenly spaced values from `start` to `stop` inclusive.
pub fn linspace(start: f64, stop: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (n - 1) as f64;
            let mut axis: Vec<f64> = (0..n).map(|i| start + i as f64 * step).collect();
            axis[n - 1] = stop;
            axis
        }
    }
}

/// Values `start, start + step, ...` strictly below `stop`.
pub fn arange(start: f64, stop: f64, step: f64) -> Vec<f64> {
    if !(step > 0.0) || !(stop > start) {
        return Vec::new();
    }
    // Guard against ratios like 201.0000000001 producing a spurious extra sample
    let n = ((stop - start) / step - 1e-9).ceil().max(0.0) as usize;
    (0..n).map(|i| start + i as f64 * step).collect()
}

fn check_axis(name: &str, axis: &[f64]) -> Result<()> {
    if axis.is_empty() {
        return Err(Error::Geometry(format!("{name} axis is empty")));
    }
    if axis.iter().any(|v| !v.is_finite()) {
        return Err(Error::Geometry(format!("{name} axis contains non-finite values")));
    }
    if axis.windows(2).any(|w| w[1] < w[0]) {
        return Err(Error::Geometry(format!("{name} axis must be non-decreasing")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pick::Pick;

    fn picks() -> PickSet {
        PickSet::new(vec![
            Pick::new(3.0, 100.0, 1500.0),
            Pick::new(8.0, 1100.0, 2500.0),
            Pick::new(5.0, 600.0, 2000.0),
        ])
        .unwrap()
    }

    #[test]
    fn test_linspace() {
        assert_eq!(linspace(0.0, 10.0, 3), vec![0.0, 5.0, 10.0]);
        assert_eq!(linspace(2.0, 9.0, 1), vec![2.0]);
        assert!(linspace(0.0, 1.0, 0).is_empty());
        let axis = linspace(0.1, 0.7, 7);
        assert_eq!(*axis.last().unwrap(), 0.7);
    }

    #[test]
    fn test_arange() {
        assert_eq!(arange(0.0, 3.0, 1.0), vec![0.0, 1.0, 2.0]);
        assert_eq!(arange(0.0, 1005.0, 5.0).len(), 201);
        assert!(arange(1.0, 1.0, 1.0).is_empty());
        assert!(arange(0.0, 1.0, 0.0).is_empty());
    }

    #[test]
    fn test_heuristic_geometry() {
        let g = GridGeometry::from_picks(&picks(), None).unwrap();
        // traces 3..=8 at 1.0 spacing
        assert_eq!(g.trace_axis(), &[3.0, 4.0, 5.0, 6.0, 7.0, 8.0]);
        // range 1000 ms → step min(5, 1000/200) = 5 ms
        assert_eq!(g.sample_interval_ms(), 5.0);
        assert_eq!(g.sample_count(), 201);
        assert_eq!(g.time_extent(), (100.0, 1100.0));
    }

    #[test]
    fn test_heuristic_small_time_range() {
        let p = PickSet::new(vec![
            Pick::new(0.0, 0.0, 1500.0),
            Pick::new(2.0, 100.0, 1600.0),
        ])
        .unwrap();
        let g = GridGeometry::from_picks(&p, None).unwrap();
        assert!((g.sample_interval_ms() - 0.5).abs() < 1e-12);
        assert_eq!(g.sample_count(), 201);
    }

    #[test]
    fn test_authoritative_geometry_shape() {
        let dims = SeismicDimensions::from_header(500, 40, 4000.0, 0.0);
        assert_eq!(dims.sample_interval_ms, 4.0);
        let g = GridGeometry::from_picks(&picks(), Some(&dims)).unwrap();
        assert_eq!(g.shape(), (500, 40));
        assert_eq!(g.time_extent(), (0.0, 499.0 * 4.0));
        assert!(g.matches(&dims));
    }

    #[test]
    fn test_authoritative_union_of_trace_ranges() {
        // volume covers traces 0..=3, picks reach trace 8
        let dims = SeismicDimensions::new(10, 4, 2.0, 50.0);
        let g = GridGeometry::from_picks(&picks(), Some(&dims)).unwrap();
        assert_eq!(g.trace_extent(), (0.0, 8.0));
        assert_eq!(g.trace_count(), 4);
        assert_eq!(g.start_time_ms(), 50.0);
    }

    #[test]
    fn test_geometry_errors() {
        assert!(matches!(
            GridGeometry::from_picks(&PickSet::default(), None),
            Err(Error::Geometry(_))
        ));

        let one_trace = PickSet::new(vec![
            Pick::new(1.0, 0.0, 1500.0),
            Pick::new(1.0, 100.0, 1600.0),
        ])
        .unwrap();
        assert!(GridGeometry::from_picks(&one_trace, None).is_err());

        let one_time = PickSet::new(vec![
            Pick::new(1.0, 100.0, 1500.0),
            Pick::new(2.0, 100.0, 1600.0),
        ])
        .unwrap();
        assert!(GridGeometry::from_picks(&one_time, None).is_err());

        let bad_dims = SeismicDimensions::new(0, 10, 4.0, 0.0);
        assert!(GridGeometry::from_picks(&picks(), Some(&bad_dims)).is_err());
    }

    #[test]
    fn test_from_axes_validation() {
        assert!(GridGeometry::from_axes(vec![0.0, 1.0], vec![0.0, 4.0, 8.0]).is_ok());
        assert!(GridGeometry::from_axes(vec![1.0, 0.0], vec![0.0]).is_err());
        assert!(GridGeometry::from_axes(vec![], vec![0.0]).is_err());
        assert!(GridGeometry::from_axes(vec![0.0], vec![f64::NAN]).is_err());
    }

    #[test]
    fn test_resized_keeps_extents() {
        let g = GridGeometry::from_axes(linspace(0.0, 10.0, 11), linspace(0.0, 100.0, 21)).unwrap();
        let r = g.resized(5, 3).unwrap();
        assert_eq!(r.trace_axis(), &[0.0, 2.5, 5.0, 7.5, 10.0]);
        assert_eq!(r.time_axis(), &[0.0, 50.0, 100.0]);
        assert_eq!(r.sample_interval_ms(), 50.0);
        assert!(g.resized(0, 3).is_err());
    }

    #[test]
    fn test_nearest_trace_index() {
        let g = GridGeometry::from_axes(vec![0.0, 1.0, 2.0, 3.0], vec![0.0]).unwrap();
        assert_eq!(g.nearest_trace_index(2.2), 2);
        assert_eq!(g.nearest_trace_index(-5.0), 0);
        // Tie between 0 and 1 goes to the first
        assert_eq!(g.nearest_trace_index(0.5), 0);
    }

    #[test]
    fn test_mesh_order() {
        let g = GridGeometry::from_axes(vec![0.0, 1.0], vec![10.0, 20.0]).unwrap();
        assert_eq!(
            g.mesh(),
            vec![[0.0, 10.0], [1.0, 10.0], [0.0, 20.0], [1.0, 20.0]]
        );
    }
}
