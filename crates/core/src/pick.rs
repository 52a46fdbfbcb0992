//! Velocity picks: sparse (trace, time, velocity) observations

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A single observed velocity sample.
///
/// `trace` may be fractional; `time_ms` is two-way travel time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pick {
    pub trace: f64,
    pub time_ms: f64,
    pub velocity: f64,
}

impl Pick {
    pub fn new(trace: f64, time_ms: f64, velocity: f64) -> Self {
        Self {
            trace,
            time_ms,
            velocity,
        }
    }

    fn validate(&self) -> Result<()> {
        if !self.trace.is_finite() || !self.time_ms.is_finite() {
            return Err(Error::invalid_parameter(
                "pick",
                format!("({}, {})", self.trace, self.time_ms),
                "trace and time must be finite",
            ));
        }
        if !self.velocity.is_finite() || self.velocity <= 0.0 {
            return Err(Error::invalid_parameter(
                "velocity",
                self.velocity,
                "velocity must be finite and positive",
            ));
        }
        Ok(())
    }
}

/// An ordered collection of picks.
///
/// Order does not affect any result and `(trace, time)` duplicates are allowed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PickSet {
    picks: Vec<Pick>,
}

/// Extents of a pick set
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PickSummary {
    pub count: usize,
    pub trace_range: (f64, f64),
    pub time_range: (f64, f64),
    pub velocity_range: (f64, f64),
}

impl PickSet {
    /// Build a pick set, rejecting non-finite coordinates and non-positive velocities.
    pub fn new(picks: Vec<Pick>) -> Result<Self> {
        for p in &picks {
            p.validate()?;
        }
        Ok(Self { picks })
    }

    /// Build from parallel trace/time/velocity columns.
    pub fn from_columns(traces: &[f64], times: &[f64], velocities: &[f64]) -> Result<Self> {
        if traces.len() != times.len() || traces.len() != velocities.len() {
            return Err(Error::invalid_parameter(
                "columns",
                format!("{}/{}/{}", traces.len(), times.len(), velocities.len()),
                "trace, time and velocity columns must have equal length",
            ));
        }
        let picks = traces
            .iter()
            .zip(times)
            .zip(velocities)
            .map(|((&trace, &time_ms), &velocity)| Pick::new(trace, time_ms, velocity))
            .collect();
        Self::new(picks)
    }

    pub fn len(&self) -> usize {
        self.picks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.picks.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Pick> {
        self.picks.iter()
    }

    pub fn as_slice(&self) -> &[Pick] {
        &self.picks
    }

    pub fn get(&self, index: usize) -> Option<&Pick> {
        self.picks.get(index)
    }

    // Editing

    /// Append a pick.
    pub fn push(&mut self, pick: Pick) -> Result<()> {
        pick.validate()?;
        self.picks.push(pick);
        Ok(())
    }

    /// Change the velocity of an existing pick, returning the previous value.
    pub fn update_velocity(&mut self, index: usize, velocity: f64) -> Result<f64> {
        let len = self.picks.len();
        let pick = self.picks.get_mut(index).ok_or(Error::IndexOutOfBounds {
            row: index,
            col: 0,
            rows: len,
            cols: 1,
        })?;
        Pick::new(pick.trace, pick.time_ms, velocity).validate()?;
        Ok(std::mem::replace(&mut pick.velocity, velocity))
    }

    /// Remove and return a pick.
    pub fn remove(&mut self, index: usize) -> Option<Pick> {
        (index < self.picks.len()).then(|| self.picks.remove(index))
    }

    /// Find the pick closest to `(trace, time_ms)` under a tolerance-normalised
    /// distance. A pick qualifies when the normalised distance is at most 1.5.
    ///
    /// Returns the index and normalised distance.
    pub fn find_nearest(
        &self,
        trace: f64,
        time_ms: f64,
        trace_tolerance: f64,
        time_tolerance: f64,
    ) -> Option<(usize, f64)> {
        let (index, distance) = self
            .picks
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let dt = (p.trace - trace) / trace_tolerance;
                let dw = (p.time_ms - time_ms) / time_tolerance;
                (i, (dt * dt + dw * dw).sqrt())
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))?;

        (distance <= 1.5).then_some((index, distance))
    }

    // Extents

    pub fn trace_extent(&self) -> Option<(f64, f64)> {
        extent(self.picks.iter().map(|p| p.trace))
    }

    pub fn time_extent(&self) -> Option<(f64, f64)> {
        extent(self.picks.iter().map(|p| p.time_ms))
    }

    pub fn velocity_extent(&self) -> Option<(f64, f64)> {
        extent(self.picks.iter().map(|p| p.velocity))
    }

    pub fn summary(&self) -> Option<PickSummary> {
        Some(PickSummary {
            count: self.picks.len(),
            trace_range: self.trace_extent()?,
            time_range: self.time_extent()?,
            velocity_range: self.velocity_extent()?,
        })
    }

    // Per-trace views

    /// Distinct trace values in ascending order.
    pub fn unique_traces(&self) -> Vec<f64> {
        let mut traces: Vec<f64> = self.picks.iter().map(|p| p.trace).collect();
        traces.sort_by(f64::total_cmp);
        traces.dedup();
        traces
    }

    /// `(time, velocity)` pairs recorded on exactly `trace`, sorted by time.
    pub fn profile(&self, trace: f64) -> Vec<(f64, f64)> {
        let mut profile: Vec<(f64, f64)> = self
            .picks
            .iter()
            .filter(|p| p.trace == trace)
            .map(|p| (p.time_ms, p.velocity))
            .collect();
        profile.sort_by(|a, b| a.0.total_cmp(&b.0));
        profile
    }

    pub fn times(&self) -> Vec<f64> {
        self.picks.iter().map(|p| p.time_ms).collect()
    }

    pub fn velocities(&self) -> Vec<f64> {
        self.picks.iter().map(|p| p.velocity).collect()
    }
}

impl<'a> IntoIterator for &'a PickSet {
    type Item = &'a Pick;
    type IntoIter = std::slice::Iter<'a, Pick>;

    fn into_iter(self) -> Self::IntoIter {
        self.picks.iter()
    }
}

fn extent(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    values.fold(None, |acc, v| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> PickSet {
        PickSet::new(vec![
            Pick::new(10.0, 200.0, 1600.0),
            Pick::new(10.0, 100.0, 1500.0),
            Pick::new(20.0, 150.0, 1550.0),
            Pick::new(5.0, 400.0, 2100.0),
        ])
        .unwrap()
    }

    #[test]
    fn test_rejects_bad_velocity() {
        assert!(PickSet::new(vec![Pick::new(1.0, 1.0, 0.0)]).is_err());
        assert!(PickSet::new(vec![Pick::new(1.0, 1.0, -5.0)]).is_err());
        assert!(PickSet::new(vec![Pick::new(f64::NAN, 1.0, 1500.0)]).is_err());
    }

    #[test]
    fn test_from_columns_length_mismatch() {
        assert!(PickSet::from_columns(&[1.0], &[1.0, 2.0], &[1500.0]).is_err());
    }

    #[test]
    fn test_extents_and_summary() {
        let picks = sample();
        assert_eq!(picks.trace_extent(), Some((5.0, 20.0)));
        assert_eq!(picks.time_extent(), Some((100.0, 400.0)));
        let s = picks.summary().unwrap();
        assert_eq!(s.count, 4);
        assert_eq!(s.velocity_range, (1500.0, 2100.0));
        assert!(PickSet::default().summary().is_none());
    }

    #[test]
    fn test_unique_traces_and_profile() {
        let picks = sample();
        assert_eq!(picks.unique_traces(), vec![5.0, 10.0, 20.0]);
        assert_eq!(picks.profile(10.0), vec![(100.0, 1500.0), (200.0, 1600.0)]);
        assert!(picks.profile(11.0).is_empty());
    }

    #[test]
    fn test_editing() {
        let mut picks = sample();
        picks.push(Pick::new(30.0, 50.0, 1480.0)).unwrap();
        assert_eq!(picks.len(), 5);

        let old = picks.update_velocity(0, 1650.0).unwrap();
        assert_eq!(old, 1600.0);
        assert_eq!(picks.get(0).unwrap().velocity, 1650.0);
        assert!(picks.update_velocity(99, 1650.0).is_err());
        assert!(picks.update_velocity(0, -1.0).is_err());

        let removed = picks.remove(4).unwrap();
        assert_eq!(removed.trace, 30.0);
        assert!(picks.remove(4).is_none());
    }

    #[test]
    fn test_find_nearest() {
        let picks = sample();
        let (idx, d) = picks.find_nearest(11.0, 205.0, 10.0, 20.0).unwrap();
        assert_eq!(idx, 0);
        assert!(d < 1.0);

        // Far from everything
        assert!(picks.find_nearest(100.0, 5000.0, 10.0, 20.0).is_none());
        assert!(PickSet::default().find_nearest(0.0, 0.0, 10.0, 20.0).is_none());
    }
}
