//! Progress reporting and cooperative cancellation

use crate::error::{Error, Result};

/// Receives `(percent, message)` updates from a running computation.
///
/// Called inline on the computing thread, so implementations must return quickly.
pub trait ProgressSink {
    fn report(&mut self, percent: u8, message: &str);
}

impl<F> ProgressSink for F
where
    F: FnMut(u8, &str),
{
    fn report(&mut self, percent: u8, message: &str) {
        self(percent, message)
    }
}

/// Sink that drops every update
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&mut self, _percent: u8, _message: &str) {}
}

/// Polled between units of work; returning `true` stops the computation.
///
/// Must be `Sync` because per-trace workers poll it from several threads.
pub trait CancelCheck: Sync {
    fn is_cancelled(&self) -> bool;
}

impl<F> CancelCheck for F
where
    F: Fn() -> bool + Sync,
{
    fn is_cancelled(&self) -> bool {
        self()
    }
}

/// Cancellation source that never fires
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverCancel;

impl CancelCheck for NeverCancel {
    fn is_cancelled(&self) -> bool {
        false
    }
}

/// Couples a progress sink with a cancellation source.
///
/// Every milestone polls cancellation *before* reporting, so a cancelled run
/// never emits another progress update. Reported percentages never decrease
/// and never exceed 100.
pub struct Checkpoint<'a> {
    sink: &'a mut dyn ProgressSink,
    cancel: &'a dyn CancelCheck,
    last: Option<u8>,
}

impl<'a> Checkpoint<'a> {
    pub fn new(sink: &'a mut dyn ProgressSink, cancel: &'a dyn CancelCheck) -> Self {
        Self {
            sink,
            cancel,
            last: None,
        }
    }

    /// Check for cancellation, then report `percent`.
    pub fn milestone(&mut self, percent: u8, message: &str) -> Result<()> {
        self.check()?;
        let percent = percent.min(100).max(self.last.unwrap_or(0));
        self.last = Some(percent);
        self.sink.report(percent, message);
        Ok(())
    }

    /// Report progress `done / total` of the way through `[start, end]`.
    pub fn step(&mut self, start: u8, end: u8, done: usize, total: usize, message: &str) -> Result<()> {
        let span = end.saturating_sub(start) as usize;
        let offset = if total == 0 { span } else { span * done.min(total) / total };
        self.milestone(start.saturating_add(offset as u8), message)
    }

    /// Fail with [`Error::Cancelled`] if the source has fired.
    pub fn check(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Cancellation source, for handing to worker threads
    pub fn cancel_source(&self) -> &'a dyn CancelCheck {
        self.cancel
    }

    /// Last reported percentage
    pub fn last_percent(&self) -> Option<u8> {
        self.last
    }

    /// Report 100%.
    pub fn finish(&mut self, message: &str) -> Result<()> {
        self.milestone(100, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn test_milestones_are_monotonic() {
        let mut seen = Vec::new();
        let mut sink = |p: u8, _: &str| seen.push(p);
        {
            let mut cp = Checkpoint::new(&mut sink, &NeverCancel);
            cp.milestone(10, "a").unwrap();
            cp.milestone(5, "b").unwrap();
            cp.milestone(150, "c").unwrap();
        }
        assert_eq!(seen, vec![10, 10, 100]);
    }

    #[test]
    fn test_step_maps_into_range() {
        let mut seen = Vec::new();
        let mut sink = |p: u8, _: &str| seen.push(p);
        {
            let mut cp = Checkpoint::new(&mut sink, &NeverCancel);
            cp.step(40, 90, 0, 4, "x").unwrap();
            cp.step(40, 90, 2, 4, "x").unwrap();
            cp.step(40, 90, 4, 4, "x").unwrap();
            cp.step(40, 90, 0, 0, "x").unwrap();
        }
        assert_eq!(seen, vec![40, 65, 90, 90]);
    }

    #[test]
    fn test_cancel_blocks_reports() {
        let flag = AtomicBool::new(false);
        let cancel = || flag.load(Ordering::Relaxed);
        let mut count = 0;
        let mut sink = |_: u8, _: &str| count += 1;
        {
            let mut cp = Checkpoint::new(&mut sink, &cancel);
            cp.milestone(5, "start").unwrap();
            flag.store(true, Ordering::Relaxed);
            assert!(matches!(cp.milestone(10, "next"), Err(Error::Cancelled)));
            assert!(cp.check().is_err());
            assert!(cp.is_cancelled());
            assert_eq!(cp.last_percent(), Some(5));
        }
        assert_eq!(count, 1);
    }

    #[test]
    fn test_finish_reports_100() {
        let mut last = 0;
        let mut sink = |p: u8, _: &str| last = p;
        {
            let mut cp = Checkpoint::new(&mut sink, &NeverCancel);
            cp.finish("done").unwrap();
        }
        assert_eq!(last, 100);
        let mut noop = NoProgress;
        Checkpoint::new(&mut noop, &NeverCancel).finish("done").unwrap();
    }
}
