// ============================================================================
// PROGRESS TRACKING — work-unit aggregation across worker threads
// ============================================================================
//
// A filter pass declares its total work units up front and reports completed
// units from whichever worker thread finishes a row-band. Trackers are
// therefore `Sync` and internally atomic; marshaling percent updates onto a
// UI thread is the caller's concern.
// ============================================================================

use std::sync::atomic::{AtomicU32, Ordering};

/// Receiver for filter-pass progress. `units_done` is invoked from worker
/// threads; `finished` exactly once, after the pass completes.
pub trait ProgressTracker: Sync {
    fn units_done(&self, units: u32);

    fn unit_done(&self) {
        self.units_done(1);
    }

    fn finished(&self);
}

/// Tracker for callers without a progress display.
pub struct NoProgress;

impl ProgressTracker for NoProgress {
    fn units_done(&self, _units: u32) {}

    fn finished(&self) {}
}

/// Shared no-op instance, handy wherever a `&dyn ProgressTracker` is needed.
pub static NO_PROGRESS: NoProgress = NoProgress;

// ============================================================================
// THRESHOLD TRACKER
// ============================================================================

/// Converts raw work units into whole-percent updates and forwards each new
/// percentage to a sink exactly once. The sink runs on whichever worker
/// crossed the threshold.
pub struct ThresholdTracker<F: Fn(u32) + Sync> {
    total_units: u32,
    done_units: AtomicU32,
    reported_percent: AtomicU32,
    sink: F,
}

impl<F: Fn(u32) + Sync> ThresholdTracker<F> {
    pub fn new(total_units: u32, sink: F) -> Self {
        Self {
            total_units: total_units.max(1),
            done_units: AtomicU32::new(0),
            reported_percent: AtomicU32::new(0),
            sink,
        }
    }
}

impl<F: Fn(u32) + Sync> ProgressTracker for ThresholdTracker<F> {
    fn units_done(&self, units: u32) {
        let done = self.done_units.fetch_add(units, Ordering::AcqRel) + units;
        let percent = (done.min(self.total_units) * 100) / self.total_units;
        let previous = self.reported_percent.fetch_max(percent, Ordering::AcqRel);
        if percent > previous {
            (self.sink)(percent);
        }
    }

    fn finished(&self) {
        let previous = self.reported_percent.fetch_max(100, Ordering::AcqRel);
        if previous < 100 {
            (self.sink)(100);
        }
    }
}

// ============================================================================
// DEBUG TRACKER
// ============================================================================

/// Counts received units against the declared total and logs a discrepancy
/// on `finished()`. Under- or over-reporting is a filter defect; this is the
/// tool that catches it.
pub struct DebugTracker {
    expected_units: u32,
    received_units: AtomicU32,
}

impl DebugTracker {
    pub fn new(expected_units: u32) -> Self {
        Self {
            expected_units,
            received_units: AtomicU32::new(0),
        }
    }

    pub fn received(&self) -> u32 {
        self.received_units.load(Ordering::Acquire)
    }

    pub fn expected(&self) -> u32 {
        self.expected_units
    }
}

impl ProgressTracker for DebugTracker {
    fn units_done(&self, units: u32) {
        self.received_units.fetch_add(units, Ordering::AcqRel);
    }

    fn finished(&self) {
        let received = self.received();
        if received == self.expected_units {
            log::debug!("progress: {received} units, OK");
        } else {
            log::warn!(
                "progress mismatch: received {received} units, expected {}",
                self.expected_units
            );
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn threshold_tracker_reports_each_percent_once() {
        let seen = Mutex::new(Vec::new());
        let tracker = ThresholdTracker::new(200, |p| seen.lock().unwrap().push(p));
        for _ in 0..200 {
            tracker.unit_done();
        }
        tracker.finished();
        let seen = seen.into_inner().unwrap();
        assert_eq!(seen.len(), 100);
        assert_eq!(*seen.first().unwrap(), 1);
        assert_eq!(*seen.last().unwrap(), 100);
    }

    #[test]
    fn threshold_tracker_finished_tops_out_at_100() {
        let seen = Mutex::new(Vec::new());
        let tracker = ThresholdTracker::new(10, |p| seen.lock().unwrap().push(p));
        tracker.units_done(3);
        tracker.finished();
        let seen = seen.into_inner().unwrap();
        assert_eq!(seen, vec![30, 100]);
    }

    #[test]
    fn debug_tracker_counts_units() {
        let tracker = DebugTracker::new(7);
        tracker.units_done(3);
        tracker.units_done(4);
        tracker.finished();
        assert_eq!(tracker.received(), tracker.expected());
    }
}
