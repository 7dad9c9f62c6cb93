//! Progress reporting for long runs.
//!
//! The [`ProgressObserver`] polls a coordinator's counters from another thread and
//! logs throughput and an ETA. It only reads; the run is unaffected whether or not
//! anyone is watching.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use tracing::info;

use crate::coordinator::ComputeCoordinator;
use crate::writer::RecordSink;

/// Upper bound on one sleep slice, so the observer notices the end of a run quickly.
const POLL_SLICE: Duration = Duration::from_millis(25);

/// Moving-window throughput estimate.
///
/// Keeps the last `capacity` samples of (time spent, items processed); a wide window
/// keeps single slow items from swinging the estimate.
#[derive(Debug, Clone)]
pub struct Estimator {
    capacity: usize,
    samples: VecDeque<(Duration, usize)>,
    sum_time: Duration,
    sum_processed: usize,
}

impl Estimator {
    /// Creates an estimator averaging over `capacity` samples.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            samples: VecDeque::with_capacity(capacity),
            sum_time: Duration::ZERO,
            sum_processed: 0,
        }
    }

    /// Adds a sample. Samples with no progress are ignored.
    pub fn record(&mut self, spent: Duration, processed: usize) {
        if processed == 0 {
            return;
        }
        self.samples.push_back((spent, processed));
        self.sum_time += spent;
        self.sum_processed += processed;

        if self.samples.len() > self.capacity
            && let Some((t, n)) = self.samples.pop_front()
        {
            self.sum_time -= t;
            self.sum_processed -= n;
        }
    }

    /// Average time per item, if any sample was recorded.
    pub fn per_item(&self) -> Option<Duration> {
        self.scaled(1)
    }

    /// Estimated time to process `remaining` more items.
    pub fn eta(&self, remaining: usize) -> Option<Duration> {
        self.scaled(remaining)
    }

    /// `sum_time * count / sum_processed`, in whole nanoseconds.
    fn scaled(&self, count: usize) -> Option<Duration> {
        if self.sum_processed == 0 {
            return None;
        }
        let nanos = self
            .sum_time
            .as_nanos()
            .checked_mul(count as u128)?
            / self.sum_processed as u128;
        let secs = u64::try_from(nanos / 1_000_000_000).ok()?;
        Some(Duration::new(secs, (nanos % 1_000_000_000) as u32))
    }
}

/// Formats a duration as `h:mm:ss`.
pub fn format_hms(d: Duration) -> String {
    let secs = d.as_secs();
    format!("{}:{:02}:{:02}", secs / 3600, secs / 60 % 60, secs % 60)
}

/// Periodic progress logger.
#[derive(Debug, Clone)]
pub struct ProgressObserver {
    interval: Duration,
    window: usize,
}

impl ProgressObserver {
    /// Reports every `interval`, averaging over the last 100 reports.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            window: 100,
        }
    }

    /// Polls `coordinator` until its run ends or `done` is raised.
    ///
    /// Meant to run on its own thread next to `ComputeCoordinator::start`.
    pub fn watch<S: RecordSink>(&self, coordinator: &ComputeCoordinator<S>, done: &AtomicBool) {
        let stopped = || coordinator.is_finished() || done.load(Ordering::SeqCst);
        let mut estimator = Estimator::new(self.window);
        let mut last_completed = coordinator.current_progress().completed;
        let mut last_time = Instant::now();

        while !stopped() {
            let deadline = Instant::now() + self.interval;
            while Instant::now() < deadline && !stopped() {
                thread::sleep(POLL_SLICE.min(self.interval));
            }

            let progress = coordinator.current_progress();
            let now = Instant::now();
            estimator.record(
                now - last_time,
                progress.completed.saturating_sub(last_completed),
            );
            last_completed = progress.completed;
            last_time = now;

            match (estimator.per_item(), estimator.eta(progress.remaining())) {
                (Some(per_item), Some(eta)) => info!(
                    completed = progress.completed,
                    total = progress.total,
                    ms_per_item = per_item.as_secs_f64() * 1e3,
                    eta = %format_hms(eta),
                    "progress"
                ),
                _ => info!(
                    completed = progress.completed,
                    total = progress.total,
                    "progress"
                ),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimator_averages_over_window() {
        let mut est = Estimator::new(2);
        est.record(Duration::from_millis(100), 1);
        est.record(Duration::from_millis(300), 1);
        assert_eq!(est.per_item(), Some(Duration::from_millis(200)));

        // The first sample falls out of the window.
        est.record(Duration::from_millis(500), 1);
        assert_eq!(est.per_item(), Some(Duration::from_millis(400)));
        assert_eq!(est.eta(10), Some(Duration::from_secs(4)));
    }

    #[test]
    fn idle_samples_are_ignored() {
        let mut est = Estimator::new(4);
        est.record(Duration::from_secs(3), 0);
        assert_eq!(est.per_item(), None);
    }

    #[test]
    fn large_counts_do_not_wrap() {
        let mut est = Estimator::new(4);
        est.record(Duration::from_secs(10), 1 << 32);
        assert!(est.per_item().is_some_and(|d| d < Duration::from_nanos(3)));

        let mut est = Estimator::new(4);
        est.record(Duration::from_millis(1), 1);
        let remaining = (1usize << 32) + 5;
        assert_eq!(
            est.eta(remaining),
            Some(Duration::from_millis(remaining as u64))
        );
    }

    #[test]
    fn hms_formatting() {
        assert_eq!(format_hms(Duration::from_secs(3725)), "1:02:05");
        assert_eq!(format_hms(Duration::ZERO), "0:00:00");
    }
}
