//! Stress harness running one operation from many threads at once.

use core::time::Duration;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Instant;

/// Shape of a stress run: `threads` workers performing `iterations`
/// operations each, optionally cut short once `deadline` has elapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StressConfig {
    pub threads: usize,
    pub iterations: usize,
    pub deadline: Option<Duration>,
}

impl StressConfig {
    #[must_use]
    pub const fn new(threads: usize, iterations: usize) -> Self {
        Self {
            threads,
            iterations,
            deadline: None,
        }
    }

    #[must_use]
    pub const fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

/// What a stress run observed.
///
/// `rejected` counts operations that answered `false` while the workers
/// ran; `violations` counts broken promises (lost items, reordering)
/// found by verifying the primitive after the workers finished.
#[derive(Debug, Clone, PartialEq)]
pub struct StressReport {
    pub completed: usize,
    pub rejected: usize,
    pub violations: usize,
    pub elapsed: Duration,
    pub threads: usize,
}

impl StressReport {
    #[must_use]
    pub const fn operations(&self) -> usize {
        self.completed + self.rejected
    }

    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs == 0.0 {
            0.0
        } else {
            self.operations() as f64 / secs
        }
    }

    #[must_use]
    pub const fn record_violations(mut self, count: usize) -> Self {
        self.violations += count;
        self
    }

    #[must_use]
    pub const fn is_clean(&self) -> bool {
        self.rejected == 0 && self.violations == 0
    }
}

/// `StressHarness` runs an operation from `threads` scoped workers.
pub struct StressHarness {
    config: StressConfig,
}

impl StressHarness {
    #[must_use]
    pub const fn new(config: StressConfig) -> Self {
        Self { config }
    }

    /// Runs `operation(thread_id, iteration)` from every worker and
    /// counts the `true`/`false` answers.
    ///
    /// Workers run on scoped threads, so `operation` may borrow from the
    /// caller's stack.
    ///
    /// # Examples
    ///
    /// ```
    /// use ewe_coordination::BoundedQueue;
    /// use ewe_coordination_testing::stress::{StressConfig, StressHarness};
    ///
    /// let queue = BoundedQueue::new(1024);
    /// let report = StressHarness::new(StressConfig::new(4, 100))
    ///     .run(|thread_id, iteration| queue.push((thread_id, iteration)).is_ok());
    ///
    /// assert_eq!(report.completed, 400);
    /// assert_eq!(queue.len(), 400);
    /// ```
    ///
    /// # Panics
    ///
    /// Panics if a worker thread panics.
    pub fn run<F>(&self, operation: F) -> StressReport
    where
        F: Fn(usize, usize) -> bool + Sync,
    {
        let StressConfig {
            threads,
            iterations,
            deadline,
        } = self.config;
        let start = Instant::now();
        let completed = AtomicUsize::new(0);
        let rejected = AtomicUsize::new(0);

        thread::scope(|scope| {
            for thread_id in 0..threads {
                let operation = &operation;
                let completed = &completed;
                let rejected = &rejected;

                scope.spawn(move || {
                    for iteration in 0..iterations {
                        if deadline.is_some_and(|limit| start.elapsed() >= limit) {
                            break;
                        }

                        let counter = if operation(thread_id, iteration) {
                            completed
                        } else {
                            rejected
                        };
                        counter.fetch_add(1, Ordering::Relaxed);
                    }
                });
            }
        });

        let report = StressReport {
            completed: completed.into_inner(),
            rejected: rejected.into_inner(),
            violations: 0,
            elapsed: start.elapsed(),
            threads,
        };

        tracing::debug!(
            "StressHarness: {} ok / {} rejected on {} threads, {:.0} ops/s",
            report.completed,
            report.rejected,
            report.threads,
            report.throughput()
        );
        report
    }
}
