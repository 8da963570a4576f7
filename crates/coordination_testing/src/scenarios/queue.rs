//! Queue and transfer scenarios.

use std::thread;

use ewe_coordination::transfer::expected_sum;
use ewe_coordination::{BatchedTransfer, BoundedQueue};

use crate::stress::{StressConfig, StressHarness, StressReport};

/// Runs every worker as a producer pushing `(thread_id, iteration)` into
/// one queue of `capacity` while a single consumer drains it.
///
/// Afterwards every item that was not received exactly once, and every
/// producer whose items arrived out of order, counts as a violation.
///
/// # Panics
///
/// Panics if the consumer thread panics.
#[must_use]
pub fn run_queue_stress(config: StressConfig, capacity: usize) -> StressReport {
    let queue = BoundedQueue::new(capacity);
    let thread_count = config.threads;

    let consumer_queue = queue.clone();
    let consumer = thread::spawn(move || {
        let mut last_seen = vec![None::<usize>; thread_count];
        let mut received = 0_usize;
        let mut violations = 0_usize;

        for (thread_id, iteration) in consumer_queue.drain() {
            if let Some(previous) = last_seen[thread_id] {
                if iteration <= previous {
                    violations += 1;
                }
            }
            last_seen[thread_id] = Some(iteration);
            received += 1;
        }
        (received, violations)
    });

    let report = StressHarness::new(config)
        .run(|thread_id, iteration| queue.push((thread_id, iteration)).is_ok());
    queue.close();

    let (received, violations) = consumer.join().expect("consumer thread panicked");
    let lost = report.completed.abs_diff(received);
    report.record_violations(violations + lost)
}

/// Runs a full batched transfer per operation, with a stream length that
/// varies with the iteration so the last batch is usually partial.
#[must_use]
pub fn run_transfer_stress(
    config: StressConfig,
    batch_size: usize,
    capacity: usize,
) -> StressReport {
    StressHarness::new(config).run(|thread_id, iteration| {
        let total = (thread_id * 31 + iteration * 7) as u64;

        match BatchedTransfer::batched(total, batch_size, capacity).run() {
            Ok(summary) => {
                let mut full_batches = summary.batch_sizes.iter().rev().skip(1);
                summary.sum == expected_sum(total)
                    && summary.items == total
                    && full_batches.all(|size| *size == batch_size)
            }
            Err(err) => {
                tracing::error!("transfer failed: {}", err);
                false
            }
        }
    })
}
