//! Relay, mailbox and barrier scenarios.

use std::sync::Mutex;
use std::thread;

use ewe_coordination::relay::relay;
use ewe_coordination::{mailbox, OrderedBarrier, WaitStrategy};

use crate::stress::{StressConfig, StressHarness, StressReport};

/// Runs one relay chain per operation, of length `iteration % max_length + 1`,
/// succeeding when the completion value equals the chain length.
#[must_use]
pub fn run_relay_stress(config: StressConfig, max_length: usize) -> StressReport {
    StressHarness::new(config).run(|_thread_id, iteration| {
        let length = iteration % max_length.max(1) + 1;
        match relay(length, 0) {
            Ok(value) => value == length as u64,
            Err(err) => {
                tracing::error!("relay chain of {} failed: {}", length, err);
                false
            }
        }
    })
}

/// Gives every worker its own mailbox and a dedicated receiver thread;
/// each operation sends the iteration number.
///
/// A receiver that sees a value other than the next expected one adds a
/// violation. Any deadline in `config` is ignored, since a receiver
/// waits for every iteration.
///
/// # Panics
///
/// Panics if a receiver thread panics.
#[must_use]
pub fn run_mailbox_stress(config: StressConfig) -> StressReport {
    let config = StressConfig {
        deadline: None,
        ..config
    };
    let iterations = config.iterations;

    let mut senders = Vec::with_capacity(config.threads);
    let mut receivers = Vec::with_capacity(config.threads);
    for _ in 0..config.threads {
        let (sender, receiver) = mailbox::create::<usize>();
        senders.push(sender);
        receivers.push(thread::spawn(move || {
            (0..iterations)
                .filter(|expected| receiver.receive() != *expected)
                .count()
        }));
    }

    let report = StressHarness::new(config).run(|thread_id, iteration| {
        senders[thread_id].send(iteration);
        true
    });

    let violations: usize = receivers
        .into_iter()
        .map(|receiver| receiver.join().expect("receiver thread panicked"))
        .sum();
    report.record_violations(violations)
}

/// Runs one ordered barrier per iteration with every worker owning the
/// index equal to its thread id, then checks each round recorded
/// `0..thread_count` in order. Any deadline in `config` is ignored, since
/// a worker stopping early would stall the workers ordered after it.
///
/// # Panics
///
/// Panics if the thread count is 0.
#[must_use]
pub fn run_barrier_stress(config: StressConfig, strategy: WaitStrategy) -> StressReport {
    let config = StressConfig {
        deadline: None,
        ..config
    };
    let rounds: Vec<(OrderedBarrier, Mutex<Vec<usize>>)> = (0..config.iterations)
        .map(|_| {
            let barrier = OrderedBarrier::new(config.threads, strategy)
                .expect("thread count must be at least 1");
            (barrier, Mutex::new(Vec::with_capacity(config.threads)))
        })
        .collect();

    let report = StressHarness::new(config).run(|thread_id, iteration| {
        let (barrier, seen) = &rounds[iteration];
        barrier
            .trigger(thread_id, || match seen.lock() {
                Ok(mut guard) => guard.push(thread_id),
                Err(poisoned) => poisoned.into_inner().push(thread_id),
            })
            .is_ok()
    });

    let expected: Vec<usize> = (0..config.threads).collect();
    let violations = rounds
        .iter()
        .filter(|(_, seen)| match seen.lock() {
            Ok(guard) => *guard != expected,
            Err(poisoned) => *poisoned.into_inner() != expected,
        })
        .count();
    report.record_violations(violations)
}
