//! Stress tests for the coordination primitives under contention.
//!
//! These runs use enough threads and iterations to shake out lost
//! wakeups and ordering bugs while staying quick on a laptop.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use ewe_coordination::WaitStrategy;
use ewe_coordination_testing::scenarios::{
    run_barrier_stress, run_mailbox_stress, run_queue_stress, run_relay_stress,
    run_transfer_stress,
};
use ewe_coordination_testing::stress::{StressConfig, StressHarness, StressReport};
use serial_test::serial;
use tracing_test::traced_test;

#[test]
fn test_stress_harness_counts_every_operation() {
    let counter = AtomicUsize::new(0);
    let report = StressHarness::new(StressConfig::new(3, 50)).run(|_thread_id, iteration| {
        counter.fetch_add(1, Ordering::Relaxed);
        iteration % 10 != 0
    });

    assert_eq!(counter.load(Ordering::Relaxed), 150);
    assert_eq!(report.operations(), 150);
    assert_eq!(report.rejected, 15);
    assert_eq!(report.violations, 0);
    assert_eq!(report.threads, 3);
    assert!(!report.is_clean());
}

#[test]
#[ntest::timeout(10000)]
fn test_stress_harness_honours_deadline() {
    let config = StressConfig::new(2, usize::MAX).with_deadline(Duration::from_millis(50));

    let report = StressHarness::new(config).run(|_thread_id, _iteration| {
        std::thread::sleep(Duration::from_millis(1));
        true
    });

    assert!(report.completed > 0);
    assert!(report.operations() < 1_000);
}

#[test]
fn test_stress_report_separates_rejections_from_violations() {
    let report = StressReport {
        completed: 100,
        rejected: 0,
        violations: 0,
        elapsed: Duration::from_secs(2),
        threads: 4,
    };

    assert!((report.throughput() - 50.0).abs() < f64::EPSILON);
    assert!(report.is_clean());

    let report = report.record_violations(3);
    assert_eq!(report.violations, 3);
    assert_eq!(report.operations(), 100);
    assert!(!report.is_clean());
}

#[test]
#[serial]
#[ntest::timeout(30000)]
fn test_queue_under_contention_keeps_per_producer_order() {
    for capacity in [1, 4, 64] {
        let report = run_queue_stress(StressConfig::new(8, 500), capacity);

        assert_eq!(report.completed, 4_000);
        assert!(report.is_clean(), "violations at capacity {capacity}");
    }
}

#[test]
#[serial]
#[ntest::timeout(60000)]
fn test_transfers_conserve_values_under_contention() {
    let report = run_transfer_stress(StressConfig::new(4, 25), 5, 2);

    assert_eq!(report.completed, 100);
    assert!(report.is_clean());
}

#[test]
#[serial]
#[ntest::timeout(60000)]
fn test_relay_chains_under_contention() {
    let report = run_relay_stress(StressConfig::new(4, 20), 32);

    assert_eq!(report.completed, 80);
    assert!(report.is_clean());
}

#[test]
#[serial]
#[ntest::timeout(30000)]
fn test_mailboxes_never_lose_or_duplicate() {
    let report = run_mailbox_stress(StressConfig::new(6, 1_000));

    assert_eq!(report.completed, 6_000);
    assert!(report.is_clean());
}

#[test]
#[serial]
#[ntest::timeout(60000)]
fn test_barrier_rounds_follow_index_order() {
    for strategy in [
        WaitStrategy::default(),
        WaitStrategy::Spin {
            backoff: Duration::ZERO,
        },
        WaitStrategy::Blocking,
    ] {
        let report = run_barrier_stress(StressConfig::new(6, 50), strategy);

        assert_eq!(report.completed, 300);
        assert!(report.is_clean(), "violations with {strategy:?}");
    }
}

#[test]
#[traced_test]
fn test_stress_harness_logs_summary() {
    let _ = StressHarness::new(StressConfig::new(1, 1)).run(|_, _| true);

    assert!(logs_contain("StressHarness: 1 ok / 0 rejected"));
}
