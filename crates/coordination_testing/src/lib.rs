//! Stress testing infrastructure for the `ewe_coordination` primitives.
//!
//! This crate provides:
//! - **Stress harness**: many scoped threads hammering one operation
//! - **Scenarios**: queue, transfer, relay, mailbox and barrier runs that
//!   verify ordering and conservation afterwards
//! - **Criterion benchmarks**: plain vs batched transfer, spin vs blocking
//!   barrier
//!
//! # Examples
//!
//! ```rust
//! use ewe_coordination_testing::scenarios::run_queue_stress;
//! use ewe_coordination_testing::stress::StressConfig;
//!
//! let report = run_queue_stress(StressConfig::new(4, 250), 8);
//!
//! assert_eq!(report.completed, 1000);
//! assert!(report.is_clean());
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod scenarios;
pub mod stress;

pub use stress::{StressConfig, StressHarness, StressReport};
