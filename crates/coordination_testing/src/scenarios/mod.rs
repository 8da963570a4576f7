//! Stress scenarios for each coordination primitive.
//!
//! Every scenario drives one primitive through the [`crate::stress`]
//! harness and then verifies what the primitive promised (order, exactly
//! once delivery, conservation), folding any violation into the
//! returned report's violations.

pub mod ordering;
pub mod queue;

pub use ordering::{run_barrier_stress, run_mailbox_stress, run_relay_stress};
pub use queue::{run_queue_stress, run_transfer_stress};
