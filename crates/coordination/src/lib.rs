//! Coordination primitives for threads and tasks.
//!
//! This crate provides:
//! - **Bounded queue**: fixed-capacity FIFO with blocking push/pop and close
//! - **Transfers**: plain and batched producer/consumer streams over the queue
//! - **Relay chain**: a line of single-shot stages passing a token hop by hop
//! - **Mailbox**: single-slot exchange with strict sender/receiver alternation
//! - **Ordered barrier**: total execution order through a shared counter
//!
//! The queue and the mailbox are built on [`monitor::Monitor`], one lock
//! paired with two wait conditions.
//!
//! # Examples
//!
//! ```rust
//! use ewe_coordination::{relay, BatchedTransfer};
//!
//! let summary = BatchedTransfer::batched(11, 5, 2).run().unwrap();
//! assert_eq!(summary.sum, 55);
//!
//! assert_eq!(relay::relay(100, 0).unwrap(), 100);
//! ```

pub mod barrier;
pub mod config;
pub mod mailbox;
pub mod monitor;
pub mod outcome;
pub mod queue;
pub mod relay;
pub mod transfer;

pub use barrier::{BarrierError, OrderCounter, OrderedBarrier, WaitStrategy};
pub use config::{ConfigError, CoordinationConfig};
pub use mailbox::{MailboxReceiver, MailboxSender, MailboxState};
pub use outcome::{RecvOutcome, SendOutcome};
pub use queue::{BoundedQueue, ClosedQueueError, QueueError, TryPushError};
pub use relay::{RelayChain, RelayCompletion, RelayError};
pub use transfer::{Batch, BatchedTransfer, TransferError, TransferMode, TransferSummary};
