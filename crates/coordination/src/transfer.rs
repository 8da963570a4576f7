// Producer/consumer transfer of an integer stream through a BoundedQueue,
// either one item at a time or grouped into fixed-size batches.

use std::thread;

use thiserror::Error;

use crate::queue::{BoundedQueue, QueueError};

pub type TransferResult<T> = std::result::Result<T, TransferError>;

#[derive(Error, Debug)]
pub enum TransferError {
    #[error("batch size must be at least 1")]
    ZeroBatchSize,

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error("failed to spawn producer thread: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("producer thread panicked")]
    ProducerPanicked,
}

/// `Batch` is an ordered run of consecutive stream values.
///
/// A batch is never padded: the last batch of a stream only holds the
/// values that remain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch(Vec<u64>);

impl Batch {
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[u64] {
        &self.0
    }

    #[must_use]
    pub fn sum(&self) -> u64 {
        self.0.iter().sum()
    }
}

impl IntoIterator for Batch {
    type Item = u64;
    type IntoIter = std::vec::IntoIter<u64>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// `Batches` lazily splits the stream `0..total` into batches of
/// `batch_size` values.
pub struct Batches {
    next: u64,
    total: u64,
    batch_size: u64,
}

impl Iterator for Batches {
    type Item = Batch;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.total {
            return None;
        }

        let end = self.next.saturating_add(self.batch_size).min(self.total);
        let batch = Batch((self.next..end).collect());
        self.next = end;
        Some(batch)
    }
}

/// `batches` returns an iterator over the batches of the stream `0..total`.
///
/// # Panics
///
/// Panics if `batch_size` is 0.
#[must_use]
pub fn batches(total: u64, batch_size: usize) -> Batches {
    assert!(batch_size > 0, "batch_size must be > 0");
    Batches {
        next: 0,
        total,
        batch_size: batch_size as u64,
    }
}

/// `expected_sum` returns `0 + 1 + ... + (total - 1)`.
#[must_use]
pub fn expected_sum(total: u64) -> u64 {
    if total == 0 {
        return 0;
    }
    if total % 2 == 0 {
        (total / 2) * (total - 1)
    } else {
        total * ((total - 1) / 2)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferMode {
    /// Every value crosses the queue on its own.
    Plain,

    /// Values cross the queue grouped into batches of `batch_size`.
    Batched { batch_size: usize },
}

/// `TransferSummary` is what the consumer side observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferSummary {
    /// Number of stream values received.
    pub items: u64,

    /// Number of queue handoffs.
    pub deliveries: usize,

    /// Size of every received batch in arrival order, empty for
    /// [`TransferMode::Plain`].
    pub batch_sizes: Vec<usize>,

    /// Running sum over every received value.
    pub sum: u64,
}

/// `BatchedTransfer` drives a producer thread pushing the stream
/// `0..total` through a [`BoundedQueue`] of the given capacity while the
/// calling thread consumes and folds it.
///
/// # Examples
///
/// ```
/// use ewe_coordination::transfer::BatchedTransfer;
///
/// let summary = BatchedTransfer::batched(11, 5, 2).run().unwrap();
///
/// assert_eq!(summary.batch_sizes, vec![5, 5, 1]);
/// assert_eq!(summary.sum, 55);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct BatchedTransfer {
    total: u64,
    capacity: usize,
    mode: TransferMode,
}

impl BatchedTransfer {
    #[must_use]
    pub fn new(total: u64, capacity: usize, mode: TransferMode) -> Self {
        Self {
            total,
            capacity,
            mode,
        }
    }

    #[must_use]
    pub fn batched(total: u64, batch_size: usize, capacity: usize) -> Self {
        Self::new(total, capacity, TransferMode::Batched { batch_size })
    }

    #[must_use]
    pub fn plain(total: u64, capacity: usize) -> Self {
        Self::new(total, capacity, TransferMode::Plain)
    }

    #[must_use]
    pub fn mode(&self) -> TransferMode {
        self.mode
    }

    /// `run` performs the transfer and returns once the consumer has
    /// observed the queue closed and drained.
    pub fn run(&self) -> TransferResult<TransferSummary> {
        match self.mode {
            TransferMode::Plain => self.run_plain(),
            TransferMode::Batched { batch_size } => self.run_batched(batch_size),
        }
    }

    fn run_plain(&self) -> TransferResult<TransferSummary> {
        let queue = BoundedQueue::<u64>::try_new(self.capacity)?;
        let total = self.total;

        let producer_queue = queue.clone();
        let producer = thread::Builder::new()
            .name(String::from("transfer-plain-producer"))
            .spawn(move || {
                let _close = producer_queue.close_on_drop();
                for value in 0..total {
                    if producer_queue.push(value).is_err() {
                        break;
                    }
                }
            })?;

        let mut summary = TransferSummary {
            items: 0,
            deliveries: 0,
            batch_sizes: Vec::new(),
            sum: 0,
        };
        for value in queue.drain() {
            summary.items += 1;
            summary.deliveries += 1;
            summary.sum += value;
        }

        join_producer(producer)?;
        tracing::debug!(
            "BatchedTransfer: plain transfer of {} items summed to {}",
            summary.items,
            summary.sum
        );
        Ok(summary)
    }

    fn run_batched(&self, batch_size: usize) -> TransferResult<TransferSummary> {
        if batch_size == 0 {
            return Err(TransferError::ZeroBatchSize);
        }

        let queue = BoundedQueue::<Batch>::try_new(self.capacity)?;
        let total = self.total;

        let producer_queue = queue.clone();
        let producer = thread::Builder::new()
            .name(String::from("transfer-batch-producer"))
            .spawn(move || {
                let _close = producer_queue.close_on_drop();
                for batch in batches(total, batch_size) {
                    if producer_queue.push(batch).is_err() {
                        break;
                    }
                }
            })?;

        let mut summary = TransferSummary {
            items: 0,
            deliveries: 0,
            batch_sizes: Vec::new(),
            sum: 0,
        };
        for batch in queue.drain() {
            summary.items += batch.len() as u64;
            summary.deliveries += 1;
            summary.batch_sizes.push(batch.len());
            summary.sum += batch.sum();
        }

        join_producer(producer)?;
        tracing::debug!(
            "BatchedTransfer: {} batches carrying {} items summed to {}",
            summary.deliveries,
            summary.items,
            summary.sum
        );
        Ok(summary)
    }
}

fn join_producer(handle: thread::JoinHandle<()>) -> TransferResult<()> {
    handle.join().map_err(|_| {
        tracing::error!("BatchedTransfer: producer thread panicked");
        TransferError::ProducerPanicked
    })
}
