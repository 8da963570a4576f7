// Fixed-capacity FIFO channel with blocking push/pop and close semantics.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::monitor::{Condition, Monitor};
use crate::outcome::{RecvOutcome, SendOutcome};

pub type QueueResult<T> = std::result::Result<T, QueueError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    #[error("queue capacity must be at least 1")]
    ZeroCapacity,
}

/// `ClosedQueueError` is returned when pushing into a queue that was
/// already closed. The rejected item is handed back to the caller.
#[derive(Error, Clone, PartialEq, Eq)]
#[error("push attempted on a closed queue")]
pub struct ClosedQueueError<T>(pub T);

impl<T> ClosedQueueError<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> fmt::Debug for ClosedQueueError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ClosedQueueError(..)")
    }
}

#[derive(Error, Clone, PartialEq, Eq)]
pub enum TryPushError<T> {
    #[error("queue is full")]
    Full(T),

    #[error("queue is closed")]
    Closed(T),
}

impl<T> TryPushError<T> {
    pub fn into_inner(self) -> T {
        match self {
            TryPushError::Full(item) | TryPushError::Closed(item) => item,
        }
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        matches!(self, TryPushError::Full(_))
    }
}

impl<T> fmt::Debug for TryPushError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TryPushError::Full(_) => f.write_str("TryPushError::Full(..)"),
            TryPushError::Closed(_) => f.write_str("TryPushError::Closed(..)"),
        }
    }
}

struct QueueState<T> {
    buffer: VecDeque<T>,
    closed: bool,
}

struct Inner<T> {
    monitor: Monitor<QueueState<T>>,
    capacity: usize,
}

/// `BoundedQueue` is a multi-producer multi-consumer FIFO holding at
/// most `capacity` items.
///
/// Handles are cheap to clone and all share the same buffer. Once
/// [`BoundedQueue::close`] is called, pushes fail with
/// [`ClosedQueueError`] while pops keep returning buffered items until
/// the queue is drained, after which they return `None` forever.
///
/// # Examples
///
/// ```
/// use ewe_coordination::queue::BoundedQueue;
/// use std::thread;
///
/// let queue = BoundedQueue::new(2);
///
/// let producer_queue = queue.clone();
/// let producer = thread::spawn(move || {
///     for i in 0..5 {
///         producer_queue.push(i).expect("queue should be open");
///     }
///     producer_queue.close();
/// });
///
/// let received: Vec<i32> = queue.drain().collect();
/// producer.join().unwrap();
///
/// assert_eq!(received, vec![0, 1, 2, 3, 4]);
/// ```
pub struct BoundedQueue<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for BoundedQueue<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> BoundedQueue<T> {
    /// Creates a new queue able to buffer `capacity` items.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is 0, use [`BoundedQueue::try_new`] for
    /// unvalidated input.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "BoundedQueue capacity must be > 0");
        Self::with_capacity(capacity)
    }

    pub fn try_new(capacity: usize) -> QueueResult<Self> {
        if capacity == 0 {
            return Err(QueueError::ZeroCapacity);
        }
        Ok(Self::with_capacity(capacity))
    }

    fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                monitor: Monitor::new(QueueState {
                    buffer: VecDeque::with_capacity(capacity),
                    closed: false,
                }),
                capacity,
            }),
        }
    }

    /// `push` appends `item`, blocking the current thread while the
    /// queue is full.
    ///
    /// A producer blocked on a full queue that gets closed under it wakes
    /// up and receives its item back in the error.
    pub fn push(&self, item: T) -> Result<(), ClosedQueueError<T>> {
        let capacity = self.inner.capacity;
        let monitor = &self.inner.monitor;

        let guard = monitor.enter();
        let mut guard = monitor.wait_while(guard, Condition::NotFull, |state| {
            !state.closed && state.buffer.len() >= capacity
        });

        if guard.closed {
            tracing::warn!("BoundedQueue: push rejected, queue is closed");
            return Err(ClosedQueueError(item));
        }

        guard.buffer.push_back(item);
        drop(guard);

        monitor.notify(Condition::NotEmpty);
        Ok(())
    }

    /// `push_timeout` behaves like [`BoundedQueue::push`] but gives up
    /// once `timeout` elapses, handing the item back in
    /// [`SendOutcome::TimedOut`].
    pub fn push_timeout(
        &self,
        item: T,
        timeout: Duration,
    ) -> Result<SendOutcome<T>, ClosedQueueError<T>> {
        let capacity = self.inner.capacity;
        let monitor = &self.inner.monitor;

        let guard = monitor.enter();
        let (mut guard, timed_out) =
            monitor.wait_timeout_while(guard, Condition::NotFull, timeout, |state| {
                !state.closed && state.buffer.len() >= capacity
            });

        if guard.closed {
            return Err(ClosedQueueError(item));
        }

        if timed_out {
            tracing::debug!("BoundedQueue: push timed out after {:?}", timeout);
            return Ok(SendOutcome::TimedOut(item));
        }

        guard.buffer.push_back(item);
        drop(guard);

        monitor.notify(Condition::NotEmpty);
        Ok(SendOutcome::Delivered)
    }

    /// `try_push` appends `item` only if it can do so without blocking.
    pub fn try_push(&self, item: T) -> Result<(), TryPushError<T>> {
        let monitor = &self.inner.monitor;

        let mut guard = monitor.enter();
        if guard.closed {
            return Err(TryPushError::Closed(item));
        }
        if guard.buffer.len() >= self.inner.capacity {
            return Err(TryPushError::Full(item));
        }

        guard.buffer.push_back(item);
        drop(guard);

        monitor.notify(Condition::NotEmpty);
        Ok(())
    }

    /// `pop` removes the oldest item, blocking while the queue is empty
    /// and still open. Returns `None` once the queue is closed and drained.
    pub fn pop(&self) -> Option<T> {
        let monitor = &self.inner.monitor;

        let guard = monitor.enter();
        let mut guard = monitor.wait_while(guard, Condition::NotEmpty, |state| {
            state.buffer.is_empty() && !state.closed
        });

        let item = guard.buffer.pop_front();
        drop(guard);

        if item.is_some() {
            monitor.notify(Condition::NotFull);
        }
        item
    }

    /// `pop_timeout` behaves like [`BoundedQueue::pop`] but gives up once
    /// `timeout` elapses.
    pub fn pop_timeout(&self, timeout: Duration) -> RecvOutcome<T> {
        let monitor = &self.inner.monitor;

        let guard = monitor.enter();
        let (mut guard, timed_out) =
            monitor.wait_timeout_while(guard, Condition::NotEmpty, timeout, |state| {
                state.buffer.is_empty() && !state.closed
            });

        if timed_out {
            return RecvOutcome::TimedOut;
        }

        match guard.buffer.pop_front() {
            Some(item) => {
                drop(guard);
                monitor.notify(Condition::NotFull);
                RecvOutcome::Received(item)
            }
            None => RecvOutcome::Closed,
        }
    }

    /// `try_pop` removes the oldest item if one is buffered.
    pub fn try_pop(&self) -> Option<T> {
        let monitor = &self.inner.monitor;

        let mut guard = monitor.enter();
        let item = guard.buffer.pop_front();
        drop(guard);

        if item.is_some() {
            monitor.notify(Condition::NotFull);
        }
        item
    }

    /// `close` stops the queue from accepting further items and wakes
    /// every blocked producer and consumer.
    ///
    /// Buffered items stay retrievable. Closing an already closed queue
    /// is a no-op, the return value tells whether this call closed it.
    pub fn close(&self) -> bool {
        let monitor = &self.inner.monitor;

        let mut guard = monitor.enter();
        if guard.closed {
            return false;
        }
        guard.closed = true;
        let pending = guard.buffer.len();
        drop(guard);

        tracing::debug!("BoundedQueue: closed with {} pending items", pending);

        monitor.notify_all(Condition::NotFull);
        monitor.notify_all(Condition::NotEmpty);
        true
    }

    /// `close_on_drop` returns a guard that closes the queue when it goes
    /// out of scope, including while a producer unwinds from a panic.
    #[must_use]
    pub fn close_on_drop(&self) -> CloseGuard<T> {
        CloseGuard {
            queue: self.clone(),
        }
    }

    /// `drain` returns a blocking iterator popping items until the queue
    /// is closed and empty.
    #[must_use]
    pub fn drain(&self) -> Drain<'_, T> {
        Drain { queue: self }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.monitor.enter().buffer.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.len() >= self.inner.capacity
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.monitor.enter().closed
    }
}

/// `CloseGuard` closes its queue when dropped, so consumers never wait
/// on a producer that is gone.
pub struct CloseGuard<T> {
    queue: BoundedQueue<T>,
}

impl<T> Drop for CloseGuard<T> {
    fn drop(&mut self) {
        self.queue.close();
    }
}

pub struct Drain<'a, T> {
    queue: &'a BoundedQueue<T>,
}

impl<T> Iterator for Drain<'_, T> {
    type Item = T;

    fn next(&mut self) -> Option<Self::Item> {
        self.queue.pop()
    }
}

#[cfg(test)]
mod test_bounded_queue {
    use std::{thread, time::Duration};

    use super::*;

    #[test]
    fn pops_items_in_push_order_then_reports_closed() {
        let queue = BoundedQueue::new(2);

        let producer_queue = queue.clone();
        let producer = thread::spawn(move || {
            for item in [1, 2, 3] {
                producer_queue.push(item).expect("should push");
            }
            producer_queue.close();
        });

        assert_eq!(queue.pop(), Some(1));
        assert_eq!(queue.pop(), Some(2));
        assert_eq!(queue.pop(), Some(3));

        producer.join().expect("should safely join");

        assert_eq!(queue.pop(), None);
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn close_is_idempotent() {
        let queue = BoundedQueue::new(3);
        queue.push("first").expect("should push");

        assert!(queue.close());
        assert!(!queue.close());
        assert!(!queue.close());

        assert_eq!(queue.pop(), Some("first"));
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn push_after_close_hands_back_item() {
        let queue = BoundedQueue::new(1);
        queue.close();

        let err = queue.push(String::from("late")).expect_err("should reject");
        assert_eq!(err.into_inner(), String::from("late"));
        assert!(queue.is_empty());
    }

    #[test]
    fn close_keeps_buffered_items() {
        let queue = BoundedQueue::new(4);
        for item in 0..4 {
            queue.push(item).expect("should push");
        }
        queue.close();

        assert!(queue.is_closed());
        assert_eq!(queue.drain().collect::<Vec<_>>(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn blocked_producer_wakes_when_consumer_pops() {
        let queue = BoundedQueue::new(1);
        queue.push(1).expect("should push");

        let producer_queue = queue.clone();
        let producer = thread::spawn(move || producer_queue.push(2));

        thread::sleep(Duration::from_millis(50));
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.pop(), Some(1));

        producer
            .join()
            .expect("should safely join")
            .expect("should push once room is available");
        assert_eq!(queue.pop(), Some(2));
    }

    #[test]
    fn blocked_producer_fails_when_queue_closes() {
        let queue = BoundedQueue::new(1);
        queue.push(1).expect("should push");

        let producer_queue = queue.clone();
        let producer = thread::spawn(move || producer_queue.push(2));

        thread::sleep(Duration::from_millis(50));
        queue.close();

        let result = producer.join().expect("should safely join");
        assert_eq!(result.expect_err("should be rejected").into_inner(), 2);
        assert_eq!(queue.pop(), Some(1));
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn blocked_consumer_wakes_on_close() {
        let queue = BoundedQueue::<u8>::new(1);

        let consumer_queue = queue.clone();
        let consumer = thread::spawn(move || consumer_queue.pop());

        thread::sleep(Duration::from_millis(50));
        queue.close();

        assert_eq!(consumer.join().expect("should safely join"), None);
    }

    #[test]
    fn try_push_reports_full_and_closed() {
        let queue = BoundedQueue::new(1);
        queue.try_push(1).expect("should push");

        let err = queue.try_push(2).expect_err("should be full");
        assert!(err.is_full());
        assert_eq!(err.into_inner(), 2);
        assert!(queue.is_full());

        queue.close();
        assert!(matches!(queue.try_push(3), Err(TryPushError::Closed(3))));
        assert_eq!(queue.try_pop(), Some(1));
        assert_eq!(queue.try_pop(), None);
    }

    #[test]
    fn push_timeout_hands_back_item_on_full_queue() {
        let queue = BoundedQueue::new(1);
        queue.push(1).expect("should push");

        let outcome = queue
            .push_timeout(2, Duration::from_millis(20))
            .expect("queue is open");
        assert_eq!(outcome, SendOutcome::TimedOut(2));

        queue.pop();
        let outcome = queue
            .push_timeout(3, Duration::from_millis(20))
            .expect("queue is open");
        assert!(outcome.is_delivered());
    }

    #[test]
    fn pop_timeout_distinguishes_timeout_from_closed() {
        let queue = BoundedQueue::<u8>::new(1);

        assert!(queue.pop_timeout(Duration::from_millis(20)).is_timed_out());

        queue.push(7).expect("should push");
        queue.close();

        assert_eq!(
            queue.pop_timeout(Duration::from_millis(20)),
            RecvOutcome::Received(7)
        );
        assert!(queue.pop_timeout(Duration::from_millis(20)).is_closed());
    }

    #[test]
    fn close_guard_closes_queue_when_producer_panics() {
        let queue = BoundedQueue::new(4);

        let producer_queue = queue.clone();
        let producer = thread::spawn(move || {
            let _guard = producer_queue.close_on_drop();
            producer_queue.push(1).expect("should push");
            panic!("producer failed midway");
        });

        assert!(producer.join().is_err());
        assert_eq!(queue.pop(), Some(1));
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn rejects_zero_capacity() {
        assert!(matches!(
            BoundedQueue::<u8>::try_new(0),
            Err(QueueError::ZeroCapacity)
        ));
    }
}
