// Total execution order across concurrently launched tasks via a shared counter.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use thiserror::Error;

pub type BarrierResult<T> = std::result::Result<T, BarrierError>;

/// Delay between two polls of the counter for [`WaitStrategy::Spin`].
pub const DEFAULT_BACKOFF: Duration = Duration::from_micros(1);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BarrierError {
    #[error("ordered barrier needs at least one task")]
    NoTasks,

    #[error("index {index} is outside of 0..{task_count}")]
    IndexOutOfRange { index: usize, task_count: usize },

    #[error("index {0} already took its turn")]
    AlreadyTriggered(usize),
}

/// `WaitStrategy` decides how a task waits for its turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitStrategy {
    /// Poll the counter, sleeping `backoff` between polls. A zero backoff
    /// yields to the scheduler instead. Burns CPU while waiting.
    Spin { backoff: Duration },

    /// Sleep on a condition variable that is notified every time the
    /// counter advances.
    Blocking,
}

impl Default for WaitStrategy {
    fn default() -> Self {
        WaitStrategy::Spin {
            backoff: DEFAULT_BACKOFF,
        }
    }
}

/// `OrderCounter` is a monotonically increasing counter shared through
/// cloned handles. It is only ever read and advanced atomically.
///
/// Every handle also shares the wakeup point used by
/// [`WaitStrategy::Blocking`], so an advance made through any barrier
/// built on the counter wakes the blocked waiters of all of them.
#[derive(Clone, Debug, Default)]
pub struct OrderCounter {
    inner: Arc<CounterInner>,
}

#[derive(Debug, Default)]
struct CounterInner {
    value: AtomicUsize,
    lock: Mutex<()>,
    changed: Condvar,
}

impl OrderCounter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn load(&self) -> usize {
        self.inner.value.load(Ordering::Acquire)
    }

    /// Advances the counter and wakes every blocked waiter.
    fn advance(&self) {
        {
            let _guard = self.lock();
            self.inner.value.fetch_add(1, Ordering::AcqRel);
        }
        self.inner.changed.notify_all();
    }

    /// Blocks until the counter reaches at least `target` and returns the
    /// value observed.
    fn block_until(&self, target: usize) -> usize {
        let guard = self.lock();
        let guard = match self
            .inner
            .changed
            .wait_while(guard, |_| self.load() < target)
        {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let current = self.load();
        drop(guard);
        current
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        match self.inner.lock.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Advances the counter when dropped, so a panicking task does not
/// stall every task ordered after it.
struct TurnGuard<'a> {
    counter: &'a OrderCounter,
    index: usize,
}

impl Drop for TurnGuard<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            tracing::error!("OrderedBarrier: task {} panicked during its turn", self.index);
        }
        self.counter.advance();
    }
}

/// `OrderedBarrier` makes `task_count` tasks run their critical section
/// in index order `0, 1, ..., task_count - 1` regardless of the order in
/// which they were launched.
///
/// Handles are cheap to clone; every clone shares the same
/// [`OrderCounter`].
///
/// # Examples
///
/// ```
/// use ewe_coordination::barrier::{OrderedBarrier, WaitStrategy};
/// use std::sync::{Arc, Mutex};
/// use std::thread;
///
/// let barrier = OrderedBarrier::new(4, WaitStrategy::default()).unwrap();
/// let seen = Arc::new(Mutex::new(Vec::new()));
///
/// let handles: Vec<_> = (0..4)
///     .rev()
///     .map(|index| {
///         let barrier = barrier.clone();
///         let seen = Arc::clone(&seen);
///         thread::spawn(move || {
///             barrier
///                 .trigger(index, || seen.lock().unwrap().push(index))
///                 .unwrap();
///         })
///     })
///     .collect();
///
/// barrier.wait_complete();
/// for handle in handles {
///     handle.join().unwrap();
/// }
///
/// assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2, 3]);
/// ```
#[derive(Clone)]
pub struct OrderedBarrier {
    counter: OrderCounter,
    task_count: usize,
    strategy: WaitStrategy,
}

impl OrderedBarrier {
    pub fn new(task_count: usize, strategy: WaitStrategy) -> BarrierResult<Self> {
        Self::with_counter(OrderCounter::new(), task_count, strategy)
    }

    /// `with_counter` builds a barrier around an existing counter handle.
    /// The first index to run is the counter's current value, and barriers
    /// sharing a counter wake each other whatever their strategies.
    pub fn with_counter(
        counter: OrderCounter,
        task_count: usize,
        strategy: WaitStrategy,
    ) -> BarrierResult<Self> {
        if task_count == 0 {
            return Err(BarrierError::NoTasks);
        }

        Ok(Self {
            counter,
            task_count,
            strategy,
        })
    }

    #[must_use]
    pub fn counter(&self) -> OrderCounter {
        self.counter.clone()
    }

    #[must_use]
    pub fn position(&self) -> usize {
        self.counter.load()
    }

    #[must_use]
    pub fn task_count(&self) -> usize {
        self.task_count
    }

    #[must_use]
    pub fn strategy(&self) -> WaitStrategy {
        self.strategy
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.position() >= self.task_count
    }

    /// `trigger` waits until the counter equals `index`, runs `task`
    /// exactly once and then advances the counter.
    ///
    /// An index outside `0..task_count` or one whose turn already passed
    /// is rejected instead of waiting forever.
    pub fn trigger<F, R>(&self, index: usize, task: F) -> BarrierResult<R>
    where
        F: FnOnce() -> R,
    {
        if index >= self.task_count {
            return Err(BarrierError::IndexOutOfRange {
                index,
                task_count: self.task_count,
            });
        }

        let reached = self.wait_until(index);
        if reached != index {
            return Err(BarrierError::AlreadyTriggered(index));
        }

        let turn = TurnGuard {
            counter: &self.counter,
            index,
        };
        let result = task();
        drop(turn);

        tracing::debug!("OrderedBarrier: task {} took its turn", index);
        Ok(result)
    }

    /// `wait_complete` blocks until every index took its turn.
    pub fn wait_complete(&self) {
        self.wait_until(self.task_count);
    }

    /// Waits until the counter reaches at least `target` and returns the
    /// value it observed.
    fn wait_until(&self, target: usize) -> usize {
        match self.strategy {
            WaitStrategy::Spin { backoff } => loop {
                let current = self.counter.load();
                if current >= target {
                    return current;
                }

                if backoff.is_zero() {
                    thread::yield_now();
                } else {
                    thread::sleep(backoff);
                }
            },
            WaitStrategy::Blocking => self.counter.block_until(target),
        }
    }
}

#[cfg(test)]
mod test_ordered_barrier {
    use std::sync::Mutex;

    use super::*;

    fn run_in_reverse(strategy: WaitStrategy) -> Vec<usize> {
        let barrier = OrderedBarrier::new(10, strategy).expect("should build");
        let seen = Arc::new(Mutex::new(Vec::new()));

        let handles: Vec<_> = (0..10)
            .rev()
            .map(|index| {
                let barrier = barrier.clone();
                let seen = Arc::clone(&seen);
                thread::spawn(move || {
                    barrier
                        .trigger(index, || seen.lock().unwrap().push(index))
                        .expect("should take turn");
                })
            })
            .collect();

        barrier.wait_complete();
        for handle in handles {
            handle.join().expect("should safely join");
        }

        let seen = seen.lock().unwrap().clone();
        seen
    }

    #[test]
    fn spin_strategy_orders_reverse_launch() {
        assert_eq!(
            run_in_reverse(WaitStrategy::default()),
            (0..10).collect::<Vec<_>>()
        );
    }

    #[test]
    fn zero_backoff_spin_orders_reverse_launch() {
        assert_eq!(
            run_in_reverse(WaitStrategy::Spin {
                backoff: Duration::ZERO
            }),
            (0..10).collect::<Vec<_>>()
        );
    }

    #[test]
    fn blocking_strategy_orders_reverse_launch() {
        assert_eq!(
            run_in_reverse(WaitStrategy::Blocking),
            (0..10).collect::<Vec<_>>()
        );
    }

    #[test]
    fn trigger_returns_task_result() {
        let barrier = OrderedBarrier::new(1, WaitStrategy::Blocking).expect("should build");
        assert_eq!(barrier.trigger(0, || "done"), Ok("done"));
        assert!(barrier.is_complete());
    }

    #[test]
    fn rejects_out_of_range_and_repeated_indices() {
        let barrier = OrderedBarrier::new(2, WaitStrategy::default()).expect("should build");

        assert_eq!(
            barrier.trigger(2, || ()),
            Err(BarrierError::IndexOutOfRange {
                index: 2,
                task_count: 2
            })
        );

        barrier.trigger(0, || ()).expect("should take turn");
        assert_eq!(
            barrier.trigger(0, || ()),
            Err(BarrierError::AlreadyTriggered(0))
        );
        assert_eq!(barrier.position(), 1);
    }

    #[test]
    fn rejects_zero_tasks() {
        assert!(matches!(
            OrderedBarrier::new(0, WaitStrategy::Blocking),
            Err(BarrierError::NoTasks)
        ));
    }

    #[test]
    fn panicking_task_still_passes_the_turn_on() {
        let barrier = OrderedBarrier::new(2, WaitStrategy::Blocking).expect("should build");

        let first = barrier.clone();
        let panicked = thread::spawn(move || {
            let _ = first.trigger(0, || panic!("task failed"));
        });
        assert!(panicked.join().is_err());

        assert_eq!(barrier.trigger(1, || 1), Ok(1));
        assert!(barrier.is_complete());
    }

    #[test]
    fn shares_an_explicit_counter_handle() {
        let counter = OrderCounter::new();
        let barrier = OrderedBarrier::with_counter(counter.clone(), 3, WaitStrategy::default())
            .expect("should build");

        barrier.trigger(0, || ()).expect("should take turn");
        barrier.trigger(1, || ()).expect("should take turn");

        assert_eq!(counter.load(), 2);
        assert_eq!(barrier.counter().load(), 2);
    }

    #[test]
    #[ntest::timeout(5000)]
    fn blocking_barriers_on_one_counter_wake_each_other() {
        let counter = OrderCounter::new();
        let first = OrderedBarrier::with_counter(counter.clone(), 2, WaitStrategy::Blocking)
            .expect("should build");
        let second = OrderedBarrier::with_counter(counter.clone(), 2, WaitStrategy::Blocking)
            .expect("should build");

        let waiter = thread::spawn(move || second.trigger(1, || "second"));
        thread::sleep(Duration::from_millis(50));

        assert_eq!(first.trigger(0, || "first"), Ok("first"));
        assert_eq!(waiter.join().expect("should safely join"), Ok("second"));
        assert_eq!(counter.load(), 2);
    }

    #[test]
    #[ntest::timeout(5000)]
    fn spinning_barrier_wakes_blocked_barrier_on_shared_counter() {
        let counter = OrderCounter::new();
        let spinning = OrderedBarrier::with_counter(counter.clone(), 2, WaitStrategy::default())
            .expect("should build");
        let blocking = OrderedBarrier::with_counter(counter, 2, WaitStrategy::Blocking)
            .expect("should build");

        let waiter = {
            let blocking = blocking.clone();
            thread::spawn(move || blocking.trigger(1, || 1))
        };
        thread::sleep(Duration::from_millis(50));

        assert_eq!(spinning.trigger(0, || 0), Ok(0));
        assert_eq!(waiter.join().expect("should safely join"), Ok(1));
        blocking.wait_complete();
    }
}
