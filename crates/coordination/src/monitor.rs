// Implements a two-condition monitor usable across threads.

use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::Duration;

/// `Condition` names one of the two wait queues of a [`Monitor`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Condition {
    /// Signalled when room becomes available in the guarded state.
    NotFull,

    /// Signalled when a value becomes available in the guarded state.
    NotEmpty,
}

/// `Monitor` pairs one exclusive lock over some state `S` with two
/// wait queues, [`Condition::NotFull`] and [`Condition::NotEmpty`].
///
/// Waiters always re-check their predicate after waking up so a
/// spurious wakeup or a stolen notification never breaks the caller's
/// invariant. Notifications wake a single waiter unless
/// [`Monitor::notify_all`] is used.
pub struct Monitor<S> {
    state: Mutex<S>,
    not_full: Condvar,
    not_empty: Condvar,
}

impl<S> Monitor<S> {
    pub fn new(state: S) -> Self {
        Self {
            state: Mutex::new(state),
            not_full: Condvar::new(),
            not_empty: Condvar::new(),
        }
    }

    fn condvar(&self, condition: Condition) -> &Condvar {
        match condition {
            Condition::NotFull => &self.not_full,
            Condition::NotEmpty => &self.not_empty,
        }
    }

    /// `enter` acquires the monitor's lock.
    ///
    /// A poisoned lock is recovered: every state transition done under
    /// the lock completes before control returns to user code.
    pub fn enter(&self) -> MutexGuard<'_, S> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// `wait_while` blocks on `condition` for as long as `predicate`
    /// holds for the guarded state, returning the re-acquired guard.
    pub fn wait_while<'a, F>(
        &self,
        guard: MutexGuard<'a, S>,
        condition: Condition,
        predicate: F,
    ) -> MutexGuard<'a, S>
    where
        F: FnMut(&mut S) -> bool,
    {
        match self.condvar(condition).wait_while(guard, predicate) {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// `wait_timeout_while` behaves like [`Monitor::wait_while`] but gives
    /// up after `timeout`. The returned flag is true when the wait ended
    /// because the timeout elapsed with the predicate still holding.
    pub fn wait_timeout_while<'a, F>(
        &self,
        guard: MutexGuard<'a, S>,
        condition: Condition,
        timeout: Duration,
        predicate: F,
    ) -> (MutexGuard<'a, S>, bool)
    where
        F: FnMut(&mut S) -> bool,
    {
        let (guard, result) = match self
            .condvar(condition)
            .wait_timeout_while(guard, timeout, predicate)
        {
            Ok(inner) => inner,
            Err(poisoned) => poisoned.into_inner(),
        };
        (guard, result.timed_out())
    }

    /// `notify` wakes a single waiter blocked on `condition`.
    pub fn notify(&self, condition: Condition) {
        self.condvar(condition).notify_one();
    }

    /// `notify_all` wakes every waiter blocked on `condition`.
    pub fn notify_all(&self, condition: Condition) {
        self.condvar(condition).notify_all();
    }
}
