// Single-slot exchange between one sender role and one receiver role.

use std::sync::{Arc, MutexGuard};
use std::time::Duration;

use crate::monitor::{Condition, Monitor};
use crate::outcome::{RecvOutcome, SendOutcome};

/// `MailboxState` tells whether the slot currently holds a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MailboxState {
    Empty,
    Full,
}

struct Mailbox<T> {
    monitor: Monitor<Option<T>>,
}

impl<T> Mailbox<T> {
    fn state(&self) -> MailboxState {
        if self.monitor.enter().is_some() {
            MailboxState::Full
        } else {
            MailboxState::Empty
        }
    }

    fn fill(&self, mut slot: MutexGuard<'_, Option<T>>, value: T) {
        *slot = Some(value);
        drop(slot);
        self.monitor.notify(Condition::NotEmpty);
    }
}

/// `create` returns the two role handles of a fresh, empty mailbox.
///
/// Neither handle can be cloned, so there is exactly one sender and one
/// receiver. The sender blocks while the slot is full and the receiver
/// blocks while it is empty, which makes the two strictly alternate.
///
/// # Examples
///
/// ```
/// use ewe_coordination::mailbox;
/// use std::thread;
///
/// let (sender, receiver) = mailbox::create::<u32>();
///
/// let consumer = thread::spawn(move || {
///     (0..3).map(|_| receiver.receive()).collect::<Vec<_>>()
/// });
///
/// for value in 0..3 {
///     sender.send(value);
/// }
///
/// assert_eq!(consumer.join().unwrap(), vec![0, 1, 2]);
/// ```
#[must_use]
pub fn create<T>() -> (MailboxSender<T>, MailboxReceiver<T>) {
    let mailbox = Arc::new(Mailbox {
        monitor: Monitor::new(None),
    });

    (
        MailboxSender {
            mailbox: Arc::clone(&mailbox),
        },
        MailboxReceiver { mailbox },
    )
}

pub struct MailboxSender<T> {
    mailbox: Arc<Mailbox<T>>,
}

impl<T> MailboxSender<T> {
    /// `send` waits for the slot to be empty, then fills it and wakes the
    /// receiver.
    pub fn send(&self, value: T) {
        let monitor = &self.mailbox.monitor;

        let slot = monitor.enter();
        let slot = monitor.wait_while(slot, Condition::NotFull, |slot| slot.is_some());
        self.mailbox.fill(slot, value);
    }

    /// `send_timeout` gives up once `timeout` elapses with the slot still
    /// full, handing `value` back.
    pub fn send_timeout(&self, value: T, timeout: Duration) -> SendOutcome<T> {
        let monitor = &self.mailbox.monitor;

        let slot = monitor.enter();
        let (slot, timed_out) =
            monitor.wait_timeout_while(slot, Condition::NotFull, timeout, |slot| slot.is_some());

        if timed_out {
            tracing::debug!("MailboxSender: send timed out after {:?}", timeout);
            return SendOutcome::TimedOut(value);
        }

        self.mailbox.fill(slot, value);
        SendOutcome::Delivered
    }

    #[must_use]
    pub fn state(&self) -> MailboxState {
        self.mailbox.state()
    }
}

pub struct MailboxReceiver<T> {
    mailbox: Arc<Mailbox<T>>,
}

impl<T> MailboxReceiver<T> {
    /// `receive` waits for the slot to be full, then empties it and wakes
    /// the sender.
    pub fn receive(&self) -> T {
        let monitor = &self.mailbox.monitor;

        loop {
            let slot = monitor.enter();
            let mut slot = monitor.wait_while(slot, Condition::NotEmpty, |slot| slot.is_none());

            if let Some(value) = slot.take() {
                drop(slot);
                monitor.notify(Condition::NotFull);
                return value;
            }
        }
    }

    /// `receive_timeout` gives up once `timeout` elapses with the slot
    /// still empty. A mailbox is never closed, so the outcome is either
    /// [`RecvOutcome::Received`] or [`RecvOutcome::TimedOut`].
    pub fn receive_timeout(&self, timeout: Duration) -> RecvOutcome<T> {
        let monitor = &self.mailbox.monitor;

        let slot = monitor.enter();
        let (mut slot, _) =
            monitor.wait_timeout_while(slot, Condition::NotEmpty, timeout, |slot| slot.is_none());

        match slot.take() {
            Some(value) => {
                drop(slot);
                monitor.notify(Condition::NotFull);
                RecvOutcome::Received(value)
            }
            None => RecvOutcome::TimedOut,
        }
    }

    #[must_use]
    pub fn state(&self) -> MailboxState {
        self.mailbox.state()
    }
}
