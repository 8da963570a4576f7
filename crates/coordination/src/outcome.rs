/// `SendOutcome` is the tagged result of a send bounded by a timeout.
///
/// A send that could not complete before its deadline hands the value
/// back through [`SendOutcome::TimedOut`] so nothing is dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome<T> {
    Delivered,
    TimedOut(T),
}

impl<T> SendOutcome<T> {
    #[must_use]
    pub fn is_delivered(&self) -> bool {
        matches!(self, SendOutcome::Delivered)
    }

    #[must_use]
    pub fn is_timed_out(&self) -> bool {
        matches!(self, SendOutcome::TimedOut(_))
    }
}

/// `RecvOutcome` is the tagged result of a receive bounded by a timeout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecvOutcome<T> {
    Received(T),

    /// The source was closed and fully drained.
    Closed,

    TimedOut,
}

impl<T> RecvOutcome<T> {
    #[must_use]
    pub fn is_timed_out(&self) -> bool {
        matches!(self, RecvOutcome::TimedOut)
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        matches!(self, RecvOutcome::Closed)
    }
}
