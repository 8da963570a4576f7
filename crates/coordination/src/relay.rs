// A line of single-shot stages handing an incrementing token from right to left.

use std::thread;
use std::time::Duration;

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use thiserror::Error;
use tokio::sync::oneshot;

pub type RelayResult<T> = std::result::Result<T, RelayError>;

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("relay chain needs at least one stage")]
    EmptyChain,

    #[error("failed to spawn relay stage: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("relay chain broke before the token reached its end")]
    Broken,

    #[error("relay chain did not complete within {0:?}")]
    TimedOut(Duration),

    #[error("starting {chain_length} stages from {initial} overflows u64")]
    Overflow { initial: u64, chain_length: usize },
}

/// Value leaving the leftmost stage of a chain started with `initial`.
fn completion_value(initial: u64, chain_length: usize) -> RelayResult<u64> {
    u64::try_from(chain_length)
        .ok()
        .and_then(|stages| initial.checked_add(stages))
        .ok_or(RelayError::Overflow {
            initial,
            chain_length,
        })
}

/// `RelayStage` owns the receiving end of the link on its right and the
/// only sending end of the link on its left.
struct RelayStage {
    index: usize,
    right: Receiver<u64>,
    left: Sender<u64>,
}

impl RelayStage {
    /// Runs the stage exactly once: receive, increment, forward.
    fn run(self) {
        let Ok(value) = self.right.recv() else {
            tracing::warn!("RelayStage({}): right neighbour went away", self.index);
            return;
        };

        let next = value + 1;
        if self.left.send(next).is_err() {
            tracing::warn!("RelayStage({}): left neighbour went away", self.index);
            return;
        }

        tracing::debug!("RelayStage({}): forwarded {}", self.index, next);
    }
}

/// `RelayChain` is a line of `chain_length` stages, each running on its
/// own thread and blocked on its right-hand link until the token arrives.
///
/// The rightmost link is fed by [`RelayChain::start`] and the leftmost
/// link is read through the returned [`RelayCompletion`], which yields
/// `initial + chain_length`.
///
/// # Examples
///
/// ```
/// use ewe_coordination::relay::RelayChain;
///
/// let chain = RelayChain::build(5).unwrap();
/// let completion = chain.start(0).unwrap();
///
/// assert_eq!(completion.wait().unwrap(), 5);
/// ```
pub struct RelayChain {
    entry: Sender<u64>,
    completion: Receiver<u64>,
    stages: Vec<thread::JoinHandle<()>>,
}

impl RelayChain {
    /// `build` wires the links right to left and spawns every stage
    /// before any value is sent.
    pub fn build(chain_length: usize) -> RelayResult<Self> {
        if chain_length == 0 {
            return Err(RelayError::EmptyChain);
        }

        let (leftmost, completion) = channel::bounded::<u64>(1);

        let mut left = leftmost;
        let mut stages = Vec::with_capacity(chain_length);
        for index in 0..chain_length {
            let (right_sender, right) = channel::bounded::<u64>(1);
            let stage = RelayStage { index, right, left };

            let handle = thread::Builder::new()
                .name(format!("relay-stage-{index}"))
                .spawn(move || stage.run())?;
            stages.push(handle);

            left = right_sender;
        }

        tracing::debug!("RelayChain: spawned {} stages", stages.len());
        Ok(Self {
            entry: left,
            completion,
            stages,
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// `start` sends `initial` into the rightmost link and hands back the
    /// completion signal.
    ///
    /// A start value whose completion would not fit in a `u64` is rejected
    /// with [`RelayError::Overflow`] before anything is sent.
    pub fn start(self, initial: u64) -> RelayResult<RelayCompletion> {
        completion_value(initial, self.stages.len())?;

        self.entry
            .send(initial)
            .map_err(|_| RelayError::Broken)?;

        Ok(RelayCompletion {
            receiver: self.completion,
            stages: self.stages,
        })
    }
}

/// `RelayCompletion` is the leftmost link of a started chain, readable
/// exactly once.
pub struct RelayCompletion {
    receiver: Receiver<u64>,
    stages: Vec<thread::JoinHandle<()>>,
}

impl RelayCompletion {
    /// `wait` blocks until the token leaves the leftmost stage.
    pub fn wait(self) -> RelayResult<u64> {
        let value = self.receiver.recv().map_err(|_| RelayError::Broken)?;
        join_stages(self.stages);
        Ok(value)
    }

    /// `wait_timeout` blocks for at most `timeout`; stages still running
    /// when it gives up are left detached.
    pub fn wait_timeout(self, timeout: Duration) -> RelayResult<u64> {
        match self.receiver.recv_timeout(timeout) {
            Ok(value) => {
                join_stages(self.stages);
                Ok(value)
            }
            Err(RecvTimeoutError::Timeout) => Err(RelayError::TimedOut(timeout)),
            Err(RecvTimeoutError::Disconnected) => Err(RelayError::Broken),
        }
    }
}

fn join_stages(stages: Vec<thread::JoinHandle<()>>) {
    for stage in stages {
        if stage.join().is_err() {
            tracing::warn!("RelayChain: a stage panicked after forwarding");
        }
    }
}

/// `relay` builds a chain, starts it with `initial` and waits for it.
pub fn relay(chain_length: usize, initial: u64) -> RelayResult<u64> {
    RelayChain::build(chain_length)?.start(initial)?.wait()
}

/// `relay_async` runs the same chain as cooperative tokio tasks linked
/// by oneshot channels, so it also completes on a single-threaded
/// runtime.
///
/// # Panics
///
/// Panics if called outside of a tokio runtime.
pub async fn relay_async(chain_length: usize, initial: u64) -> RelayResult<u64> {
    if chain_length == 0 {
        return Err(RelayError::EmptyChain);
    }
    completion_value(initial, chain_length)?;

    let (leftmost, completion) = oneshot::channel::<u64>();

    let mut left = leftmost;
    for index in 0..chain_length {
        let (right_sender, right) = oneshot::channel::<u64>();
        tokio::spawn(async move {
            let Ok(value) = right.await else {
                tracing::warn!("RelayStage({}): right neighbour went away", index);
                return;
            };
            if left.send(value + 1).is_err() {
                tracing::warn!("RelayStage({}): left neighbour went away", index);
            }
        });
        left = right_sender;
    }

    left.send(initial).map_err(|_| RelayError::Broken)?;
    completion.await.map_err(|_| RelayError::Broken)
}
