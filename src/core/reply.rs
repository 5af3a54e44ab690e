//! One-shot reply slots
//!
//! Each request carries its own dedicated reply path, so responses find
//! their caller without any central table of pending requests: the write
//! half travels with the request, the read half stays with the submitter.
//!
//! Single-write is enforced by move semantics (`deliver` consumes the write
//! half); a completed value is cached on the read side so repeated reads
//! observe the identical result without re-running any work.

use crate::{DispatchError, Result};
use tokio::sync::{oneshot, Mutex};

/// Write half of a reply slot
///
/// Created together with its [`PendingReply`] via [`ReplyTx::pair`]. Consumed
/// by [`deliver`](Self::deliver), so a slot can never be written twice.
/// Delivery to an abandoned reader is a silent no-op: the worker side never
/// blocks on a caller that stopped listening.
pub struct ReplyTx<R> {
    tx: oneshot::Sender<Result<R>>,
}

impl<R> ReplyTx<R> {
    /// Create a linked write/read pair
    pub fn pair() -> (ReplyTx<R>, PendingReply<R>) {
        let (tx, rx) = oneshot::channel();
        (
            ReplyTx { tx },
            PendingReply {
                state: Mutex::new(ReplyState::Waiting(rx)),
            },
        )
    }

    /// Write the slot's one and only value
    ///
    /// The value is dropped if the reader abandoned its wait.
    pub fn deliver(self, result: Result<R>) {
        let _ = self.tx.send(result);
    }
}

/// Read state: still waiting on the channel, or terminal value cached
#[derive(Debug)]
enum ReplyState<R> {
    Waiting(oneshot::Receiver<Result<R>>),
    Done(Result<R>),
}

/// Caller-side handle to one eventual reply
///
/// `recv` suspends until the slot is written. The first completed read
/// caches the value; later reads return the identical result.
#[derive(Debug)]
pub struct PendingReply<R> {
    state: Mutex<ReplyState<R>>,
}

impl<R: Clone> PendingReply<R> {
    /// Wait for the reply
    ///
    /// Returns `DispatchError::ReplyDropped` if the write half was destroyed
    /// without delivering (engine torn down before the request ran).
    ///
    /// Cancellation safe: abandoning this wait (e.g. under
    /// `tokio::time::timeout`) leaves the slot intact, and a later `recv`
    /// still observes the delivered value.
    pub async fn recv(&self) -> Result<R> {
        let mut state = self.state.lock().await;
        match &mut *state {
            ReplyState::Done(value) => value.clone(),
            ReplyState::Waiting(rx) => {
                let value = match rx.await {
                    Ok(value) => value,
                    Err(_) => Err(DispatchError::ReplyDropped),
                };
                *state = ReplyState::Done(value.clone());
                value
            }
        }
    }

    /// Non-blocking probe: the reply if it is already written
    pub fn try_recv(&self) -> Option<Result<R>> {
        let mut state = self.state.try_lock().ok()?;
        match &mut *state {
            ReplyState::Done(value) => Some(value.clone()),
            ReplyState::Waiting(rx) => match rx.try_recv() {
                Ok(value) => {
                    *state = ReplyState::Done(value.clone());
                    Some(value)
                }
                Err(oneshot::error::TryRecvError::Empty) => None,
                Err(oneshot::error::TryRecvError::Closed) => {
                    let value = Err(DispatchError::ReplyDropped);
                    *state = ReplyState::Done(value.clone());
                    Some(value)
                }
            },
        }
    }
}
