//! Request objects
//!
//! A request bundles the payload, the work function to apply to it, and the
//! write half of its reply slot. The reply path being embedded in the
//! request is what makes out-of-order completion safe: no correlation IDs,
//! no pending-request table, each caller waits only on its own slot.

use crate::core::reply::{PendingReply, ReplyTx};

/// Outcome of a work function: a value or a failure message
///
/// Failures travel to the caller through the reply slot as ordinary results,
/// never as panics.
pub type WorkResult<R> = std::result::Result<R, String>;

/// The opaque callable applied to a request's payload
pub type WorkFn<T, R> = Box<dyn FnOnce(T) -> WorkResult<R> + Send + 'static>;

/// One unit of work in flight
///
/// Constructed at submission time; owned by the engine from enqueue until
/// its reply is delivered. Not mutated after construction except for the
/// single write of its reply slot.
pub struct Request<T, R> {
    pub(crate) payload: T,
    pub(crate) work: WorkFn<T, R>,
    pub(crate) reply: ReplyTx<R>,
}

impl<T, R> Request<T, R> {
    /// Build a request and the caller's handle to its eventual reply
    pub fn new<F>(payload: T, work: F) -> (Self, PendingReply<R>)
    where
        F: FnOnce(T) -> WorkResult<R> + Send + 'static,
    {
        let (reply, pending) = ReplyTx::pair();
        (
            Self {
                payload,
                work: Box::new(work),
                reply,
            },
            pending,
        )
    }
}
