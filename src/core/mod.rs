//! Core dispatch types
//!
//! Admission gate, one-shot reply slots, and the request object that ties
//! a payload, its work function, and its reply path together.

pub mod gate;
pub mod reply;
pub mod request;

pub use gate::{AdmissionGate, Ticket};
pub use reply::{PendingReply, ReplyTx};
pub use request::{Request, WorkFn, WorkResult};
