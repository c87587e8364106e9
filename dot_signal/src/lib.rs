//! # dot_signal
//!
//! The coordination primitives shared by the render loop and the input
//! classifiers.  Nothing here is a global: every loop is handed the handles
//! it needs, so each one can be driven in isolation with fake producers or
//! consumers.
//!
//! * [`CancelFlag`]: set-once shutdown signal with a bounded wait.
//! * [`command_channel`]: unbounded multi-producer queue of
//!   [`Command`](dot_state::Command)s, drained to empty once per tick.
//! * [`Worker`]: a named thread whose join can be abandoned after a grace
//!   period.

pub mod cancel;
pub mod channel;
pub mod worker;

pub use cancel::CancelFlag;
pub use channel::{command_channel, ChannelClosed, CommandReceiver, CommandSender};
pub use worker::{JoinOutcome, Worker};
