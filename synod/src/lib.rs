//! Single-decree Paxos, as described in "Paxos Made Simple", implemented as a plain state machine.
//!
//! A [`Synod`](node::Synod) decides one value. It performs no I/O and keeps no clock: the caller hands it a proposal
//! or a received command and gets back the command to send, if any. Running one `Synod` per log position and routing
//! commands by sequence number is left to the caller.

#[macro_use]
mod macros;

pub mod acceptor;
pub mod coordinator;
pub mod learner;
pub mod message;
pub mod node;

pub use message::{Cmd, Message, MessageDestination, SendableMessage};
pub use node::Synod;
