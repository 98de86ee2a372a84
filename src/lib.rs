//! The coordination core of a replicated log.
//!
//! Each position of the log is decided by its own single-decree Paxos round. A [`Manager`] hands out the positions
//! this node leads, round-robin over the acceptors, routes inbound protocol messages to the right round, and proposes
//! a placeholder ([`NOP`]) for positions a slow or failed leader left behind, so the log never stalls on a gap.
//!
//! Membership, persistence and transport are collaborators: see [`Oracle`], [`Store`] and [`PutterTo`].

use std::sync::{Mutex, MutexGuard, PoisonError};

use bytes::Bytes;

mod allocator;
pub mod cluster;
pub mod config;
pub mod error;
mod filler;
mod holdback;
mod instance;
pub mod manager;
pub mod net;
mod registry;
pub mod store;
pub mod transport;

pub use cluster::{Addr, Cluster, Oracle, Registrar};
pub use config::Config;
pub use error::Error;
pub use manager::Manager;
pub use net::LocalNet;
pub use store::{Event, MemStore, Store, StoreError};
pub use synod::{Cmd, Message};
pub use transport::{Discard, PutterTo};

/// A position in the log.
pub type Seqn = u64;

/// The placeholder value proposed for positions left behind.
pub const NOP: Bytes = Bytes::from_static(b"nop:");

pub(crate) fn unlock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
