//! Inbound messages for positions whose membership is not settled yet.
//!
//! A round binds its acceptor set when it is created, so it must not be created before the membership for its
//! position is final. Messages from peers running ahead are parked here and replayed, lowest position first, once
//! the oracle reports their position settled.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{unbounded, Sender, TryRecvError};
use synod::Message;

use crate::cluster::{Addr, Oracle};
use crate::Seqn;

// How long to wait on the oracle before checking for newly parked messages.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Spawns the holdback thread, returning the channel on which unsettled messages are parked.
///
/// Each message is handed to `deliver` with its sender once its position is settled. The thread exits when the
/// sender is dropped, dropping whatever is still parked, or when `deliver` returns `false`.
pub fn spawn<F>(oracle: Arc<dyn Oracle>, deliver: F) -> Sender<(Addr, Message)>
where
    F: FnMut(Addr, Message) -> bool + Send + 'static,
{
    let (park, recv) = unbounded::<(Addr, Message)>();

    let _ = thread::spawn(move || {
        let mut deliver = deliver;
        let mut parked: BTreeMap<Seqn, Vec<(Addr, Message)>> = BTreeMap::new();

        loop {
            let next = if parked.is_empty() {
                match recv.recv() {
                    Ok(next) => Some(next),
                    Err(_) => return,
                }
            } else {
                match recv.try_recv() {
                    Ok(next) => Some(next),
                    Err(TryRecvError::Empty) => None,
                    Err(TryRecvError::Disconnected) => return,
                }
            };
            if let Some((from, message)) = next {
                parked.entry(message.seqn()).or_default().push((from, message));
                continue;
            }

            let lowest = match parked.keys().next() {
                Some(lowest) => *lowest,
                None => continue,
            };
            if !oracle.wait_for(lowest, POLL_INTERVAL) {
                continue;
            }
            for (from, message) in parked.remove(&lowest).unwrap_or_default() {
                log::debug!("holdback replaying {} from {}", message, from);
                if !deliver(from, message) {
                    return;
                }
            }
        }
    });

    park
}
