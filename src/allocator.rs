//! Round-robin allocation of the positions this node leads.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender};

use crate::cluster::{Cluster, Oracle};
use crate::Seqn;

// How often a blocked allocator checks whether it was closed.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Spawns the allocator thread, returning the channel on which it offers positions led by `self_addr`, in increasing
/// order, starting at `first`.
///
/// The channel has no capacity: each offer blocks until a proposer takes it, so at most one led position is
/// outstanding at a time. The thread exits when the receiver is dropped or `closed` is set.
pub fn spawn(
    first: Seqn,
    self_addr: String,
    oracle: Arc<dyn Oracle>,
    closed: Arc<AtomicBool>,
) -> Receiver<Seqn> {
    let (seqns, recv) = bounded(0);

    let _ = thread::spawn(move || gen(first, &self_addr, oracle.as_ref(), &closed, &seqns));

    recv
}

fn gen(
    mut next: Seqn,
    self_addr: &str,
    oracle: &dyn Oracle,
    closed: &AtomicBool,
    seqns: &Sender<Seqn>,
) {
    loop {
        while !oracle.wait_for(next, POLL_INTERVAL) {
            if closed.load(Ordering::Relaxed) {
                return;
            }
        }
        if closed.load(Ordering::Relaxed) {
            return;
        }

        let cluster = Cluster::for_seqn(oracle, self_addr, next);
        if cluster.is_leader(next) {
            log::debug!("allocator offering {}", next);
            if seqns.send(next).is_err() {
                return;
            }
        }
        next += 1;
    }
}
