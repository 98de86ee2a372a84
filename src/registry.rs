//! The sequence number to round mapping.

use std::collections::HashMap;
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{bounded, unbounded, Sender};

use crate::error::Error;
use crate::Seqn;

struct Request<R> {
    seqn: Seqn,
    reply: Sender<Arc<R>>,
}

/// A handle to the registry thread, which exclusively owns every round.
///
/// Rounds are created on first lookup, whether that lookup comes from a local proposal or an inbound message, and
/// live as long as the registry. Lookups are serialized through the registry thread, so concurrent lookups of the
/// same unseen position always observe the same round.
pub struct Registry<R> {
    reqs: Sender<Request<R>>,
}

impl<R> Clone for Registry<R> {
    fn clone(&self) -> Self {
        Self {
            reqs: self.reqs.clone(),
        }
    }
}

impl<R> Registry<R>
where
    R: Send + Sync + 'static,
{
    /// Spawns the registry thread, building rounds with `make`.
    ///
    /// The thread exits once every handle has been dropped.
    pub fn spawn<F>(make: F) -> Self
    where
        F: FnMut(Seqn) -> R + Send + 'static,
    {
        let (reqs, recv) = unbounded::<Request<R>>();

        let _ = thread::spawn(move || {
            let mut make = make;
            let mut rounds: HashMap<Seqn, Arc<R>> = HashMap::new();

            for req in recv {
                let round = rounds
                    .entry(req.seqn)
                    .or_insert_with(|| {
                        log::debug!("registry creating round {}", req.seqn);
                        Arc::new(make(req.seqn))
                    })
                    .clone();
                let _ = req.reply.send(round);
            }

            log::debug!("registry stopped with {} rounds", rounds.len());
        });

        Self { reqs }
    }

    /// Returns the round for `seqn`, creating it if this is the first reference to it.
    pub fn get(&self, seqn: Seqn) -> Result<Arc<R>, Error> {
        let (reply, round) = bounded(1);
        self.reqs.send(Request { seqn, reply })?;
        Ok(round.recv()?)
    }
}
