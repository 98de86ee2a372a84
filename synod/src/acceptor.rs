//! The acceptor role: the durable memory of a round.

use bytes::Bytes;

use crate::message::Cmd;

/// The state of an acceptor for a single round.
#[derive(Debug, Default)]
pub struct Acceptor {
    // highest round promised
    rnd: u64,
    // round and value of the last vote
    vrnd: u64,
    vval: Option<Bytes>,
}

impl Acceptor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handles an invitation to round `crnd`, returning the [`Rsvp`](Cmd::Rsvp) to send back to the coordinator.
    ///
    /// An acceptor joins a round only once, and never a round lower than one it already joined.
    pub fn invite(&mut self, crnd: u64) -> Option<Cmd> {
        if crnd <= self.rnd {
            verbose!("acceptor ignoring invite {}, promised {}", crnd, self.rnd);
            return None;
        }
        self.rnd = crnd;
        Some(Cmd::Rsvp {
            i: crnd,
            vrnd: self.vrnd,
            vval: self.vval.clone(),
        })
    }

    /// Handles a nomination of `v` in round `crnd`, returning the [`Vote`](Cmd::Vote) to broadcast.
    pub fn nominate(&mut self, crnd: u64, v: Bytes) -> Option<Cmd> {
        if crnd < self.rnd {
            verbose!("acceptor ignoring nominate {}, promised {}", crnd, self.rnd);
            return None;
        }
        self.rnd = crnd;
        self.vrnd = crnd;
        self.vval = Some(v.clone());
        Some(Cmd::Vote { i: crnd, vval: v })
    }

    pub fn rnd(&self) -> u64 {
        self.rnd
    }

    /// Returns the round and value of the last vote cast, if any.
    pub fn last_vote(&self) -> Option<(u64, &Bytes)> {
        self.vval.as_ref().map(|vval| (self.vrnd, vval))
    }
}
