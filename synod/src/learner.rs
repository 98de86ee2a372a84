//! The learner role: tallies votes until a value is chosen.

use std::collections::BTreeMap;

use bytes::Bytes;

/// The state of a learner for a single round.
#[derive(Debug)]
pub struct Learner<NodeId> {
    quorum: usize,
    // round -> voter -> value
    votes: BTreeMap<u64, BTreeMap<NodeId, Bytes>>,
    learned: Option<Bytes>,
}

impl<NodeId: Ord> Learner<NodeId> {
    pub fn new(quorum: usize) -> Self {
        Self {
            quorum,
            votes: BTreeMap::new(),
            learned: None,
        }
    }

    /// Records a vote from `from` for `vval` in round `i`, returning the value if this vote completed a quorum.
    ///
    /// A value is returned at most once over the lifetime of a learner.
    pub fn vote(&mut self, from: NodeId, i: u64, vval: Bytes) -> Option<Bytes> {
        if self.learned.is_some() {
            return None;
        }

        let round = self.votes.entry(i).or_default();
        round.entry(from).or_insert(vval.clone());
        let count = round.values().filter(|v| **v == vval).count();
        if count < self.quorum {
            return None;
        }

        self.votes.clear();
        self.learned = Some(vval.clone());
        Some(vval)
    }

    pub fn learned(&self) -> Option<&Bytes> {
        self.learned.as_ref()
    }
}
