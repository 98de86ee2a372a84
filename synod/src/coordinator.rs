//! The coordinator role: drives a round from an invitation to a nomination.

use std::collections::BTreeSet;

use bytes::Bytes;

use crate::message::Cmd;

/// The state of a coordinator for a single round.
///
/// Each acceptor index owns a distinct round number, `index + 1`, so two coordinators never compete within the same
/// round. A coordinator runs at most one round: proposing again after it started has no effect.
#[derive(Debug)]
pub struct Coordinator<NodeId> {
    crnd: u64,
    quorum: usize,
    target: Option<Bytes>,
    rsvps: BTreeSet<NodeId>,
    // highest vote reported by the rsvps so far
    vrnd: u64,
    vval: Option<Bytes>,
    nominated: bool,
}

impl<NodeId: Ord> Coordinator<NodeId> {
    /// Constructs a coordinator for the acceptor at `index` in a group requiring `quorum` acceptors.
    pub fn new(index: usize, quorum: usize) -> Self {
        Self {
            crnd: index as u64 + 1,
            quorum,
            target: None,
            rsvps: BTreeSet::new(),
            vrnd: 0,
            vval: None,
            nominated: false,
        }
    }

    /// Starts the round with `value` as the preferred value, returning the [`Invite`](Cmd::Invite) to broadcast.
    pub fn propose(&mut self, value: Bytes) -> Option<Cmd> {
        if self.target.is_some() {
            return None;
        }
        self.target = Some(value);
        Some(Cmd::Invite { crnd: self.crnd })
    }

    /// Records an [`Rsvp`](Cmd::Rsvp) from `from`, returning the [`Nominate`](Cmd::Nominate) to broadcast once a
    /// quorum of acceptors joined the round.
    pub fn rsvp(&mut self, from: NodeId, i: u64, vrnd: u64, vval: Option<Bytes>) -> Option<Cmd> {
        if i != self.crnd || self.nominated || self.target.is_none() {
            return None;
        }
        if !self.rsvps.insert(from) {
            return None;
        }
        if vrnd > self.vrnd {
            self.vrnd = vrnd;
            self.vval = vval;
        }
        if self.rsvps.len() < self.quorum {
            return None;
        }

        // a value voted in an earlier round may already be chosen, so it takes precedence over ours
        let v = match (&self.vval, &self.target) {
            (Some(vval), _) => vval.clone(),
            (None, Some(target)) => target.clone(),
            (None, None) => return None,
        };
        self.nominated = true;
        Some(Cmd::Nominate { crnd: self.crnd, v })
    }

    pub fn crnd(&self) -> u64 {
        self.crnd
    }

    pub fn has_started(&self) -> bool {
        self.target.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_are_unique_per_index() {
        assert_eq!(Coordinator::<u64>::new(0, 2).crnd(), 1);
        assert_eq!(Coordinator::<u64>::new(4, 2).crnd(), 5);
    }

    #[test]
    fn propose_only_starts_once() {
        let mut coordinator = Coordinator::<u64>::new(1, 2);
        assert_eq!(
            coordinator.propose(Bytes::from_static(b"a")),
            Some(Cmd::Invite { crnd: 2 })
        );
        assert_eq!(coordinator.propose(Bytes::from_static(b"b")), None);
    }

    #[test]
    fn nominates_own_value_on_fresh_quorum() {
        let mut coordinator = Coordinator::<u64>::new(0, 2);
        let _ = coordinator.propose(Bytes::from_static(b"mine"));
        assert_eq!(coordinator.rsvp(7, 1, 0, None), None);
        // duplicate rsvps do not count twice
        assert_eq!(coordinator.rsvp(7, 1, 0, None), None);
        assert_eq!(
            coordinator.rsvp(8, 1, 0, None),
            Some(Cmd::Nominate {
                crnd: 1,
                v: Bytes::from_static(b"mine")
            })
        );
        assert_eq!(coordinator.rsvp(9, 1, 0, None), None);
    }

    #[test]
    fn nominates_highest_prior_vote() {
        let mut coordinator = Coordinator::<u64>::new(2, 3);
        let _ = coordinator.propose(Bytes::from_static(b"mine"));
        let _ = coordinator.rsvp(1, 3, 1, Some(Bytes::from_static(b"old")));
        let _ = coordinator.rsvp(2, 3, 2, Some(Bytes::from_static(b"newer")));
        assert_eq!(
            coordinator.rsvp(3, 3, 0, None),
            Some(Cmd::Nominate {
                crnd: 3,
                v: Bytes::from_static(b"newer")
            })
        );
    }

    #[test]
    fn rsvps_for_other_rounds_are_ignored() {
        let mut coordinator = Coordinator::<u64>::new(0, 1);
        let _ = coordinator.propose(Bytes::from_static(b"mine"));
        assert_eq!(coordinator.rsvp(1, 2, 0, None), None);
        assert!(coordinator.rsvp(1, 1, 0, None).is_some());
    }
}
