//! Higher-level API for the round of a single node.

use std::collections::BTreeSet;
use std::fmt::Display;

use bytes::Bytes;

use crate::acceptor::Acceptor;
use crate::coordinator::Coordinator;
use crate::learner::Learner;
use crate::message::{Cmd, MessageDestination, SendableMessage};

/// One node's view of a single-decree consensus round, combining the acceptor, coordinator and learner roles.
///
/// # Message delivery
///
/// [`propose`] and [`receive`] return at most one command to be sent, together with its destination. A
/// [`Broadcast`](MessageDestination::Broadcast) is meant for every member *including this node*: the caller must feed
/// it back through [`receive`] with this node's own id as the sender, since this node's acceptor and learner take part
/// in the round like any other.
///
/// Commands may be delivered out of order, more than once, or not at all without affecting safety. A round makes
/// progress once the commands of its highest-numbered coordinator reach a quorum of acceptors and their votes reach
/// the learners.
///
/// # Roles
///
/// Only members of the acceptor group accept and coordinate. Every node learns, counting only votes from acceptors.
///
/// [`propose`]: Self::propose
/// [`receive`]: Self::receive
pub struct Synod<NodeId> {
    node_id: NodeId,
    acceptors: BTreeSet<NodeId>,
    acceptor: Option<Acceptor>,
    coordinator: Option<Coordinator<NodeId>>,
    learner: Learner<NodeId>,
}

impl<NodeId> Synod<NodeId>
where
    NodeId: Ord + Clone + Display,
{
    /// Constructs the round for `node_id` within the ordered group `acceptors`.
    ///
    /// `acceptors` must be ordered the same way on every node, since a node's position in it determines its round
    /// number. `node_id` may be absent from `acceptors`, in which case the node only learns.
    pub fn new(node_id: NodeId, acceptors: Vec<NodeId>) -> Self {
        let quorum = acceptors.len() / 2 + 1;
        let index = acceptors.iter().position(|id| *id == node_id);
        Self {
            acceptor: index.map(|_| Acceptor::new()),
            coordinator: index.map(|index| Coordinator::new(index, quorum)),
            learner: Learner::new(quorum),
            acceptors: acceptors.into_iter().collect(),
            node_id,
        }
    }

    /// Starts coordinating the round with `value`, returning the command to be sent.
    ///
    /// Proposing is idempotent: it has no effect once this node started coordinating, once a value was learned, or if
    /// this node is not an acceptor.
    #[must_use = "This function returns a command to be sent."]
    pub fn propose(&mut self, value: Bytes) -> Option<SendableMessage<NodeId>> {
        if self.learner.learned().is_some() {
            return None;
        }
        let coordinator = self.coordinator.as_mut()?;
        let cmd = coordinator.propose(value)?;
        verbose!("{} coordinating round {}", self.node_id, coordinator.crnd());
        Some(SendableMessage {
            cmd,
            dest: MessageDestination::Broadcast,
        })
    }

    /// Processes receipt of `cmd` from the member with id `from`, returning the command to be sent in response.
    #[must_use = "This function returns a command to be sent."]
    pub fn receive(&mut self, cmd: Cmd, from: NodeId) -> Option<SendableMessage<NodeId>> {
        match cmd {
            Cmd::Invite { crnd } => {
                let rsvp = self.acceptor.as_mut()?.invite(crnd)?;
                Some(SendableMessage {
                    cmd: rsvp,
                    dest: MessageDestination::To(from),
                })
            }
            Cmd::Nominate { crnd, v } => {
                let vote = self.acceptor.as_mut()?.nominate(crnd, v)?;
                Some(SendableMessage {
                    cmd: vote,
                    dest: MessageDestination::Broadcast,
                })
            }
            Cmd::Rsvp { i, vrnd, vval } => {
                if !self.acceptors.contains(&from) {
                    verbose!("{} ignoring rsvp from non-acceptor {}", self.node_id, from);
                    return None;
                }
                let nominate = self.coordinator.as_mut()?.rsvp(from, i, vrnd, vval)?;
                Some(SendableMessage {
                    cmd: nominate,
                    dest: MessageDestination::Broadcast,
                })
            }
            Cmd::Vote { i, vval } => {
                if !self.acceptors.contains(&from) {
                    verbose!("{} ignoring vote from non-acceptor {}", self.node_id, from);
                    return None;
                }
                if let Some(v) = self.learner.vote(from, i, vval) {
                    verbose!("{} learned {:?} in round {}", self.node_id, v, i);
                }
                None
            }
        }
    }

    /// Returns the value this node learned, if any.
    pub fn learned(&self) -> Option<&Bytes> {
        self.learner.learned()
    }

    /// Returns whether this node is an acceptor of the round.
    pub fn is_acceptor(&self) -> bool {
        self.acceptor.is_some()
    }

    /// Returns whether this node started coordinating the round.
    pub fn is_coordinating(&self) -> bool {
        self.coordinator
            .as_ref()
            .map_or(false, Coordinator::has_started)
    }

    /// Returns this node's ID.
    pub fn node_id(&self) -> &NodeId {
        &self.node_id
    }
}
