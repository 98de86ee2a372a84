//! Synod message types for sending between nodes.
//!
//! The top-level message type is [`Message`], which tags a [`Cmd`] with the sequence number of the round it belongs
//! to. A [`Synod`](crate::node::Synod) itself never looks at the sequence number: it consumes and produces bare
//! [`Cmd`]s, and whoever routes messages between rounds is responsible for the envelope.

use core::fmt;

use bytes::Bytes;

/// A [`Cmd`] to be sent to a destination.
pub struct SendableMessage<NodeId> {
    /// The command to be sent.
    pub cmd: Cmd,

    /// The destination for the command.
    pub dest: MessageDestination<NodeId>,
}

/// The destination for a [`SendableMessage`].
#[derive(Clone, Debug, PartialEq)]
pub enum MessageDestination<NodeId> {
    /// The associated command should be sent to every member, including the sender.
    Broadcast,
    /// The associated command should be sent to one particular member.
    To(NodeId),
}

/// A message exchanged between the rounds of two nodes.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Message {
    /// The sequence number of the round this message belongs to.
    pub seqn: u64,

    /// The command contained by this message.
    ///
    /// A message received from the network may fail to carry a command it can be decoded to, in which case this is
    /// `None` and the message is not [well formed](Self::is_well_formed).
    pub cmd: Option<Cmd>,
}

/// A command of the single-decree Paxos protocol.
///
/// Round numbers are never zero: zero stands for "no round" in the `vrnd` of an [`Rsvp`](Cmd::Rsvp).
#[derive(Clone, Debug, PartialEq)]
pub enum Cmd {
    /// Phase 1a: a coordinator asks acceptors to join round `crnd`.
    Invite {
        /// The coordinator's round.
        crnd: u64,
    },

    /// Phase 1b: an acceptor promises to ignore rounds lower than `i`, reporting its last vote.
    Rsvp {
        /// The round being joined.
        i: u64,
        /// The round of the acceptor's last vote, or zero if it never voted.
        vrnd: u64,
        /// The value of the acceptor's last vote.
        vval: Option<Bytes>,
    },

    /// Phase 2a: a coordinator asks acceptors to vote for `v` in round `crnd`.
    Nominate {
        /// The coordinator's round.
        crnd: u64,
        /// The value to vote for.
        v: Bytes,
    },

    /// Phase 2b: an acceptor announces its vote for `vval` in round `i`.
    Vote {
        /// The round voted in.
        i: u64,
        /// The value voted for.
        vval: Bytes,
    },
}

//
// Message impls
//

impl Message {
    /// Wraps `cmd` for the round with sequence number `seqn`.
    pub fn new(seqn: u64, cmd: Cmd) -> Self {
        Self {
            seqn,
            cmd: Some(cmd),
        }
    }

    /// Returns the sequence number of the round this message targets.
    pub fn seqn(&self) -> u64 {
        self.seqn
    }

    /// Returns whether this message carries a command which is internally consistent.
    pub fn is_well_formed(&self) -> bool {
        self.cmd.as_ref().map_or(false, Cmd::is_well_formed)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self { seqn, cmd } = self;
        let mut debug = fmt.debug_tuple("");
        debug.field(seqn);
        if let Some(cmd) = cmd {
            debug.field(&format_args!("{}", cmd));
        } else {
            debug.field(&"None");
        }
        debug.finish()
    }
}

//
// Cmd impls
//

impl Cmd {
    /// Returns whether every round number is non-zero and an [`Rsvp`](Cmd::Rsvp) carries a value exactly when it
    /// reports a vote from an earlier round.
    pub fn is_well_formed(&self) -> bool {
        match self {
            Cmd::Invite { crnd } => *crnd > 0,
            Cmd::Rsvp { i, vrnd, vval } => *i > 0 && *vrnd < *i && (*vrnd > 0) == vval.is_some(),
            Cmd::Nominate { crnd, .. } => *crnd > 0,
            Cmd::Vote { i, .. } => *i > 0,
        }
    }
}

impl fmt::Display for Cmd {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cmd::Invite { crnd } => fmt.debug_struct("Invite").field("crnd", crnd).finish(),
            Cmd::Rsvp { i, vrnd, vval } => fmt
                .debug_struct("Rsvp")
                .field("i", i)
                .field("vrnd", vrnd)
                .field("vval", vval)
                .finish(),
            Cmd::Nominate { crnd, v } => fmt
                .debug_struct("Nominate")
                .field("crnd", crnd)
                .field("v", v)
                .finish(),
            Cmd::Vote { i, vval } => fmt
                .debug_struct("Vote")
                .field("i", i)
                .field("vval", vval)
                .finish(),
        }
    }
}
