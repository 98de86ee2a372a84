//! The round for a single position.

use std::collections::VecDeque;
use std::sync::Mutex;

use bytes::Bytes;
use crossbeam_channel::Sender;
use synod::{Message, MessageDestination, SendableMessage, Synod};

use crate::cluster::{Addr, Cluster};
use crate::transport::SeqnPutter;
use crate::{unlock, Seqn};

/// A value learned by the round for `seqn`.
#[derive(Clone, Debug, PartialEq)]
pub struct Learned {
    pub seqn: Seqn,
    pub value: Bytes,
}

/// The consensus round for one position, as run by this node.
///
/// Commands addressed to this node are handled in place; everything else goes out through the transport. When the
/// round learns a value, it is sent on the shared learned channel, exactly once.
pub struct Instance {
    seqn: Seqn,
    cluster: Cluster,
    outs: SeqnPutter,
    learned: Sender<Learned>,
    state: Mutex<State>,
}

struct State {
    synod: Synod<Addr>,
    emitted: bool,
}

impl Instance {
    pub fn new(
        seqn: Seqn,
        cluster: Cluster,
        outs: SeqnPutter,
        learned: Sender<Learned>,
    ) -> Self {
        let synod = Synod::new(cluster.self_addr().clone(), cluster.cals().to_vec());
        Self {
            seqn,
            cluster,
            outs,
            learned,
            state: Mutex::new(State {
                synod,
                emitted: false,
            }),
        }
    }

    /// Proposes `value` for this position. Has no effect if this node already proposed or the round already learned.
    pub fn propose(&self, value: Bytes) {
        self.step(|synod| synod.propose(value));
    }

    /// Applies one protocol message received from `addr`.
    pub fn put_from(&self, addr: &str, message: Message) {
        if let Some(cmd) = message.cmd {
            let from = addr.to_string();
            self.step(|synod| synod.receive(cmd, from));
        }
    }

    /// Returns the value this round learned, if any.
    #[cfg(test)]
    pub fn learned(&self) -> Option<Bytes> {
        unlock(&self.state).synod.learned().cloned()
    }

    fn step<F>(&self, first: F)
    where
        F: FnOnce(&mut Synod<Addr>) -> Option<SendableMessage<Addr>>,
    {
        let self_addr = self.cluster.self_addr();
        let mut outbox: Vec<SendableMessage<Addr>> = Vec::new();
        let mut newly_learned = None;

        {
            let mut state = unlock(&self.state);
            let mut local: VecDeque<SendableMessage<Addr>> =
                first(&mut state.synod).into_iter().collect();

            while let Some(sendable) = local.pop_front() {
                let to_self = match &sendable.dest {
                    MessageDestination::Broadcast => true,
                    MessageDestination::To(addr) => addr == self_addr,
                };
                if to_self {
                    let reply = state.synod.receive(sendable.cmd.clone(), self_addr.clone());
                    local.extend(reply);
                }
                outbox.push(sendable);
            }

            if !state.emitted {
                newly_learned = state.synod.learned().cloned();
                state.emitted = newly_learned.is_some();
            }
        }

        for sendable in outbox {
            self.send(sendable);
        }

        if let Some(value) = newly_learned {
            let _ = self.learned.send(Learned {
                seqn: self.seqn,
                value,
            });
        }
    }

    fn send(&self, sendable: SendableMessage<Addr>) {
        let SendableMessage { cmd, dest } = sendable;
        match dest {
            MessageDestination::Broadcast => {
                log::debug!("paxos {} -> all {}", self.seqn, cmd);
                self.outs.put_all(self.cluster.peers(), &cmd);
            }
            MessageDestination::To(addr) if addr != *self.cluster.self_addr() => {
                log::debug!("paxos {} -> {} {}", self.seqn, addr, cmd);
                self.outs.put_to(&addr, cmd);
            }
            MessageDestination::To(_) => {}
        }
    }
}
