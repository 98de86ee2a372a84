//! Outbound transport.

use std::sync::Arc;

use synod::{Cmd, Message};

use crate::cluster::Addr;
use crate::Seqn;

/// Sends protocol messages to other members.
///
/// Delivery is best effort: implementations may drop, delay, duplicate or reorder messages.
pub trait PutterTo: Send + Sync {
    fn put_to(&self, addr: &str, message: Message);
}

/// A [`PutterTo`] bound to one position, so that a round can send commands without knowing its own sequence number.
#[derive(Clone)]
pub struct SeqnPutter {
    seqn: Seqn,
    outs: Arc<dyn PutterTo>,
}

impl SeqnPutter {
    pub fn new(seqn: Seqn, outs: Arc<dyn PutterTo>) -> Self {
        Self { seqn, outs }
    }

    pub fn put_to(&self, addr: &str, cmd: Cmd) {
        self.outs.put_to(addr, Message::new(self.seqn, cmd));
    }

    pub fn put_all<'a>(&self, addrs: impl IntoIterator<Item = &'a Addr>, cmd: &Cmd) {
        for addr in addrs {
            self.put_to(addr, cmd.clone());
        }
    }
}

/// A transport which drops everything, for nodes alone in their cluster.
#[derive(Clone, Copy, Debug, Default)]
pub struct Discard;

impl PutterTo for Discard {
    fn put_to(&self, _addr: &str, _message: Message) {}
}
