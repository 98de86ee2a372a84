//! An in-process transport connecting the managers of several nodes.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, Weak};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Receiver, Sender};
use synod::Message;

use crate::cluster::Addr;
use crate::manager::Manager;
use crate::transport::PutterTo;
use crate::unlock;

/// A set of mailboxes, one per joined address, with drop rules to simulate partitions.
///
/// Cloning a `LocalNet` yields a handle on the same network.
#[derive(Clone, Default)]
pub struct LocalNet {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    mailboxes: HashMap<Addr, Sender<(Addr, Message)>>,
    isolated: HashSet<Addr>,
    dropped: HashSet<(Addr, Addr)>,
}

impl Inner {
    fn delivers(&self, from: &str, to: &str) -> bool {
        if from == to {
            return true;
        }
        !self.isolated.contains(from)
            && !self.isolated.contains(to)
            && !self.dropped.contains(&(from.to_string(), to.to_string()))
    }
}

impl LocalNet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens the mailbox of `addr`, replacing any previous one. Messages sent before joining are lost.
    pub fn join<A: Into<Addr>>(&self, addr: A) -> Receiver<(Addr, Message)> {
        let (sender, mailbox) = unbounded();
        unlock(&self.inner).mailboxes.insert(addr.into(), sender);
        mailbox
    }

    /// Closes the mailbox of `addr`. Its receiver disconnects once drained.
    pub fn leave(&self, addr: &str) {
        unlock(&self.inner).mailboxes.remove(addr);
    }

    /// Returns the transport through which `from` sends.
    pub fn endpoint<A: Into<Addr>>(&self, from: A) -> Arc<dyn PutterTo> {
        Arc::new(Endpoint {
            from: from.into(),
            net: self.clone(),
        })
    }

    /// Drops every message to or from `addr` until [`heal`](Self::heal).
    pub fn isolate(&self, addr: &str) {
        unlock(&self.inner).isolated.insert(addr.to_string());
    }

    /// Drops every message between `a` and `b`, both ways, until [`heal`](Self::heal).
    pub fn drop_between(&self, a: &str, b: &str) {
        let mut inner = unlock(&self.inner);
        inner.dropped.insert((a.to_string(), b.to_string()));
        inner.dropped.insert((b.to_string(), a.to_string()));
    }

    pub fn heal(&self) {
        let mut inner = unlock(&self.inner);
        inner.isolated.clear();
        inner.dropped.clear();
    }

    fn deliver(&self, from: &str, to: &str, message: Message) {
        let mailbox = {
            let inner = unlock(&self.inner);
            if !inner.delivers(from, to) {
                log::trace!("net dropping {} -> {} {}", from, to, message);
                return;
            }
            match inner.mailboxes.get(to) {
                Some(mailbox) => mailbox.clone(),
                None => return,
            }
        };
        let _ = mailbox.send((from.to_string(), message));
    }
}

struct Endpoint {
    from: Addr,
    net: LocalNet,
}

impl PutterTo for Endpoint {
    fn put_to(&self, addr: &str, message: Message) {
        self.net.deliver(&self.from, addr, message);
    }
}

/// Spawns a thread handing every message from `mailbox` to `manager`.
///
/// The thread does not keep the manager alive: it exits when the manager is dropped or the mailbox is closed.
pub fn serve(mailbox: Receiver<(Addr, Message)>, manager: &Arc<Manager>) -> JoinHandle<()> {
    let manager: Weak<Manager> = Arc::downgrade(manager);

    thread::spawn(move || {
        for (from, message) in mailbox {
            match manager.upgrade() {
                Some(manager) => manager.put_from(&from, message),
                None => return,
            }
        }
    })
}
