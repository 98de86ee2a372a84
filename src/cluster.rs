//! Membership: who takes part in the round for a given position, and who leads it.

use std::collections::BTreeMap;
use std::sync::{Condvar, Mutex, PoisonError};
use std::time::Duration;

use crate::{unlock, Seqn};

/// The network address identifying a member.
pub type Addr = String;

/// The membership oracle consulted for every position.
///
/// Membership may change over the history of the log, so it is asked afresh for each sequence number rather than
/// cached by the caller.
pub trait Oracle: Send + Sync {
    /// Returns the members and the acceptors valid for `seqn`. Acceptors are listed in the same order on every node.
    fn sets_for_seqn(&self, seqn: Seqn) -> (Vec<Addr>, Vec<Addr>);

    /// Blocks until the membership for `seqn` is settled or `timeout` elapses, returning whether it is settled.
    fn wait_for(&self, _seqn: Seqn, _timeout: Duration) -> bool {
        true
    }
}

/// The membership governing one position, as seen from this node.
#[derive(Clone, Debug, PartialEq)]
pub struct Cluster {
    self_addr: Addr,
    members: Vec<Addr>,
    cals: Vec<Addr>,
    self_index: Option<usize>,
    peers: Vec<Addr>,
}

impl Cluster {
    pub fn new(self_addr: &str, members: Vec<Addr>, cals: Vec<Addr>) -> Self {
        let self_index = cals.iter().position(|addr| addr == self_addr);

        let mut peers: Vec<Addr> = Vec::with_capacity(members.len());
        for addr in members.iter().chain(cals.iter()) {
            if addr != self_addr && !peers.contains(addr) {
                peers.push(addr.clone());
            }
        }

        Self {
            self_addr: self_addr.to_string(),
            members,
            cals,
            self_index,
            peers,
        }
    }

    pub fn for_seqn(oracle: &dyn Oracle, self_addr: &str, seqn: Seqn) -> Self {
        let (members, cals) = oracle.sets_for_seqn(seqn);
        Self::new(self_addr, members, cals)
    }

    /// Returns the number of acceptors.
    pub fn len(&self) -> usize {
        self.cals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cals.is_empty()
    }

    /// Returns this node's position among the acceptors, or `None` if it is not one.
    pub fn self_index(&self) -> Option<usize> {
        self.self_index
    }

    pub fn quorum(&self) -> usize {
        self.len() / 2 + 1
    }

    /// Returns the index of the acceptor leading `seqn`, chosen round-robin.
    ///
    /// # Panics
    ///
    /// If the cluster has no acceptors. The oracle must never report an empty acceptor set.
    pub fn leader_index(&self, seqn: Seqn) -> usize {
        assert!(
            !self.is_empty(),
            "membership for seqn {} has no acceptors",
            seqn
        );
        (seqn % self.len() as u64) as usize
    }

    pub fn is_leader(&self, seqn: Seqn) -> bool {
        self.self_index == Some(self.leader_index(seqn))
    }

    pub fn self_addr(&self) -> &Addr {
        &self.self_addr
    }

    pub fn members(&self) -> &[Addr] {
        &self.members
    }

    pub fn cals(&self) -> &[Addr] {
        &self.cals
    }

    /// Returns every other member and acceptor, each once.
    pub fn peers(&self) -> &[Addr] {
        &self.peers
    }
}

type Sets = (Vec<Addr>, Vec<Addr>);

/// An [`Oracle`] recording the membership committed at each position.
///
/// Membership committed at position `n` takes effect at `n + alpha`, so a node may look up to `alpha` positions past
/// the applied log. Positions further ahead are not settled: [`wait_for`](Oracle::wait_for) blocks until the log is
/// [advanced](Self::advance) far enough.
pub struct Registrar {
    alpha: u64,
    known: Mutex<Known>,
    advanced: Condvar,
}

struct Known {
    applied: Seqn,
    history: BTreeMap<Seqn, Sets>,
}

impl Registrar {
    /// Constructs a registrar whose initial membership was committed at `start`.
    ///
    /// No round runs between `start` and `start + alpha`, so those positions count as applied from the outset.
    pub fn new(start: Seqn, alpha: u64, members: Vec<Addr>, cals: Vec<Addr>) -> Self {
        let mut history = BTreeMap::new();
        history.insert(start, (members, cals));
        Self {
            alpha,
            known: Mutex::new(Known {
                applied: start.max(start.saturating_add(alpha).saturating_sub(1)),
                history,
            }),
            advanced: Condvar::new(),
        }
    }

    /// Records membership committed at `seqn`, effective from `seqn + alpha`.
    pub fn record(&self, seqn: Seqn, members: Vec<Addr>, cals: Vec<Addr>) {
        log::info!(
            "registrar membership at {}: members={:?} cals={:?}",
            seqn,
            members,
            cals
        );
        unlock(&self.known).history.insert(seqn, (members, cals));
    }

    /// Marks the log as applied through `seqn`, settling membership up to `seqn + alpha`.
    pub fn advance(&self, seqn: Seqn) {
        let mut known = unlock(&self.known);
        if seqn > known.applied {
            known.applied = seqn;
            self.advanced.notify_all();
        }
    }

    /// Returns the highest position whose membership is settled.
    pub fn horizon(&self) -> Seqn {
        unlock(&self.known).applied.saturating_add(self.alpha)
    }

    pub fn alpha(&self) -> u64 {
        self.alpha
    }
}

impl Oracle for Registrar {
    fn sets_for_seqn(&self, seqn: Seqn) -> (Vec<Addr>, Vec<Addr>) {
        let known = unlock(&self.known);
        let at = seqn.saturating_sub(self.alpha);
        known
            .history
            .range(..=at)
            .next_back()
            .or_else(|| known.history.iter().next())
            .map(|(_, sets)| sets.clone())
            .unwrap_or_default()
    }

    fn wait_for(&self, seqn: Seqn, timeout: Duration) -> bool {
        let alpha = self.alpha;
        let known = unlock(&self.known);
        let (known, _) = self
            .advanced
            .wait_timeout_while(known, timeout, |known| {
                known.applied.saturating_add(alpha) < seqn
            })
            .unwrap_or_else(PoisonError::into_inner);
        known.applied.saturating_add(alpha) >= seqn
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addrs(names: &[&str]) -> Vec<Addr> {
        names.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn leader_is_round_robin_over_acceptors() {
        let cluster = Cluster::new("b", addrs(&["a", "b", "c", "d"]), addrs(&["a", "b", "c"]));
        assert_eq!(cluster.len(), 3);
        assert_eq!(cluster.self_index(), Some(1));
        assert_eq!(cluster.leader_index(9), 0);
        assert_eq!(cluster.leader_index(10), 1);
        assert!(cluster.is_leader(10));
        assert!(!cluster.is_leader(11));
    }

    #[test]
    fn non_acceptor_never_leads() {
        let cluster = Cluster::new("d", addrs(&["a", "b", "c", "d"]), addrs(&["a", "b", "c"]));
        assert_eq!(cluster.self_index(), None);
        assert!((0..30).all(|seqn| !cluster.is_leader(seqn)));
    }

    #[test]
    fn peers_exclude_self_and_duplicates() {
        let cluster = Cluster::new("a", addrs(&["a", "b"]), addrs(&["a", "b", "c"]));
        assert_eq!(cluster.peers(), &addrs(&["b", "c"])[..]);
        assert_eq!(cluster.quorum(), 2);
    }

    #[test]
    #[should_panic(expected = "no acceptors")]
    fn empty_cluster_is_a_precondition_violation() {
        let cluster = Cluster::new("a", addrs(&["a"]), Vec::new());
        cluster.leader_index(1);
    }

    #[test]
    fn registrar_applies_membership_after_alpha() {
        let registrar = Registrar::new(0, 5, addrs(&["a"]), addrs(&["a"]));
        registrar.record(10, addrs(&["a", "b"]), addrs(&["a", "b"]));

        assert_eq!(registrar.sets_for_seqn(14).1, addrs(&["a"]));
        assert_eq!(registrar.sets_for_seqn(15).1, addrs(&["a", "b"]));
        assert_eq!(registrar.sets_for_seqn(100).1, addrs(&["a", "b"]));
    }

    #[test]
    fn registrar_settles_membership_as_log_advances() {
        let registrar = Registrar::new(10, 3, addrs(&["a"]), addrs(&["a"]));
        // 11 and 12 precede the first round
        assert_eq!(registrar.horizon(), 15);
        assert!(registrar.wait_for(15, Duration::from_millis(0)));
        assert!(!registrar.wait_for(16, Duration::from_millis(10)));

        registrar.advance(13);
        assert!(registrar.wait_for(16, Duration::from_millis(0)));

        // advancing backwards has no effect
        registrar.advance(5);
        assert_eq!(registrar.horizon(), 16);
    }

    #[test]
    fn registrar_wakes_blocked_waiters() {
        use std::sync::Arc;
        use std::thread;

        let registrar = Arc::new(Registrar::new(0, 1, addrs(&["a"]), addrs(&["a"])));
        let waiter = {
            let registrar = registrar.clone();
            thread::spawn(move || registrar.wait_for(5, Duration::from_secs(10)))
        };
        thread::sleep(Duration::from_millis(20));
        registrar.advance(4);
        assert!(waiter.join().unwrap());
    }
}
