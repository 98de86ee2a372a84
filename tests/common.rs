#![allow(dead_code)]

use std::sync::{Arc, Weak};
use std::thread;
use std::time::{Duration, Instant};

use bytes::Bytes;
use crossbeam_channel::{unbounded, Receiver};

use seqlog::net::serve;
use seqlog::{Addr, Config, Discard, LocalNet, Manager, MemStore, PutterTo, Registrar, Seqn};

pub const START: Seqn = 0;
pub const ALPHA: u64 = 3;

const APPLY_POLL: Duration = Duration::from_millis(20);
const APPLY_TIMEOUT: Duration = Duration::from_secs(5);

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn addrs(names: &[&str]) -> Vec<Addr> {
    names.iter().map(|name| name.to_string()).collect()
}

pub fn value(v: &'static str) -> Bytes {
    Bytes::from_static(v.as_bytes())
}

/// One member: a manager together with its membership, its store and the loop applying what it learns.
pub struct Node {
    pub manager: Arc<Manager>,
    pub registrar: Arc<Registrar>,
    pub store: Arc<MemStore>,
    /// Every value learned by the manager, as it was handed to the store.
    pub learned: Receiver<(Seqn, Bytes)>,
}

impl Node {
    pub fn new(
        self_addr: &str,
        cals: &[&str],
        config: Config,
        store: MemStore,
        outs: Arc<dyn PutterTo>,
    ) -> Self {
        init_logger();
        let registrar = Arc::new(Registrar::new(START, config.alpha, addrs(cals), addrs(cals)));
        let store = Arc::new(store);
        let manager = Arc::new(Manager::with_config(
            self_addr,
            START,
            config,
            registrar.clone(),
            store.clone(),
            outs,
        ));
        let learned = apply(Arc::downgrade(&manager), registrar.clone(), store.clone());

        Self {
            manager,
            registrar,
            store,
            learned,
        }
    }

    /// A member alone in its cluster.
    pub fn alone(self_addr: &str, alpha: u64) -> Self {
        Self::new(
            self_addr,
            &[self_addr],
            Config::with_alpha(alpha),
            MemStore::new(START + alpha),
            Arc::new(Discard),
        )
    }

    /// Waits until this member's store applied `seqn`, returning whether it did in time.
    pub fn wait_applied(&self, seqn: Seqn) -> bool {
        let deadline = Instant::now() + APPLY_TIMEOUT;
        while self.store.get(seqn).is_none() {
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(APPLY_POLL);
        }
        true
    }

    /// Waits for the next value learned by this member.
    pub fn next_learned(&self, timeout: Duration) -> Option<(Seqn, Bytes)> {
        self.learned.recv_timeout(timeout).ok()
    }
}

/// Spawns the loop applying learned values to `store` and advancing membership accordingly.
fn apply(
    manager: Weak<Manager>,
    registrar: Arc<Registrar>,
    store: Arc<MemStore>,
) -> Receiver<(Seqn, Bytes)> {
    let (learned_tx, learned) = unbounded();

    let _ = thread::spawn(move || loop {
        let next = match manager.upgrade() {
            Some(manager) => manager.recv_timeout(APPLY_POLL),
            None => return,
        };
        match next {
            Ok(Some((seqn, value))) => {
                if let Some(last) = store.apply(seqn, value.clone()) {
                    registrar.advance(last);
                }
                let _ = learned_tx.send((seqn, value));
            }
            Ok(None) => {}
            Err(_) => return,
        }
    });

    learned
}

/// Several members connected through a [`LocalNet`], all acceptors.
pub struct TestCluster {
    pub net: LocalNet,
    pub nodes: Vec<Node>,
}

impl TestCluster {
    pub fn new(names: &[&str], config: Config) -> Self {
        let net = LocalNet::new();
        let nodes = names
            .iter()
            .map(|name| {
                let mailbox = net.join(*name);
                let node = Node::new(
                    name,
                    names,
                    config.clone(),
                    MemStore::new(START + config.alpha),
                    net.endpoint(*name),
                );
                let _ = serve(mailbox, &node.manager);
                node
            })
            .collect();

        Self { net, nodes }
    }

    pub fn node(&self, name: &str) -> &Node {
        self.nodes
            .iter()
            .find(|node| node.manager.self_addr() == name)
            .unwrap()
    }
}
