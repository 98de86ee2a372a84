#![allow(dead_code)]

use std::collections::BTreeSet;

use bytes::Bytes;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaChaRng;

use synod::{Cmd, MessageDestination, SendableMessage, Synod};

const RANDOM_SEED: u64 = 0;
const MAX_STEPS: usize = 100_000;

pub type TestSynod = Synod<NodeId>;

#[derive(
    Clone, Copy, Debug, derive_more::Display, Eq, derive_more::From, PartialEq, PartialOrd, Ord,
)]
#[display(fmt = "{:?}", self)]
pub struct NodeId(u64);

/// A group of rounds for the same log position, exchanging commands through an in-memory queue.
pub struct TestGroup {
    pub nodes: Vec<TestSynod>,
    pub config: TestGroupConfig,
    pub in_flight: Vec<(NodeId, NodeId, Cmd)>,
    pub random: ChaChaRng,
}

#[derive(Clone, Default)]
pub struct TestGroupConfig {
    pub drops: BTreeSet<(Option<NodeId>, Option<NodeId>)>,
    pub down: BTreeSet<NodeId>,
}

pub struct TestLogger;

pub fn init_random() -> ChaChaRng {
    ChaChaRng::seed_from_u64(RANDOM_SEED)
}

pub fn synod(node_id: u64, acceptors: Vec<u64>) -> TestSynod {
    TestLogger::init();
    Synod::new(NodeId(node_id), acceptors.into_iter().map(NodeId).collect())
}

pub fn config() -> TestGroupConfig {
    TestGroupConfig::default()
}

pub fn value(v: &'static str) -> Bytes {
    Bytes::from_static(v.as_bytes())
}

//
// TestGroup impls
//

impl TestGroup {
    pub fn new(size: u64, random: ChaChaRng, config: TestGroupConfig) -> Self {
        let acceptors: Vec<u64> = (0..size).collect();
        Self {
            nodes: acceptors
                .iter()
                .map(|node_id| synod(*node_id, acceptors.clone()))
                .collect(),
            config,
            in_flight: Vec::new(),
            random,
        }
    }

    pub fn propose(&mut self, node_idx: usize, v: &'static str) -> &mut Self {
        let node_id = *self.nodes[node_idx].node_id();
        if let Some(sendable) = self.nodes[node_idx].propose(value(v)) {
            self.enqueue(node_id, sendable);
        }
        self
    }

    /// Delivers every in-flight command in a random order until the queue drains.
    pub fn run(&mut self) -> &mut Self {
        let mut steps = 0;
        while !self.in_flight.is_empty() {
            steps += 1;
            assert!(steps < MAX_STEPS, "group did not quiesce");
            self.step();
        }
        self
    }

    /// Delivers up to `count` randomly chosen in-flight commands.
    pub fn run_steps(&mut self, count: usize) -> &mut Self {
        for _ in 0..count {
            if self.in_flight.is_empty() {
                break;
            }
            self.step();
        }
        self
    }

    pub fn shuffle(&mut self) -> &mut Self {
        let Self {
            in_flight, random, ..
        } = self;
        in_flight.shuffle(random);
        self
    }

    pub fn learned(&self) -> Vec<Option<Bytes>> {
        self.nodes
            .iter()
            .map(|node| node.learned().cloned())
            .collect()
    }

    pub fn modify(&mut self, fun: impl FnOnce(&mut Self)) -> &mut Self {
        fun(self);
        self
    }

    fn step(&mut self) {
        let idx = self.random.gen_range(0..self.in_flight.len());
        let (from, to, cmd) = self.in_flight.swap_remove(idx);
        if self.config.should_drop(from, to) {
            log::info!("{} -> {} DROPPED {}", from, to, cmd);
            return;
        }
        log::info!("{} -> {} {}", from, to, cmd);
        let node = self
            .nodes
            .iter_mut()
            .find(|node| *node.node_id() == to)
            .expect("unknown destination");
        if let Some(sendable) = node.receive(cmd, from) {
            self.enqueue(to, sendable);
        }
    }

    fn enqueue(&mut self, from: NodeId, sendable: SendableMessage<NodeId>) {
        match sendable.dest {
            MessageDestination::Broadcast => {
                for node in &self.nodes {
                    self.in_flight
                        .push((from, *node.node_id(), sendable.cmd.clone()));
                }
            }
            MessageDestination::To(to) => self.in_flight.push((from, to, sendable.cmd)),
        }
    }
}

//
// TestGroupConfig impls
//

impl TestGroupConfig {
    pub fn node_down(mut self, node_id: u64) -> Self {
        self.down.insert(NodeId(node_id));
        self
    }

    pub fn isolate(mut self, node_id: u64) -> Self {
        self.drops.insert((Some(NodeId(node_id)), None));
        self.drops.insert((None, Some(NodeId(node_id))));
        self
    }

    pub fn should_drop(&self, from: NodeId, to: NodeId) -> bool {
        // a node always reaches itself
        if from == to {
            return self.down.contains(&from);
        }
        self.drops.contains(&(Some(from), Some(to)))
            || self.drops.contains(&(Some(from), None))
            || self.drops.contains(&(None, Some(to)))
            || self.down.contains(&from)
            || self.down.contains(&to)
    }
}

//
// TestLogger impls
//

impl TestLogger {
    pub fn init() {
        let _ignore = log::set_logger(&Self);
        log::set_max_level(log::LevelFilter::Debug);
    }
}

impl log::Log for TestLogger {
    fn enabled(&self, _metadata: &log::Metadata) -> bool {
        true
    }

    fn log(&self, record: &log::Record) {
        eprintln!("{}", record.args());
    }

    fn flush(&self) {}
}
