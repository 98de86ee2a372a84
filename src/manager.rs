use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use synod::Message;

use crate::cluster::{Addr, Cluster, Oracle};
use crate::config::Config;
use crate::error::Error;
use crate::instance::{Instance, Learned};
use crate::registry::Registry;
use crate::store::Store;
use crate::transport::{PutterTo, SeqnPutter};
use crate::{allocator, filler, holdback, Seqn, NOP};

/// The coordination core of one node: allocates the positions it leads, multiplexes a round per position and keeps
/// the log moving past positions nobody proposed for.
///
/// All methods take `&self`, so a `Manager` is typically shared behind an [`Arc`] between proposers, the network
/// receive loop and a consumer of [`recv`](Self::recv).
pub struct Manager {
    self_addr: Addr,
    config: Config,
    oracle: Arc<dyn Oracle>,
    store: Arc<dyn Store>,
    registry: Registry<Instance>,
    held: Sender<(Addr, Message)>,
    seqns: Receiver<Seqn>,
    fill_until: Sender<Seqn>,
    learned: Receiver<Learned>,
    closed: Arc<AtomicBool>,
}

impl Manager {
    /// Constructs the manager of the member `self_addr`, defined at position `start`.
    ///
    /// The first position this member allocates or fills is `start + alpha`.
    pub fn new<A: Into<Addr>>(
        self_addr: A,
        start: Seqn,
        alpha: u64,
        oracle: Arc<dyn Oracle>,
        store: Arc<dyn Store>,
        outs: Arc<dyn PutterTo>,
    ) -> Self {
        Self::with_config(
            self_addr,
            start,
            Config::with_alpha(alpha),
            oracle,
            store,
            outs,
        )
    }

    pub fn with_config<A: Into<Addr>>(
        self_addr: A,
        start: Seqn,
        config: Config,
        oracle: Arc<dyn Oracle>,
        store: Arc<dyn Store>,
        outs: Arc<dyn PutterTo>,
    ) -> Self {
        let self_addr = self_addr.into();
        let floor = start.saturating_add(config.alpha);
        let (learned_tx, learned) = unbounded();
        let closed = Arc::new(AtomicBool::new(false));

        let registry = {
            let oracle = oracle.clone();
            let self_addr = self_addr.clone();
            Registry::spawn(move |seqn| {
                let cluster = Cluster::for_seqn(oracle.as_ref(), &self_addr, seqn);
                let outs = SeqnPutter::new(seqn, outs.clone());
                Instance::new(seqn, cluster, outs, learned_tx.clone())
            })
        };

        let held = {
            let registry = registry.clone();
            holdback::spawn(oracle.clone(), move |from, message| {
                match registry.get(message.seqn()) {
                    Ok(instance) => {
                        instance.put_from(&from, message);
                        true
                    }
                    Err(_) => false,
                }
            })
        };

        let seqns = allocator::spawn(floor, self_addr.clone(), oracle.clone(), closed.clone());

        let fill_until = {
            let registry = registry.clone();
            filler::spawn(floor, config.fill_delay, move |seqn| {
                if let Err(err) = propose_at(&registry, seqn, NOP) {
                    log::warn!("paxos fill {} failed: {}", seqn, err);
                }
            })
        };

        log::info!("manager {} starting at {}", self_addr, floor);

        Self {
            self_addr,
            config,
            oracle,
            store,
            registry,
            held,
            seqns,
            fill_until,
            learned,
            closed,
        }
    }

    /// Returns the lookahead window.
    pub fn alpha(&self) -> u64 {
        self.config.alpha
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn self_addr(&self) -> &Addr {
        &self.self_addr
    }

    /// Appends `value` to the log at the next position this node leads, returning the position and the value
    /// committed there.
    ///
    /// The committed value is not necessarily `value`: if another proposal for the same position won, its value is
    /// returned instead. Blocks until a position is available and then until the store reports it durably applied.
    ///
    /// # Errors
    ///
    /// If the store resolved the position with an error, it is returned unchanged in [`Error::Store`].
    pub fn propose<V: Into<Bytes>>(&self, value: V) -> Result<(Seqn, Bytes), Error> {
        let seqn = self.seqns.recv()?;
        let committed = self.store.wait(seqn);
        propose_at(&self.registry, seqn, value.into())?;
        self.fill_until.send(seqn)?;

        let event = committed.recv()?;
        match event.err {
            Some(source) => Err(Error::Store { seqn, source }),
            None => Ok((seqn, event.value)),
        }
    }

    /// Hands a protocol message received from `addr` to the round it targets. Ill-formed messages are dropped.
    ///
    /// A message for a position whose membership is not settled yet is held back until it is, so that its round is
    /// never built from a membership that may still change.
    pub fn put_from(&self, addr: &str, message: Message) {
        if !message.is_well_formed() {
            log::debug!("manager dropping ill-formed message from {}: {}", addr, message);
            return;
        }
        if !self.oracle.wait_for(message.seqn(), Duration::from_millis(0)) {
            log::debug!("manager holding back {} from {}", message, addr);
            if self.held.send((addr.to_string(), message)).is_err() {
                log::warn!("manager dropping message from {}: holdback stopped", addr);
            }
            return;
        }
        match self.registry.get(message.seqn()) {
            Ok(instance) => instance.put_from(addr, message),
            Err(err) => log::warn!("manager dropping message from {}: {}", addr, err),
        }
    }

    /// Blocks until any round learns a value, returning its position and value.
    ///
    /// Every position is returned once, in no particular order.
    pub fn recv(&self) -> Result<(Seqn, Bytes), Error> {
        let Learned { seqn, value } = self.learned.recv()?;
        log::info!("paxos {} learned <- {:?}", seqn, value);
        Ok((seqn, value))
    }

    /// Like [`recv`](Self::recv), giving up after `timeout`.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Option<(Seqn, Bytes)>, Error> {
        match self.learned.recv_timeout(timeout) {
            Ok(Learned { seqn, value }) => {
                log::info!("paxos {} learned <- {:?}", seqn, value);
                Ok(Some((seqn, value)))
            }
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(Error::Disconnected),
        }
    }
}

impl Drop for Manager {
    fn drop(&mut self) {
        self.closed.store(true, Ordering::Relaxed);
    }
}

fn propose_at(registry: &Registry<Instance>, seqn: Seqn, value: Bytes) -> Result<(), Error> {
    let instance = registry.get(seqn)?;
    log::info!("paxos propose -> {} {:?}", seqn, value);
    instance.propose(value);
    Ok(())
}
