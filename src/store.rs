//! The persistence collaborator: the durable source of truth for what each position committed.

use std::collections::{BTreeMap, HashMap};
use std::fmt::{Display, Formatter};
use std::sync::Mutex;

use bytes::Bytes;
use crossbeam_channel::{bounded, Receiver, Sender};

use crate::{unlock, Seqn, NOP};

/// The durable outcome of one position.
#[derive(Clone, Debug, PartialEq)]
pub struct Event {
    pub seqn: Seqn,
    pub value: Bytes,
    pub err: Option<StoreError>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum StoreError {
    // The committed value could not be applied, holds the reason
    Rejected(String),
    // The store could not be reached
    Unavailable,
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rejected(reason) => write!(f, "rejected: {}", reason),
            Self::Unavailable => write!(f, "store unavailable"),
        }
    }
}

impl std::error::Error for StoreError {}

pub trait Store: Send + Sync {
    /// Returns a channel resolved with the [`Event`] for `seqn` once it is durably applied.
    ///
    /// Waiting on a position that was already applied resolves immediately.
    fn wait(&self, seqn: Seqn) -> Receiver<Event>;
}

type Validator = Box<dyn Fn(&[u8]) -> Result<(), StoreError> + Send + Sync>;

/// An in-memory [`Store`] applying learned values in sequence order.
///
/// Learned values arrive unordered and possibly more than once; they are buffered until every earlier position has
/// been applied. A value failing validation still occupies its position, and its event carries the error.
pub struct MemStore {
    validate: Option<Validator>,
    state: Mutex<State>,
}

struct State {
    next: Seqn,
    pending: BTreeMap<Seqn, Bytes>,
    applied: BTreeMap<Seqn, Event>,
    waiters: HashMap<Seqn, Vec<Sender<Event>>>,
}

impl MemStore {
    /// Constructs an empty store whose first position is `first`.
    pub fn new(first: Seqn) -> Self {
        Self {
            validate: None,
            state: Mutex::new(State {
                next: first,
                pending: BTreeMap::new(),
                applied: BTreeMap::new(),
                waiters: HashMap::new(),
            }),
        }
    }

    /// Constructs an empty store which checks every applied value with `validate`.
    pub fn with_validator<F>(first: Seqn, validate: F) -> Self
    where
        F: Fn(&[u8]) -> Result<(), StoreError> + Send + Sync + 'static,
    {
        Self {
            validate: Some(Box::new(validate)),
            ..Self::new(first)
        }
    }

    /// Hands a learned value to the store, returning the last position applied as a result, if any.
    pub fn apply(&self, seqn: Seqn, value: Bytes) -> Option<Seqn> {
        let mut state = unlock(&self.state);
        if seqn < state.next {
            return None;
        }
        state.pending.entry(seqn).or_insert(value);

        let mut last = None;
        loop {
            let next = state.next;
            let value = match state.pending.remove(&next) {
                Some(value) => value,
                None => break,
            };
            let err = match (&self.validate, value == NOP) {
                (Some(validate), false) => validate(&value[..]).err(),
                _ => None,
            };
            let event = Event {
                seqn: next,
                value,
                err,
            };
            log::debug!("store applied {} {:?}", next, event.value);

            for waiter in state.waiters.remove(&next).unwrap_or_default() {
                let _ = waiter.send(event.clone());
            }
            state.applied.insert(next, event);
            state.next += 1;
            last = Some(next);
        }
        last
    }

    /// Returns the event applied at `seqn`, if any.
    pub fn get(&self, seqn: Seqn) -> Option<Event> {
        unlock(&self.state).applied.get(&seqn).cloned()
    }

    /// Returns the next position waiting to be applied.
    pub fn next_seqn(&self) -> Seqn {
        unlock(&self.state).next
    }
}

impl Store for MemStore {
    fn wait(&self, seqn: Seqn) -> Receiver<Event> {
        let (sender, receiver) = bounded(1);
        let mut state = unlock(&self.state);
        match state.applied.get(&seqn).cloned() {
            Some(event) => {
                let _ = sender.send(event);
            }
            None => state.waiters.entry(seqn).or_default().push(sender),
        }
        receiver
    }
}
