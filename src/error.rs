use std::fmt::{Display, Formatter};

use crate::store::StoreError;
use crate::Seqn;

#[derive(Debug)]
pub enum Error {
    // The persistence collaborator resolved the position with an error
    Store { seqn: Seqn, source: StoreError },
    // A background thread or collaborator hung up on its channel
    Disconnected,
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Store { seqn, source } => write!(f, "seqn {}: {}", seqn, source),
            Self::Disconnected => write!(f, "manager channel disconnected"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Store { source, .. } => Some(source),
            Self::Disconnected => None,
        }
    }
}

impl<T> From<crossbeam_channel::SendError<T>> for Error {
    fn from(_: crossbeam_channel::SendError<T>) -> Self {
        Self::Disconnected
    }
}

impl From<crossbeam_channel::RecvError> for Error {
    fn from(_: crossbeam_channel::RecvError) -> Self {
        Self::Disconnected
    }
}
