//! Error types for the push facade.

use herald_protocol::{ErrorInfo, ProtocolError};
use herald_transport::TransportError;
use thiserror::Error;

use crate::storage::StorageError;

/// Push errors.
#[derive(Debug, Error)]
pub enum PushError {
    /// Activation or deactivation failed; carries the reason handed to the
    /// callback.
    #[error("Rejected: {0}")]
    Rejected(ErrorInfo),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The machine worker is no longer running.
    #[error("Activation machine stopped")]
    MachineStopped,

    /// A later call of the same kind replaced this call's callback.
    #[error("Superseded by a later call")]
    Superseded,
}

impl From<ErrorInfo> for PushError {
    fn from(reason: ErrorInfo) -> Self {
        PushError::Rejected(reason)
    }
}

impl PushError {
    /// The service error behind this failure, if there is one.
    #[must_use]
    pub fn info(&self) -> Option<&ErrorInfo> {
        match self {
            PushError::Rejected(info) | PushError::Transport(TransportError::Api(info)) => {
                Some(info)
            }
            _ => None,
        }
    }
}
