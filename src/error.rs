//! Error type shared by every gate subsystem.

use crate::types::{EntityHandle, GateId, ObserverId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GateError {
    #[error("unknown gate id {0}")]
    UnknownGate(GateId),

    #[error("{0} is not connected")]
    UnknownObserver(ObserverId),

    #[error("{0} is no longer available")]
    EntityUnavailable(EntityHandle),

    #[error("no handler registered for channel '{0}'")]
    UnknownChannel(String),

    #[error("payload codec error: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("invalid gate catalog: {0}")]
    InvalidCatalog(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

impl GateError {
    /// Steady-state failures are logged and dropped at the tick or handler
    /// boundary; anything else must stop startup.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, GateError::InvalidCatalog(_) | GateError::Config(_))
    }
}

pub type Result<T> = std::result::Result<T, GateError>;
