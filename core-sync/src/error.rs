use bridge_traits::BridgeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    /// A collaborator call failed. Names the call and the entity it was for.
    #[error("{operation} failed for '{key}': {source}")]
    Transport {
        operation: &'static str,
        key: String,
        #[source]
        source: BridgeError,
    },

    #[error("Inconsistent state during {operation} for '{key}': {reason}")]
    InconsistentState {
        operation: &'static str,
        key: String,
        reason: String,
    },

    #[error("Sync cancelled")]
    Cancelled,

    #[error("Invalid phase transition from {from} to {to}")]
    InvalidPhaseTransition { from: String, to: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl SyncError {
    pub fn transport(operation: &'static str, key: impl Into<String>, source: BridgeError) -> Self {
        Self::Transport {
            operation,
            key: key.into(),
            source,
        }
    }

    pub fn inconsistent(
        operation: &'static str,
        key: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InconsistentState {
            operation,
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Entity key the failing operation was working on, if any.
    pub fn key(&self) -> Option<&str> {
        match self {
            Self::Transport { key, .. } | Self::InconsistentState { key, .. } => Some(key),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
