use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Core initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Configuration error: {0}")]
    Config(#[from] core_runtime::Error),

    #[error("Bridge error: {0}")]
    Bridge(#[from] bridge_traits::BridgeError),

    #[error("Sync error: {0}")]
    Sync(#[from] core_sync::SyncError),
}

impl CoreError {
    /// The run was stopped through its cancellation token.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, CoreError::Sync(core_sync::SyncError::Cancelled))
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
