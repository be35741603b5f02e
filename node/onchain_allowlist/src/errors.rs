use std::time::Duration;

use gateway_eth_client::ContractCallError;
use tokio::task::JoinError;

/// Errors produced by allowlist operations.
#[derive(Debug, thiserror::Error)]
pub enum AllowlistError {
    #[error("allowlist is already running")]
    AlreadyRunning,
    #[error("allowlist is stopped and cannot be restarted")]
    AlreadyStopped,
    #[error("allowlist was not started")]
    NotStarted,
    #[error("chain client reported zero block height; is the node synced?")]
    ZeroBlockHeight,
    #[error("failed reading allowlist contract: {0}")]
    ContractCall(#[from] ContractCallError),
    #[error("malformed allowlist contract response: {0}")]
    MalformedResponse(String),
    #[error("allowlist update timed out after {0:?}")]
    Timeout(Duration),
    #[error("allowlist operation was cancelled")]
    Cancelled,
    #[error("background sync task failed")]
    TaskFailed(#[source] JoinError),
}

impl AllowlistError {
    /// Checks whether this is a sync error that is expected to go away on a later refresh,
    /// as opposed to a misuse of the allowlist lifecycle.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::ZeroBlockHeight
                | Self::ContractCall(_)
                | Self::MalformedResponse(_)
                | Self::Timeout(_)
                | Self::Cancelled
        )
    }
}
