//! Sender allowlist of the functions gateway backed by an on-chain terms-of-service contract.
//!
//! [`ChainBackedAllowlist`] keeps an in-memory snapshot of allowed senders that is read without locking on the
//! request path, and refreshes it from the chain in a background task started by [`OnchainAllowlist::start()`].
//! A refresh publishes a new snapshot only if the whole allowed senders list was read successfully; otherwise,
//! the last-known-good snapshot keeps being served.

use std::fmt;

use async_trait::async_trait;
use gateway_eth_client::ethabi::Address;
use tokio::sync::watch;

pub use self::{
    chain::ChainBackedAllowlist,
    errors::AllowlistError,
    state::{AllowlistSnapshot, LifecycleState, RefreshState, SyncFailure, SyncSuccess},
    static_allowlist::StaticAllowlist,
};

mod chain;
mod errors;
mod lifecycle;
mod metrics;
mod scheduler;
mod state;
mod static_allowlist;

/// Receiver of a stop signal bounding an allowlist operation.
///
/// The signal is raised by sending `true` through the paired sender. Dropping the sender is treated
/// as a stop signal as well.
#[derive(Debug, Clone)]
pub struct StopReceiver(pub watch::Receiver<bool>);

impl StopReceiver {
    /// Checks whether the stop signal was raised.
    pub fn is_stopped(&self) -> bool {
        *self.0.borrow()
    }

    /// Resolves once the stop signal is raised.
    pub async fn stopped(&mut self) {
        // An error means that the sender is dropped, which counts as a stop request.
        self.0.wait_for(|stop| *stop).await.ok();
    }
}

/// Allowlist of addresses permitted to send requests to the gateway.
#[async_trait]
pub trait OnchainAllowlist: 'static + fmt::Debug + Send + Sync {
    /// Checks whether `address` is allowed. Never blocks and never touches the network.
    fn allow(&self, address: &Address) -> bool;

    /// Refreshes the allowlist from the contract. The refresh is aborted once `stop_receiver` is signalled.
    ///
    /// On error, the previously published snapshot stays current.
    async fn update_from_contract(&self, stop_receiver: StopReceiver) -> Result<(), AllowlistError>;

    /// Starts background synchronization. `stop_receiver` only bounds the start-up phase; use
    /// [`Self::close()`] to stop synchronization afterwards.
    ///
    /// # Errors
    ///
    /// Returns an error if the allowlist is already running or was stopped.
    async fn start(&self, stop_receiver: StopReceiver) -> Result<(), AllowlistError>;

    /// Stops background synchronization and waits for it to terminate. Closing a stopped allowlist
    /// is a no-op; concurrent calls all wait until synchronization has terminated.
    ///
    /// # Errors
    ///
    /// Returns an error if the allowlist was never started.
    async fn close(&self) -> Result<(), AllowlistError>;
}
