use std::{collections::HashSet, time::Duration};

use gateway_eth_client::ethabi::Address;
use serde::Serialize;
use tokio::time::Instant;

/// Immutable set of allowed addresses published by a successful refresh.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AllowlistSnapshot {
    addresses: HashSet<Address>,
    block_number: Option<u64>,
}

impl AllowlistSnapshot {
    pub fn new(addresses: HashSet<Address>, block_number: Option<u64>) -> Self {
        Self {
            addresses,
            block_number,
        }
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.addresses.contains(address)
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }

    pub fn addresses(&self) -> &HashSet<Address> {
        &self.addresses
    }

    /// Block the snapshot was read at. `None` for snapshots that were not read from the chain.
    pub fn block_number(&self) -> Option<u64> {
        self.block_number
    }
}

/// Successful refresh recorded in [`RefreshState`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyncSuccess {
    pub at: Instant,
    pub block_number: u64,
    pub allowlist_size: usize,
}

/// Failed refresh recorded in [`RefreshState`].
#[derive(Debug, Clone, PartialEq)]
pub struct SyncFailure {
    pub at: Instant,
    pub message: String,
}

/// Outcome of the latest refreshes, for observability.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RefreshState {
    pub last_success: Option<SyncSuccess>,
    pub last_error: Option<SyncFailure>,
    /// Number of failed refreshes since the last successful one.
    pub consecutive_failures: u32,
}

impl RefreshState {
    /// Returns time elapsed since the last successful refresh, or `None` if there was none.
    pub fn staleness(&self) -> Option<Duration> {
        self.last_success.map(|success| success.at.elapsed())
    }

    pub(crate) fn record_success(&mut self, block_number: u64, allowlist_size: usize) {
        self.last_success = Some(SyncSuccess {
            at: Instant::now(),
            block_number,
            allowlist_size,
        });
        self.consecutive_failures = 0;
    }

    pub(crate) fn record_failure(&mut self, message: String) {
        self.last_error = Some(SyncFailure {
            at: Instant::now(),
            message,
        });
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
    }

    pub(crate) fn health_details(&self) -> RefreshDetails<'_> {
        RefreshDetails {
            last_synced_block: self.last_success.map(|success| success.block_number),
            allowlist_size: self.last_success.map(|success| success.allowlist_size),
            consecutive_failures: self.consecutive_failures,
            last_error: self.last_error.as_ref().map(|failure| failure.message.as_str()),
        }
    }
}

/// Health check details derived from [`RefreshState`].
#[derive(Debug, Serialize)]
pub(crate) struct RefreshDetails<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    last_synced_block: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    allowlist_size: Option<usize>,
    consecutive_failures: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_error: Option<&'a str>,
}

/// Lifecycle of the background synchronization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Unstarted,
    Running,
    /// Background sync was asked to stop, but hasn't finished yet.
    Stopping,
    /// Terminal state; a stopped allowlist cannot be restarted.
    Stopped,
}
