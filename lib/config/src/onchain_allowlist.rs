use std::time::Duration;

use ethabi::Address;
use serde::{de, Deserialize, Deserializer};

/// The only version of the router / allowlist contract pair understood by the allowlist.
pub const SUPPORTED_CONTRACT_VERSION: u32 = 1;

const DEFAULT_BLOCK_CONFIRMATIONS: u64 = 1;
const DEFAULT_UPDATE_FREQUENCY_SEC: u64 = 30;
const DEFAULT_UPDATE_TIMEOUT_SEC: u64 = 10;
const DEFAULT_BATCH_SIZE: u32 = 100;

/// How the initial sync is performed when the allowlist is started.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitialSyncMode {
    /// `start()` waits for the first sync attempt to finish, bounded by the initial sync timeout.
    #[default]
    Blocking,
    /// `start()` returns immediately; the first sync is performed by the background task.
    Background,
}

/// Configuration for the on-chain allowlist of the functions gateway.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OnchainAllowlistConfig {
    /// Address of the functions router contract that the allowlist contract is discovered from.
    #[serde(deserialize_with = "deserialize_address")]
    pub contract_address: Address,
    #[serde(default = "OnchainAllowlistConfig::default_contract_version")]
    pub contract_version: u32,
    /// Number of confirmations the read block must have; contract state is read at
    /// `latest - block_confirmations`.
    #[serde(default = "OnchainAllowlistConfig::default_block_confirmations")]
    pub block_confirmations: u64,
    /// How often the background task refreshes the allowlist.
    #[serde(default = "OnchainAllowlistConfig::default_update_frequency_sec")]
    pub update_frequency_sec: u64,
    /// Deadline for a single refresh attempt.
    #[serde(default = "OnchainAllowlistConfig::default_update_timeout_sec")]
    pub update_timeout_sec: u64,
    /// Number of addresses requested from the contract in a single range call.
    #[serde(default = "OnchainAllowlistConfig::default_batch_size")]
    pub onchain_allowlist_batch_size: u32,
    /// Upper bound of the random delay between range calls. Zero disables the delay.
    #[serde(default)]
    pub fetching_delay_in_range_ms: u64,
    #[serde(default)]
    pub initial_sync: InitialSyncMode,
    /// Bound on the blocking initial sync. Defaults to the update timeout.
    pub initial_sync_timeout_sec: Option<u64>,
}

impl OnchainAllowlistConfig {
    /// Creates a config with default values for everything except the router address.
    pub fn for_router(contract_address: Address) -> Self {
        Self {
            contract_address,
            contract_version: Self::default_contract_version(),
            block_confirmations: Self::default_block_confirmations(),
            update_frequency_sec: Self::default_update_frequency_sec(),
            update_timeout_sec: Self::default_update_timeout_sec(),
            onchain_allowlist_batch_size: Self::default_batch_size(),
            fetching_delay_in_range_ms: 0,
            initial_sync: InitialSyncMode::default(),
            initial_sync_timeout_sec: None,
        }
    }

    fn default_contract_version() -> u32 {
        SUPPORTED_CONTRACT_VERSION
    }

    fn default_block_confirmations() -> u64 {
        DEFAULT_BLOCK_CONFIRMATIONS
    }

    fn default_update_frequency_sec() -> u64 {
        DEFAULT_UPDATE_FREQUENCY_SEC
    }

    fn default_update_timeout_sec() -> u64 {
        DEFAULT_UPDATE_TIMEOUT_SEC
    }

    fn default_batch_size() -> u32 {
        DEFAULT_BATCH_SIZE
    }

    pub fn update_interval(&self) -> Duration {
        Duration::from_secs(self.update_frequency_sec)
    }

    pub fn update_timeout(&self) -> Duration {
        Duration::from_secs(self.update_timeout_sec)
    }

    pub fn fetching_delay_in_range(&self) -> Duration {
        Duration::from_millis(self.fetching_delay_in_range_ms)
    }

    pub fn initial_sync_timeout(&self) -> Duration {
        self.initial_sync_timeout_sec
            .map_or_else(|| self.update_timeout(), Duration::from_secs)
    }

    /// Checks that the config can drive the allowlist.
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.contract_version == SUPPORTED_CONTRACT_VERSION,
            "unsupported allowlist contract version {}; only version {SUPPORTED_CONTRACT_VERSION} is supported",
            self.contract_version
        );
        anyhow::ensure!(
            !self.contract_address.is_zero(),
            "router contract address must not be zero"
        );
        anyhow::ensure!(
            self.update_frequency_sec > 0,
            "update frequency must be positive"
        );
        anyhow::ensure!(self.update_timeout_sec > 0, "update timeout must be positive");
        anyhow::ensure!(
            self.onchain_allowlist_batch_size > 0,
            "allowlist batch size must be positive"
        );
        if let Some(timeout) = self.initial_sync_timeout_sec {
            anyhow::ensure!(timeout > 0, "initial sync timeout must be positive");
        }
        Ok(())
    }
}

/// Accepts both `0x`-prefixed and bare hex addresses, the same as `Address::from_str()`.
fn deserialize_address<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Address, D::Error> {
    let raw = String::deserialize(deserializer)?;
    raw.trim()
        .parse()
        .map_err(|err| de::Error::custom(format!("invalid address `{raw}`: {err}")))
}
