use anyhow::Context as _;
use serde::de::DeserializeOwned;

use crate::OnchainAllowlistConfig;

pub trait FromEnv: Sized {
    fn from_env() -> anyhow::Result<Self>;
}

/// Convenience function that loads the structure from the environment variable given the prefix.
pub fn envy_load<T: DeserializeOwned>(name: &str, prefix: &str) -> anyhow::Result<T> {
    envy::prefixed(prefix)
        .from_env()
        .with_context(|| format!("Cannot load config <{name}>"))
}

impl FromEnv for OnchainAllowlistConfig {
    fn from_env() -> anyhow::Result<Self> {
        let config: Self = envy_load("onchain_allowlist", "ONCHAIN_ALLOWLIST_")?;
        config
            .validate()
            .context("invalid config <onchain_allowlist>")?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        test_utils::{addr, EnvMutex},
        InitialSyncMode,
    };

    static MUTEX: EnvMutex = EnvMutex::new();

    fn expected_config() -> OnchainAllowlistConfig {
        OnchainAllowlistConfig {
            contract_address: addr("0x6e2dc0f9db014ae19888f539e59285d2ea04244c"),
            contract_version: 1,
            block_confirmations: 3,
            update_frequency_sec: 60,
            update_timeout_sec: 5,
            onchain_allowlist_batch_size: 50,
            fetching_delay_in_range_ms: 250,
            initial_sync: InitialSyncMode::Background,
            initial_sync_timeout_sec: Some(20),
        }
    }

    #[test]
    fn from_env() {
        let mut lock = MUTEX.lock();
        let config = r#"
            ONCHAIN_ALLOWLIST_CONTRACT_ADDRESS="0x6e2dc0f9db014ae19888f539e59285d2ea04244c"
            ONCHAIN_ALLOWLIST_CONTRACT_VERSION=1
            ONCHAIN_ALLOWLIST_BLOCK_CONFIRMATIONS=3
            ONCHAIN_ALLOWLIST_UPDATE_FREQUENCY_SEC=60
            ONCHAIN_ALLOWLIST_UPDATE_TIMEOUT_SEC=5
            ONCHAIN_ALLOWLIST_ONCHAIN_ALLOWLIST_BATCH_SIZE=50
            ONCHAIN_ALLOWLIST_FETCHING_DELAY_IN_RANGE_MS=250
            ONCHAIN_ALLOWLIST_INITIAL_SYNC="background"
            ONCHAIN_ALLOWLIST_INITIAL_SYNC_TIMEOUT_SEC=20
        "#;
        lock.set_env(config);

        let actual = OnchainAllowlistConfig::from_env().unwrap();
        assert_eq!(actual, expected_config());
        assert_eq!(actual.fetching_delay_in_range(), Duration::from_millis(250));
    }

    #[test]
    fn from_env_with_defaults() {
        let mut lock = MUTEX.lock();
        lock.remove_env(&[
            "ONCHAIN_ALLOWLIST_CONTRACT_VERSION",
            "ONCHAIN_ALLOWLIST_BLOCK_CONFIRMATIONS",
            "ONCHAIN_ALLOWLIST_UPDATE_FREQUENCY_SEC",
            "ONCHAIN_ALLOWLIST_UPDATE_TIMEOUT_SEC",
            "ONCHAIN_ALLOWLIST_ONCHAIN_ALLOWLIST_BATCH_SIZE",
            "ONCHAIN_ALLOWLIST_FETCHING_DELAY_IN_RANGE_MS",
            "ONCHAIN_ALLOWLIST_INITIAL_SYNC",
            "ONCHAIN_ALLOWLIST_INITIAL_SYNC_TIMEOUT_SEC",
        ]);
        lock.set_env("ONCHAIN_ALLOWLIST_CONTRACT_ADDRESS=0x6e2dc0f9db014ae19888f539e59285d2ea04244c");

        let actual = OnchainAllowlistConfig::from_env().unwrap();
        let expected =
            OnchainAllowlistConfig::for_router(addr("0x6e2dc0f9db014ae19888f539e59285d2ea04244c"));
        assert_eq!(actual, expected);
        assert_eq!(actual.initial_sync, InitialSyncMode::Blocking);
    }

    #[test]
    fn invalid_config_from_env() {
        let mut lock = MUTEX.lock();
        lock.set_env(
            r#"
            ONCHAIN_ALLOWLIST_CONTRACT_ADDRESS="0x6e2dc0f9db014ae19888f539e59285d2ea04244c"
            ONCHAIN_ALLOWLIST_CONTRACT_VERSION=2
        "#,
        );
        let err = OnchainAllowlistConfig::from_env().unwrap_err();
        assert!(format!("{err:#}").contains("unsupported"), "{err:#}");

        lock.remove_env(&["ONCHAIN_ALLOWLIST_CONTRACT_ADDRESS"]);
        let err = OnchainAllowlistConfig::from_env().unwrap_err();
        assert!(format!("{err:#}").contains("onchain_allowlist"), "{err:#}");
    }
}
