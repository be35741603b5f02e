//! Configuration of the functions gateway components.

pub use self::{
    env::{envy_load, FromEnv},
    onchain_allowlist::{InitialSyncMode, OnchainAllowlistConfig, SUPPORTED_CONTRACT_VERSION},
};

mod env;
mod onchain_allowlist;
#[cfg(test)]
mod test_utils;
