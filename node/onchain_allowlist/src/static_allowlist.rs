use std::collections::HashSet;

use async_trait::async_trait;
use gateway_eth_client::ethabi::Address;

use crate::{
    lifecycle::{Lifecycle, StopTransition},
    AllowlistError, LifecycleState, OnchainAllowlist, StopReceiver,
};

/// Allowlist with a fixed set of addresses that never touches the chain.
///
/// Lifecycle transitions are checked the same way as for [`ChainBackedAllowlist`](crate::ChainBackedAllowlist),
/// so this allowlist can stand in for the chain-backed one in components consuming [`OnchainAllowlist`].
#[derive(Debug, Default)]
pub struct StaticAllowlist {
    addresses: HashSet<Address>,
    lifecycle: Lifecycle<()>,
}

impl StaticAllowlist {
    pub fn new(addresses: impl IntoIterator<Item = Address>) -> Self {
        Self {
            addresses: addresses.into_iter().collect(),
            lifecycle: Lifecycle::default(),
        }
    }

    pub fn lifecycle_state(&self) -> LifecycleState {
        self.lifecycle.state()
    }
}

#[async_trait]
impl OnchainAllowlist for StaticAllowlist {
    fn allow(&self, address: &Address) -> bool {
        self.addresses.contains(address)
    }

    async fn update_from_contract(&self, stop_receiver: StopReceiver) -> Result<(), AllowlistError> {
        if stop_receiver.is_stopped() {
            return Err(AllowlistError::Cancelled);
        }
        Ok(())
    }

    async fn start(&self, _stop_receiver: StopReceiver) -> Result<(), AllowlistError> {
        self.lifecycle.start(|| ())
    }

    async fn close(&self) -> Result<(), AllowlistError> {
        match self.lifecycle.begin_stop()? {
            StopTransition::Stop(()) => self.lifecycle.finish_stop(),
            StopTransition::Wait(stopped_receiver) => {
                Lifecycle::<()>::wait_stopped(stopped_receiver).await;
            }
        }
        Ok(())
    }
}
