//! Read-only Ethereum client interface consumed by the functions gateway.

use std::fmt;

use async_trait::async_trait;
pub use ethabi;
use ethabi::Address;

pub use crate::types::{
    CallFunctionArgs, CallRequest, ClientError, ClientErrorKind, ContractCall, ContractCallError,
};

pub mod clients;
pub mod contracts;
pub mod contracts_loader;
mod types;

/// Common Web3 interface, as seen by the gateway components.
///
/// The trait only contains "abstract" queries to Web3, i.e. there are no assumptions about the contract
/// that is queried. Contract-specific logic is built on top of it (see [`contracts_loader`]).
/// Implementations are free to retry or batch requests internally; callers treat each method as a black box.
#[async_trait]
pub trait EthInterface: Sync + Send + fmt::Debug {
    /// Returns the current block number.
    async fn block_number(&self) -> Result<u64, ClientError>;

    /// Performs an `eth_call` at the specified block (or the latest block if `None`) and returns raw output bytes.
    async fn call_contract_function(
        &self,
        request: CallRequest,
        block: Option<u64>,
    ) -> Result<Vec<u8>, ClientError>;
}

#[async_trait]
impl<T: EthInterface + ?Sized> EthInterface for Box<T> {
    async fn block_number(&self) -> Result<u64, ClientError> {
        (**self).block_number().await
    }

    async fn call_contract_function(
        &self,
        request: CallRequest,
        block: Option<u64>,
    ) -> Result<Vec<u8>, ClientError> {
        (**self).call_contract_function(request, block).await
    }
}

impl CallRequest {
    pub fn new(to: Address, data: Vec<u8>) -> Self {
        Self { to, data }
    }
}
