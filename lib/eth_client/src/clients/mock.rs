use std::{
    fmt,
    sync::{Arc, RwLock},
};

use async_trait::async_trait;
use ethabi::Token;

use crate::{CallRequest, ClientError, EthInterface};

/// `eth_call` recorded by [`MockEthereum`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub request: CallRequest,
    pub block: Option<u64>,
}

/// Mutable part of [`MockEthereum`] that needs to be synchronized via an `RwLock`.
#[derive(Debug, Default)]
struct MockEthereumInner {
    block_number: u64,
    block_number_error: Option<ClientError>,
    calls: Vec<RecordedCall>,
}

type CallHandler = dyn Fn(&CallRequest, Option<u64>) -> Result<Token, ClientError> + Send + Sync;

/// Mock Ethereum client is capable of recording all the incoming requests for the further analysis.
#[derive(Clone)]
pub struct MockEthereum {
    inner: Arc<RwLock<MockEthereumInner>>,
    call_handler: Arc<CallHandler>,
}

impl fmt::Debug for MockEthereum {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("MockEthereum")
            .field("inner", &self.inner)
            .finish_non_exhaustive()
    }
}

impl Default for MockEthereum {
    fn default() -> Self {
        Self {
            inner: Arc::default(),
            call_handler: Arc::new(|call, block| {
                panic!("Unexpected eth_call: {call:?}, {block:?}");
            }),
        }
    }
}

impl MockEthereum {
    pub fn with_block_number(self, block_number: u64) -> Self {
        self.write_inner().block_number = block_number;
        self
    }

    pub fn with_call_handler<F>(self, call_handler: F) -> Self
    where
        F: 'static + Send + Sync + Fn(&CallRequest, Option<u64>) -> Token,
    {
        Self {
            call_handler: Arc::new(move |call, block| Ok(call_handler(call, block))),
            ..self
        }
    }

    pub fn with_fallible_call_handler<F>(self, call_handler: F) -> Self
    where
        F: 'static + Send + Sync + Fn(&CallRequest, Option<u64>) -> Result<Token, ClientError>,
    {
        Self {
            call_handler: Arc::new(call_handler),
            ..self
        }
    }

    /// Makes all subsequent `block_number()` calls fail with the specified error, or restores normal operation
    /// if `None` is provided.
    pub fn set_block_number_error(&self, err: Option<ClientError>) {
        self.write_inner().block_number_error = err;
    }

    /// Returns all `eth_call`s made via this client.
    pub fn recorded_calls(&self) -> Vec<RecordedCall> {
        self.read_inner().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.read_inner().calls.len()
    }

    fn read_inner(&self) -> std::sync::RwLockReadGuard<'_, MockEthereumInner> {
        self.inner.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_inner(&self) -> std::sync::RwLockWriteGuard<'_, MockEthereumInner> {
        self.inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl EthInterface for MockEthereum {
    async fn block_number(&self) -> Result<u64, ClientError> {
        let inner = self.read_inner();
        match &inner.block_number_error {
            Some(err) => Err(err.clone()),
            None => Ok(inner.block_number),
        }
    }

    async fn call_contract_function(
        &self,
        request: CallRequest,
        block: Option<u64>,
    ) -> Result<Vec<u8>, ClientError> {
        self.write_inner().calls.push(RecordedCall {
            request: request.clone(),
            block,
        });
        (self.call_handler)(&request, block).map(|token| ethabi::encode(&[token]))
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use ethabi::Address;

    use super::*;

    #[tokio::test]
    async fn managing_block_number() {
        let block_number = MockEthereum::default().block_number().await.unwrap();
        assert_eq!(block_number, 0);

        let client = MockEthereum::default().with_block_number(5);
        let block_number = client.block_number().await.unwrap();
        assert_eq!(block_number, 5);

        client.set_block_number_error(Some(ClientError::transport("eth_blockNumber", "down")));
        assert_matches!(client.block_number().await, Err(err) if err.is_retryable());
        client.set_block_number_error(None);
        assert_eq!(client.block_number().await.unwrap(), 5);
    }

    #[tokio::test]
    async fn recording_calls() {
        let client = MockEthereum::default()
            .with_call_handler(|call, _| Token::Address(call.to));
        let request = CallRequest::new(Address::repeat_byte(1), vec![1, 2, 3, 4]);
        let output = client
            .call_contract_function(request.clone(), Some(3))
            .await
            .unwrap();
        assert_eq!(output, ethabi::encode(&[Token::Address(Address::repeat_byte(1))]));

        assert_eq!(client.call_count(), 1);
        assert_eq!(
            client.recorded_calls(),
            [RecordedCall {
                request,
                block: Some(3)
            }]
        );
    }
}
