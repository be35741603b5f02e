use std::fmt;

use ethabi::{Address, Contract, Token};

use crate::EthInterface;

/// Raw `eth_call` request.
#[derive(Debug, Clone, PartialEq)]
pub struct CallRequest {
    pub to: Address,
    pub data: Vec<u8>,
}

/// Kind of a failed client request.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum ClientErrorKind {
    /// Problem on the transport level (e.g., connection reset).
    #[error("transport error: {0}")]
    Transport(String),
    /// The request didn't complete in time.
    #[error("request timed out")]
    RequestTimeout,
    /// The node responded with a JSON-RPC error.
    #[error("JSON-RPC error {code}: {message}")]
    Rpc { code: i64, message: String },
}

/// Client error enriched with the name of the failed method.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{kind} (calling `{method}`)")]
pub struct ClientError {
    method: &'static str,
    #[source]
    kind: ClientErrorKind,
}

impl ClientError {
    pub fn new(method: &'static str, kind: ClientErrorKind) -> Self {
        Self { method, kind }
    }

    pub fn transport(method: &'static str, message: impl fmt::Display) -> Self {
        Self::new(method, ClientErrorKind::Transport(message.to_string()))
    }

    /// Checks whether the request may succeed if it's repeated.
    pub fn is_retryable(&self) -> bool {
        match &self.kind {
            ClientErrorKind::Transport(_) | ClientErrorKind::RequestTimeout => true,
            // Rate limiting and internal node errors.
            ClientErrorKind::Rpc { code, .. } => matches!(code, -32005 | -32603),
        }
    }
}

/// Error of calling a function in a specific contract.
#[derive(Debug, thiserror::Error)]
pub enum ContractCallError {
    #[error("function `{0}` is not defined in the contract ABI")]
    UnknownFunction(String, #[source] ethabi::Error),
    #[error("failed encoding arguments for `{function}`: {source}")]
    Encode {
        function: String,
        #[source]
        source: ethabi::Error,
    },
    /// Problem on the Ethereum client side (e.g. bad RPC call, network issues).
    #[error("request to ethereum gateway failed: {0}")]
    EthereumGateway(#[from] ClientError),
    #[error("failed decoding output of `{function}`: {source}")]
    Decode {
        function: String,
        #[source]
        source: ethabi::Error,
    },
    /// Output was decoded according to the ABI, but doesn't satisfy the caller expectations.
    #[error("unexpected output of `{function}`: {reason}")]
    UnexpectedOutput { function: String, reason: String },
}

impl ContractCallError {
    pub fn unexpected_output(function: &str, reason: impl Into<String>) -> Self {
        Self::UnexpectedOutput {
            function: function.to_owned(),
            reason: reason.into(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::EthereumGateway(err) if err.is_retryable())
    }
}

/// Arguments for calling a function in an unspecified Ethereum smart contract.
#[derive(Debug, Clone)]
pub struct CallFunctionArgs {
    name: String,
    block: Option<u64>,
    params: Vec<Token>,
}

impl CallFunctionArgs {
    pub fn new(name: &str, params: Vec<Token>) -> Self {
        Self {
            name: name.to_owned(),
            block: None,
            params,
        }
    }

    pub fn with_block(mut self, block: u64) -> Self {
        self.block = Some(block);
        self
    }

    pub fn for_contract(self, contract_address: Address, contract_abi: &Contract) -> ContractCall<'_> {
        ContractCall {
            contract_address,
            contract_abi,
            inner: self,
        }
    }
}

/// Information sufficient for calling a function in a specific Ethereum smart contract. Instantiated
/// using [`CallFunctionArgs::for_contract()`].
#[derive(Debug, Clone)]
pub struct ContractCall<'a> {
    contract_address: Address,
    contract_abi: &'a Contract,
    inner: CallFunctionArgs,
}

impl ContractCall<'_> {
    /// Encodes the call, performs it using the provided client and decodes output tokens.
    pub async fn call(&self, client: &dyn EthInterface) -> Result<Vec<Token>, ContractCallError> {
        let name = &self.inner.name;
        let function = self
            .contract_abi
            .function(name)
            .map_err(|err| ContractCallError::UnknownFunction(name.clone(), err))?;
        let data = function
            .encode_input(&self.inner.params)
            .map_err(|source| ContractCallError::Encode {
                function: name.clone(),
                source,
            })?;

        let request = CallRequest::new(self.contract_address, data);
        let output = client
            .call_contract_function(request, self.inner.block)
            .await?;
        function
            .decode_output(&output)
            .map_err(|source| ContractCallError::Decode {
                function: name.clone(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::tos_allowlist_contract;

    #[test]
    fn retryable_errors() {
        let err = ClientError::transport("eth_call", "connection reset");
        assert!(err.is_retryable());
        let message = err.to_string();
        assert!(message.contains("connection reset"), "{message}");
        assert!(message.contains("`eth_call`"), "{message}");

        let err = ClientError::new(
            "eth_call",
            ClientErrorKind::Rpc {
                code: 3,
                message: "execution reverted".into(),
            },
        );
        assert!(!err.is_retryable());
        let err = ContractCallError::from(err);
        assert!(!err.is_retryable());

        let err = ContractCallError::from(ClientError::new(
            "eth_blockNumber",
            ClientErrorKind::RequestTimeout,
        ));
        assert!(err.is_retryable());
        assert!(!ContractCallError::unexpected_output("f", "oops").is_retryable());
    }

    #[test]
    fn encoding_call_arguments() {
        let contract = tos_allowlist_contract();
        let args = CallFunctionArgs::new(
            "getAllowedSendersInRange",
            vec![Token::Uint(0.into()), Token::Uint(9.into())],
        );
        let func = contract.function(&args.name).unwrap();
        let data = func.encode_input(&args.params).unwrap();
        assert_eq!(data[..4], func.short_signature());
        assert_eq!(data.len(), 4 + 2 * 32);
    }
}
