//! Typed reads of the functions router and the terms-of-service allowlist contracts.

use ethabi::{Address, Token};

use crate::{
    contracts::{functions_router_contract, tos_allowlist_contract},
    CallFunctionArgs, ContractCallError, EthInterface,
};

/// Resolves the address of the allowlist contract registered in the functions router.
pub async fn get_allowlist_contract_address(
    client: &dyn EthInterface,
    router_address: Address,
    block: u64,
) -> Result<Address, ContractCallError> {
    let router = functions_router_contract();
    let output = CallFunctionArgs::new("getAllowListId", vec![])
        .with_block(block)
        .for_contract(router_address, router)
        .call(client)
        .await?;
    let allowlist_id = match single_output("getAllowListId", output)? {
        Token::FixedBytes(bytes) if bytes.len() == 32 => bytes,
        token => {
            return Err(ContractCallError::unexpected_output(
                "getAllowListId",
                format!("expected bytes32, got {token:?}"),
            ))
        }
    };
    tracing::trace!("Allowlist ID in router {router_address:?}: {allowlist_id:02x?}");

    let output = CallFunctionArgs::new("getContractById", vec![Token::FixedBytes(allowlist_id)])
        .with_block(block)
        .for_contract(router_address, router)
        .call(client)
        .await?;
    let address = into_address("getContractById", single_output("getContractById", output)?)?;
    if address.is_zero() {
        return Err(ContractCallError::unexpected_output(
            "getContractById",
            "allowlist contract is not registered in the router",
        ));
    }
    Ok(address)
}

/// Returns the number of allowed senders stored in the allowlist contract.
pub async fn get_allowed_senders_count(
    client: &dyn EthInterface,
    allowlist_address: Address,
    block: u64,
) -> Result<u64, ContractCallError> {
    let output = CallFunctionArgs::new("getAllowedSendersCount", vec![])
        .with_block(block)
        .for_contract(allowlist_address, tos_allowlist_contract())
        .call(client)
        .await?;
    into_u64(
        "getAllowedSendersCount",
        single_output("getAllowedSendersCount", output)?,
    )
}

/// Returns allowed senders with indices in `start..=end`.
pub async fn get_allowed_senders_in_range(
    client: &dyn EthInterface,
    allowlist_address: Address,
    start: u64,
    end: u64,
    block: u64,
) -> Result<Vec<Address>, ContractCallError> {
    const FUNCTION: &str = "getAllowedSendersInRange";

    let params = vec![Token::Uint(start.into()), Token::Uint(end.into())];
    let output = CallFunctionArgs::new(FUNCTION, params)
        .with_block(block)
        .for_contract(allowlist_address, tos_allowlist_contract())
        .call(client)
        .await?;
    let Token::Array(tokens) = single_output(FUNCTION, output)? else {
        return Err(ContractCallError::unexpected_output(
            FUNCTION,
            "expected an array of addresses",
        ));
    };
    tokens
        .into_iter()
        .map(|token| into_address(FUNCTION, token))
        .collect()
}

fn single_output(function: &str, tokens: Vec<Token>) -> Result<Token, ContractCallError> {
    let len = tokens.len();
    let mut tokens = tokens.into_iter();
    match (tokens.next(), len) {
        (Some(token), 1) => Ok(token),
        _ => Err(ContractCallError::unexpected_output(
            function,
            format!("expected a single output token, got {len}"),
        )),
    }
}

fn into_address(function: &str, token: Token) -> Result<Address, ContractCallError> {
    match token {
        Token::Address(address) => Ok(address),
        token => Err(ContractCallError::unexpected_output(
            function,
            format!("expected address, got {token:?}"),
        )),
    }
}

fn into_u64(function: &str, token: Token) -> Result<u64, ContractCallError> {
    match token {
        Token::Uint(value) if value.bits() <= 64 => Ok(value.low_u64()),
        token => Err(ContractCallError::unexpected_output(
            function,
            format!("expected uint64, got {token:?}"),
        )),
    }
}
