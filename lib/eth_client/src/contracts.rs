//! ABIs of the contracts read by the gateway.

use ethabi::Contract;
use once_cell::sync::Lazy;

const FUNCTIONS_ROUTER_ABI: &str = include_str!("../abi/FunctionsRouter.json");
const TOS_ALLOWLIST_ABI: &str = include_str!("../abi/TermsOfServiceAllowList.json");

static FUNCTIONS_ROUTER_CONTRACT: Lazy<Contract> =
    Lazy::new(|| load_contract("FunctionsRouter", FUNCTIONS_ROUTER_ABI));
static TOS_ALLOWLIST_CONTRACT: Lazy<Contract> =
    Lazy::new(|| load_contract("TermsOfServiceAllowList", TOS_ALLOWLIST_ABI));

fn load_contract(name: &str, raw_abi: &str) -> Contract {
    Contract::load(raw_abi.as_bytes())
        .unwrap_or_else(|err| panic!("Malformed ABI of contract `{name}`: {err}"))
}

/// Functions router, which resolves the allowlist contract by its ID.
pub fn functions_router_contract() -> &'static Contract {
    &FUNCTIONS_ROUTER_CONTRACT
}

/// Terms-of-service allowlist, which stores the addresses of allowed senders.
pub fn tos_allowlist_contract() -> &'static Contract {
    &TOS_ALLOWLIST_CONTRACT
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contracts_are_loaded() {
        let router = functions_router_contract();
        router.function("getAllowListId").unwrap();
        router.function("getContractById").unwrap();

        let allowlist = tos_allowlist_contract();
        allowlist.function("getAllowedSendersCount").unwrap();
        let range_fn = allowlist.function("getAllowedSendersInRange").unwrap();
        assert_eq!(range_fn.inputs.len(), 2);
        assert_eq!(range_fn.outputs.len(), 1);
    }
}
