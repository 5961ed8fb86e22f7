use anyhow::Error;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use sentinel_core::api::{BalanceFetcher, FetchError};
use sentinel_core::types::{parse_raw_balance, Address, RawBalance};
use tracing::debug;

use crate::Sui;

/// `suix_getBalance` result. Amounts are decimal strings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoinBalance {
    pub coin_type: String,
    pub coin_object_count: u64,
    pub total_balance: String,
}

impl CoinBalance {
    pub fn raw_total(&self) -> Result<RawBalance, Error> {
        parse_raw_balance(&self.total_balance)
    }
}

impl Sui {
    pub async fn get_balance(
        &self,
        owner: &Address,
        coin_type: &str,
    ) -> Result<CoinBalance, Error> {
        self.rpc_client
            .call("suix_getBalance", json!([owner.as_str(), coin_type]))
            .await
    }
}

#[async_trait]
impl BalanceFetcher for Sui {
    async fn fetch(&self, address: &Address, token: &str) -> Result<RawBalance, FetchError> {
        let balance = self
            .get_balance(address, token)
            .await
            .map_err(|e| FetchError::new(address, e))?;

        debug!(
            "Sui | {} holds {} of {} in {} coin objects",
            address, balance.total_balance, balance.coin_type, balance.coin_object_count
        );

        balance.raw_total().map_err(|e| FetchError::new(address, e))
    }
}

#[cfg(test)]
mod test {
    use alloy_primitives::U256;

    use super::*;
    use crate::rpc::decode_response;

    const GET_BALANCE_RESPONSE: &str = r#"{
        "jsonrpc": "2.0",
        "id": 1,
        "result": {
            "coinType": "0x8b449b4dc0f8c5f996734eaf23d36a5f6724e02e312a7e4af34bd0bb74de7b17::deagent_token::DEAGENT_TOKEN",
            "coinObjectCount": 3,
            "totalBalance": "292000000",
            "lockedBalance": {}
        }
    }"#;

    #[test]
    fn test_decode_get_balance() {
        let balance: CoinBalance =
            decode_response("suix_getBalance", GET_BALANCE_RESPONSE).unwrap();
        assert_eq!(balance.coin_object_count, 3);
        assert_eq!(balance.raw_total().unwrap(), U256::from(292_000_000u64));
    }

    #[test]
    fn test_raw_total_beyond_u64() {
        let balance = CoinBalance {
            coin_type: "0x2::sui::SUI".to_string(),
            coin_object_count: 1,
            total_balance: "340282366920938463463374607431768211455".to_string(),
        };
        assert_eq!(balance.raw_total().unwrap(), U256::from(u128::MAX));
    }

    #[test]
    fn test_raw_total_rejects_garbage() {
        let balance = CoinBalance {
            coin_type: "0x2::sui::SUI".to_string(),
            coin_object_count: 0,
            total_balance: "n/a".to_string(),
        };
        assert!(balance.raw_total().is_err());
    }
}
