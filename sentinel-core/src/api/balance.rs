use anyhow::Error;
use async_trait::async_trait;

use crate::types::{Address, RawBalance};

/// Any failure to obtain one address's balance: transport, decoding, unknown
/// owner or timeout. The engine treats all of them alike.
#[derive(Debug, thiserror::Error)]
#[error("Failed to fetch balance of {address}: {source}")]
pub struct FetchError {
    pub address: Address,
    #[source]
    pub source: Error,
}

impl FetchError {
    pub fn new(address: &Address, source: impl Into<Error>) -> Self {
        Self {
            address: address.clone(),
            source: source.into(),
        }
    }
}

#[async_trait]
pub trait BalanceFetcher: Send + Sync + 'static {
    /// Single query, no retry, no caching.
    async fn fetch(&self, address: &Address, token: &str) -> Result<RawBalance, FetchError>;
}
