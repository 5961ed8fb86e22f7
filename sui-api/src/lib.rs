use std::time::Duration;

use anyhow::Error;
use tracing::debug;

mod balance;
mod config;
mod rpc;

pub use self::balance::CoinBalance;
pub use self::config::{SuiConfig, SuiNetwork};
use self::rpc::RpcClient;

/// Sui full node client exposing the balance query the monitor needs.
pub struct Sui {
    rpc_client: RpcClient,
}

impl Sui {
    pub fn new(config: &SuiConfig) -> Result<Sui, Error> {
        let rpc_client = RpcClient::new(
            config.rpc_url(),
            Duration::from_secs(config.request_timeout_secs),
        )?;

        debug!("Sui | Using full node {}", rpc_client.url());

        Ok(Sui { rpc_client })
    }
}
