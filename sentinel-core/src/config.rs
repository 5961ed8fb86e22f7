use std::{
    collections::{HashMap, HashSet},
    time::Duration,
};

use serde::Deserialize;

use crate::types::{parse_raw_balance, Address, RawBalance, MAX_DECIMALS};

const DEFAULT_POLL_INTERVAL_SECS: u64 = 30;
const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("No addresses configured")]
    EmptyAddressList,
    #[error("Address {0} is configured more than once")]
    DuplicateAddress(Address),
    #[error("Decimals must be at most {max}, got {decimals}")]
    InvalidDecimals { decimals: u32, max: u32 },
    #[error("Poll interval must be greater than zero")]
    ZeroPollInterval,
    #[error("Fetch timeout must be greater than zero")]
    ZeroFetchTimeout,
    #[error("Initial value {value:?} for {address} is not a raw integer balance")]
    InvalidInitialValue { address: Address, value: String },
    #[error("Initial value given for unmonitored address {0}")]
    UnknownInitialAddress(Address),
}

/// What to do with records whose fetches keep failing.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FailurePolicy {
    /// Flag a record stale after this many consecutive failures.
    pub stale_after: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct EngineConfig {
    pub addresses: Vec<Address>,
    pub token: String,
    pub decimals: u32,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    #[serde(default)]
    pub stale_after_failures: Option<u32>,
    #[serde(default)]
    pub initial_values: HashMap<Address, String>,
}

fn default_poll_interval_secs() -> u64 {
    DEFAULT_POLL_INTERVAL_SECS
}

fn default_fetch_timeout_secs() -> u64 {
    DEFAULT_FETCH_TIMEOUT_SECS
}

impl EngineConfig {
    pub fn new(addresses: Vec<Address>, token: &str, decimals: u32) -> Self {
        Self {
            addresses,
            token: token.to_string(),
            decimals,
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
            stale_after_failures: None,
            initial_values: HashMap::new(),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn failure_policy(&self) -> FailurePolicy {
        FailurePolicy {
            stale_after: self.stale_after_failures,
        }
    }

    /// Checks the configuration and resolves the seed value of every address,
    /// in address order. Missing initial values default to zero.
    pub fn validate(&self) -> Result<Vec<(Address, RawBalance)>, ConfigError> {
        if self.addresses.is_empty() {
            return Err(ConfigError::EmptyAddressList);
        }

        if self.decimals > MAX_DECIMALS {
            return Err(ConfigError::InvalidDecimals {
                decimals: self.decimals,
                max: MAX_DECIMALS,
            });
        }

        if self.poll_interval_secs == 0 {
            return Err(ConfigError::ZeroPollInterval);
        }

        if self.fetch_timeout_secs == 0 {
            return Err(ConfigError::ZeroFetchTimeout);
        }

        let mut seen = HashSet::new();
        for address in &self.addresses {
            if !seen.insert(address) {
                return Err(ConfigError::DuplicateAddress(address.clone()));
            }
        }

        if let Some(address) = self.initial_values.keys().find(|a| !seen.contains(a)) {
            return Err(ConfigError::UnknownInitialAddress(address.clone()));
        }

        self.addresses
            .iter()
            .map(|address| {
                let value = match self.initial_values.get(address) {
                    Some(value) => parse_raw_balance(value).map_err(|_| {
                        ConfigError::InvalidInitialValue {
                            address: address.clone(),
                            value: value.clone(),
                        }
                    })?,
                    None => RawBalance::ZERO,
                };
                Ok((address.clone(), value))
            })
            .collect()
    }
}
