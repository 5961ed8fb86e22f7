use ::config::{Config, Environment, File};
use anyhow::Error;
use sentinel_core::EngineConfig;
use serde::Deserialize;
use sui_api::SuiConfig;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SentinelConfig {
    pub monitor: EngineConfig,
    #[serde(default)]
    pub sui: SuiConfig,
}

/// Reads `<name>.toml` (or any format `config` recognizes by extension), with
/// `SENTINEL__SECTION__KEY` environment variables on top.
pub fn load(name: &str) -> Result<SentinelConfig, Error> {
    let config = Config::builder()
        .add_source(File::with_name(name))
        .add_source(Environment::with_prefix("SENTINEL").separator("__"))
        .build()?;

    Ok(config.try_deserialize()?)
}
