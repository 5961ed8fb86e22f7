use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use anyhow::Error;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Value as JsonValue};
use tracing::debug;

/// Minimal JSON-RPC 2.0 client over HTTP.
pub struct RpcClient {
    http_client: reqwest::Client,
    url: String,
    next_id: AtomicU64,
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

impl RpcClient {
    pub fn new(url: &str, request_timeout: Duration) -> Result<Self, Error> {
        let http_client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;

        Ok(Self {
            http_client,
            url: url.to_string(),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: JsonValue,
    ) -> Result<T, Error> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        debug!("Sui | {} #{} {}", method, id, params);

        let body = self
            .http_client
            .post(&self.url)
            .json(&json!({
                "jsonrpc": "2.0",
                "id": id,
                "method": method,
                "params": params,
            }))
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        decode_response(method, &body)
    }
}

pub(crate) fn decode_response<T: DeserializeOwned>(method: &str, body: &str) -> Result<T, Error> {
    let response: RpcResponse<T> = serde_json::from_str(body)?;

    if let Some(error) = response.error {
        return Err(Error::msg(format!(
            "{} failed with code {}: {}",
            method, error.code, error.message
        )));
    }

    response
        .result
        .ok_or(Error::msg(format!("{} returned no result", method)))
}
