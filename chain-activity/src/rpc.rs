//! JSON-RPC 2.0 client
//!
//! Thin request/response envelope over `reqwest`, shared by the wallet bridge
//! and the data provider. Failures keep the provider's error code so callers
//! can classify them.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::{Duration, Instant},
};
use thiserror::Error;
use tracing::debug;

use crate::error::{DataError, WalletError};

/// JSON-RPC request ID counter
static REQUEST_ID: AtomicU64 = AtomicU64::new(1);

/// JSON-RPC 2.0 request
#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    params: Value,
    id: u64,
}

/// JSON-RPC 2.0 response
#[derive(Debug, Deserialize)]
struct JsonRpcResponse<T> {
    result: Option<T>,
    error: Option<JsonRpcError>,
}

/// JSON-RPC error
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
}

/// Why a JSON-RPC call failed.
#[derive(Debug, Error)]
pub enum RpcCallError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("HTTP error: {0}")]
    Status(reqwest::StatusCode),
    #[error("RPC error {}: {}", .0.code, .0.message)]
    Rpc(JsonRpcError),
    #[error("missing result in RPC response")]
    MissingResult,
}

impl From<RpcCallError> for DataError {
    fn from(err: RpcCallError) -> Self {
        match err {
            RpcCallError::Transport(e) => DataError::Transport(e),
            RpcCallError::Status(status) => DataError::Status(status),
            RpcCallError::Rpc(e) => DataError::Rpc {
                code: e.code,
                message: e.message,
            },
            RpcCallError::MissingResult => DataError::MissingResult,
        }
    }
}

impl From<RpcCallError> for WalletError {
    fn from(err: RpcCallError) -> Self {
        match err {
            RpcCallError::Rpc(e) => WalletError::from_code(e.code, e.message, None),
            other => WalletError::Transport(other.to_string()),
        }
    }
}

/// Build the HTTP client shared by every endpoint of one provider.
pub fn http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

/// Client for a single JSON-RPC endpoint.
#[derive(Debug, Clone)]
pub struct JsonRpcClient {
    client: reqwest::Client,
    url: String,
}

impl JsonRpcClient {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Call `method` and decode its `result`.
    ///
    /// A `null` result is decoded as-is, so `T = Option<_>` accepts it.
    pub async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<T, RpcCallError> {
        let id = REQUEST_ID.fetch_add(1, Ordering::SeqCst);
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            method,
            params,
            id,
        };

        let start = Instant::now();
        let response = self.client.post(&self.url).json(&request).send().await?;

        if !response.status().is_success() {
            return Err(RpcCallError::Status(response.status()));
        }

        let body: JsonRpcResponse<Value> = response.json().await?;
        debug!(
            "{} #{} answered in {}ms",
            method,
            id,
            start.elapsed().as_millis()
        );

        if let Some(error) = body.error {
            return Err(RpcCallError::Rpc(error));
        }

        let result = body.result.unwrap_or(Value::Null);
        serde_json::from_value(result).map_err(|_| RpcCallError::MissingResult)
    }
}

/// Parse a `0x`-prefixed hex quantity.
pub fn parse_quantity(s: &str) -> Option<primitive_types::U256> {
    let digits = s.strip_prefix("0x").unwrap_or(s);
    if digits.is_empty() {
        return Some(primitive_types::U256::zero());
    }
    primitive_types::U256::from_str_radix(digits, 16).ok()
}
