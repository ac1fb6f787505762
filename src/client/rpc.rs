/// JSON-RPC HTTP client for account and transaction lookups

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::ingest::transaction::TransactionEnvelope;

#[derive(Error, Debug)]
pub enum RpcError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("Unexpected response shape: {0}")]
    Decode(String),

    #[error("Invalid base64 account data: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// Fetches raw account data for the snapshot engine
#[async_trait]
pub trait AccountSource: Send + Sync {
    /// `Ok(None)` when the account does not exist (yet)
    async fn fetch_account_data(&self, address: &str) -> Result<Option<Vec<u8>>, RpcError>;
}

/// Fetches full transactions for the event monitor
#[async_trait]
pub trait TransactionSource: Send + Sync {
    /// `Ok(None)` when the node does not know the signature yet
    async fn fetch_transaction(&self, signature: &str) -> Result<Option<TransactionEnvelope>, RpcError>;
}

/// JSON-RPC request body
#[derive(Debug, Serialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: u64,
    pub method: String,
    pub params: Value,
}

impl JsonRpcRequest {
    pub fn new(id: u64, method: &str, params: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            method: method.to_string(),
            params,
        }
    }
}

/// JSON-RPC error structure
#[derive(Debug, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
}

/// JSON-RPC response envelope
#[derive(Debug, Deserialize)]
pub struct JsonRpcResponse<T> {
    pub result: Option<T>,
    pub error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct AccountInfoResult {
    value: Option<AccountInfoValue>,
}

#[derive(Debug, Deserialize)]
struct AccountInfoValue {
    /// `[payload, encoding]`
    data: Vec<String>,
}

/// HTTP JSON-RPC client shared read-only by every polling loop
#[derive(Debug, Clone)]
pub struct RpcClient {
    url: String,
    client: Client,
}

impl RpcClient {
    pub fn new(url: &str, request_timeout: Duration) -> Result<Self, RpcError> {
        let client = Client::builder().timeout(request_timeout).build()?;
        Ok(Self {
            url: url.to_string(),
            client,
        })
    }

    async fn call<T: for<'de> Deserialize<'de>>(&self, method: &str, params: Value) -> Result<Option<T>, RpcError> {
        let request = JsonRpcRequest::new(1, method, params);

        let response: JsonRpcResponse<T> = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if let Some(error) = response.error {
            return Err(RpcError::Rpc {
                code: error.code,
                message: error.message,
            });
        }

        Ok(response.result)
    }
}

/// Decode the `[payload, "base64"]` pair returned by `getAccountInfo`
fn decode_account_payload(data: &[String]) -> Result<Option<Vec<u8>>, RpcError> {
    match data.first() {
        Some(payload) if !payload.is_empty() => Ok(Some(STANDARD.decode(payload)?)),
        _ => Ok(None),
    }
}

#[async_trait]
impl AccountSource for RpcClient {
    #[instrument(skip(self))]
    async fn fetch_account_data(&self, address: &str) -> Result<Option<Vec<u8>>, RpcError> {
        let params = serde_json::json!([
            address,
            { "encoding": "base64", "commitment": "confirmed" }
        ]);

        let result: Option<AccountInfoResult> = self.call("getAccountInfo", params).await?;

        match result.and_then(|r| r.value) {
            Some(value) => decode_account_payload(&value.data),
            None => {
                debug!("Account {} not found", address);
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl TransactionSource for RpcClient {
    #[instrument(skip(self))]
    async fn fetch_transaction(&self, signature: &str) -> Result<Option<TransactionEnvelope>, RpcError> {
        let params = serde_json::json!([
            signature,
            { "commitment": "confirmed", "maxSupportedTransactionVersion": 0 }
        ]);

        self.call("getTransaction", params).await
    }
}
