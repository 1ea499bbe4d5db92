//! JSON-RPC client with Basic auth, per-call deadline and transport retries.

use std::time::Duration;

use rand::rngs::OsRng;
use rand::RngCore;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::time::{sleep, timeout};

use crate::observability::metrics;
use crate::resilience::RetryPolicy;
use crate::rpc::types::{error_text, RpcError, RpcRequest, RpcResponse, RpcResult};

/// Protocol dialect spoken by the daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonRpcVersion {
    /// bitcoind style (`"jsonrpc": "1.0"`).
    V1,
    /// Counterparty style (`"jsonrpc": "2.0"`).
    V2,
}

impl JsonRpcVersion {
    fn as_str(&self) -> &'static str {
        match self {
            JsonRpcVersion::V1 => "1.0",
            JsonRpcVersion::V2 => "2.0",
        }
    }
}

/// A JSON-RPC endpoint with credentials.
#[derive(Clone)]
pub struct JsonRpcClient {
    http: reqwest::Client,
    endpoint: String,
    username: String,
    password: String,
    version: JsonRpcVersion,
    timeout_duration: Duration,
    retry: RetryPolicy,
}

impl JsonRpcClient {
    /// Create a client for `endpoint`.
    ///
    /// # Arguments
    /// * `endpoint` - Full URL the envelope is POSTed to
    /// * `username`, `password` - HTTP Basic credentials
    /// * `version` - Envelope dialect
    /// * `timeout_duration` - Deadline for each HTTP exchange
    pub fn new(
        endpoint: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        version: JsonRpcVersion,
        timeout_duration: Duration,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into(),
            username: username.into(),
            password: password.into(),
            version,
            timeout_duration,
            retry: RetryPolicy::none(),
        }
    }

    /// Retry connection failures according to `policy`.
    pub fn with_retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    /// Endpoint URL.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Call `method` and decode its `result` member into `T`.
    pub async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> RpcResult<T> {
        let request = RpcRequest {
            method,
            params: &params,
            jsonrpc: self.version.as_str(),
            id: OsRng.next_u32(),
        };

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.send_once(&request).await {
                Err(e) if e.is_retryable() && attempt < self.retry.max_attempts() => {
                    let delay = self.retry.delay(attempt);
                    tracing::warn!(
                        method = method,
                        attempt = attempt,
                        delay = ?delay,
                        error = %e,
                        "RPC connection failed, retrying"
                    );
                    sleep(delay).await;
                }
                result => {
                    metrics::record_rpc(method, result.is_ok());
                    if let Err(e) = &result {
                        tracing::debug!(method = method, id = request.id, error = %e, "RPC call failed");
                    }
                    return result;
                }
            }
        }
    }

    async fn send_once<T: DeserializeOwned>(&self, request: &RpcRequest<'_>) -> RpcResult<T> {
        let fut = self
            .http
            .post(&self.endpoint)
            .basic_auth(&self.username, Some(&self.password))
            .json(request)
            .send();

        let response = match timeout(self.timeout_duration, fut).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) if e.is_connect() => return Err(RpcError::Connect(e.to_string())),
            Ok(Err(e)) => return Err(RpcError::Transport(e.to_string())),
            Err(_) => return Err(RpcError::Timeout(self.timeout_duration.as_secs())),
        };

        let status = response.status();
        let body = match timeout(self.timeout_duration, response.text()).await {
            Ok(Ok(body)) => body,
            Ok(Err(e)) => return Err(RpcError::Transport(e.to_string())),
            Err(_) => return Err(RpcError::Timeout(self.timeout_duration.as_secs())),
        };

        if status != reqwest::StatusCode::OK {
            return Err(RpcError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let envelope: RpcResponse = serde_json::from_str(&body)
            .map_err(|e| RpcError::Decode(format!("{} (body: {})", e, body)))?;

        if let Some(error) = envelope.error {
            return Err(RpcError::Remote {
                code: error.get("code").and_then(Value::as_i64),
                message: error_text(&error),
            });
        }

        serde_json::from_value(envelope.result.unwrap_or(Value::Null))
            .map_err(|e| RpcError::Decode(format!("{} in result of {}", e, request.method)))
    }
}

impl std::fmt::Debug for JsonRpcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonRpcClient")
            .field("endpoint", &self.endpoint)
            .field("username", &self.username)
            .field("version", &self.version)
            .field("timeout_secs", &self.timeout_duration.as_secs())
            .finish()
    }
}
