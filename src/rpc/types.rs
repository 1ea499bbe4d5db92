//! JSON-RPC envelope and error types.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Outbound request envelope.
#[derive(Debug, Serialize)]
pub struct RpcRequest<'a> {
    pub method: &'a str,
    pub params: &'a Value,
    pub jsonrpc: &'static str,
    pub id: u32,
}

/// Inbound response envelope. Both members are optional because daemons
/// disagree on whether to send `null` or omit the field.
#[derive(Debug, Deserialize)]
pub struct RpcResponse {
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<Value>,
}

/// Errors that can occur during a JSON-RPC call.
#[derive(Debug, Clone, Error)]
pub enum RpcError {
    /// Could not reach the daemon at all.
    #[error("RPC connection failed: {0}")]
    Connect(String),

    /// The request was sent but the exchange failed midway.
    #[error("RPC transport error: {0}")]
    Transport(String),

    /// No response within the deadline.
    #[error("RPC timeout after {0} seconds")]
    Timeout(u64),

    /// Non-200 HTTP status; the body is kept verbatim.
    #[error("RPC returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The daemon answered with an `error` member.
    #[error("RPC error: {message}")]
    Remote { code: Option<i64>, message: String },

    /// The response could not be decoded.
    #[error("Malformed RPC response: {0}")]
    Decode(String),
}

impl RpcError {
    /// Text reported by the remote side, if the daemon answered at all.
    pub fn remote_detail(&self) -> Option<&str> {
        match self {
            RpcError::Http { body, .. } => Some(body),
            RpcError::Remote { message, .. } => Some(message),
            _ => None,
        }
    }

    /// Whether the call may safely be attempted again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RpcError::Connect(_))
    }
}

/// Result type for JSON-RPC calls.
pub type RpcResult<T> = Result<T, RpcError>;

/// Flatten an `error` member into a single line of text.
///
/// Counterparty sends `{code, message, data}` objects, bitcoind sends
/// `{code, message}`, and some proxies send a bare string.
pub fn error_text(error: &Value) -> String {
    match error {
        Value::String(s) => s.clone(),
        Value::Object(map) => {
            let message = map.get("message").and_then(Value::as_str).unwrap_or_default();
            match map.get("data") {
                Some(Value::String(data)) if !message.is_empty() => format!("{}: {}", message, data),
                Some(Value::String(data)) => data.clone(),
                Some(data) if !data.is_null() && !message.is_empty() => format!("{}: {}", message, data),
                _ if !message.is_empty() => message.to_string(),
                _ => error.to_string(),
            }
        }
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_text_shapes() {
        assert_eq!(error_text(&json!("insufficient funds")), "insufficient funds");
        assert_eq!(
            error_text(&json!({"code": -25, "message": "bad-txns-inputs-spent"})),
            "bad-txns-inputs-spent"
        );
        assert_eq!(
            error_text(&json!({"code": -32000, "message": "Server error", "data": "no such asset"})),
            "Server error: no such asset"
        );
        assert_eq!(error_text(&json!(17)), "17");
    }

    #[test]
    fn test_remote_detail() {
        let err = RpcError::Http {
            status: 500,
            body: "{\"error\":\"insufficient funds\"}".to_string(),
        };
        assert_eq!(err.remote_detail(), Some("{\"error\":\"insufficient funds\"}"));
        assert!(RpcError::Timeout(5).remote_detail().is_none());
        assert!(RpcError::Connect("refused".into()).is_retryable());
        assert!(!RpcError::Timeout(5).is_retryable());
    }

    #[test]
    fn test_response_envelope_null_error() {
        let response: RpcResponse = serde_json::from_str(r#"{"result": "00ff", "error": null, "id": 7}"#).unwrap();
        assert!(response.error.is_none());
        assert_eq!(response.result, Some(json!("00ff")));
    }
}
