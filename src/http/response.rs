//! Error and acknowledgement responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Map, Value};

use crate::coordination::{DispatchError, OperationError};
use crate::persistence::{OperationKind, OperationRecord, StoreError};

/// Failures surfaced to API callers.
#[derive(Debug)]
pub enum ApiError {
    MissingAccessKey,
    NotFound { kind: OperationKind, id: String },
    Dispatch(DispatchError),
    Store(StoreError),
}

impl From<DispatchError> for ApiError {
    fn from(e: DispatchError) -> Self {
        ApiError::Dispatch(e)
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        ApiError::Store(e)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingAccessKey => StatusCode::UNAUTHORIZED,
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::Dispatch(DispatchError::Saturated { .. }) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Dispatch(DispatchError::Rejected(e)) => match e {
                OperationError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
                OperationError::Store(StoreError::Duplicate { .. }) => StatusCode::CONFLICT,
                OperationError::NoCustodialWallet(_) => StatusCode::SERVICE_UNAVAILABLE,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::MissingAccessKey => "Missing x-access-key header".to_string(),
            ApiError::NotFound { kind, id } => format!("No {} with id {}", kind, id),
            ApiError::Dispatch(e) => e.to_string(),
            ApiError::Store(e) => e.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self.message(), "Request failed");
        }
        (status, Json(json!({ "error": self.message() }))).into_response()
    }
}

/// `202 Accepted` body: `{"<kind>Id": id, "status": "valid"}`.
pub fn accepted(kind: OperationKind, correlation_id: &str) -> Response {
    let mut body = Map::new();
    body.insert(kind.id_field().to_string(), Value::String(correlation_id.to_string()));
    body.insert("status".to_string(), Value::String("valid".to_string()));
    (StatusCode::ACCEPTED, Json(Value::Object(body))).into_response()
}

/// Record body with the kind-specific id field added.
pub fn record(record: &OperationRecord) -> Response {
    let mut value = serde_json::to_value(record).unwrap_or_else(|_| json!({}));
    if let Value::Object(map) = &mut value {
        map.insert(
            record.kind.id_field().to_string(),
            Value::String(record.correlation_id.clone()),
        );
    }
    (StatusCode::OK, Json(value)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ApiError::MissingAccessKey.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            ApiError::Dispatch(DispatchError::Saturated { limit: 1 }).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ApiError::Dispatch(DispatchError::Rejected(OperationError::InvalidRequest("x".into()))).status(),
            StatusCode::BAD_REQUEST
        );
        let duplicate = StoreError::Duplicate {
            kind: OperationKind::Payment,
            correlation_id: "p".into(),
        };
        assert_eq!(
            ApiError::Dispatch(DispatchError::Rejected(OperationError::Store(duplicate))).status(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn test_accepted_body() {
        let response = accepted(OperationKind::Dividend, "abc");
        assert_eq!(response.status(), StatusCode::ACCEPTED);
    }
}
