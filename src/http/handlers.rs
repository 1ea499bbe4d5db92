//! Route handlers.

use axum::extract::{Path, State};
use axum::response::Response;
use axum::Json;
use serde_json::{json, Value};

use crate::coordination::OperationRequest;
use crate::http::request::{AccessKey, ActivationBody, AssetBody, DividendBody, PaymentBody};
use crate::http::response::{self, ApiError};
use crate::http::server::AppState;
use crate::persistence::OperationKind;

async fn submit(state: &AppState, request: OperationRequest) -> Result<Response, ApiError> {
    let submitted = state.dispatcher.submit(request).await?;
    Ok(response::accepted(submitted.kind, &submitted.correlation_id))
}

async fn fetch(state: &AppState, kind: OperationKind, access_key: AccessKey, id: String) -> Result<Response, ApiError> {
    let record = state
        .dispatcher
        .coordinator()
        .store()
        .get(kind, &access_key.0, &id)
        .await?;
    if record.is_not_found() {
        return Err(ApiError::NotFound { kind, id });
    }
    Ok(response::record(&record))
}

pub async fn create_payment(
    State(state): State<AppState>,
    access_key: AccessKey,
    Json(body): Json<PaymentBody>,
) -> Result<Response, ApiError> {
    submit(&state, OperationRequest::Payment(body.into_request(access_key))).await
}

pub async fn create_asset(
    State(state): State<AppState>,
    access_key: AccessKey,
    Json(body): Json<AssetBody>,
) -> Result<Response, ApiError> {
    submit(&state, OperationRequest::Asset(body.into_request(access_key))).await
}

pub async fn create_dividend(
    State(state): State<AppState>,
    access_key: AccessKey,
    Json(body): Json<DividendBody>,
) -> Result<Response, ApiError> {
    submit(&state, OperationRequest::Dividend(body.into_request(access_key))).await
}

pub async fn create_activation(
    State(state): State<AppState>,
    access_key: AccessKey,
    Json(body): Json<ActivationBody>,
) -> Result<Response, ApiError> {
    submit(&state, OperationRequest::Activation(body.into_request(access_key))).await
}

pub async fn get_payment(
    State(state): State<AppState>,
    access_key: AccessKey,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    fetch(&state, OperationKind::Payment, access_key, id).await
}

pub async fn get_asset(
    State(state): State<AppState>,
    access_key: AccessKey,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    fetch(&state, OperationKind::Asset, access_key, id).await
}

pub async fn get_dividend(
    State(state): State<AppState>,
    access_key: AccessKey,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    fetch(&state, OperationKind::Dividend, access_key, id).await
}

pub async fn get_activation(
    State(state): State<AppState>,
    access_key: AccessKey,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    fetch(&state, OperationKind::Activation, access_key, id).await
}

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "inFlight": state.dispatcher.in_flight(),
        "lockedAddresses": state.dispatcher.coordinator().locks().len(),
    }))
}
