//! Request extraction and body shapes.
//!
//! # Responsibilities
//! - Pull the owning access key from the `x-access-key` header
//! - Deserialize camelCase request bodies into coordinator requests
//!
//! Authentication of the key happens upstream; here it only scopes records.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use serde::Deserialize;

use crate::blockchain::Passphrase;
use crate::coordination::{ActivationRequest, AssetRequest, DividendRequest, PaymentRequest};
use crate::http::response::ApiError;

/// Header naming the caller's access key.
pub const X_ACCESS_KEY: &str = "x-access-key";

/// The caller's access key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessKey(pub String);

impl<S> FromRequestParts<S> for AccessKey
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let key = parts
            .headers
            .get(X_ACCESS_KEY)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or(ApiError::MissingAccessKey)?;
        Ok(AccessKey(key.to_string()))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentBody {
    pub payment_id: Option<String>,
    pub source: String,
    pub destination: String,
    pub asset: String,
    pub quantity: u64,
    pub passphrase: String,
    pub tag: Option<String>,
}

impl PaymentBody {
    pub fn into_request(self, access_key: AccessKey) -> PaymentRequest {
        PaymentRequest {
            access_key: access_key.0,
            payment_id: self.payment_id,
            source: self.source,
            destination: self.destination,
            asset: self.asset,
            quantity: self.quantity,
            passphrase: Passphrase::new(self.passphrase),
            tag: self.tag,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetBody {
    pub asset_id: Option<String>,
    pub source: String,
    pub asset: Option<String>,
    #[serde(default)]
    pub description: String,
    pub quantity: u64,
    #[serde(default = "default_divisible")]
    pub divisible: bool,
    pub passphrase: String,
    pub tag: Option<String>,
}

fn default_divisible() -> bool {
    true
}

impl AssetBody {
    pub fn into_request(self, access_key: AccessKey) -> AssetRequest {
        AssetRequest {
            access_key: access_key.0,
            asset_id: self.asset_id,
            source: self.source,
            asset: self.asset,
            description: self.description,
            quantity: self.quantity,
            divisible: self.divisible,
            passphrase: Passphrase::new(self.passphrase),
            tag: self.tag,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DividendBody {
    pub dividend_id: Option<String>,
    pub source: String,
    pub asset: String,
    pub dividend_asset: String,
    pub quantity_per_unit: u64,
    pub passphrase: String,
    pub tag: Option<String>,
}

impl DividendBody {
    pub fn into_request(self, access_key: AccessKey) -> DividendRequest {
        DividendRequest {
            access_key: access_key.0,
            dividend_id: self.dividend_id,
            source: self.source,
            asset: self.asset,
            dividend_asset: self.dividend_asset,
            quantity_per_unit: self.quantity_per_unit,
            passphrase: Passphrase::new(self.passphrase),
            tag: self.tag,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivationBody {
    pub activation_id: Option<String>,
    pub destination: String,
    #[serde(default = "default_activation_count")]
    pub activation_count: u64,
    pub tag: Option<String>,
}

fn default_activation_count() -> u64 {
    1
}

impl ActivationBody {
    pub fn into_request(self, access_key: AccessKey) -> ActivationRequest {
        ActivationRequest {
            access_key: access_key.0,
            activation_id: self.activation_id,
            destination: self.destination,
            activation_count: self.activation_count,
            tag: self.tag,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_body_camel_case() {
        let body: PaymentBody = serde_json::from_str(
            r#"{"paymentId": "p-1", "source": "mxA", "destination": "mxB", "asset": "XCP",
                "quantity": 5, "passphrase": "words"}"#,
        )
        .unwrap();
        let request = body.into_request(AccessKey("key".into()));
        assert_eq!(request.payment_id.as_deref(), Some("p-1"));
        assert_eq!(request.passphrase.expose(), "words");
        assert!(request.tag.is_none());
    }

    #[test]
    fn test_defaults() {
        let body: AssetBody =
            serde_json::from_str(r#"{"source": "mxA", "quantity": 100, "passphrase": "words"}"#).unwrap();
        assert!(body.divisible);
        assert!(body.asset.is_none());
        assert_eq!(body.description, "");

        let body: ActivationBody = serde_json::from_str(r#"{"destination": "mxB"}"#).unwrap();
        assert_eq!(body.activation_count, 1);
    }
}
