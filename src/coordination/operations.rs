//! Operation requests and their accepted form.

use crate::blockchain::Passphrase;
use crate::persistence::OperationKind;

/// Longest caller-supplied correlation id accepted.
pub const MAX_CORRELATION_ID_LEN: usize = 64;

/// Transfer `quantity` of `asset` from `source` to `destination`.
#[derive(Debug, Clone)]
pub struct PaymentRequest {
    pub access_key: String,
    pub payment_id: Option<String>,
    pub source: String,
    pub destination: String,
    pub asset: String,
    pub quantity: u64,
    pub passphrase: Passphrase,
    pub tag: Option<String>,
}

/// Issue a new asset. With no `asset` name a numeric one is generated.
#[derive(Debug, Clone)]
pub struct AssetRequest {
    pub access_key: String,
    pub asset_id: Option<String>,
    pub source: String,
    pub asset: Option<String>,
    pub description: String,
    pub quantity: u64,
    pub divisible: bool,
    pub passphrase: Passphrase,
    pub tag: Option<String>,
}

/// Pay `quantity_per_unit` of `dividend_asset` to every holder of `asset`.
#[derive(Debug, Clone)]
pub struct DividendRequest {
    pub access_key: String,
    pub dividend_id: Option<String>,
    pub source: String,
    pub asset: String,
    pub dividend_asset: String,
    pub quantity_per_unit: u64,
    pub passphrase: Passphrase,
    pub tag: Option<String>,
}

/// Fund `destination` from a custodial wallet so it can transact.
#[derive(Debug, Clone)]
pub struct ActivationRequest {
    pub access_key: String,
    pub activation_id: Option<String>,
    pub destination: String,
    pub activation_count: u64,
    pub tag: Option<String>,
}

/// Any request the coordinator accepts.
#[derive(Debug, Clone)]
pub enum OperationRequest {
    Payment(PaymentRequest),
    Asset(AssetRequest),
    Dividend(DividendRequest),
    Activation(ActivationRequest),
}

impl OperationRequest {
    pub fn kind(&self) -> OperationKind {
        match self {
            OperationRequest::Payment(_) => OperationKind::Payment,
            OperationRequest::Asset(_) => OperationKind::Asset,
            OperationRequest::Dividend(_) => OperationKind::Dividend,
            OperationRequest::Activation(_) => OperationKind::Activation,
        }
    }

    pub fn access_key(&self) -> &str {
        match self {
            OperationRequest::Payment(r) => &r.access_key,
            OperationRequest::Asset(r) => &r.access_key,
            OperationRequest::Dividend(r) => &r.access_key,
            OperationRequest::Activation(r) => &r.access_key,
        }
    }

    pub fn correlation_id(&self) -> Option<&str> {
        match self {
            OperationRequest::Payment(r) => r.payment_id.as_deref(),
            OperationRequest::Asset(r) => r.asset_id.as_deref(),
            OperationRequest::Dividend(r) => r.dividend_id.as_deref(),
            OperationRequest::Activation(r) => r.activation_id.as_deref(),
        }
    }
}

/// Which composition the saga performs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComposeStep {
    Send {
        destination: String,
        asset: String,
        quantity: u64,
    },
    Issuance {
        asset: String,
        description: String,
        quantity: u64,
        divisible: bool,
    },
    Dividend {
        asset: String,
        dividend_asset: String,
        quantity_per_unit: u64,
    },
}

/// A request whose record has been durably inserted.
#[derive(Debug, Clone)]
pub struct AcceptedOperation {
    pub kind: OperationKind,
    pub correlation_id: String,
    pub access_key: String,
    pub source: String,
    pub(crate) passphrase: Passphrase,
    pub step: ComposeStep,
}
