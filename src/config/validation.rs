//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check endpoint URLs and network names
//! - Validate value ranges (timeouts > 0, pool indices in range)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RelayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::str::FromStr;

use bitcoin::Network;
use thiserror::Error;

use crate::config::schema::{RelayConfig, StorageBackend, WalletSelection};

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &RelayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<std::net::SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }
    if config.listener.request_timeout_secs == 0 {
        errors.push(ValidationError::new("listener.request_timeout_secs", "must be > 0"));
    }

    if Network::from_str(&config.bitcoin.network).is_err() {
        errors.push(ValidationError::new(
            "bitcoin.network",
            format!("unknown network '{}'", config.bitcoin.network),
        ));
    }
    check_url(&mut errors, "bitcoin.rpc_url", &config.bitcoin.rpc_url);
    check_url(&mut errors, "ledger.rpc_url", &config.ledger.rpc_url);
    if config.bitcoin.rpc_timeout_secs == 0 {
        errors.push(ValidationError::new("bitcoin.rpc_timeout_secs", "must be > 0"));
    }
    if config.ledger.rpc_timeout_secs == 0 {
        errors.push(ValidationError::new("ledger.rpc_timeout_secs", "must be > 0"));
    }
    if !config.environment.skips_broadcast() && config.bitcoin.rpc_password.is_empty() {
        errors.push(ValidationError::new(
            "bitcoin.rpc_password",
            "required in production (or set RELAY_BITCOIN_RPC_PASSWORD)",
        ));
    }

    if config.coordinator.step_timeout_secs == 0 {
        errors.push(ValidationError::new("coordinator.step_timeout_secs", "must be > 0"));
    }
    if config.coordinator.max_in_flight == 0 {
        errors.push(ValidationError::new("coordinator.max_in_flight", "must be > 0"));
    }

    let wallets = &config.activation.wallets;
    if config.activation.selection == WalletSelection::Fixed
        && !wallets.is_empty()
        && config.activation.fixed_index >= wallets.len()
    {
        errors.push(ValidationError::new(
            "activation.fixed_index",
            format!("index {} out of range for {} wallets", config.activation.fixed_index, wallets.len()),
        ));
    }
    for (i, wallet) in wallets.iter().enumerate() {
        if wallet.address.trim().is_empty() {
            errors.push(ValidationError::new(&format!("activation.wallets[{}].address", i), "must not be empty"));
        }
        if wallet.passphrase_env.trim().is_empty() {
            errors.push(ValidationError::new(
                &format!("activation.wallets[{}].passphrase_env", i),
                "must name an environment variable",
            ));
        }
    }

    if config.persistence.backend == StorageBackend::Sqlite && config.persistence.sqlite_path.is_empty() {
        errors.push(ValidationError::new("persistence.sqlite_path", "must not be empty"));
    }

    if config.retries.enabled && config.retries.max_attempts == 0 {
        errors.push(ValidationError::new("retries.max_attempts", "must be >= 1"));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<std::net::SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_url(errors: &mut Vec<ValidationError>, field: &str, value: &str) {
    match url::Url::parse(value) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
        Ok(url) => errors.push(ValidationError::new(field, format!("unsupported scheme '{}'", url.scheme()))),
        Err(e) => errors.push(ValidationError::new(field, format!("invalid URL '{}': {}", value, e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{CustodialWalletConfig, Environment};

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&RelayConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_every_error() {
        let mut config = RelayConfig::default();
        config.bitcoin.network = "dogecoin".to_string();
        config.ledger.rpc_url = "not a url".to_string();
        config.coordinator.max_in_flight = 0;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors.iter().any(|e| e.field == "bitcoin.network"));
        assert!(errors.iter().any(|e| e.field == "ledger.rpc_url"));
    }

    #[test]
    fn test_production_requires_node_password() {
        let mut config = RelayConfig::default();
        config.environment = Environment::Production;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "bitcoin.rpc_password");

        config.bitcoin.rpc_password = "secret".to_string();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_fixed_index_out_of_range() {
        let mut config = RelayConfig::default();
        config.activation.selection = WalletSelection::Fixed;
        config.activation.fixed_index = 2;
        config.activation.wallets.push(CustodialWalletConfig {
            address: "mfWxJ45yp2SFn7UciZyNpvDKrzbhyfKrY8".to_string(),
            passphrase_env: "RELAY_WALLET_0".to_string(),
        });
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "activation.fixed_index");
    }
}
