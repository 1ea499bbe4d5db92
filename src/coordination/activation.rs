//! Address activation from a pool of custodial wallets.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::blockchain::Passphrase;
use crate::config::{ActivationConfig, WalletSelection};
use crate::coordination::error::OperationError;

/// Smallest non-dust output, in satoshis.
pub const DUST_SIZE: u64 = 5_430;

/// Minimum relay fee per transaction, in satoshis.
pub const MIN_FEE: u64 = 10_000;

/// Upper bound on transactions one activation pre-funds.
pub const MAX_ACTIVATION_COUNT: u64 = 10;

/// Asset transferred by an activation.
pub const ACTIVATION_ASSET: &str = "BTC";

/// Satoshis needed to fund `count` future transactions.
pub fn activation_quantity(count: u64) -> Result<u64, OperationError> {
    if count == 0 || count > MAX_ACTIVATION_COUNT {
        return Err(OperationError::InvalidRequest(format!(
            "activation count must be between 1 and {}",
            MAX_ACTIVATION_COUNT
        )));
    }
    Ok((DUST_SIZE + MIN_FEE) * count)
}

/// A wallet the service controls.
#[derive(Debug, Clone)]
pub struct CustodialWallet {
    pub address: String,
    pub passphrase: Passphrase,
}

/// Supplies the funding wallet for each activation.
pub trait WalletPool: Send + Sync {
    fn next_wallet(&self) -> Result<CustodialWallet, OperationError>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Fixed list of wallets, chosen round-robin or by a fixed index.
#[derive(Debug)]
pub struct StaticWalletPool {
    wallets: Vec<CustodialWallet>,
    selection: WalletSelection,
    fixed_index: usize,
    cursor: AtomicUsize,
}

impl StaticWalletPool {
    pub fn new(wallets: Vec<CustodialWallet>, selection: WalletSelection, fixed_index: usize) -> Self {
        Self {
            wallets,
            selection,
            fixed_index,
            cursor: AtomicUsize::new(0),
        }
    }

    /// Build the pool from config, reading each passphrase from the
    /// environment variable the wallet entry names.
    pub fn from_config(config: &ActivationConfig) -> Result<Self, OperationError> {
        Self::from_config_with(config, |name| std::env::var(name).ok())
    }

    pub fn from_config_with<F>(config: &ActivationConfig, lookup: F) -> Result<Self, OperationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let wallets = config
            .wallets
            .iter()
            .map(|wallet| {
                let words = lookup(&wallet.passphrase_env).ok_or_else(|| {
                    OperationError::NoCustodialWallet(format!(
                        "{} is not set for wallet {}",
                        wallet.passphrase_env, wallet.address
                    ))
                })?;
                Ok(CustodialWallet {
                    address: wallet.address.clone(),
                    passphrase: Passphrase::new(words),
                })
            })
            .collect::<Result<Vec<_>, OperationError>>()?;

        Ok(Self::new(wallets, config.selection, config.fixed_index))
    }
}

impl WalletPool for StaticWalletPool {
    fn next_wallet(&self) -> Result<CustodialWallet, OperationError> {
        if self.wallets.is_empty() {
            return Err(OperationError::NoCustodialWallet("no wallets configured".to_string()));
        }

        let index = match self.selection {
            WalletSelection::RoundRobin => self.cursor.fetch_add(1, Ordering::Relaxed) % self.wallets.len(),
            WalletSelection::Fixed => self.fixed_index,
        };
        self.wallets
            .get(index)
            .cloned()
            .ok_or_else(|| OperationError::NoCustodialWallet(format!("wallet index {} out of range", index)))
    }

    fn len(&self) -> usize {
        self.wallets.len()
    }
}
