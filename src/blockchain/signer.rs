//! Local signing of ledger-composed transactions.
//!
//! # Flow
//! ```text
//! unsigned hex → decode → classify every input's locking script (P2PKH only)
//!     → resolve a key per funding address (KeyDeriver, bounded search)
//!     → SIGHASH_ALL signature + <sig> <pubkey> unlocking script per input
//!     → re-verify with the P2PKH interpreter → signed hex
//! ```
//!
//! The ledger RPC returns unsigned transactions with each input's locking
//! script placed in its `scriptSig` slot; that is the script signed against.

use std::collections::HashMap;
use std::sync::Arc;

use bitcoin::consensus::encode;
use bitcoin::hashes::Hash;
use bitcoin::script::{Builder, PushBytesBuf};
use bitcoin::secp256k1::{All, Message, Secp256k1};
use bitcoin::sighash::{EcdsaSighashType, SighashCache};
use bitcoin::{Address, ScriptBuf, Transaction};

use crate::blockchain::keys::{KeyDeriver, KeyPair, Passphrase};
use crate::blockchain::script::{verify_p2pkh_input, ScriptClass, VerifyFlags};
use crate::blockchain::types::{KeyError, KeyResult, SignError, SignResult};
use crate::config::SelfCheckMode;

/// Decode a hex-encoded wire transaction.
pub fn decode_transaction(tx_hex: &str) -> Result<Transaction, String> {
    let bytes = hex::decode(tx_hex.trim()).map_err(|e| format!("invalid hex: {}", e))?;
    encode::deserialize::<Transaction>(&bytes).map_err(|e| format!("invalid transaction: {}", e))
}

/// Encode a transaction as wire-format hex.
pub fn encode_transaction(tx: &Transaction) -> String {
    hex::encode(encode::serialize(tx))
}

/// Signs P2PKH inputs with keys recovered from a passphrase.
pub struct TransactionSigner {
    deriver: Arc<KeyDeriver>,
    secp: Secp256k1<All>,
    flags: VerifyFlags,
    self_check: SelfCheckMode,
}

impl TransactionSigner {
    pub fn new(deriver: Arc<KeyDeriver>, self_check: SelfCheckMode) -> Self {
        Self {
            deriver,
            secp: Secp256k1::new(),
            flags: VerifyFlags::STANDARD,
            self_check,
        }
    }

    /// Sign `unsigned_hex` with keys derived from `passphrase`.
    pub fn sign(&self, unsigned_hex: &str, passphrase: &Passphrase) -> SignResult<String> {
        let tx = decode_transaction(unsigned_hex).map_err(SignError::Decode)?;

        let mut resolved: HashMap<String, Option<KeyPair>> = HashMap::new();
        let signed = self.sign_with(tx, |address| {
            if let Some(cached) = resolved.get(address) {
                return Ok(cached.clone());
            }
            let found = match self.deriver.resolve_key_for_address(passphrase, address) {
                Ok(keys) => Some(keys),
                Err(KeyError::KeyNotFound { .. }) => None,
                Err(e) => return Err(e),
            };
            resolved.insert(address.to_string(), found.clone());
            Ok(found)
        })?;

        Ok(encode_transaction(&signed))
    }

    /// Sign every input of `tx`, asking `lookup` for the key of each funding
    /// address. `Ok(None)` from the lookup means the key is unavailable.
    pub fn sign_with<F>(&self, mut tx: Transaction, mut lookup: F) -> SignResult<Transaction>
    where
        F: FnMut(&str) -> KeyResult<Option<KeyPair>>,
    {
        if tx.input.is_empty() {
            return Err(SignError::Decode("transaction has no inputs".to_string()));
        }

        let locking: Vec<ScriptBuf> = tx.input.iter().map(|txin| txin.script_sig.clone()).collect();
        for (input, script) in locking.iter().enumerate() {
            let class = ScriptClass::classify(script);
            if class != ScriptClass::PubKeyHash {
                return Err(SignError::UnsupportedScriptType {
                    input,
                    class: class.name(),
                });
            }
        }

        let mut unlocking = Vec::with_capacity(locking.len());
        {
            let cache = SighashCache::new(&tx);
            for (input, script) in locking.iter().enumerate() {
                let address = Address::from_script(script, self.deriver.network())
                    .map_err(|e| SignError::SignatureConstruction {
                        input,
                        reason: format!("cannot derive address: {}", e),
                    })?
                    .to_string();

                let keys = lookup(&address)?.ok_or_else(|| SignError::KeyNotFound {
                    input,
                    address: address.clone(),
                })?;

                let sighash = cache
                    .legacy_signature_hash(input, script, EcdsaSighashType::All.to_u32())
                    .map_err(|e| SignError::SignatureConstruction {
                        input,
                        reason: e.to_string(),
                    })?;
                let message = Message::from_digest(sighash.to_byte_array());
                let signature = bitcoin::ecdsa::Signature {
                    signature: self.secp.sign_ecdsa(&message, &keys.private_key.inner),
                    sighash_type: EcdsaSighashType::All,
                };

                let sig_push = PushBytesBuf::try_from(signature.to_vec()).map_err(|e| {
                    SignError::SignatureConstruction {
                        input,
                        reason: e.to_string(),
                    }
                })?;
                unlocking.push(
                    Builder::new()
                        .push_slice(sig_push)
                        .push_key(&keys.public_key)
                        .into_script(),
                );
            }
        }

        for (txin, script_sig) in tx.input.iter_mut().zip(unlocking) {
            txin.script_sig = script_sig;
        }

        let checked = match self.self_check {
            SelfCheckMode::AllInputs => locking.len(),
            SelfCheckMode::FirstInput => 1,
        };
        for (input, script) in locking.iter().enumerate().take(checked) {
            verify_p2pkh_input(&self.secp, &tx, input, script, self.flags).map_err(|e| {
                SignError::ScriptVerification {
                    input,
                    reason: e.to_string(),
                }
            })?;
        }

        tracing::debug!(
            txid = %tx.compute_txid(),
            inputs = tx.input.len(),
            verified = checked,
            "Transaction signed"
        );
        Ok(tx)
    }
}

impl std::fmt::Debug for TransactionSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionSigner")
            .field("network", &self.deriver.network())
            .field("self_check", &self.self_check)
            .finish()
    }
}
