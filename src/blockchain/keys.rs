//! Hierarchical key derivation from mnemonic passphrases.
//!
//! # Derivation
//! ```text
//! 12-word mnemonic ──(BIP-39 word list)──→ 128-bit entropy = seed
//! seed → master → account (hardened 0) → external chain (0) → leaf i
//! ```
//!
//! # Security
//! - Passphrases are zeroized on drop and never printed
//! - Private keys are redacted from `Debug` output
//! - Pure functions of their inputs; safe to call from any thread

use bitcoin::bip32::{ChildNumber, Xpriv};
use bitcoin::secp256k1::{All, Secp256k1};
use bitcoin::{Address, Network, PrivateKey, PublicKey};
use bip39::{Language, Mnemonic};
use zeroize::Zeroizing;

use crate::blockchain::types::{KeyError, KeyResult};

/// Number of leaf indices searched when recovering a key for an address.
pub const ADDRESS_SEARCH_RANGE: u32 = 20;

/// Word count of a 128-bit mnemonic.
pub const MNEMONIC_WORDS: usize = 12;

/// A caller-supplied mnemonic passphrase.
#[derive(Clone)]
pub struct Passphrase(Zeroizing<String>);

impl Passphrase {
    pub fn new(words: impl Into<String>) -> Self {
        Self(Zeroizing::new(words.into()))
    }

    pub fn expose(&self) -> &str {
        self.0.as_str()
    }
}

impl From<String> for Passphrase {
    fn from(words: String) -> Self {
        Self::new(words)
    }
}

impl std::fmt::Debug for Passphrase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Passphrase([redacted])")
    }
}

/// A signing keypair for one address.
#[derive(Clone)]
pub struct KeyPair {
    pub public_key: PublicKey,
    pub private_key: PrivateKey,
}

impl KeyPair {
    /// Hex encoding of the compressed public key, as the ledger RPC expects it.
    pub fn public_key_hex(&self) -> String {
        self.public_key.to_string()
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key.to_string())
            .field("private_key", &"[redacted]")
            .finish()
    }
}

/// One leaf of the derived wallet.
#[derive(Debug, Clone)]
pub struct DerivedKey {
    pub index: u32,
    pub address: String,
    pub keys: KeyPair,
}

/// Result of deriving a wallet from a passphrase.
#[derive(Clone)]
pub struct DerivedWallet {
    pub seed_hex: Zeroizing<String>,
    pub keys: Vec<DerivedKey>,
}

impl DerivedWallet {
    /// Addresses in index order.
    pub fn addresses(&self) -> Vec<&str> {
        self.keys.iter().map(|k| k.address.as_str()).collect()
    }
}

impl std::fmt::Debug for DerivedWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedWallet")
            .field("seed_hex", &"[redacted]")
            .field("keys", &self.keys)
            .finish()
    }
}

/// Derives hierarchical keys for one network.
pub struct KeyDeriver {
    network: Network,
    secp: Secp256k1<All>,
}

impl KeyDeriver {
    pub fn new(network: Network) -> Self {
        Self {
            network,
            secp: Secp256k1::new(),
        }
    }

    pub fn network(&self) -> Network {
        self.network
    }

    /// Convert a mnemonic into its hex seed.
    pub fn seed_from_mnemonic(passphrase: &Passphrase) -> KeyResult<Zeroizing<Vec<u8>>> {
        let normalized = passphrase
            .expose()
            .split_whitespace()
            .map(str::to_lowercase)
            .collect::<Vec<_>>()
            .join(" ");
        let normalized = Zeroizing::new(normalized);

        let word_count = normalized.split(' ').filter(|w| !w.is_empty()).count();
        if word_count != MNEMONIC_WORDS {
            return Err(KeyError::InvalidMnemonic(format!(
                "expected {} words, got {}",
                MNEMONIC_WORDS, word_count
            )));
        }

        let mnemonic = Mnemonic::parse_in_normalized(Language::English, &normalized)
            .map_err(|e| KeyError::InvalidMnemonic(e.to_string()))?;
        Ok(Zeroizing::new(mnemonic.to_entropy()))
    }

    /// Derive the first `count` leaf keys of the wallet behind `passphrase`.
    pub fn derive_wallet(&self, passphrase: &Passphrase, count: u32) -> KeyResult<DerivedWallet> {
        let seed = Self::seed_from_mnemonic(passphrase)?;
        let chain = self.external_chain(&seed)?;

        let keys = (0..count)
            .map(|index| self.derive_leaf(&chain, index))
            .collect::<KeyResult<Vec<_>>>()?;

        Ok(DerivedWallet {
            seed_hex: Zeroizing::new(hex::encode(seed.as_slice())),
            keys,
        })
    }

    /// Find the keypair controlling `address` among the first
    /// [`ADDRESS_SEARCH_RANGE`] leaves.
    ///
    /// `KeyNotFound` means "not owned within the supported range", not a
    /// definitive negative.
    pub fn resolve_key_for_address(&self, passphrase: &Passphrase, address: &str) -> KeyResult<KeyPair> {
        let seed = Self::seed_from_mnemonic(passphrase)?;
        let chain = self.external_chain(&seed)?;

        for index in 0..ADDRESS_SEARCH_RANGE {
            let leaf = self.derive_leaf(&chain, index)?;
            if leaf.address == address {
                return Ok(leaf.keys);
            }
        }

        Err(KeyError::KeyNotFound {
            address: address.to_string(),
            searched: ADDRESS_SEARCH_RANGE,
        })
    }

    /// master → account' → chain
    fn external_chain(&self, seed: &[u8]) -> KeyResult<Xpriv> {
        let master = Xpriv::new_master(self.network, seed)
            .map_err(|e| KeyError::Derivation(format!("master key: {}", e)))?;

        let account = ChildNumber::from_hardened_idx(0)
            .map_err(|e| KeyError::Derivation(e.to_string()))?;
        let chain = ChildNumber::from_normal_idx(0).map_err(|e| KeyError::Derivation(e.to_string()))?;

        master
            .derive_priv(&self.secp, &[account, chain])
            .map_err(|e| KeyError::Derivation(format!("account/chain: {}", e)))
    }

    fn derive_leaf(&self, chain: &Xpriv, index: u32) -> KeyResult<DerivedKey> {
        let child = ChildNumber::from_normal_idx(index)
            .map_err(|e| KeyError::Derivation(format!("leaf {}: {}", index, e)))?;
        let leaf = chain
            .derive_priv(&self.secp, &[child])
            .map_err(|e| KeyError::Derivation(format!("leaf {}: {}", index, e)))?;

        let private_key = leaf.to_priv();
        let public_key = private_key.public_key(&self.secp);
        let address = Address::p2pkh(public_key.pubkey_hash(), self.network).to_string();

        Ok(DerivedKey {
            index,
            address,
            keys: KeyPair {
                public_key,
                private_key,
            },
        })
    }
}

impl std::fmt::Debug for KeyDeriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyDeriver").field("network", &self.network).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub const TEST_MNEMONIC: &str =
        "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";
    const OTHER_MNEMONIC: &str = "legal winner thank year wave sausage worth useful legal winner thank yellow";

    fn deriver() -> KeyDeriver {
        KeyDeriver::new(Network::Testnet)
    }

    #[test]
    fn test_seed_is_word_list_entropy() {
        let seed = KeyDeriver::seed_from_mnemonic(&Passphrase::new(TEST_MNEMONIC)).unwrap();
        assert_eq!(seed.as_slice(), &[0u8; 16]);

        let seed = KeyDeriver::seed_from_mnemonic(&Passphrase::new(OTHER_MNEMONIC)).unwrap();
        assert_eq!(hex::encode(seed.as_slice()), "7f7f7f7f7f7f7f7f7f7f7f7f7f7f7f7f");
    }

    #[test]
    fn test_derivation_is_deterministic() {
        let first = deriver().derive_wallet(&Passphrase::new(TEST_MNEMONIC), 20).unwrap();
        let second = deriver().derive_wallet(&Passphrase::new(TEST_MNEMONIC), 20).unwrap();

        assert_eq!(first.keys.len(), 20);
        assert_eq!(first.addresses(), second.addresses());
        assert_eq!(first.seed_hex.as_str(), "00000000000000000000000000000000");

        // Testnet P2PKH addresses start with m or n
        for key in &first.keys {
            assert!(key.address.starts_with('m') || key.address.starts_with('n'));
            assert!(key.keys.public_key.compressed);
        }
    }

    #[test]
    fn test_addresses_are_distinct() {
        let wallet = deriver().derive_wallet(&Passphrase::new(TEST_MNEMONIC), 20).unwrap();
        let mut addresses = wallet.addresses();
        addresses.sort();
        addresses.dedup();
        assert_eq!(addresses.len(), 20);
    }

    #[test]
    fn test_resolve_round_trip() {
        let passphrase = Passphrase::new(TEST_MNEMONIC);
        let wallet = deriver().derive_wallet(&passphrase, 20).unwrap();

        for key in &wallet.keys {
            let resolved = deriver().resolve_key_for_address(&passphrase, &key.address).unwrap();
            assert_eq!(resolved.public_key, key.keys.public_key);
            assert_eq!(resolved.private_key, key.keys.private_key);
        }
    }

    #[test]
    fn test_resolution_is_bounded() {
        let passphrase = Passphrase::new(TEST_MNEMONIC);
        let wallet = deriver().derive_wallet(&passphrase, 25).unwrap();

        // Index 20 is derivable but outside the search range
        let result = deriver().resolve_key_for_address(&passphrase, &wallet.keys[20].address);
        assert!(matches!(result, Err(KeyError::KeyNotFound { searched: 20, .. })));
    }

    #[test]
    fn test_foreign_address_not_found() {
        let other = deriver().derive_wallet(&Passphrase::new(OTHER_MNEMONIC), 1).unwrap();
        let result = deriver().resolve_key_for_address(&Passphrase::new(TEST_MNEMONIC), &other.keys[0].address);
        assert!(matches!(result, Err(KeyError::KeyNotFound { .. })));
    }

    #[test]
    fn test_invalid_mnemonic() {
        let result = deriver().derive_wallet(&Passphrase::new("not a real mnemonic"), 1);
        assert!(matches!(result, Err(KeyError::InvalidMnemonic(_))));

        // Twelve words but a bad checksum
        let bad_checksum =
            "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon";
        let result = deriver().derive_wallet(&Passphrase::new(bad_checksum), 1);
        assert!(matches!(result, Err(KeyError::InvalidMnemonic(_))));
    }

    #[test]
    fn test_whitespace_and_case_are_normalized() {
        let messy = format!("  {}  ", TEST_MNEMONIC.to_uppercase().replace(' ', "   "));
        let a = deriver().derive_wallet(&Passphrase::new(messy), 3).unwrap();
        let b = deriver().derive_wallet(&Passphrase::new(TEST_MNEMONIC), 3).unwrap();
        assert_eq!(a.addresses(), b.addresses());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let passphrase = Passphrase::new(TEST_MNEMONIC);
        assert!(!format!("{:?}", passphrase).contains("abandon"));

        let wallet = deriver().derive_wallet(&passphrase, 1).unwrap();
        let rendered = format!("{:?}", wallet);
        assert!(rendered.contains("[redacted]"));
        assert!(!rendered.contains(&wallet.keys[0].keys.private_key.to_wif()));
    }
}
