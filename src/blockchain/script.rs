//! Locking-script classification and a pay-to-pubkey-hash interpreter.
//!
//! The relay only ever spends P2PKH outputs, so the interpreter evaluates
//! exactly that template:
//!
//! ```text
//! scriptSig:    <sig> <pubkey>
//! scriptPubKey: OP_DUP OP_HASH160 <hash160(pubkey)> OP_EQUALVERIFY OP_CHECKSIG
//! ```
//!
//! Flags that only affect opcodes absent from this template (`NULLDUMMY`,
//! `DISCOURAGE_UPGRADABLE_NOPS`, `P2SH` evaluation) are accepted and have no
//! effect.

use std::ops::BitOr;

use bitcoin::hashes::Hash;
use bitcoin::script::Instruction;
use bitcoin::secp256k1::{ecdsa, All, Message, Secp256k1};
use bitcoin::sighash::{EcdsaSighashType, SighashCache};
use bitcoin::{PublicKey, Script, ScriptBuf, Transaction};
use thiserror::Error;

/// Standard output script templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptClass {
    PubKeyHash,
    ScriptHash,
    PubKey,
    Multisig,
    WitnessPubKeyHash,
    WitnessScriptHash,
    Taproot,
    NullData,
    NonStandard,
}

impl ScriptClass {
    pub fn classify(script: &Script) -> Self {
        if script.is_p2pkh() {
            ScriptClass::PubKeyHash
        } else if script.is_p2sh() {
            ScriptClass::ScriptHash
        } else if script.is_p2pk() {
            ScriptClass::PubKey
        } else if script.is_p2wpkh() {
            ScriptClass::WitnessPubKeyHash
        } else if script.is_p2wsh() {
            ScriptClass::WitnessScriptHash
        } else if script.is_p2tr() {
            ScriptClass::Taproot
        } else if script.is_op_return() {
            ScriptClass::NullData
        } else if is_bare_multisig(script) {
            ScriptClass::Multisig
        } else {
            ScriptClass::NonStandard
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ScriptClass::PubKeyHash => "pubkeyhash",
            ScriptClass::ScriptHash => "scripthash",
            ScriptClass::PubKey => "pubkey",
            ScriptClass::Multisig => "multisig",
            ScriptClass::WitnessPubKeyHash => "witness_v0_keyhash",
            ScriptClass::WitnessScriptHash => "witness_v0_scripthash",
            ScriptClass::Taproot => "witness_v1_taproot",
            ScriptClass::NullData => "nulldata",
            ScriptClass::NonStandard => "nonstandard",
        }
    }
}

// OP_1..OP_16 ... OP_CHECKMULTISIG
fn is_bare_multisig(script: &Script) -> bool {
    let bytes = script.as_bytes();
    matches!(bytes.first(), Some(0x51..=0x60)) && bytes.last() == Some(&0xae)
}

/// Script verification flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifyFlags(u32);

impl VerifyFlags {
    pub const NONE: Self = Self(0);
    pub const P2SH: Self = Self(1 << 0);
    pub const STRICTENC: Self = Self(1 << 1);
    pub const DERSIG: Self = Self(1 << 2);
    pub const LOW_S: Self = Self(1 << 3);
    pub const NULLDUMMY: Self = Self(1 << 4);
    pub const DISCOURAGE_UPGRADABLE_NOPS: Self = Self(1 << 7);

    /// The flag set applied when signing relay transactions.
    pub const STANDARD: Self = Self(
        Self::P2SH.0
            | Self::STRICTENC.0
            | Self::DERSIG.0
            | Self::LOW_S.0
            | Self::NULLDUMMY.0
            | Self::DISCOURAGE_UPGRADABLE_NOPS.0,
    );

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for VerifyFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Why a scriptSig failed to satisfy its locking script.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScriptError {
    #[error("input index {0} out of range")]
    InputIndex(usize),
    #[error("locking script is {0}, not pubkeyhash")]
    NotPubKeyHash(&'static str),
    #[error("unlocking script is not push-only")]
    NotPushOnly,
    #[error("malformed unlocking script: {0}")]
    Malformed(String),
    #[error("non-canonical DER signature")]
    SignatureEncoding,
    #[error("undefined sighash type {0:#04x}")]
    HashType(u32),
    #[error("signature S value is not low")]
    HighS,
    #[error("public key encoding is not strict")]
    PubKeyEncoding,
    #[error("public key does not match the locking script hash")]
    PubKeyMismatch,
    #[error("signature does not verify")]
    BadSignature,
}

/// Evaluate the unlocking script of `tx.input[input]` against `locking`.
pub fn verify_p2pkh_input(
    secp: &Secp256k1<All>,
    tx: &Transaction,
    input: usize,
    locking: &Script,
    flags: VerifyFlags,
) -> Result<(), ScriptError> {
    let txin = tx.input.get(input).ok_or(ScriptError::InputIndex(input))?;

    let class = ScriptClass::classify(locking);
    if class != ScriptClass::PubKeyHash {
        return Err(ScriptError::NotPubKeyHash(class.name()));
    }

    let mut pushes = Vec::with_capacity(2);
    for instruction in txin.script_sig.instructions() {
        match instruction.map_err(|e| ScriptError::Malformed(e.to_string()))? {
            Instruction::PushBytes(bytes) => pushes.push(bytes.as_bytes()),
            Instruction::Op(_) => return Err(ScriptError::NotPushOnly),
        }
    }
    let [sig_bytes, pubkey_bytes] = pushes[..] else {
        return Err(ScriptError::Malformed(format!("expected 2 pushes, found {}", pushes.len())));
    };

    let (signature, hash_type) = parse_signature(sig_bytes, flags)?;
    let pubkey = parse_pubkey(pubkey_bytes, flags)?;

    // OP_DUP OP_HASH160 <hash> OP_EQUALVERIFY
    if ScriptBuf::new_p2pkh(&pubkey.pubkey_hash()).as_script() != locking {
        return Err(ScriptError::PubKeyMismatch);
    }

    // OP_CHECKSIG
    let sighash = SighashCache::new(tx)
        .legacy_signature_hash(input, locking, hash_type)
        .map_err(|_| ScriptError::InputIndex(input))?;
    let message = Message::from_digest(sighash.to_byte_array());

    // libsecp256k1 only verifies low-S signatures
    let mut normalized = signature;
    normalized.normalize_s();
    secp.verify_ecdsa(&message, &normalized, &pubkey.inner)
        .map_err(|_| ScriptError::BadSignature)
}

fn parse_signature(bytes: &[u8], flags: VerifyFlags) -> Result<(ecdsa::Signature, u32), ScriptError> {
    let (hash_byte, der) = bytes.split_last().ok_or(ScriptError::BadSignature)?;
    let hash_type = u32::from(*hash_byte);

    let strict_der = flags.contains(VerifyFlags::DERSIG)
        || flags.contains(VerifyFlags::STRICTENC)
        || flags.contains(VerifyFlags::LOW_S);
    let signature = if strict_der {
        ecdsa::Signature::from_der(der).map_err(|_| ScriptError::SignatureEncoding)?
    } else {
        ecdsa::Signature::from_der_lax(der).map_err(|_| ScriptError::SignatureEncoding)?
    };

    if flags.contains(VerifyFlags::STRICTENC) && EcdsaSighashType::from_standard(hash_type).is_err() {
        return Err(ScriptError::HashType(hash_type));
    }

    if flags.contains(VerifyFlags::LOW_S) {
        let mut normalized = signature;
        normalized.normalize_s();
        if normalized != signature {
            return Err(ScriptError::HighS);
        }
    }

    Ok((signature, hash_type))
}

fn parse_pubkey(bytes: &[u8], flags: VerifyFlags) -> Result<PublicKey, ScriptError> {
    if flags.contains(VerifyFlags::STRICTENC) {
        let canonical = match bytes.first() {
            Some(0x02) | Some(0x03) => bytes.len() == 33,
            Some(0x04) => bytes.len() == 65,
            _ => false,
        };
        if !canonical {
            return Err(ScriptError::PubKeyEncoding);
        }
    }
    PublicKey::from_slice(bytes).map_err(|_| ScriptError::PubKeyEncoding)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::absolute::LockTime;
    use bitcoin::script::{Builder, PushBytesBuf};
    use bitcoin::transaction::Version;
    use bitcoin::{Amount, OutPoint, PrivateKey, Sequence, TxIn, TxOut, Txid, Witness};

    fn keypair(byte: u8) -> (PrivateKey, PublicKey) {
        let secp = Secp256k1::new();
        let secret = bitcoin::secp256k1::SecretKey::from_slice(&[byte; 32]).unwrap();
        let private = PrivateKey::new(secret, bitcoin::Network::Testnet);
        (private, private.public_key(&secp))
    }

    fn spending_tx(locking: &Script) -> Transaction {
        Transaction {
            version: Version::ONE,
            lock_time: LockTime::ZERO,
            input: vec![TxIn {
                previous_output: OutPoint {
                    txid: Txid::from_byte_array([3u8; 32]),
                    vout: 0,
                },
                script_sig: ScriptBuf::new(),
                sequence: Sequence::MAX,
                witness: Witness::default(),
            }],
            output: vec![TxOut {
                value: Amount::from_sat(5_430),
                script_pubkey: locking.to_owned(),
            }],
        }
    }

    fn sign(tx: &mut Transaction, private: &PrivateKey, public: &PublicKey, locking: &Script, hash_type: u8) {
        let secp = Secp256k1::new();
        let sighash = SighashCache::new(&*tx)
            .legacy_signature_hash(0, locking, u32::from(hash_type))
            .unwrap();
        let sig = secp.sign_ecdsa(&Message::from_digest(sighash.to_byte_array()), &private.inner);
        let mut bytes = sig.serialize_der().to_vec();
        bytes.push(hash_type);
        tx.input[0].script_sig = Builder::new()
            .push_slice(PushBytesBuf::try_from(bytes).unwrap())
            .push_key(public)
            .into_script();
    }

    #[test]
    fn test_classify() {
        let (_, public) = keypair(1);
        let p2pkh = ScriptBuf::new_p2pkh(&public.pubkey_hash());
        assert_eq!(ScriptClass::classify(&p2pkh), ScriptClass::PubKeyHash);

        let p2sh = ScriptBuf::new_p2sh(&bitcoin::ScriptHash::from_byte_array([9u8; 20]));
        assert_eq!(ScriptClass::classify(&p2sh), ScriptClass::ScriptHash);

        let multisig = Builder::new()
            .push_opcode(bitcoin::opcodes::all::OP_PUSHNUM_1)
            .push_key(&public)
            .push_opcode(bitcoin::opcodes::all::OP_PUSHNUM_1)
            .push_opcode(bitcoin::opcodes::all::OP_CHECKMULTISIG)
            .into_script();
        assert_eq!(ScriptClass::classify(&multisig), ScriptClass::Multisig);
        assert_eq!(ScriptClass::classify(&ScriptBuf::new()), ScriptClass::NonStandard);
    }

    #[test]
    fn test_valid_signature_verifies() {
        let (private, public) = keypair(1);
        let locking = ScriptBuf::new_p2pkh(&public.pubkey_hash());
        let mut tx = spending_tx(&locking);
        sign(&mut tx, &private, &public, &locking, 0x01);

        let secp = Secp256k1::new();
        assert_eq!(verify_p2pkh_input(&secp, &tx, 0, &locking, VerifyFlags::STANDARD), Ok(()));
    }

    #[test]
    fn test_wrong_key_is_rejected() {
        let (private, public) = keypair(1);
        let (_, other) = keypair(2);
        let locking = ScriptBuf::new_p2pkh(&other.pubkey_hash());
        let mut tx = spending_tx(&locking);
        sign(&mut tx, &private, &public, &locking, 0x01);

        let secp = Secp256k1::new();
        assert_eq!(
            verify_p2pkh_input(&secp, &tx, 0, &locking, VerifyFlags::STANDARD),
            Err(ScriptError::PubKeyMismatch)
        );
    }

    #[test]
    fn test_tampered_output_breaks_signature() {
        let (private, public) = keypair(1);
        let locking = ScriptBuf::new_p2pkh(&public.pubkey_hash());
        let mut tx = spending_tx(&locking);
        sign(&mut tx, &private, &public, &locking, 0x01);
        tx.output[0].value = Amount::from_sat(1);

        let secp = Secp256k1::new();
        assert_eq!(
            verify_p2pkh_input(&secp, &tx, 0, &locking, VerifyFlags::STANDARD),
            Err(ScriptError::BadSignature)
        );
    }

    #[test]
    fn test_undefined_hash_type_needs_strictenc() {
        let (private, public) = keypair(1);
        let locking = ScriptBuf::new_p2pkh(&public.pubkey_hash());
        let mut tx = spending_tx(&locking);
        sign(&mut tx, &private, &public, &locking, 0x05);

        let secp = Secp256k1::new();
        assert_eq!(
            verify_p2pkh_input(&secp, &tx, 0, &locking, VerifyFlags::STANDARD),
            Err(ScriptError::HashType(0x05))
        );
        assert_eq!(verify_p2pkh_input(&secp, &tx, 0, &locking, VerifyFlags::DERSIG), Ok(()));
    }

    #[test]
    fn test_non_p2pkh_locking_script() {
        let (_, public) = keypair(1);
        let locking = ScriptBuf::new_p2sh(&bitcoin::ScriptHash::from_byte_array([9u8; 20]));
        let tx = spending_tx(&ScriptBuf::new_p2pkh(&public.pubkey_hash()));

        let secp = Secp256k1::new();
        assert_eq!(
            verify_p2pkh_input(&secp, &tx, 0, &locking, VerifyFlags::STANDARD),
            Err(ScriptError::NotPubKeyHash("scripthash"))
        );
    }

    #[test]
    fn test_flags() {
        assert!(VerifyFlags::STANDARD.contains(VerifyFlags::P2SH | VerifyFlags::LOW_S));
        assert!(!VerifyFlags::DERSIG.contains(VerifyFlags::STRICTENC));
        assert!(VerifyFlags::NONE.contains(VerifyFlags::NONE));
    }
}
