use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::constants::VERSION;
use crate::crypto::{verify_signature, KeyPair, PublicKey, Signature};
use crate::error::{LedgerError, Result};
use crate::hash::random_hash;

pub type Amount = f64;

/// Reference to an output of an earlier transaction. Carried on the wire but
/// not yet interpreted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInput {
    pub hash: String,
    pub n: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Transaction {
    pub version: String,
    pub hash: String,
    pub outputs: BTreeMap<String, Amount>,
    pub inputs: Vec<TxInput>,
    public_key: Option<PublicKey>,
    signature: Option<Signature>,
}

/// Wire form of a [`Transaction`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransactionDoc {
    pub version: String,
    pub hash: String,
    #[serde(default)]
    pub outputs: BTreeMap<String, Amount>,
    #[serde(default)]
    pub inputs: Vec<TxInput>,
}

impl Transaction {
    /// Creates an unsigned transaction with a fresh hash. Amounts must be
    /// finite and non-negative.
    pub fn new<I, A>(outputs: I) -> Self
    where
        I: IntoIterator<Item = (A, Amount)>,
        A: Into<String>,
    {
        Self::with_inputs(outputs, Vec::new())
    }

    pub fn with_inputs<I, A>(outputs: I, inputs: Vec<TxInput>) -> Self
    where
        I: IntoIterator<Item = (A, Amount)>,
        A: Into<String>,
    {
        let outputs: BTreeMap<String, Amount> =
            outputs.into_iter().map(|(a, v)| (a.into(), v)).collect();
        debug_assert!(outputs.values().all(|v| v.is_finite() && *v >= 0.0));
        Self {
            version: VERSION.to_string(),
            hash: random_hash(),
            outputs,
            inputs,
            public_key: None,
            signature: None,
        }
    }

    /// Signs the hash with `keys`, replacing any earlier signature.
    pub fn sign(&mut self, keys: &KeyPair) {
        let message = signing_message(&self.hash);
        self.signature = Some(keys.sign(&message));
        self.public_key = Some(keys.public_key());
    }

    /// False when unsigned; never an error.
    pub fn verify(&self) -> bool {
        match (&self.public_key, &self.signature) {
            (Some(key), Some(sig)) => verify_signature(&signing_message(&self.hash), sig, key),
            _ => false,
        }
    }

    pub fn public_key(&self) -> Option<&PublicKey> {
        self.public_key.as_ref()
    }

    pub fn signature(&self) -> Option<&Signature> {
        self.signature.as_ref()
    }

    pub fn value_for_address(&self, address: &str) -> Amount {
        self.outputs.get(address).copied().unwrap_or(0.0)
    }

    pub fn to_wire(&self) -> TransactionDoc {
        TransactionDoc {
            version: self.version.clone(),
            hash: self.hash.clone(),
            outputs: self.outputs.clone(),
            inputs: self.inputs.clone(),
        }
    }

    pub fn from_wire(doc: TransactionDoc) -> Result<Self> {
        if let Some((address, amount)) = doc
            .outputs
            .iter()
            .find(|(_, v)| !v.is_finite() || **v < 0.0)
        {
            return Err(LedgerError::InvalidAmount {
                address: address.clone(),
                amount: *amount,
            });
        }
        Ok(Self {
            version: doc.version,
            hash: doc.hash,
            outputs: doc.outputs,
            inputs: doc.inputs,
            public_key: None,
            signature: None,
        })
    }
}

/// The hash read as a big-endian number; identifiers that are not hex are
/// signed as raw bytes.
fn signing_message(hash: &str) -> Vec<u8> {
    hex::decode(hash).unwrap_or_else(|_| hash.as_bytes().to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_transaction_has_fresh_hash() {
        let a = Transaction::new([("alice", 1.0)]);
        let b = Transaction::new([("alice", 1.0)]);
        assert_ne!(a.hash, b.hash);
        assert_eq!(a.version, VERSION);
        assert!(a.inputs.is_empty());
    }

    #[test]
    fn value_for_address_example() {
        let tx = Transaction::new([("alice", 20.5), ("bob", 3.0)]);
        assert_eq!(tx.value_for_address("alice"), 20.5);
        assert_eq!(tx.value_for_address("bob"), 3.0);
        assert_eq!(tx.value_for_address("carol"), 0.0);
    }

    #[test]
    fn unsigned_transaction_does_not_verify() {
        let tx = Transaction::new([("alice", 1.0)]);
        assert!(tx.public_key().is_none());
        assert!(!tx.verify());
    }

    #[test]
    fn signed_transaction_verifies() {
        let keys = KeyPair::generate();
        let mut tx = Transaction::new([("alice", 1.0)]);
        tx.sign(&keys);
        assert!(tx.verify());
        assert_eq!(tx.public_key(), Some(&keys.public_key()));
    }

    #[test]
    fn resigning_overwrites_signature() {
        let first = KeyPair::generate();
        let second = KeyPair::generate();
        let mut tx = Transaction::new([("alice", 1.0)]);
        tx.sign(&first);
        tx.sign(&second);
        assert!(tx.verify());
        assert_eq!(tx.public_key(), Some(&second.public_key()));
    }

    #[test]
    fn tampered_hash_fails_verification() {
        let keys = KeyPair::generate();
        let mut tx = Transaction::new([("alice", 1.0)]);
        tx.sign(&keys);
        tx.hash = crate::hash::random_hash();
        assert!(!tx.verify());
    }

    #[test]
    fn wire_doc_example() {
        let mut tx = Transaction::with_inputs(
            [("alice", 20.5)],
            vec![TxInput {
                hash: "abc".into(),
                n: 0,
            }],
        );
        tx.hash = "deadbeef".into();
        let json = serde_json::to_string(&tx.to_wire()).unwrap();
        assert_eq!(
            json,
            r#"{"version":"0.1.0","hash":"deadbeef","outputs":{"alice":20.5},"inputs":[{"hash":"abc","n":0}]}"#
        );
        let back = Transaction::from_wire(serde_json::from_str(&json).unwrap()).unwrap();
        assert_eq!(back.to_wire(), tx.to_wire());
        assert!(back.signature().is_none());
    }

    #[test]
    fn from_wire_rejects_negative_amounts() {
        let doc: TransactionDoc = serde_json::from_str(
            r#"{"version":"0.1.0","hash":"ab","outputs":{"mallory":-5},"inputs":[]}"#,
        )
        .unwrap();
        assert!(matches!(
            Transaction::from_wire(doc),
            Err(LedgerError::InvalidAmount { .. })
        ));
    }
}
