//! Signing capability used to bind a transaction to its sender's key.

use std::fmt;

use ed25519_dalek::{Signer, SigningKey, Verifier};
use rand::rngs::OsRng;

use crate::error::{LedgerError, Result};

pub use ed25519_dalek::{Signature, VerifyingKey as PublicKey};

pub struct KeyPair {
    signing_key: SigningKey,
}

impl KeyPair {
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    pub fn from_secret_bytes(bytes: &[u8]) -> Result<Self> {
        let secret: [u8; 32] = bytes.try_into().map_err(|_| {
            LedgerError::InvalidSecretKey(format!("expected 32 bytes, got {}", bytes.len()))
        })?;
        Ok(Self {
            signing_key: SigningKey::from_bytes(&secret),
        })
    }

    pub fn public_key(&self) -> PublicKey {
        self.signing_key.verifying_key()
    }

    pub fn sign(&self, message: &[u8]) -> Signature {
        self.signing_key.sign(message)
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &public_key_hex(&self.public_key()))
            .finish_non_exhaustive()
    }
}

pub fn verify_signature(message: &[u8], signature: &Signature, public_key: &PublicKey) -> bool {
    public_key.verify(message, signature).is_ok()
}

pub fn public_key_hex(public_key: &PublicKey) -> String {
    hex::encode(public_key.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_and_verify_example() {
        let keys = KeyPair::generate();
        let sig = keys.sign(b"hello");
        assert!(verify_signature(b"hello", &sig, &keys.public_key()));
        assert!(!verify_signature(b"goodbye", &sig, &keys.public_key()));

        let other = KeyPair::generate();
        assert!(!verify_signature(b"hello", &sig, &other.public_key()));
    }

    #[test]
    fn from_secret_bytes_is_deterministic() {
        let a = KeyPair::from_secret_bytes(&[7u8; 32]).unwrap();
        let b = KeyPair::from_secret_bytes(&[7u8; 32]).unwrap();
        assert_eq!(a.public_key(), b.public_key());
        assert!(KeyPair::from_secret_bytes(&[7u8; 31]).is_err());
    }
}
