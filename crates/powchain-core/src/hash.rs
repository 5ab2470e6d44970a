use rand::Rng;
use sha2::{Digest, Sha256};

use crate::constants::{RANDOM_ID_MAX, RANDOM_ID_MIN};

pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// A fresh identifier: the digest of a random integer, unrelated to whatever
/// it ends up naming.
pub fn random_hash() -> String {
    let seed: u32 = rand::thread_rng().gen_range(RANDOM_ID_MIN..=RANDOM_ID_MAX);
    sha256_hex(seed.to_string().as_bytes())
}

/// Shortens a hash to `head...tail` for log lines.
pub fn pretty_hash(hash: &str) -> String {
    let keep = hash.len() / 8;
    if keep == 0 || !hash.is_ascii() {
        return hash.to_string();
    }
    format!("{}...{}", &hash[..keep], &hash[hash.len() - keep..])
}
