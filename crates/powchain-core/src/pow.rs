use sha2::{Digest, Sha256};

pub type Hash = [u8; 32];

/// Digest of `puzzle + nonce`, the value a solution is judged by.
pub fn digest(puzzle: &str, nonce: &str) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(puzzle.as_bytes());
    hasher.update(nonce.as_bytes());
    hasher.finalize().into()
}

pub fn digest_hex(puzzle: &str, nonce: &str) -> String {
    hex::encode(digest(puzzle, nonce))
}

/// Number of leading `'0'` characters in the hex rendering of `hash`.
pub fn count_leading_zero_nibbles(hash: &Hash) -> u32 {
    let mut total = 0u32;
    for b in hash {
        if *b == 0 {
            total += 2;
        } else {
            if *b < 0x10 {
                total += 1;
            }
            break;
        }
    }
    total
}

/// True iff the first `target` hex characters of `digest(puzzle, nonce)` are all `'0'`.
pub fn meets_target(puzzle: &str, nonce: &str, target: u32) -> bool {
    count_leading_zero_nibbles(&digest(puzzle, nonce)) >= target
}
