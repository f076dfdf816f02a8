//! Random opaque tokens and their digests

use rand::RngCore;
use sha2::{Digest, Sha256};

/// `len` random bytes from the thread CSPRNG, hex encoded
pub fn random_hex(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// hex(sha256(value)), used to store refresh tokens
pub fn sha256_hex(value: &str) -> String {
    hex::encode(Sha256::digest(value.as_bytes()))
}
