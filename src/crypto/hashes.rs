//! Digest functions backing `SHA1`, `SHA256`, `HASH160` and `HASH256`.

use ripemd::Ripemd160;
use sha1::Sha1;
use sha2::{Digest, Sha256};

/// SHA-1 digest of `data`.
pub fn sha1(data: &[u8]) -> [u8; 20] {
    Sha1::digest(data).into()
}

/// SHA-256 digest of `data`.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// `RIPEMD160(SHA256(data))`, the 20-byte script hash.
pub fn hash160(data: &[u8]) -> [u8; 20] {
    Ripemd160::digest(sha256(data)).into()
}

/// `SHA256(SHA256(data))`.
pub fn hash256(data: &[u8]) -> [u8; 32] {
    sha256(&sha256(data))
}
