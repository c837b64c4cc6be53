//! 32-byte SHA3-256 digest of canonically encoded values.

use crate::types::encoding::EncodeSink;
use sha3::{Digest, Sha3_256};
use std::fmt;

/// SHA3-256 digest length in bytes.
pub const HASH_LEN: usize = 32;

/// Fixed-size digest identifying a serialized value.
///
/// Two values hash equal exactly when their canonical encodings are equal,
/// so a map hashes the same regardless of insertion order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Hash, Ord, PartialOrd)]
pub struct Hash(pub [u8; HASH_LEN]);

impl Hash {
    /// Returns the digest as a byte slice.
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    /// Starts an incremental SHA3-256 computation.
    pub fn sha3() -> HashBuilder {
        HashBuilder {
            hasher: Sha3_256::new(),
        }
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// Incremental SHA3-256 builder.
///
/// Implements [`EncodeSink`] so values can be encoded straight into the
/// hasher without building the serialized buffer first.
pub struct HashBuilder {
    hasher: Sha3_256,
}

impl HashBuilder {
    /// Feeds data into the digest.
    pub fn update(&mut self, data: &[u8]) {
        self.hasher.update(data);
    }

    /// Consumes the builder and returns the final digest.
    pub fn finalize(self) -> Hash {
        Hash(self.hasher.finalize().into())
    }
}

impl EncodeSink for HashBuilder {
    fn write(&mut self, bytes: &[u8]) {
        self.hasher.update(bytes);
    }
}
