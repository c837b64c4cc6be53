//! Cryptographic primitives used by the hashing and signature opcodes.
//!
//! - [`hashes`]: SHA-1, SHA-256, HASH160 and HASH256 digests
//! - [`key_pair`]: BIP-340 Schnorr keys on secp256k1

pub mod hashes;
pub mod key_pair;
