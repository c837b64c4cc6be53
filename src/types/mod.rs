//! Core type definitions shared by the interpreter and its codec.
//!
//! - `Bytes`: reference-counted immutable byte buffer
//! - `encoding`: `Encode`/`Decode` traits and the variable-length prefixes
//! - `Hash`: SHA3-256 digest of encoded values

pub mod bytes;
pub mod encoding;
pub mod hash;
