//! Schnorr signature key pairs on secp256k1.
//!
//! Public keys are the 32-byte x-only encoding of BIP-340, signatures are
//! 64 bytes. These are the default primitives behind the `VERIFY` opcode.

use k256::schnorr::signature::{Signer, Verifier};
use k256::schnorr::{Signature, SigningKey, VerifyingKey};
use rand_core::OsRng;

/// Encoded public key length in bytes.
pub const PUBLIC_KEY_LEN: usize = 32;

/// Encoded signature length in bytes.
pub const SIGNATURE_LEN: usize = 64;

/// Private key for signing messages.
///
/// Generated using cryptographically secure randomness from the OS.
#[derive(Clone)]
pub struct PrivateKey {
    key: SigningKey,
}

/// Public key for signature verification.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PublicKey {
    key: VerifyingKey,
}

impl PrivateKey {
    /// Generates a new random private key using OS-provided entropy.
    pub fn new() -> Self {
        Self {
            key: SigningKey::random(&mut OsRng),
        }
    }

    /// Creates a private key from raw scalar bytes.
    ///
    /// Returns `None` if the bytes are not a valid secp256k1 scalar.
    pub fn from_bytes(bytes: &[u8; 32]) -> Option<Self> {
        SigningKey::from_bytes(bytes).ok().map(|key| Self { key })
    }

    /// Derives the corresponding public key.
    pub fn public_key(&self) -> PublicKey {
        PublicKey {
            key: *self.key.verifying_key(),
        }
    }

    /// Signs arbitrary data, returning the 64-byte signature.
    pub fn sign(&self, data: &[u8]) -> [u8; SIGNATURE_LEN] {
        let signature: Signature = self.key.sign(data);
        signature.to_bytes()
    }
}

impl Default for PrivateKey {
    fn default() -> Self {
        Self::new()
    }
}

impl PublicKey {
    /// Parses an x-only public key.
    ///
    /// Returns `None` when the bytes are not exactly [`PUBLIC_KEY_LEN`] long
    /// or do not name a point on the curve.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != PUBLIC_KEY_LEN {
            return None;
        }
        VerifyingKey::from_bytes(bytes).ok().map(|key| Self { key })
    }

    /// Returns the x-only encoding of this key.
    pub fn to_bytes(&self) -> [u8; PUBLIC_KEY_LEN] {
        let mut out = [0u8; PUBLIC_KEY_LEN];
        out.copy_from_slice(&self.key.to_bytes());
        out
    }

    /// Verifies a signature over `data`.
    ///
    /// A signature that does not even parse is simply invalid.
    pub fn verify(&self, data: &[u8], signature: &[u8]) -> bool {
        // k256 panics on slices of any other length.
        if signature.len() != SIGNATURE_LEN {
            return false;
        }
        match Signature::try_from(signature) {
            Ok(sig) => self.key.verify(data, &sig).is_ok(),
            Err(_) => false,
        }
    }
}
