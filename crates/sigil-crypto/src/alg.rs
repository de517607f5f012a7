//! Signing algorithm registry
//!
//! One built-in algorithm (Ed25519); the enum is the seam where further
//! algorithms plug in. Selection is always by declared enum value, never by
//! inspecting key material.

use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use std::fmt;

use sigil_core::{Error, Result};

/// Declared signature algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SigningAlg {
    /// Ed25519 (RFC 8032)
    #[serde(rename = "ed25519")]
    Ed25519,
}

impl fmt::Display for SigningAlg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ed25519 => write!(f, "ed25519"),
        }
    }
}

impl SigningAlg {
    /// Size in bytes of a signature produced under this algorithm
    pub fn signature_len(&self) -> usize {
        match self {
            Self::Ed25519 => 64,
        }
    }
}

/// Verify `signature` over `data` with `public_key` under `alg`
///
/// Returns `Ok(false)` for a well-formed but non-matching signature;
/// malformed key or signature bytes are an error.
pub fn verify_signature(
    alg: SigningAlg,
    public_key: &[u8],
    data: &[u8],
    signature: &[u8],
) -> Result<bool> {
    match alg {
        SigningAlg::Ed25519 => {
            let key_bytes: [u8; 32] = public_key
                .try_into()
                .map_err(|_| Error::signer("verify", "ed25519 public key must be 32 bytes"))?;
            let key = VerifyingKey::from_bytes(&key_bytes)
                .map_err(|e| Error::signer("verify", e.to_string()))?;
            let sig_bytes: [u8; 64] = signature
                .try_into()
                .map_err(|_| Error::signer("verify", "ed25519 signature must be 64 bytes"))?;
            let sig = Signature::from_bytes(&sig_bytes);
            Ok(key.verify(data, &sig).is_ok())
        }
    }
}
