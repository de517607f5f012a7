//! Content hashing for provenance bindings
//!
//! Hashing is pure and synchronous; no effect context is needed. The
//! algorithm is fixed at SHA-256 and named once here, so the digest
//! algorithm recorded in hash bindings always matches what this module
//! computes.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::io::Read;

use crate::error::{Error, Result};

/// Wire name of the digest algorithm used throughout the engine
pub const DIGEST_ALG: &str = "sha256";

/// Chunk size for streaming hash computation (64 KiB)
pub const CHUNK_SIZE: usize = 64 * 1024;

/// 32-byte SHA-256 digest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Hash32(pub [u8; 32]);

impl Hash32 {
    /// Wrap raw digest bytes
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Borrow the raw digest bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex rendering of the digest
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse a digest from lowercase or uppercase hex
    pub fn from_hex(s: &str) -> Result<Self> {
        let raw = hex::decode(s)
            .map_err(|e| Error::serialization("hash hex decode", e))?;
        let bytes: [u8; 32] = raw
            .try_into()
            .map_err(|_| Error::serialization("hash hex decode", "expected 32 bytes"))?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for Hash32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Hash a byte slice to a 32-byte digest
pub fn hash(data: &[u8]) -> Hash32 {
    let mut h = Sha256::new();
    h.update(data);
    Hash32(h.finalize().into())
}

/// Incremental hasher for multi-part data
#[derive(Default)]
pub struct Hasher {
    inner: Sha256,
}

impl Hasher {
    /// Create a fresh hasher
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed more data into the digest
    pub fn update(&mut self, data: &[u8]) {
        self.inner.update(data);
    }

    /// Finish and return the digest
    pub fn finalize(self) -> Hash32 {
        Hash32(self.inner.finalize().into())
    }
}

/// Hash an entire reader in bounded chunks
///
/// Payloads larger than available memory are fine; at most [`CHUNK_SIZE`]
/// bytes are resident at a time.
pub fn hash_reader<R: Read>(reader: &mut R) -> Result<Hash32> {
    let mut hasher = Hasher::new();
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize())
}
