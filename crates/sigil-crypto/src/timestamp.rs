//! Timestamp authority capability
//!
//! A timestamp token is an authority-signed statement that a given claim
//! signature existed at a point in time. The authority is a caller-supplied
//! capability; requesting a token can fail independently of signing
//! (network, timeout), and whether that failure is fatal is a policy
//! decision made per build.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ed25519_dalek::{Signer as DalekSigner, SigningKey};
use serde::{Deserialize, Serialize};

use sigil_core::Result;

use crate::alg::{verify_signature, SigningAlg};

/// How a build treats timestamp-authority failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimestampPolicy {
    /// Never request a timestamp
    #[default]
    Disabled,
    /// Request one; failure is a reported warning, signing still succeeds
    Optional,
    /// Request one; failure fails the build
    Required,
}

/// An authority-signed statement over a claim signature
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimestampToken {
    /// Name of the issuing authority
    pub authority: String,
    /// Time asserted by the authority
    pub time: DateTime<Utc>,
    /// Authority signature over `claim_signature || rfc3339(time)`
    #[serde(with = "serde_bytes")]
    pub signature: Vec<u8>,
    /// Authority public key used to verify the token
    #[serde(with = "serde_bytes")]
    pub public_key: Vec<u8>,
}

impl TimestampToken {
    fn message(claim_signature: &[u8], time: DateTime<Utc>) -> Vec<u8> {
        let mut msg = claim_signature.to_vec();
        msg.extend_from_slice(time.to_rfc3339().as_bytes());
        msg
    }

    /// Verify the token against the claim signature it covers
    pub fn verify(&self, claim_signature: &[u8]) -> Result<bool> {
        verify_signature(
            SigningAlg::Ed25519,
            &self.public_key,
            &Self::message(claim_signature, self.time),
            &self.signature,
        )
    }
}

/// Capability to obtain a timestamp token over a signature
#[async_trait]
pub trait TimestampAuthority: Send + Sync {
    /// Authority name recorded in issued tokens
    fn name(&self) -> &str;

    /// Request a token over `claim_signature`
    async fn timestamp(&self, claim_signature: &[u8]) -> Result<TimestampToken>;
}

/// In-process authority signing with a local key
///
/// Suitable for tests and air-gapped deployments; a networked RFC 3161
/// client implements the same trait outside this core.
pub struct LocalTimestampAuthority {
    name: String,
    key: SigningKey,
    /// Fixed time for reproducible tokens; `None` means "now"
    fixed_time: Option<DateTime<Utc>>,
}

impl LocalTimestampAuthority {
    /// Create an authority with the given name and key
    pub fn new(name: impl Into<String>, key: SigningKey) -> Self {
        Self {
            name: name.into(),
            key,
            fixed_time: None,
        }
    }

    /// Pin the asserted time, making tokens reproducible
    pub fn with_fixed_time(mut self, time: DateTime<Utc>) -> Self {
        self.fixed_time = Some(time);
        self
    }
}

#[async_trait]
impl TimestampAuthority for LocalTimestampAuthority {
    fn name(&self) -> &str {
        &self.name
    }

    async fn timestamp(&self, claim_signature: &[u8]) -> Result<TimestampToken> {
        let time = self.fixed_time.unwrap_or_else(Utc::now);
        let msg = TimestampToken::message(claim_signature, time);
        Ok(TimestampToken {
            authority: self.name.clone(),
            time,
            signature: self.key.sign(&msg).to_bytes().to_vec(),
            public_key: self.key.verifying_key().to_bytes().to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn token_verifies_over_its_signature() {
        let tsa = LocalTimestampAuthority::new("test-tsa", SigningKey::from_bytes(&[5u8; 32]));
        let token = tsa.timestamp(b"some claim signature").await.unwrap();
        assert!(token.verify(b"some claim signature").unwrap());
        assert!(!token.verify(b"a different signature").unwrap());
        assert_eq!(token.authority, "test-tsa");
    }
}
