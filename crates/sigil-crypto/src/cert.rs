//! Certificate chains and trust anchors
//!
//! Sigil never reads private key material; certificate chains arrive from
//! the caller through the signer capability and are treated as opaque,
//! self-contained records. The chain model here is deliberately minimal:
//! each certificate binds a subject name to an Ed25519 public key within a
//! validity window, signed by its issuer. Chains are ordered leaf-first and
//! terminate in a self-signed root. Trust is established by walking the
//! chain to a caller-supplied anchor set.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use sigil_core::{Error, Result};

use crate::alg::{verify_signature, SigningAlg};

/// A single certificate record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certificate {
    /// Subject name
    pub subject: String,
    /// Issuer name; equal to `subject` for a self-signed root
    pub issuer: String,
    /// Subject's Ed25519 public key
    #[serde(with = "serde_bytes")]
    pub public_key: Vec<u8>,
    /// Start of the validity window
    pub not_before: DateTime<Utc>,
    /// End of the validity window
    pub not_after: DateTime<Utc>,
    /// Issuer signature over the to-be-signed bytes
    #[serde(with = "serde_bytes")]
    pub signature: Vec<u8>,
}

/// The to-be-signed portion of a certificate
#[derive(Serialize)]
struct TbsCertificate<'a> {
    subject: &'a str,
    issuer: &'a str,
    #[serde(with = "serde_bytes")]
    public_key: &'a [u8],
    not_before: &'a DateTime<Utc>,
    not_after: &'a DateTime<Utc>,
}

impl Certificate {
    /// Canonical bytes the issuer signs
    pub fn tbs_bytes(&self) -> Result<Vec<u8>> {
        serde_cbor::to_vec(&TbsCertificate {
            subject: &self.subject,
            issuer: &self.issuer,
            public_key: &self.public_key,
            not_before: &self.not_before,
            not_after: &self.not_after,
        })
        .map_err(|e| Error::serialization("certificate tbs", e))
    }

    /// True when `at` falls inside the validity window
    pub fn is_valid_at(&self, at: DateTime<Utc>) -> bool {
        at >= self.not_before && at <= self.not_after
    }
}

/// Outcome of a chain trust evaluation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainStatus {
    /// Chain verifies and reaches a trust anchor within validity windows
    Trusted,
    /// Chain verifies but no certificate matches a trust anchor, or a link
    /// signature is bad
    Untrusted(String),
    /// A certificate in the chain is outside its validity window
    Expired(String),
}

/// Caller-supplied set of trusted root public keys
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustAnchors {
    anchors: Vec<Vec<u8>>,
}

impl TrustAnchors {
    /// Empty anchor set; every chain evaluates as untrusted
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a trusted root public key
    pub fn add(&mut self, public_key: impl Into<Vec<u8>>) {
        self.anchors.push(public_key.into());
    }

    /// True if `public_key` is an anchor
    pub fn contains(&self, public_key: &[u8]) -> bool {
        self.anchors.iter().any(|a| a == public_key)
    }

    /// Anchor keys, in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &[u8]> {
        self.anchors.iter().map(Vec::as_slice)
    }

    /// Absorb every anchor from `other`
    pub fn merge(&mut self, other: &TrustAnchors) {
        for key in other.iter() {
            if !self.contains(key) {
                self.anchors.push(key.to_vec());
            }
        }
    }

    /// Number of anchors
    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    /// True when no anchors are configured
    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }
}

/// An ordered certificate chain, leaf first
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateChain {
    certificates: Vec<Certificate>,
}

impl CertificateChain {
    /// Build a chain from leaf-first certificates
    pub fn new(certificates: Vec<Certificate>) -> Self {
        Self { certificates }
    }

    /// The leaf (signing) certificate
    pub fn leaf(&self) -> Result<&Certificate> {
        self.certificates
            .first()
            .ok_or_else(|| Error::signer("verify", "empty certificate chain"))
    }

    /// All certificates, leaf first
    pub fn certificates(&self) -> &[Certificate] {
        &self.certificates
    }

    /// Evaluate the chain against `anchors` at reference time `at`
    ///
    /// Checks, in order: validity windows for every certificate, each link's
    /// issuer signature (the root must be self-signed), then whether any
    /// certificate's public key is an anchor. Expiry is reported ahead of
    /// trust so a lapsed-but-known signer is distinguishable from an unknown
    /// one.
    pub fn evaluate(&self, anchors: &TrustAnchors, at: DateTime<Utc>) -> Result<ChainStatus> {
        if self.certificates.is_empty() {
            return Ok(ChainStatus::Untrusted("empty certificate chain".into()));
        }

        for cert in &self.certificates {
            if !cert.is_valid_at(at) {
                return Ok(ChainStatus::Expired(format!(
                    "certificate {} not valid at {}",
                    cert.subject,
                    at.to_rfc3339()
                )));
            }
        }

        for (i, cert) in self.certificates.iter().enumerate() {
            let issuer_key = match self.certificates.get(i + 1) {
                Some(issuer) => &issuer.public_key,
                // Root must be self-signed
                None => &cert.public_key,
            };
            let tbs = cert.tbs_bytes()?;
            if !verify_signature(SigningAlg::Ed25519, issuer_key, &tbs, &cert.signature)? {
                return Ok(ChainStatus::Untrusted(format!(
                    "issuer signature on certificate {} does not verify",
                    cert.subject
                )));
            }
        }

        if self.certificates.iter().any(|c| anchors.contains(&c.public_key)) {
            Ok(ChainStatus::Trusted)
        } else {
            Ok(ChainStatus::Untrusted(
                "chain does not reach a configured trust anchor".into(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signer::test_chain;
    use chrono::TimeZone;

    #[test]
    fn valid_chain_is_trusted() {
        let (_, chain, anchors) = test_chain("unit-test-signer", [7u8; 32]);
        let at = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        assert_eq!(chain.evaluate(&anchors, at).unwrap(), ChainStatus::Trusted);
    }

    #[test]
    fn unknown_root_is_untrusted() {
        let (_, chain, _) = test_chain("unit-test-signer", [7u8; 32]);
        let at = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        let empty = TrustAnchors::new();
        assert!(matches!(
            chain.evaluate(&empty, at).unwrap(),
            ChainStatus::Untrusted(_)
        ));
    }

    #[test]
    fn out_of_window_is_expired() {
        let (_, chain, anchors) = test_chain("unit-test-signer", [7u8; 32]);
        let at = Utc.with_ymd_and_hms(2099, 1, 1, 0, 0, 0).unwrap();
        assert!(matches!(
            chain.evaluate(&anchors, at).unwrap(),
            ChainStatus::Expired(_)
        ));
    }

    #[test]
    fn tampered_link_is_untrusted() {
        let (_, chain, anchors) = test_chain("unit-test-signer", [7u8; 32]);
        let mut certs = chain.certificates().to_vec();
        certs[0].subject = "impostor".into();
        let forged = CertificateChain::new(certs);
        let at = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        assert!(matches!(
            forged.evaluate(&anchors, at).unwrap(),
            ChainStatus::Untrusted(_)
        ));
    }
}
