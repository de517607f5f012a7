//! The signer capability
//!
//! Signing is the one seam where private key material touches the pipeline,
//! and it stays entirely on the caller's side of this trait: the engine only
//! ever asks "produce a signature over these bytes" and reads static
//! metadata (algorithm, certificate chain, reserve size). The built-in
//! [`Ed25519Signer`] wraps a caller-supplied key.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use ed25519_dalek::{Signer as DalekSigner, SigningKey};

use sigil_core::Result;

use crate::alg::SigningAlg;
use crate::cert::{Certificate, CertificateChain, TrustAnchors};

/// Capability to produce signatures over claim bytes
#[async_trait]
pub trait Signer: Send + Sync {
    /// Declared signature algorithm
    fn alg(&self) -> SigningAlg;

    /// Certificate chain to embed alongside signatures, leaf first
    fn cert_chain(&self) -> &CertificateChain;

    /// Upper-bound estimate of the signature block size in bytes
    ///
    /// Used for placeholder reservation during the sign loop; an estimate
    /// that is merely close is fine, the loop corrects it.
    fn reserve_size(&self) -> u64 {
        self.alg().signature_len() as u64 + 1024
    }

    /// Produce a signature over `data`
    ///
    /// May suspend (hardware token, remote KMS); the engine wraps the call
    /// in a timeout and treats failure as fatal to the build.
    async fn sign(&self, data: &[u8]) -> Result<Vec<u8>>;
}

/// Ed25519 signer over a caller-supplied key
pub struct Ed25519Signer {
    key: SigningKey,
    chain: CertificateChain,
}

impl Ed25519Signer {
    /// Wrap an existing key and its certificate chain
    pub fn new(key: SigningKey, chain: CertificateChain) -> Self {
        Self { key, chain }
    }
}

#[async_trait]
impl Signer for Ed25519Signer {
    fn alg(&self) -> SigningAlg {
        SigningAlg::Ed25519
    }

    fn cert_chain(&self) -> &CertificateChain {
        &self.chain
    }

    async fn sign(&self, data: &[u8]) -> Result<Vec<u8>> {
        Ok(self.key.sign(data).to_bytes().to_vec())
    }
}

/// Build a deterministic two-certificate chain for a test or local signer
///
/// Derives a root and a leaf key from `seed`, issues `root → leaf`, and
/// returns the leaf signing key, the leaf-first chain, and an anchor set
/// containing the root. The validity window is fixed (2024-01-01 to
/// 2030-01-01) so outputs are reproducible across runs.
pub fn test_chain(
    subject: &str,
    seed: [u8; 32],
) -> (SigningKey, CertificateChain, TrustAnchors) {
    let root_key = SigningKey::from_bytes(&seed);
    let mut leaf_seed = seed;
    leaf_seed[0] = leaf_seed[0].wrapping_add(1);
    let leaf_key = SigningKey::from_bytes(&leaf_seed);

    let epoch = chrono::DateTime::UNIX_EPOCH;
    let not_before = Utc
        .with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or(epoch);
    let not_after = Utc
        .with_ymd_and_hms(2030, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or(epoch);

    let mut root = Certificate {
        subject: format!("{subject} root"),
        issuer: format!("{subject} root"),
        public_key: root_key.verifying_key().to_bytes().to_vec(),
        not_before,
        not_after,
        signature: Vec::new(),
    };
    // Self-sign the root, then issue the leaf
    let root_tbs = root.tbs_bytes().unwrap_or_default();
    root.signature = root_key.sign(&root_tbs).to_bytes().to_vec();

    let mut leaf = Certificate {
        subject: subject.to_string(),
        issuer: root.subject.clone(),
        public_key: leaf_key.verifying_key().to_bytes().to_vec(),
        not_before,
        not_after,
        signature: Vec::new(),
    };
    let leaf_tbs = leaf.tbs_bytes().unwrap_or_default();
    leaf.signature = root_key.sign(&leaf_tbs).to_bytes().to_vec();

    let mut anchors = TrustAnchors::new();
    anchors.add(root.public_key.clone());

    (leaf_key, CertificateChain::new(vec![leaf, root]), anchors)
}

/// Convenience: a ready-to-use Ed25519 signer with a deterministic chain
pub fn test_signer(subject: &str, seed: [u8; 32]) -> (Ed25519Signer, TrustAnchors) {
    let (key, chain, anchors) = test_chain(subject, seed);
    (Ed25519Signer::new(key, chain), anchors)
}
