//! Sigil crypto: signer and timestamp capabilities
//!
//! Models "produce a signature over these bytes" as an explicit capability
//! trait, parameterized by declared algorithm, certificate chain, and an
//! optional timestamp authority. Key custody stays with the caller; this
//! crate never reads private key material except through the capability
//! seam.

pub mod alg;
pub mod cert;
pub mod claim_sign;
pub mod signer;
pub mod timestamp;

pub use alg::{verify_signature, SigningAlg};
pub use cert::{Certificate, CertificateChain, ChainStatus, TrustAnchors};
pub use claim_sign::{sign_claim, SignOptions, SignOutcome, SignedClaim, DEFAULT_SIGN_TIMEOUT};
pub use signer::{test_chain, test_signer, Ed25519Signer, Signer};
pub use timestamp::{
    LocalTimestampAuthority, TimestampAuthority, TimestampPolicy, TimestampToken,
};
