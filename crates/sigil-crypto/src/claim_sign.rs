//! Claim signing orchestration
//!
//! Hash and claim construction complete before this module is entered; the
//! signer call is the sole suspension point of a build. Failure to sign is
//! fatal. Failure to timestamp is fatal only under
//! [`TimestampPolicy::Required`]; under `Optional` it degrades to a warning
//! carried in the outcome.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use sigil_core::{Error, Result};

use crate::alg::{verify_signature, SigningAlg};
use crate::cert::CertificateChain;
use crate::signer::Signer;
use crate::timestamp::{TimestampAuthority, TimestampPolicy, TimestampToken};

/// Default deadline for the signer capability
pub const DEFAULT_SIGN_TIMEOUT: Duration = Duration::from_secs(30);

/// Options governing one claim-signing call
#[derive(Debug, Clone)]
pub struct SignOptions {
    /// Deadline for the raw sign call; `SignerTimeout` past it
    pub timeout: Duration,
    /// Timestamp policy for this build
    pub timestamp_policy: TimestampPolicy,
}

impl Default for SignOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_SIGN_TIMEOUT,
            timestamp_policy: TimestampPolicy::Disabled,
        }
    }
}

/// A signature block ready to embed in a manifest store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignedClaim {
    /// Algorithm the signature was produced under
    pub alg: SigningAlg,
    /// Signature over the claim bytes
    #[serde(with = "serde_bytes")]
    pub signature: Vec<u8>,
    /// Certificate chain of the signer, leaf first
    pub cert_chain: CertificateChain,
    /// Timestamp token, when one was obtained
    pub timestamp: Option<TimestampToken>,
}

impl SignedClaim {
    /// Verify the signature over `claim_bytes` with the embedded leaf key
    pub fn verify(&self, claim_bytes: &[u8]) -> Result<bool> {
        let leaf = self.cert_chain.leaf()?;
        verify_signature(self.alg, &leaf.public_key, claim_bytes, &self.signature)
    }
}

/// Result of a signing call: the claim plus non-fatal warnings
#[derive(Debug)]
pub struct SignOutcome {
    /// The signed claim
    pub claim: SignedClaim,
    /// Non-fatal problems (optional timestamp failure)
    pub warnings: Vec<String>,
}

/// Sign `claim_bytes` and, per policy, attach a timestamp token
///
/// Cancel-safe: no state is mutated here; dropping the returned future
/// simply abandons the outstanding capability call.
pub async fn sign_claim(
    signer: &dyn Signer,
    tsa: Option<&dyn TimestampAuthority>,
    options: &SignOptions,
    claim_bytes: &[u8],
) -> Result<SignOutcome> {
    debug!(
        alg = %signer.alg(),
        claim_len = claim_bytes.len(),
        "invoking signer capability"
    );
    let signature = tokio::time::timeout(options.timeout, signer.sign(claim_bytes))
        .await
        .map_err(|_| Error::SignerTimeout(options.timeout.as_millis() as u64))?
        .map_err(|e| Error::signer("sign", e.to_string()))?;

    if signature.len() != signer.alg().signature_len() {
        return Err(Error::signer(
            "sign",
            format!(
                "signer returned {} bytes, {} expects {}",
                signature.len(),
                signer.alg(),
                signer.alg().signature_len()
            ),
        ));
    }

    let mut warnings = Vec::new();
    let timestamp = match (options.timestamp_policy, tsa) {
        (TimestampPolicy::Disabled, _) | (_, None) => {
            if matches!(options.timestamp_policy, TimestampPolicy::Required) {
                return Err(Error::Timestamp(
                    "timestamp required but no authority configured".into(),
                ));
            }
            None
        }
        (policy, Some(tsa)) => match tsa.timestamp(&signature).await {
            Ok(token) => {
                debug!(authority = tsa.name(), "timestamp token attached");
                Some(token)
            }
            Err(e) if matches!(policy, TimestampPolicy::Required) => {
                return Err(Error::Timestamp(format!(
                    "authority {} failed: {e}",
                    tsa.name()
                )));
            }
            Err(e) => {
                warn!(authority = tsa.name(), error = %e, "timestamp skipped");
                warnings.push(format!("timestamp authority {} failed: {e}", tsa.name()));
                None
            }
        },
    };

    Ok(SignOutcome {
        claim: SignedClaim {
            alg: signer.alg(),
            signature,
            cert_chain: signer.cert_chain().clone(),
            timestamp,
        },
        warnings,
    })
}
