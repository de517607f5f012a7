//! Validation status codes and reports
//!
//! Validation findings are data, not failures: validating a tampered or
//! untrusted asset still yields a complete report, so callers can inspect a
//! partially-trustworthy asset instead of receiving a bare pass/fail.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Enumerated validation outcomes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationCode {
    /// Recomputed asset digest matches the stored hash binding
    #[serde(rename = "assertion.hash.match")]
    HashMatch,
    /// Recomputed asset digest differs from the stored hash binding
    #[serde(rename = "assertion.hash.mismatch")]
    HashMismatch,
    /// Claim signature verified against the embedded certificate chain
    #[serde(rename = "claim.signature.valid")]
    SignatureValid,
    /// Claim signature failed verification
    #[serde(rename = "claim.signature.invalid")]
    SignatureInvalid,
    /// Certificate chain does not terminate at a caller-supplied trust anchor
    #[serde(rename = "signer.untrusted")]
    UntrustedSigner,
    /// A certificate in the chain is outside its validity window
    #[serde(rename = "signer.certificate.expired")]
    CertificateExpired,
    /// An ingredient's nested manifest store validated cleanly
    #[serde(rename = "ingredient.valid")]
    IngredientValid,
    /// An ingredient's nested manifest store reported findings
    #[serde(rename = "ingredient.invalid")]
    IngredientInvalid,
    /// The provenance structure itself is malformed (cycle, depth, dangling ref)
    #[serde(rename = "manifest.structure.invalid")]
    StructurallyInvalid,
    /// The signature carries no timestamp token
    #[serde(rename = "timestamp.missing")]
    TimestampMissing,
    /// The timestamp token failed verification
    #[serde(rename = "timestamp.invalid")]
    TimestampInvalid,
}

impl ValidationCode {
    /// True for codes that demand caller attention
    pub fn is_finding(&self) -> bool {
        matches!(
            self,
            Self::HashMismatch
                | Self::SignatureInvalid
                | Self::UntrustedSigner
                | Self::CertificateExpired
                | Self::IngredientInvalid
                | Self::StructurallyInvalid
                | Self::TimestampInvalid
        )
    }
}

impl fmt::Display for ValidationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Render the wire name
        let s = serde_json::to_string(self).map_err(|_| fmt::Error)?;
        write!(f, "{}", s.trim_matches('"'))
    }
}

/// One validation outcome with context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationStatus {
    /// The outcome code
    pub code: ValidationCode,
    /// Human-readable explanation
    pub detail: String,
    /// What the status refers to (manifest label, ingredient title, resource id)
    pub location: String,
}

impl ValidationStatus {
    /// Construct a status entry
    pub fn new(
        code: ValidationCode,
        detail: impl Into<String>,
        location: impl Into<String>,
    ) -> Self {
        Self {
            code,
            detail: detail.into(),
            location: location.into(),
        }
    }
}

/// Ordered validation report for a manifest store
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Label of the active manifest, when one was found
    pub active_manifest: Option<String>,
    /// Statuses in evaluation order (deterministic across runs)
    pub statuses: Vec<ValidationStatus>,
}

impl ValidationReport {
    /// Empty report
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a status entry
    pub fn push(
        &mut self,
        code: ValidationCode,
        detail: impl Into<String>,
        location: impl Into<String>,
    ) {
        self.statuses.push(ValidationStatus::new(code, detail, location));
    }

    /// Fold a nested ingredient report into this one, preserving its order
    pub fn absorb(&mut self, nested: ValidationReport) {
        self.statuses.extend(nested.statuses);
    }

    /// Statuses that demand attention
    pub fn findings(&self) -> impl Iterator<Item = &ValidationStatus> {
        self.statuses.iter().filter(|s| s.code.is_finding())
    }

    /// True when no status demands attention
    pub fn is_clean(&self) -> bool {
        self.findings().next().is_none()
    }

    /// Count of statuses with the given code
    pub fn count(&self, code: ValidationCode) -> usize {
        self.statuses.iter().filter(|s| s.code == code).count()
    }

    /// Serialize the report as a JSON document
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn findings_are_filtered() {
        let mut report = ValidationReport::new();
        report.push(ValidationCode::HashMatch, "binding ok", "m1");
        report.push(ValidationCode::HashMismatch, "binding differs", "m2");
        report.push(ValidationCode::SignatureValid, "sig ok", "m1");
        assert!(!report.is_clean());
        assert_eq!(report.findings().count(), 1);
        assert_eq!(report.count(ValidationCode::HashMatch), 1);
    }

    #[test]
    fn codes_serialize_to_dotted_names() {
        let code = ValidationCode::UntrustedSigner;
        assert_eq!(
            serde_json::to_string(&code).unwrap(),
            "\"signer.untrusted\""
        );
        assert_eq!(code.to_string(), "signer.untrusted");
    }
}
