//! The manifest: a signed record of provenance assertions
//!
//! A manifest accumulates assertions and ingredient references during a
//! build and becomes immutable once signed. The signature block and hash
//! binding are both `None` only for the in-progress definition inside a
//! builder; every manifest that reaches a store on disk carries both.

use serde::{Deserialize, Serialize};

use sigil_core::{Error, HashBinding, Result};
use sigil_crypto::SignedClaim;

use crate::assertion::Assertion;
use crate::ingredient::Ingredient;

/// Prefix for generated manifest labels
pub const LABEL_PREFIX: &str = "urn:sigil:manifest:";

/// Generate a fresh manifest label
pub fn new_label() -> String {
    format!("{LABEL_PREFIX}{}", uuid::Uuid::new_v4())
}

/// A signed (or, within a builder, in-progress) provenance record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    /// Unique label of this manifest within its store
    pub label: String,
    /// Name/version of the tool that generated the claim
    pub claim_generator: String,
    /// Ordered assertion sequence
    pub assertions: Vec<Assertion>,
    /// Ordered ingredient references
    pub ingredients: Vec<Ingredient>,
    /// Hash binding over the asset this manifest was embedded into
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash_binding: Option<HashBinding>,
    /// Signature block; present on every signed manifest
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<SignedClaim>,
}

impl Manifest {
    /// True once the manifest carries a signature
    pub fn is_signed(&self) -> bool {
        self.signature.is_some()
    }

    /// The signature block, or an error for an unsigned manifest
    pub fn signature(&self) -> Result<&SignedClaim> {
        self.signature
            .as_ref()
            .ok_or_else(|| Error::structurally_invalid(format!("manifest {} is unsigned", self.label)))
    }

    /// The hash binding, or an error when absent
    pub fn hash_binding(&self) -> Result<&HashBinding> {
        self.hash_binding.as_ref().ok_or_else(|| {
            Error::structurally_invalid(format!("manifest {} has no hash binding", self.label))
        })
    }

    /// Find an assertion by label
    pub fn assertion(&self, label: &str) -> Option<&Assertion> {
        self.assertions.iter().find(|a| a.label == label)
    }
}
