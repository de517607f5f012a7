//! Unified error type for the Sigil workspace
//!
//! Every crate in the workspace surfaces this one error enum. Build errors
//! are fatal to the in-progress operation and leave caller-visible state
//! unchanged; container errors are fatal to the operation; validation
//! findings are *not* errors and live in [`crate::status`] instead.

use thiserror::Error;

/// Sigil error taxonomy
#[derive(Debug, Error)]
pub enum Error {
    /// A resource identifier was registered twice without explicit overwrite
    #[error("duplicate identifier: {0}")]
    DuplicateIdentifier(String),

    /// A resource or manifest lookup failed
    #[error("not found: {0}")]
    NotFound(String),

    /// An assertion references a resource identifier that was never registered
    #[error("assertion {assertion} references unregistered resource {identifier}")]
    UnresolvedResourceReference {
        /// Label of the referencing assertion
        assertion: String,
        /// The missing resource identifier
        identifier: String,
    },

    /// `sign` was invoked on a builder that already produced a signed manifest
    #[error("builder is already signed")]
    AlreadySigned,

    /// An operation was attempted in a builder state that does not permit it
    #[error("operation {operation} not valid in state {state}")]
    InvalidState {
        /// The rejected operation
        operation: &'static str,
        /// The builder state at the time of the call
        state: &'static str,
    },

    /// The signer capability did not respond within the configured deadline
    #[error("signer timed out after {0} ms")]
    SignerTimeout(u64),

    /// The signer capability failed
    #[error("signer failed during {step}: {reason}")]
    Signer {
        /// Which signing step failed
        step: &'static str,
        /// Capability-reported reason
        reason: String,
    },

    /// The timestamp authority failed and the policy requires a timestamp
    #[error("timestamp authority failed: {0}")]
    Timestamp(String),

    /// The manifest box size failed to converge within the retry bound
    #[error("manifest box size diverged after {attempts} passes (estimated {estimated}, actual {actual})")]
    BoxSizeDiverged {
        /// Number of signing passes performed
        attempts: u32,
        /// Last size estimate in bytes
        estimated: u64,
        /// Actual serialized size in bytes
        actual: u64,
    },

    /// The asset carries no manifest box; a valid empty state, not corruption
    #[error("asset carries no manifest data")]
    NoManifestFound,

    /// The manifest box or its container structure is damaged
    #[error("malformed container: {0}")]
    MalformedContainer(String),

    /// A builder archive failed structural checks on restore
    #[error("corrupt archive: {0}")]
    CorruptArchive(String),

    /// No codec is registered for the declared content type
    #[error("no codec registered for content type {0}")]
    UnsupportedContentType(String),

    /// An ingredient chain is self-referential or exceeds the depth bound
    #[error("structurally invalid provenance: {0}")]
    StructurallyInvalid(String),

    /// Wire (de)serialization failed
    #[error("serialization failed during {step}: {reason}")]
    Serialization {
        /// Which operation was serializing
        step: &'static str,
        /// Underlying codec message
        reason: String,
    },

    /// Underlying I/O failure
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias used across the workspace
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a signer failure with step context
    pub fn signer(step: &'static str, reason: impl Into<String>) -> Self {
        Self::Signer {
            step,
            reason: reason.into(),
        }
    }

    /// Create a malformed-container error
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedContainer(reason.into())
    }

    /// Create a corrupt-archive error
    pub fn corrupt_archive(reason: impl Into<String>) -> Self {
        Self::CorruptArchive(reason.into())
    }

    /// Create a structurally-invalid error
    pub fn structurally_invalid(reason: impl Into<String>) -> Self {
        Self::StructurallyInvalid(reason.into())
    }

    /// Create a serialization error with step context
    pub fn serialization(step: &'static str, reason: impl std::fmt::Display) -> Self {
        Self::Serialization {
            step,
            reason: reason.to_string(),
        }
    }

    /// True for the valid-empty-state probe outcome
    pub fn is_no_manifest(&self) -> bool {
        matches!(self, Self::NoManifestFound)
    }
}
