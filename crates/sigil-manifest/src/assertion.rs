//! Assertions: labeled structured claims within a manifest
//!
//! Assertions are opaque to the engine beyond structural validation. The
//! well-known labels below have documented schemas enforced by higher
//! layers, not here.

use serde::{Deserialize, Serialize};

use sigil_core::DocValue;

/// Well-known assertion labels
pub mod labels {
    /// Edit/creation action history
    pub const ACTIONS: &str = "c2pa.actions";
    /// Training and data-mining usage restrictions
    pub const TRAINING_MINING: &str = "c2pa.training-mining";
    /// Claim thumbnail reference
    pub const THUMBNAIL: &str = "c2pa.thumbnail";
}

/// A labeled structured claim, optionally referencing a stored resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assertion {
    /// Assertion label, e.g. `c2pa.actions`
    pub label: String,
    /// Structured payload; schema is caller-defined
    pub data: DocValue,
    /// Identifier of a binary resource this assertion refers to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
}

impl Assertion {
    /// Assertion with a structured payload only
    pub fn new(label: impl Into<String>, data: DocValue) -> Self {
        Self {
            label: label.into(),
            data,
            resource: None,
        }
    }

    /// Assertion referencing a stored binary resource
    pub fn with_resource(
        label: impl Into<String>,
        data: DocValue,
        resource: impl Into<String>,
    ) -> Self {
        Self {
            label: label.into(),
            data,
            resource: Some(resource.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_form_omits_absent_resource() {
        let a = Assertion::new(labels::ACTIONS, DocValue::map());
        let json = serde_json::to_value(&a).unwrap();
        assert!(json.get("resource").is_none());

        let b = Assertion::with_resource(labels::THUMBNAIL, DocValue::Null, "thumb");
        let json = serde_json::to_value(&b).unwrap();
        assert_eq!(json["resource"], "thumb");
    }
}
