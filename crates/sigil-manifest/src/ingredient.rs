//! Ingredients: references to assets that contributed to the current one
//!
//! An ingredient records the contributing asset's content hash at ingestion
//! time and, when that asset carried its own provenance, the label of its
//! active manifest within the containing store's arena. Holding a label
//! instead of an owning pointer keeps the graph acyclic by construction.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use sigil_core::{DocValue, Error, Hash32, Result};

/// How a contributing asset relates to the current one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Relationship {
    /// The ingredient is the asset this one was derived from
    #[serde(rename = "parentOf")]
    ParentOf,
    /// The ingredient is composited into this asset
    #[serde(rename = "componentOf")]
    ComponentOf,
    /// The ingredient was an input to the process that produced this asset
    #[serde(rename = "inputTo")]
    InputTo,
}

impl fmt::Display for Relationship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ParentOf => write!(f, "parentOf"),
            Self::ComponentOf => write!(f, "componentOf"),
            Self::InputTo => write!(f, "inputTo"),
        }
    }
}

impl FromStr for Relationship {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "parentOf" => Ok(Self::ParentOf),
            "componentOf" => Ok(Self::ComponentOf),
            "inputTo" => Ok(Self::InputTo),
            other => Err(Error::structurally_invalid(format!(
                "unknown ingredient relationship {other}"
            ))),
        }
    }
}

/// Caller-facing description of an ingredient before ingestion
#[derive(Debug, Clone, PartialEq)]
pub struct IngredientDescriptor {
    /// Human-readable title of the contributing asset
    pub title: String,
    /// Relationship to the current asset
    pub relationship: Relationship,
    /// Resource identifier of a thumbnail, if one was registered
    pub thumbnail: Option<String>,
}

impl IngredientDescriptor {
    /// Descriptor with title and relationship only
    pub fn new(title: impl Into<String>, relationship: Relationship) -> Self {
        Self {
            title: title.into(),
            relationship,
            thumbnail: None,
        }
    }

    /// Attach a thumbnail resource identifier
    pub fn with_thumbnail(mut self, identifier: impl Into<String>) -> Self {
        self.thumbnail = Some(identifier.into());
        self
    }

    /// Parse a descriptor from its JSON document form
    ///
    /// Recognized keys: `title`, `relationship`, `thumbnail.identifier`.
    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        let doc = DocValue::from_json(value)?;
        let title = doc
            .get("title")
            .and_then(DocValue::as_text)
            .ok_or_else(|| Error::structurally_invalid("ingredient descriptor missing title"))?
            .to_string();
        let relationship = doc
            .get("relationship")
            .and_then(DocValue::as_text)
            .ok_or_else(|| {
                Error::structurally_invalid("ingredient descriptor missing relationship")
            })?
            .parse()?;
        let thumbnail = doc
            .get("thumbnail")
            .and_then(|t| t.get("identifier"))
            .and_then(DocValue::as_text)
            .map(str::to_string);
        Ok(Self {
            title,
            relationship,
            thumbnail,
        })
    }
}

/// An ingested ingredient record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ingredient {
    /// Human-readable title of the contributing asset
    pub title: String,
    /// Relationship to the current asset
    pub relationship: Relationship,
    /// Content hash of the contributing asset at ingestion time
    pub document_hash: Hash32,
    /// Resource identifier of the ingredient thumbnail
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    /// Label of the ingredient's active manifest within the containing
    /// store's arena, when the ingredient carried provenance
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_manifest: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn relationship_wire_names() {
        assert_eq!(
            serde_json::to_string(&Relationship::ParentOf).unwrap(),
            "\"parentOf\""
        );
        assert_eq!("inputTo".parse::<Relationship>().unwrap(), Relationship::InputTo);
        assert_matches!(
            "derivedFrom".parse::<Relationship>(),
            Err(Error::StructurallyInvalid(_))
        );
    }

    #[test]
    fn descriptor_from_json() {
        let json: serde_json::Value = serde_json::from_str(
            r#"{"title": "source.jpg", "relationship": "parentOf",
                "thumbnail": {"identifier": "thumb-1"}}"#,
        )
        .unwrap();
        let d = IngredientDescriptor::from_json(&json).unwrap();
        assert_eq!(d.title, "source.jpg");
        assert_eq!(d.relationship, Relationship::ParentOf);
        assert_eq!(d.thumbnail.as_deref(), Some("thumb-1"));
    }

    #[test]
    fn descriptor_requires_title_and_relationship() {
        let json: serde_json::Value =
            serde_json::from_str(r#"{"relationship": "parentOf"}"#).unwrap();
        assert_matches!(
            IngredientDescriptor::from_json(&json),
            Err(Error::StructurallyInvalid(_))
        );
    }
}
