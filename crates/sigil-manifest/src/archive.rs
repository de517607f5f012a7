//! Builder archives: suspend and resume multi-step construction
//!
//! An archive is a self-contained CBOR bundle of a builder's definition,
//! ingredient records (including chain manifests folded in from ingested
//! assets), and resources — independent of any target asset. It is created
//! on demand, portable across processes, and round-trips byte-identically
//! for any builder state prior to signing.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use sigil_core::{DocValue, Error, Result};
use sigil_store::ResourceStore;

use crate::assertion::Assertion;
use crate::ingredient::Ingredient;
use crate::manifest::Manifest;

/// Wire version of the archive bundle
pub const ARCHIVE_VERSION: u32 = 1;

/// Serialized snapshot of a pre-signing builder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuilderArchive {
    /// Archive wire version
    pub version: u32,
    /// Manifest label reserved by the builder
    pub label: String,
    /// Claim generator string
    pub claim_generator: String,
    /// Accumulated assertions, in order
    pub assertions: Vec<Assertion>,
    /// Ingested ingredient records, in order
    pub ingredients: Vec<Ingredient>,
    /// Chain manifests folded in from ingested ingredient assets
    pub chain_manifests: IndexMap<String, Manifest>,
    /// Registered resources
    pub resources: ResourceStore,
    /// Unrecognized definition keys, preserved opaquely
    pub extra: BTreeMap<String, DocValue>,
}

impl BuilderArchive {
    /// Serialize to the portable CBOR form
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_cbor::to_vec(self).map_err(|e| Error::serialization("archive", e))
    }

    /// Parse and structurally check an archive
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let archive: Self = serde_cbor::from_slice(bytes)
            .map_err(|e| Error::corrupt_archive(format!("decode: {e}")))?;
        archive.check()?;
        Ok(archive)
    }

    /// Structural integrity checks shared by restore paths
    pub fn check(&self) -> Result<()> {
        if self.version != ARCHIVE_VERSION {
            return Err(Error::corrupt_archive(format!(
                "unsupported archive version {}",
                self.version
            )));
        }
        if self.label.is_empty() {
            return Err(Error::corrupt_archive("empty manifest label"));
        }
        for ingredient in &self.ingredients {
            if let Some(label) = &ingredient.active_manifest {
                if !self.chain_manifests.contains_key(label) {
                    return Err(Error::corrupt_archive(format!(
                        "ingredient {} references missing chain manifest {label}",
                        ingredient.title
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn archive() -> BuilderArchive {
        BuilderArchive {
            version: ARCHIVE_VERSION,
            label: "urn:sigil:manifest:fixed".into(),
            claim_generator: "sigil-test/0.1".into(),
            assertions: vec![],
            ingredients: vec![],
            chain_manifests: IndexMap::new(),
            resources: ResourceStore::new(),
            extra: BTreeMap::new(),
        }
    }

    #[test]
    fn byte_identical_round_trip() {
        let a = archive();
        let wire = a.to_bytes().unwrap();
        let restored = BuilderArchive::from_bytes(&wire).unwrap();
        assert_eq!(restored, a);
        assert_eq!(restored.to_bytes().unwrap(), wire);
    }

    #[test]
    fn garbage_is_corrupt() {
        assert_matches!(
            BuilderArchive::from_bytes(b"not an archive"),
            Err(Error::CorruptArchive(_))
        );
    }

    #[test]
    fn wrong_version_is_corrupt() {
        let mut a = archive();
        a.version = 99;
        let wire = a.to_bytes().unwrap();
        assert_matches!(
            BuilderArchive::from_bytes(&wire),
            Err(Error::CorruptArchive(_))
        );
    }

    #[test]
    fn dangling_chain_reference_is_corrupt() {
        let mut a = archive();
        a.ingredients.push(Ingredient {
            title: "src".into(),
            relationship: crate::ingredient::Relationship::ParentOf,
            document_hash: sigil_core::hash(b"src"),
            thumbnail: None,
            active_manifest: Some("urn:sigil:manifest:ghost".into()),
        });
        let wire = a.to_bytes().unwrap();
        assert_matches!(
            BuilderArchive::from_bytes(&wire),
            Err(Error::CorruptArchive(_))
        );
    }
}
