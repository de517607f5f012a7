//! The manifest store: an arena of manifests with one active entry
//!
//! All manifests embedded in one asset live in a single label-indexed arena;
//! ingredients refer to entries by label rather than by owning pointers.
//! Ingredient chains are a DAG by construction (each ingredient points at a
//! frozen, already-signed store), but a hostile or corrupted store can still
//! encode a self-referential chain, so the walk below enforces a visited
//! set and a depth bound instead of trusting the input.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use sigil_core::{Error, Result};
use sigil_store::ResourceStore;

use crate::manifest::Manifest;

/// Maximum ingredient chain depth accepted before a store is rejected
pub const MAX_INGREDIENT_DEPTH: usize = 20;

/// Wire version of the serialized store
const STORE_VERSION: u32 = 1;

/// The collection of manifests embedded in one asset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestStore {
    version: u32,
    manifests: IndexMap<String, Manifest>,
    active_label: String,
    resources: ResourceStore,
}

impl ManifestStore {
    /// Assemble a store; `active` becomes the active manifest
    ///
    /// `chain` holds manifests folded in from ingredient provenance chains.
    /// Fails if the active label collides with a chain label.
    pub fn assemble(
        active: Manifest,
        chain: IndexMap<String, Manifest>,
        resources: ResourceStore,
    ) -> Result<Self> {
        let active_label = active.label.clone();
        let mut manifests = chain;
        if manifests.insert(active_label.clone(), active).is_some() {
            return Err(Error::structurally_invalid(format!(
                "active manifest label {active_label} already present in ingredient chain"
            )));
        }
        Ok(Self {
            version: STORE_VERSION,
            manifests,
            active_label,
            resources,
        })
    }

    /// The active manifest
    pub fn active_manifest(&self) -> Result<&Manifest> {
        self.manifests
            .get(&self.active_label)
            .ok_or_else(|| Error::malformed(format!("active manifest {} absent", self.active_label)))
    }

    /// Label of the active manifest
    pub fn active_label(&self) -> &str {
        &self.active_label
    }

    /// Look up a manifest by label
    pub fn get(&self, label: &str) -> Option<&Manifest> {
        self.manifests.get(label)
    }

    /// All manifests, in arena order
    pub fn manifests(&self) -> impl Iterator<Item = &Manifest> {
        self.manifests.values()
    }

    /// The arena itself, label-indexed
    pub fn arena(&self) -> &IndexMap<String, Manifest> {
        &self.manifests
    }

    /// Extracted resources, read-only
    pub fn resources(&self) -> &ResourceStore {
        &self.resources
    }

    /// Serialize to the CBOR wire form carried inside the manifest box
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_cbor::to_vec(self).map_err(|e| Error::serialization("manifest store", e))
    }

    /// Parse the wire form; structural invariants are checked
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let store: Self = serde_cbor::from_slice(bytes)
            .map_err(|e| Error::malformed(format!("manifest store decode: {e}")))?;
        if store.version != STORE_VERSION {
            return Err(Error::malformed(format!(
                "unsupported manifest store version {}",
                store.version
            )));
        }
        if !store.manifests.contains_key(&store.active_label) {
            return Err(Error::malformed(format!(
                "active manifest {} missing from store",
                store.active_label
            )));
        }
        Ok(store)
    }

    /// Reject self-referential or over-deep ingredient chains
    ///
    /// Walks ingredient links from `start` with a visited-label set and the
    /// [`MAX_INGREDIENT_DEPTH`] bound. Dangling labels are also rejected.
    pub fn check_chain(&self, start: &str) -> Result<()> {
        let mut visited = HashSet::new();
        self.walk(start, &mut visited, 0)
    }

    fn walk<'a>(
        &'a self,
        label: &'a str,
        visited: &mut HashSet<&'a str>,
        depth: usize,
    ) -> Result<()> {
        if depth > MAX_INGREDIENT_DEPTH {
            return Err(Error::structurally_invalid(format!(
                "ingredient chain exceeds depth {MAX_INGREDIENT_DEPTH}"
            )));
        }
        if !visited.insert(label) {
            return Err(Error::structurally_invalid(format!(
                "manifest {label} appears in its own ingredient chain"
            )));
        }
        let manifest = self
            .manifests
            .get(label)
            .ok_or_else(|| Error::structurally_invalid(format!("dangling manifest label {label}")))?;
        for ingredient in &manifest.ingredients {
            if let Some(nested) = &ingredient.active_manifest {
                self.walk(nested, visited, depth + 1)?;
            }
        }
        visited.remove(label);
        Ok(())
    }
}
