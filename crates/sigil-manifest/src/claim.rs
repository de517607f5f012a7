//! Claim construction: the to-be-signed byte form of a manifest
//!
//! The claim is a canonical CBOR document of the manifest's content plus its
//! hash binding. Canonical here means: fixed struct field order, key-ordered
//! maps inside [`sigil_core::DocValue`], and no floating wall-clock inputs —
//! so the same definition over the same asset always yields the same bytes,
//! which the archive round-trip guarantee depends on.

use serde::Serialize;

use sigil_core::{Error, HashBinding, Result};

use crate::assertion::Assertion;
use crate::ingredient::Ingredient;
use crate::manifest::Manifest;

/// Borrowed view of everything the signature covers
#[derive(Serialize)]
struct Claim<'a> {
    label: &'a str,
    claim_generator: &'a str,
    assertions: &'a [Assertion],
    ingredients: &'a [Ingredient],
    hash_binding: &'a HashBinding,
}

/// Canonical claim bytes for a manifest and its hash binding
pub fn claim_bytes(manifest: &Manifest, binding: &HashBinding) -> Result<Vec<u8>> {
    serde_cbor::to_vec(&Claim {
        label: &manifest.label,
        claim_generator: &manifest.claim_generator,
        assertions: &manifest.assertions,
        ingredients: &manifest.ingredients,
        hash_binding: binding,
    })
    .map_err(|e| Error::serialization("claim", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sigil_core::{hash, DocValue, ExclusionSet};

    fn fixture() -> (Manifest, HashBinding) {
        let binding = HashBinding {
            alg: sigil_core::DIGEST_ALG.to_string(),
            ranges: vec![],
            exclusions: ExclusionSet::new(),
            digest: hash(b"asset"),
        };
        let manifest = Manifest {
            label: "urn:sigil:manifest:test".into(),
            claim_generator: "sigil/0.1.0".into(),
            assertions: vec![Assertion::new("c2pa.actions", DocValue::map())],
            ingredients: vec![],
            hash_binding: None,
            signature: None,
        };
        (manifest, binding)
    }

    #[test]
    fn claim_bytes_are_deterministic() {
        let (m, b) = fixture();
        assert_eq!(claim_bytes(&m, &b).unwrap(), claim_bytes(&m, &b).unwrap());
    }

    #[test]
    fn claim_bytes_cover_content() {
        let (m, b) = fixture();
        let baseline = claim_bytes(&m, &b).unwrap();

        let mut edited = m.clone();
        edited.claim_generator = "someone-else/9.9".into();
        assert_ne!(claim_bytes(&edited, &b).unwrap(), baseline);

        let mut rebound = b.clone();
        rebound.digest = hash(b"tampered asset");
        assert_ne!(claim_bytes(&m, &rebound).unwrap(), baseline);
    }
}
