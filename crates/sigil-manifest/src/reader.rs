//! The reader: extract an embedded manifest store and validate it
//!
//! Validation findings are data, never failures of `validate` itself: a
//! tampered or untrusted asset still yields a complete, deterministic
//! report. Statuses are folded in ingredient order, not completion order,
//! so reports are reproducible.

use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::io::{Cursor, Read, Seek, Write};
use std::path::Path;
use tracing::{debug, warn};

use sigil_codec::CodecRegistry;
use sigil_core::{Error, Result, ValidationCode, ValidationReport};
use sigil_crypto::{ChainStatus, TrustAnchors};
use sigil_store::ResourceStore;

use crate::claim::claim_bytes;
use crate::manifest::Manifest;
use crate::store::{ManifestStore, MAX_INGREDIENT_DEPTH};

/// Read-only view over an asset's extracted manifest store
#[derive(Debug)]
pub struct Reader {
    store: ManifestStore,
    asset: Vec<u8>,
}

impl Reader {
    /// Probe whether an asset carries a manifest box at all
    ///
    /// The empty state is not an error; this is the explicit probe callers
    /// use before constructing a full reader.
    pub fn probe(asset: &[u8], content_type: &str) -> Result<bool> {
        Self::probe_with(&CodecRegistry::with_defaults(), asset, content_type)
    }

    /// Probe with a caller-supplied codec registry
    pub fn probe_with(
        registry: &CodecRegistry,
        asset: &[u8],
        content_type: &str,
    ) -> Result<bool> {
        Ok(registry.get(content_type)?.locate(asset)?.is_some())
    }

    /// Open a reader over in-memory asset bytes with a declared content type
    ///
    /// Fails with `NoManifestFound` when the asset has no provenance data.
    pub fn from_bytes(asset: &[u8], content_type: &str) -> Result<Self> {
        Self::from_bytes_with(&CodecRegistry::with_defaults(), asset, content_type)
    }

    /// Open a reader with a caller-supplied codec registry
    pub fn from_bytes_with(
        registry: &CodecRegistry,
        asset: &[u8],
        content_type: &str,
    ) -> Result<Self> {
        let codec = registry.get(content_type)?;
        let payload = codec.extract(asset)?.ok_or(Error::NoManifestFound)?;
        let store = ManifestStore::from_bytes(&payload)?;
        debug!(
            active = store.active_label(),
            manifests = store.arena().len(),
            "manifest store extracted"
        );
        Ok(Self {
            store,
            asset: asset.to_vec(),
        })
    }

    /// Open a reader over a seekable stream; content type must be declared
    pub fn from_stream<R: Read + Seek>(stream: &mut R, content_type: &str) -> Result<Self> {
        let mut asset = Vec::new();
        stream.read_to_end(&mut asset)?;
        Self::from_bytes(&asset, content_type)
    }

    /// Open a reader over a file path
    ///
    /// Paths and streams behave identically; the content type is still
    /// declared by the caller, never sniffed from the bytes.
    pub fn from_file(path: &Path, content_type: &str) -> Result<Self> {
        let asset = std::fs::read(path)?;
        Self::from_bytes(&asset, content_type)
    }

    /// The extracted manifest store
    pub fn manifest_store(&self) -> &ManifestStore {
        &self.store
    }

    /// The active manifest
    pub fn active_manifest(&self) -> Result<&Manifest> {
        self.store.active_manifest()
    }

    /// Label of the active manifest
    pub fn active_label(&self) -> &str {
        self.store.active_label()
    }

    /// Extracted resources, read-only
    pub fn resources(&self) -> &ResourceStore {
        self.store.resources()
    }

    /// Full payload bytes of an extracted resource
    pub fn resource_bytes(&self, identifier: &str) -> Result<Vec<u8>> {
        self.store.resources().bytes(identifier)
    }

    /// Stream an extracted resource into `writer` in bounded chunks
    pub fn resource_to_stream(&self, identifier: &str, writer: &mut dyn Write) -> Result<u64> {
        self.store.resources().to_stream(identifier, writer)
    }

    /// Write an extracted resource to a file
    pub fn resource_to_file(&self, identifier: &str, path: &Path) -> Result<u64> {
        let mut file = std::fs::File::create(path)?;
        self.resource_to_stream(identifier, &mut file)
    }

    /// Validate the active manifest and every ingredient transitively,
    /// using the current wall clock for certificate validity
    pub fn validate(&self, anchors: &TrustAnchors) -> ValidationReport {
        self.validate_at(anchors, Utc::now())
    }

    /// Validate against a fixed reference time (reproducible reports)
    pub fn validate_at(&self, anchors: &TrustAnchors, at: DateTime<Utc>) -> ValidationReport {
        let mut report = ValidationReport::new();
        report.active_manifest = Some(self.store.active_label().to_string());

        if let Err(e) = self.store.check_chain(self.store.active_label()) {
            report.push(
                ValidationCode::StructurallyInvalid,
                e.to_string(),
                self.store.active_label(),
            );
            return report;
        }

        let mut visited = HashSet::new();
        self.validate_manifest(
            self.store.active_label(),
            anchors,
            at,
            true,
            0,
            &mut visited,
            &mut report,
        );
        report
    }

    /// Validate one manifest; `check_binding` is true only for the active
    /// manifest, whose hash binding refers to the asset in hand
    #[allow(clippy::too_many_arguments)]
    fn validate_manifest(
        &self,
        label: &str,
        anchors: &TrustAnchors,
        at: DateTime<Utc>,
        check_binding: bool,
        depth: usize,
        visited: &mut HashSet<String>,
        report: &mut ValidationReport,
    ) {
        if depth > MAX_INGREDIENT_DEPTH || !visited.insert(label.to_string()) {
            report.push(
                ValidationCode::StructurallyInvalid,
                "ingredient recursion bound hit",
                label,
            );
            return;
        }

        let manifest = match self.store.get(label) {
            Some(m) => m,
            None => {
                report.push(
                    ValidationCode::StructurallyInvalid,
                    "manifest label does not resolve",
                    label,
                );
                return;
            }
        };

        let (binding, signature) = match (manifest.hash_binding(), manifest.signature()) {
            (Ok(b), Ok(s)) => (b, s),
            (Err(e), _) | (_, Err(e)) => {
                report.push(ValidationCode::StructurallyInvalid, e.to_string(), label);
                return;
            }
        };

        if check_binding {
            let total_len = self.asset.len() as u64;
            match binding.verify(&mut Cursor::new(&self.asset), total_len) {
                Ok(true) => {
                    report.push(ValidationCode::HashMatch, "asset digest matches binding", label);
                }
                Ok(false) => {
                    report.push(
                        ValidationCode::HashMismatch,
                        "asset bytes were modified after signing",
                        label,
                    );
                }
                Err(e) => {
                    report.push(ValidationCode::HashMismatch, e.to_string(), label);
                }
            }
        }

        match claim_bytes(manifest, binding)
            .and_then(|bytes| signature.verify(&bytes))
        {
            Ok(true) => {
                report.push(ValidationCode::SignatureValid, "claim signature verifies", label);
            }
            Ok(false) => {
                report.push(
                    ValidationCode::SignatureInvalid,
                    "claim signature does not verify",
                    label,
                );
            }
            Err(e) => {
                report.push(ValidationCode::SignatureInvalid, e.to_string(), label);
            }
        }

        match signature.cert_chain.evaluate(anchors, at) {
            Ok(ChainStatus::Trusted) => {}
            Ok(ChainStatus::Expired(detail)) => {
                report.push(ValidationCode::CertificateExpired, detail, label);
            }
            Ok(ChainStatus::Untrusted(detail)) => {
                report.push(ValidationCode::UntrustedSigner, detail, label);
            }
            Err(e) => {
                report.push(ValidationCode::UntrustedSigner, e.to_string(), label);
            }
        }

        match &signature.timestamp {
            None => {
                report.push(ValidationCode::TimestampMissing, "no timestamp token", label);
            }
            Some(token) => match token.verify(&signature.signature) {
                Ok(true) => {}
                Ok(false) => {
                    report.push(
                        ValidationCode::TimestampInvalid,
                        format!("token from {} does not verify", token.authority),
                        label,
                    );
                }
                Err(e) => {
                    report.push(ValidationCode::TimestampInvalid, e.to_string(), label);
                }
            },
        }

        // Ingredients are validated independently and folded in ingredient
        // order; an invalid ingredient is reported distinctly and does not
        // retract the parent's own signature status.
        for ingredient in &manifest.ingredients {
            let Some(nested_label) = &ingredient.active_manifest else {
                continue;
            };
            let mut nested = ValidationReport::new();
            self.validate_manifest(
                nested_label,
                anchors,
                at,
                false,
                depth + 1,
                visited,
                &mut nested,
            );
            let clean = nested.is_clean();
            report.absorb(nested);
            if clean {
                report.push(
                    ValidationCode::IngredientValid,
                    format!("ingredient {} validated", ingredient.title),
                    nested_label,
                );
            } else {
                warn!(ingredient = %ingredient.title, "ingredient reported findings");
                report.push(
                    ValidationCode::IngredientInvalid,
                    format!("ingredient {} reported findings", ingredient.title),
                    nested_label,
                );
            }
        }

        visited.remove(label);
    }
}
