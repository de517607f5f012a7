//! The builder: accumulate a manifest definition, then sign and embed
//!
//! State machine `Empty → Populated → Signed`. All mutation is rejected
//! once signed; `sign` itself commits builder state only after the last
//! suspension point, so cancelling an in-flight sign leaves the builder
//! `Populated` and no output is produced (embedding is atomic).
//!
//! The manifest box's final size is unknown until signing completes, since
//! the claim embeds its own exclusion extent. The sign loop reserves a
//! placeholder sized from a trial serialization, then re-runs with the
//! corrected size if the serialized store disagrees — a bounded retry,
//! because the size converges once the estimate stops shifting CBOR length
//! encodings.

use indexmap::IndexMap;
use std::collections::BTreeMap;
use std::io::Cursor;
use std::path::Path;
use tracing::{debug, info};

use sigil_codec::CodecRegistry;
use sigil_core::{ByteRange, DocValue, Error, ExclusionSet, HashBinding, Result};
use sigil_crypto::{sign_claim, SignOptions, SignedClaim, Signer, TimestampAuthority};
use sigil_store::ResourceStore;

use crate::archive::{BuilderArchive, ARCHIVE_VERSION};
use crate::assertion::Assertion;
use crate::claim::claim_bytes;
use crate::ingredient::{Ingredient, IngredientDescriptor};
use crate::manifest::{new_label, Manifest};
use crate::store::ManifestStore;

/// Corrective re-sign passes allowed after the initial estimate
pub const MAX_BOX_RETRIES: u32 = 2;

/// Builder lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuilderState {
    /// No assertions, resources, or ingredients yet
    Empty,
    /// Holds definition content; signing is permitted
    Populated,
    /// A signed manifest was produced; the builder is frozen
    Signed,
}

impl BuilderState {
    fn name(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Populated => "populated",
            Self::Signed => "signed",
        }
    }
}

/// Result of a successful sign: the store bytes and the finalized asset
#[derive(Debug)]
pub struct SignOutput {
    /// Serialized manifest store (the box payload)
    pub manifest_bytes: Vec<u8>,
    /// The output asset with the box embedded
    pub asset: Vec<u8>,
    /// Non-fatal warnings (optional timestamp failure)
    pub warnings: Vec<String>,
}

/// Accumulates a manifest definition and produces a signed, embedded store
#[derive(Debug)]
pub struct Builder {
    state: BuilderState,
    label: String,
    claim_generator: String,
    assertions: Vec<Assertion>,
    ingredients: Vec<Ingredient>,
    chain_manifests: IndexMap<String, Manifest>,
    resources: ResourceStore,
    extra: BTreeMap<String, DocValue>,
    registry: CodecRegistry,
    signed_bytes: Option<Vec<u8>>,
}

impl Builder {
    /// New empty builder; the manifest label is reserved immediately so it
    /// survives archive round-trips
    pub fn new(claim_generator: impl Into<String>) -> Self {
        Self {
            state: BuilderState::Empty,
            label: new_label(),
            claim_generator: claim_generator.into(),
            assertions: Vec::new(),
            ingredients: Vec::new(),
            chain_manifests: IndexMap::new(),
            resources: ResourceStore::new(),
            extra: BTreeMap::new(),
            registry: CodecRegistry::with_defaults(),
            signed_bytes: None,
        }
    }

    /// Replace the codec registry (to plug in concrete format codecs)
    pub fn with_registry(mut self, registry: CodecRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Build from a caller-supplied JSON definition
    ///
    /// Recognized keys: `claim_generator`, `assertions` (array of
    /// `{label, data}`), and `ingredients` (descriptors, returned for the
    /// caller to ingest alongside their source assets). Unrecognized keys
    /// are preserved opaquely and re-serialized unchanged by
    /// [`Builder::definition_json`].
    pub fn from_definition(
        definition: &serde_json::Value,
    ) -> Result<(Self, Vec<IngredientDescriptor>)> {
        let doc = DocValue::from_json(definition)?;
        let map = doc.as_map().ok_or_else(|| {
            Error::structurally_invalid("manifest definition must be a JSON object")
        })?;
        let claim_generator = map
            .get("claim_generator")
            .and_then(DocValue::as_text)
            .ok_or_else(|| {
                Error::structurally_invalid("manifest definition missing claim_generator")
            })?;

        let mut builder = Self::new(claim_generator);

        if let Some(DocValue::Seq(entries)) = map.get("assertions") {
            for entry in entries {
                let label = entry
                    .get("label")
                    .and_then(DocValue::as_text)
                    .ok_or_else(|| {
                        Error::structurally_invalid("assertion entry missing label")
                    })?;
                let data = entry.get("data").cloned().unwrap_or(DocValue::Null);
                let resource = entry
                    .get("resource")
                    .and_then(DocValue::as_text)
                    .map(str::to_string);
                builder.assertions.push(Assertion {
                    label: label.to_string(),
                    data,
                    resource,
                });
            }
        }

        let mut descriptors = Vec::new();
        if let Some(serde_json::Value::Array(entries)) = definition.get("ingredients") {
            for entry in entries {
                descriptors.push(IngredientDescriptor::from_json(entry)?);
            }
        }

        for (key, value) in map {
            if !matches!(key.as_str(), "claim_generator" | "assertions" | "ingredients") {
                builder.extra.insert(key.clone(), value.clone());
            }
        }

        if !builder.assertions.is_empty() || !builder.extra.is_empty() {
            builder.state = BuilderState::Populated;
        }
        Ok((builder, descriptors))
    }

    /// Re-serialize the definition, unknown keys included and unchanged
    pub fn definition_json(&self) -> serde_json::Value {
        let mut obj = serde_json::Map::new();
        obj.insert(
            "claim_generator".into(),
            serde_json::Value::String(self.claim_generator.clone()),
        );
        obj.insert(
            "assertions".into(),
            serde_json::Value::Array(
                self.assertions
                    .iter()
                    .map(|a| serde_json::to_value(a).unwrap_or(serde_json::Value::Null))
                    .collect(),
            ),
        );
        for (key, value) in &self.extra {
            obj.insert(key.clone(), value.to_json());
        }
        serde_json::Value::Object(obj)
    }

    /// Current lifecycle state
    pub fn state(&self) -> BuilderState {
        self.state
    }

    /// The reserved manifest label
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Accumulated assertions
    pub fn assertions(&self) -> &[Assertion] {
        &self.assertions
    }

    /// Ingested ingredients
    pub fn ingredients(&self) -> &[Ingredient] {
        &self.ingredients
    }

    /// The resource store (exclusively owned until signing)
    pub fn resources(&self) -> &ResourceStore {
        &self.resources
    }

    /// Serialized store bytes retained after a successful sign
    pub fn signed_bytes(&self) -> Option<&[u8]> {
        self.signed_bytes.as_deref()
    }

    fn ensure_mutable(&self, operation: &'static str) -> Result<()> {
        match self.state {
            BuilderState::Signed => Err(Error::InvalidState {
                operation,
                state: self.state.name(),
            }),
            _ => Ok(()),
        }
    }

    /// Append an assertion
    pub fn add_assertion(&mut self, label: impl Into<String>, data: DocValue) -> Result<&mut Self> {
        self.ensure_mutable("add_assertion")?;
        self.assertions.push(Assertion::new(label, data));
        self.state = BuilderState::Populated;
        Ok(self)
    }

    /// Append an assertion that references a stored resource
    ///
    /// The identifier may be registered later; referential integrity is
    /// finally checked at sign time.
    pub fn add_assertion_with_resource(
        &mut self,
        label: impl Into<String>,
        data: DocValue,
        resource: impl Into<String>,
    ) -> Result<&mut Self> {
        self.ensure_mutable("add_assertion")?;
        self.assertions
            .push(Assertion::with_resource(label, data, resource));
        self.state = BuilderState::Populated;
        Ok(self)
    }

    /// Register an in-memory resource payload
    pub fn add_resource(
        &mut self,
        identifier: impl Into<String>,
        content_type: impl Into<String>,
        payload: impl Into<Vec<u8>>,
    ) -> Result<&mut Self> {
        self.ensure_mutable("add_resource")?;
        self.resources.put(identifier, content_type, payload)?;
        self.state = BuilderState::Populated;
        Ok(self)
    }

    /// Register a file-backed resource without reading it into memory
    pub fn add_resource_file(
        &mut self,
        identifier: impl Into<String>,
        content_type: impl Into<String>,
        path: impl Into<std::path::PathBuf>,
    ) -> Result<&mut Self> {
        self.ensure_mutable("add_resource")?;
        self.resources.put_file(identifier, content_type, path)?;
        self.state = BuilderState::Populated;
        Ok(self)
    }

    /// Ingest an ingredient: hash its bytes, fold in any provenance chain
    ///
    /// If the source asset carries an embedded manifest store, its manifests
    /// are folded into this builder's arena and the ingredient records the
    /// chain's active label. Self-referential chains are rejected here, at
    /// build time, with `StructurallyInvalid`.
    pub fn add_ingredient(
        &mut self,
        descriptor: IngredientDescriptor,
        source: &[u8],
        content_type: &str,
    ) -> Result<&mut Self> {
        self.ensure_mutable("add_ingredient")?;
        let codec = self.registry.get(content_type)?;
        let document_hash = sigil_core::hash(source);

        let active_manifest = match codec.extract(source)? {
            None => None,
            Some(payload) => {
                let nested = ManifestStore::from_bytes(&payload)?;
                nested.check_chain(nested.active_label())?;
                if nested.get(&self.label).is_some() {
                    return Err(Error::structurally_invalid(format!(
                        "ingredient {} lists the manifest under construction ({}) in its chain",
                        descriptor.title, self.label
                    )));
                }
                for (label, manifest) in nested.arena() {
                    self.chain_manifests
                        .entry(label.clone())
                        .or_insert_with(|| manifest.clone());
                }
                Some(nested.active_label().to_string())
            }
        };

        debug!(
            title = %descriptor.title,
            relationship = %descriptor.relationship,
            chained = active_manifest.is_some(),
            "ingredient ingested"
        );
        self.ingredients.push(Ingredient {
            title: descriptor.title,
            relationship: descriptor.relationship,
            document_hash,
            thumbnail: descriptor.thumbnail,
            active_manifest,
        });
        self.check_chain_structure()?;
        self.state = BuilderState::Populated;
        Ok(self)
    }

    /// Walk the would-be store to reject cycles and over-deep chains early
    fn check_chain_structure(&self) -> Result<()> {
        let draft = self.draft_manifest();
        let store = ManifestStore::assemble(
            draft,
            self.chain_manifests.clone(),
            ResourceStore::new(),
        )?;
        match store.check_chain(&self.label) {
            Err(e @ Error::StructurallyInvalid(_)) => Err(e),
            _ => Ok(()),
        }
    }

    /// Snapshot the builder into a portable archive; pure, no side effects
    pub fn to_archive(&self) -> Result<BuilderArchive> {
        self.ensure_mutable("to_archive")?;
        Ok(BuilderArchive {
            version: ARCHIVE_VERSION,
            label: self.label.clone(),
            claim_generator: self.claim_generator.clone(),
            assertions: self.assertions.clone(),
            ingredients: self.ingredients.clone(),
            chain_manifests: self.chain_manifests.clone(),
            resources: self.resources.clone(),
            extra: self.extra.clone(),
        })
    }

    /// Reconstruct an equivalent `Populated` builder from an archive
    pub fn from_archive(archive: BuilderArchive) -> Result<Self> {
        archive.check()?;
        Ok(Self {
            state: BuilderState::Populated,
            label: archive.label,
            claim_generator: archive.claim_generator,
            assertions: archive.assertions,
            ingredients: archive.ingredients,
            chain_manifests: archive.chain_manifests,
            resources: archive.resources,
            extra: archive.extra,
            registry: CodecRegistry::with_defaults(),
            signed_bytes: None,
        })
    }

    fn draft_manifest(&self) -> Manifest {
        Manifest {
            label: self.label.clone(),
            claim_generator: self.claim_generator.clone(),
            assertions: self.assertions.clone(),
            ingredients: self.ingredients.clone(),
            hash_binding: None,
            signature: None,
        }
    }

    /// Final referential-integrity check before signing
    fn check_resource_refs(&self) -> Result<()> {
        for assertion in &self.assertions {
            if let Some(id) = &assertion.resource {
                if !self.resources.contains(id) {
                    return Err(Error::UnresolvedResourceReference {
                        assertion: assertion.label.clone(),
                        identifier: id.clone(),
                    });
                }
            }
        }
        for ingredient in &self.ingredients {
            if let Some(id) = &ingredient.thumbnail {
                if !self.resources.contains(id) {
                    return Err(Error::UnresolvedResourceReference {
                        assertion: format!("ingredient {}", ingredient.title),
                        identifier: id.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Serialize a store with the given signature block; used both for the
    /// trial size estimate and for the real passes
    fn serialize_store(
        &self,
        binding: HashBinding,
        signature: SignedClaim,
    ) -> Result<Vec<u8>> {
        let mut manifest = self.draft_manifest();
        manifest.hash_binding = Some(binding);
        manifest.signature = Some(signature);
        let store = ManifestStore::assemble(
            manifest,
            self.chain_manifests.clone(),
            self.resources.clone(),
        )?;
        store.to_bytes()
    }

    /// Sign the accumulated definition over `asset` and embed the store
    ///
    /// Valid only once; transitions to `Signed` on success. On any failure
    /// the builder is unchanged and no output exists. Cancel-safe: all
    /// builder mutation happens after the final await.
    pub async fn sign(
        &mut self,
        signer: &dyn Signer,
        tsa: Option<&dyn TimestampAuthority>,
        options: &SignOptions,
        asset: &[u8],
        content_type: &str,
    ) -> Result<SignOutput> {
        if self.state == BuilderState::Signed {
            return Err(Error::AlreadySigned);
        }
        self.check_resource_refs()?;
        self.check_chain_structure()?;
        let codec = self.registry.get(content_type)?.clone();

        // Re-signing an already-provenanced asset replaces its box
        let base = codec.strip(asset)?;
        let base_len = base.len() as u64;

        // Trial pass with a zero signature of the declared length gives the
        // initial placeholder estimate
        let trial_exclusion = ExclusionSet::single(ByteRange::new(base_len, codec.box_size(0)));
        let trial_binding = HashBinding::compute(
            &mut Cursor::new(&base),
            base_len + codec.box_size(0),
            trial_exclusion,
        )?;
        let trial_signature = SignedClaim {
            alg: signer.alg(),
            signature: vec![0u8; signer.alg().signature_len()],
            cert_chain: signer.cert_chain().clone(),
            timestamp: None,
        };
        let trial_payload = self.serialize_store(trial_binding, trial_signature)?;
        // The trial store already carries a right-sized zero signature; the
        // signer's reserve only covers what the trial cannot know (timestamp
        // token), so it is added only when an authority is configured.
        let reserve = if tsa.is_some() { signer.reserve_size() } else { 0 };
        let mut estimated = codec.box_size(trial_payload.len() as u64 + reserve);

        let mut attempts = 0u32;
        let mut last_estimated = estimated;
        let mut last_actual = estimated;
        while attempts <= MAX_BOX_RETRIES {
            attempts += 1;
            let exclusions = ExclusionSet::single(ByteRange::new(base_len, estimated));
            let binding =
                HashBinding::compute(&mut Cursor::new(&base), base_len + estimated, exclusions)?;

            let draft = self.draft_manifest();
            let to_sign = claim_bytes(&draft, &binding)?;
            let outcome = sign_claim(signer, tsa, options, &to_sign).await?;

            let payload = self.serialize_store(binding, outcome.claim)?;
            let actual = codec.box_size(payload.len() as u64);

            if actual == estimated {
                let output = codec.embed(&base, &payload)?;
                info!(
                    label = %self.label,
                    box_len = actual,
                    passes = attempts,
                    "manifest signed and embedded"
                );
                self.state = BuilderState::Signed;
                self.signed_bytes = Some(payload.clone());
                return Ok(SignOutput {
                    manifest_bytes: payload,
                    asset: output,
                    warnings: outcome.warnings,
                });
            }

            debug!(
                estimated,
                actual,
                pass = attempts,
                "box size estimate corrected, re-signing"
            );
            last_estimated = estimated;
            last_actual = actual;
            estimated = actual;
        }

        Err(Error::BoxSizeDiverged {
            attempts,
            estimated: last_estimated,
            actual: last_actual,
        })
    }

    /// Sign a file on disk and write the finalized asset atomically
    ///
    /// The output is written to a temporary file in the destination
    /// directory and persisted only after the full asset is on disk; a
    /// failed build leaves no output file.
    pub async fn sign_file(
        &mut self,
        signer: &dyn Signer,
        tsa: Option<&dyn TimestampAuthority>,
        options: &SignOptions,
        input: &Path,
        output: &Path,
        content_type: &str,
    ) -> Result<Vec<u8>> {
        let asset = std::fs::read(input)?;
        let signed = self.sign(signer, tsa, options, &asset, content_type).await?;

        let dir = output.parent().unwrap_or_else(|| Path::new("."));
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        std::io::Write::write_all(&mut tmp, &signed.asset)?;
        tmp.persist(output)
            .map_err(|e| Error::Io(e.error))?;
        Ok(signed.manifest_bytes)
    }
}
