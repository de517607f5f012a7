//! Sigil manifest: build, sign, embed, extract, and validate provenance
//!
//! The top crate of the engine. A [`Builder`] accumulates a manifest
//! definition (assertions, resources, ingredients), can suspend itself into
//! a portable [`BuilderArchive`], and on `sign` produces a signed manifest
//! store embedded into the target asset through the codec layer. A
//! [`Reader`] extracts the store back out, recomputes hash bindings,
//! verifies signatures and trust, and emits a structured
//! [`sigil_core::ValidationReport`].

pub mod archive;
pub mod assertion;
pub mod builder;
pub mod claim;
pub mod ingredient;
pub mod manifest;
pub mod reader;
pub mod store;

pub use archive::BuilderArchive;
pub use assertion::{labels, Assertion};
pub use builder::{Builder, BuilderState, SignOutput, MAX_BOX_RETRIES};
pub use ingredient::{Ingredient, IngredientDescriptor, Relationship};
pub use manifest::Manifest;
pub use reader::Reader;
pub use store::{ManifestStore, MAX_INGREDIENT_DEPTH};

// Re-export the capability surfaces callers wire in
pub use sigil_codec::{CodecRegistry, ContainerCodec, TrailerBoxCodec};
pub use sigil_core::{
    DocValue, Error, Result, ValidationCode, ValidationReport, ValidationStatus,
};
pub use sigil_crypto::{
    SignOptions, Signer, SigningAlg, TimestampAuthority, TimestampPolicy, TrustAnchors,
};
