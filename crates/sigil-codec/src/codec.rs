//! The container codec capability
//!
//! Asset-format-specific logic for locating, inserting, and stripping the
//! manifest data box lives behind this trait. Concrete format parsers
//! (JPEG segments, PNG chunks, MP4 boxes) are external collaborators that
//! implement it; the engine ships one generic implementation, the trailer
//! box codec in [`crate::boxfmt`].

use sigil_core::{ByteRange, Result};

/// Capability to embed and extract manifest boxes in one asset family
pub trait ContainerCodec: Send + Sync {
    /// Declared content types this codec handles
    fn content_types(&self) -> &[&'static str];

    /// Find the byte extent of an existing manifest box, if any
    ///
    /// `Ok(None)` means the asset carries no manifest data — a valid empty
    /// state, not an error.
    fn locate(&self, asset: &[u8]) -> Result<Option<ByteRange>>;

    /// Extract the manifest store payload from an existing box, if any
    fn extract(&self, asset: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Produce a new asset with `manifest_bytes` embedded
    ///
    /// Replaces any box already present. The input slice is never modified;
    /// the output is a complete new asset (embedding is atomic).
    fn embed(&self, asset: &[u8], manifest_bytes: &[u8]) -> Result<Vec<u8>>;

    /// Produce a new asset with any manifest box removed
    ///
    /// Identity for assets that carry no box.
    fn strip(&self, asset: &[u8]) -> Result<Vec<u8>>;

    /// Total box size in bytes for a payload of `payload_len`
    ///
    /// Used for placeholder reservation during the sign loop.
    fn box_size(&self, payload_len: u64) -> u64;
}

impl std::fmt::Debug for dyn ContainerCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContainerCodec")
            .field("content_types", &self.content_types())
            .finish()
    }
}
