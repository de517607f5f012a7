//! Sigil codec: container embed/extract for manifest boxes
//!
//! Locates, inserts, or strips the manifest data box within an asset's
//! native byte layout. Format-specific parsing is pluggable through the
//! [`ContainerCodec`] capability, keyed by declared content type; the
//! built-in [`TrailerBoxCodec`] handles opaque byte streams.

pub mod boxfmt;
pub mod codec;
pub mod registry;

pub use boxfmt::TrailerBoxCodec;
pub use codec::ContainerCodec;
pub use registry::CodecRegistry;
