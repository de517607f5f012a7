//! Sigil core: shared types for the provenance engine
//!
//! Leaf crate of the workspace. Provides the unified error enum, content
//! hashing, the byte-range/exclusion model used for tamper-evident hash
//! bindings, the generic document type carried by assertions, and the
//! validation status vocabulary.
//!
//! Nothing here performs I/O beyond streaming hash computation; signing,
//! container parsing, and storage live in the crates layered above.

pub mod document;
pub mod error;
pub mod hash;
pub mod span;
pub mod status;

pub use document::DocValue;
pub use error::{Error, Result};
pub use hash::{hash, hash_reader, Hash32, Hasher, CHUNK_SIZE, DIGEST_ALG};
pub use span::{ByteRange, ExclusionSet, HashBinding};
pub use status::{ValidationCode, ValidationReport, ValidationStatus};
