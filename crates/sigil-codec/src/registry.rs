//! Codec registry keyed by declared content type
//!
//! Selection is always by the caller's declared content type; assets are
//! never sniffed. Callers plug concrete format codecs in alongside the
//! default generic trailer codec.

use indexmap::IndexMap;
use std::sync::Arc;

use sigil_core::{Error, Result};

use crate::boxfmt::TrailerBoxCodec;
use crate::codec::ContainerCodec;

/// Registry of container codecs by content type
#[derive(Clone, Default)]
pub struct CodecRegistry {
    codecs: IndexMap<String, Arc<dyn ContainerCodec>>,
}

impl std::fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodecRegistry")
            .field("content_types", &self.codecs.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl CodecRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the generic trailer codec pre-registered
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(TrailerBoxCodec));
        registry
    }

    /// Register a codec under every content type it declares
    ///
    /// Later registrations shadow earlier ones for the same content type.
    pub fn register(&mut self, codec: Arc<dyn ContainerCodec>) {
        for ct in codec.content_types() {
            self.codecs.insert((*ct).to_string(), Arc::clone(&codec));
        }
    }

    /// Look up the codec for a declared content type
    pub fn get(&self, content_type: &str) -> Result<&Arc<dyn ContainerCodec>> {
        self.codecs
            .get(content_type)
            .ok_or_else(|| Error::UnsupportedContentType(content_type.to_string()))
    }

    /// Content types with a registered codec, in registration order
    pub fn content_types(&self) -> impl Iterator<Item = &str> {
        self.codecs.keys().map(String::as_str)
    }
}
