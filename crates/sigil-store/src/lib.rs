//! Sigil store: identifier-addressed binary resources
//!
//! Holds the thumbnails, icons, and ingredient payloads referenced by
//! manifest assertions. A builder owns its store exclusively until the
//! resources are consumed into a signed manifest; a reader owns resources
//! extracted from an asset and exposes them read-only.
//!
//! Payloads are either in-memory bytes or a file-backed handle; file-backed
//! entries stream in bounded chunks, so payloads larger than available
//! memory are supported on the `put_file`/`to_stream` path. Serializing a
//! store (for an archive or a manifest box) materializes file-backed
//! payloads, since the wire form carries the bytes themselves.

use indexmap::IndexMap;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fs::File;
use std::io::{Read, Write};
use std::path::PathBuf;
use tracing::debug;

use sigil_core::{Error, Result, CHUNK_SIZE};

/// Payload of a stored resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceData {
    /// Bytes held in memory
    Memory(Vec<u8>),
    /// A file-backed streaming handle
    File(PathBuf),
}

/// One stored resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceEntry {
    /// Declared media type of the payload
    pub content_type: String,
    /// The payload itself
    pub data: ResourceData,
}

/// Identifier-addressed resource store
///
/// Insertion order is preserved and significant: it carries through
/// serialization, which keeps archives byte-stable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceStore {
    entries: IndexMap<String, ResourceEntry>,
}

impl ResourceStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an in-memory payload
    ///
    /// Fails with `DuplicateIdentifier` if `id` is already present; use
    /// [`ResourceStore::put_overwrite`] to replace.
    pub fn put(
        &mut self,
        id: impl Into<String>,
        content_type: impl Into<String>,
        payload: impl Into<Vec<u8>>,
    ) -> Result<()> {
        let id = id.into();
        if self.entries.contains_key(&id) {
            return Err(Error::DuplicateIdentifier(id));
        }
        self.insert(id, content_type.into(), ResourceData::Memory(payload.into()));
        Ok(())
    }

    /// Register or replace an in-memory payload
    pub fn put_overwrite(
        &mut self,
        id: impl Into<String>,
        content_type: impl Into<String>,
        payload: impl Into<Vec<u8>>,
    ) {
        self.insert(
            id.into(),
            content_type.into(),
            ResourceData::Memory(payload.into()),
        );
    }

    /// Register a file-backed payload without reading it
    pub fn put_file(
        &mut self,
        id: impl Into<String>,
        content_type: impl Into<String>,
        path: impl Into<PathBuf>,
    ) -> Result<()> {
        let id = id.into();
        if self.entries.contains_key(&id) {
            return Err(Error::DuplicateIdentifier(id));
        }
        self.insert(id, content_type.into(), ResourceData::File(path.into()));
        Ok(())
    }

    fn insert(&mut self, id: String, content_type: String, data: ResourceData) {
        debug!(id = %id, content_type = %content_type, "resource registered");
        self.entries.insert(id, ResourceEntry { content_type, data });
    }

    /// True if `id` is registered
    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Registered identifiers in insertion order
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Number of stored resources
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the store holds nothing
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Declared content type of a resource
    pub fn content_type(&self, id: &str) -> Result<&str> {
        self.entry(id).map(|e| e.content_type.as_str())
    }

    /// Full payload bytes; materializes file-backed entries
    pub fn bytes(&self, id: &str) -> Result<Vec<u8>> {
        match &self.entry(id)?.data {
            ResourceData::Memory(bytes) => Ok(bytes.clone()),
            ResourceData::File(path) => Ok(std::fs::read(path)?),
        }
    }

    /// Copy the payload into `writer` in bounded chunks
    ///
    /// Returns the number of bytes written; never truncates silently.
    pub fn to_stream(&self, id: &str, writer: &mut dyn Write) -> Result<u64> {
        match &self.entry(id)?.data {
            ResourceData::Memory(bytes) => {
                writer.write_all(bytes)?;
                Ok(bytes.len() as u64)
            }
            ResourceData::File(path) => {
                let mut file = File::open(path)?;
                let mut buf = vec![0u8; CHUNK_SIZE];
                let mut written = 0u64;
                loop {
                    let n = file.read(&mut buf)?;
                    if n == 0 {
                        break;
                    }
                    writer.write_all(&buf[..n])?;
                    written += n as u64;
                }
                Ok(written)
            }
        }
    }

    fn entry(&self, id: &str) -> Result<&ResourceEntry> {
        self.entries
            .get(id)
            .ok_or_else(|| Error::NotFound(format!("resource {id}")))
    }
}

// Wire form: map of id -> { content_type, data bytes }. File-backed entries
// are read in full here; the manifest box has to carry the bytes regardless.

#[derive(Serialize)]
struct PortableEntryRef<'a> {
    content_type: &'a str,
    #[serde(with = "serde_bytes")]
    data: &'a [u8],
}

#[derive(Deserialize)]
struct PortableEntry {
    content_type: String,
    #[serde(with = "serde_bytes")]
    data: Vec<u8>,
}

impl Serialize for ResourceStore {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        use serde::ser::Error as _;
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (id, entry) in &self.entries {
            let owned;
            let data: &[u8] = match &entry.data {
                ResourceData::Memory(bytes) => bytes,
                ResourceData::File(path) => {
                    owned = std::fs::read(path).map_err(S::Error::custom)?;
                    &owned
                }
            };
            map.serialize_entry(
                id,
                &PortableEntryRef {
                    content_type: &entry.content_type,
                    data,
                },
            )?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ResourceStore {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct StoreVisitor;

        impl<'de> Visitor<'de> for StoreVisitor {
            type Value = ResourceStore;

            fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str("a map of resource identifiers to entries")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut access: A,
            ) -> std::result::Result<Self::Value, A::Error> {
                let mut store = ResourceStore::new();
                while let Some((id, entry)) = access.next_entry::<String, PortableEntry>()? {
                    store.insert(
                        id,
                        entry.content_type,
                        ResourceData::Memory(entry.data),
                    );
                }
                Ok(store)
            }
        }

        deserializer.deserialize_map(StoreVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn put_and_get() {
        let mut store = ResourceStore::new();
        store.put("thumb", "image/jpeg", vec![1, 2, 3]).unwrap();
        assert!(store.contains("thumb"));
        assert_eq!(store.bytes("thumb").unwrap(), vec![1, 2, 3]);
        assert_eq!(store.content_type("thumb").unwrap(), "image/jpeg");
    }

    #[test]
    fn duplicate_requires_explicit_overwrite() {
        let mut store = ResourceStore::new();
        store.put("thumb", "image/jpeg", vec![1]).unwrap();
        assert_matches!(
            store.put("thumb", "image/jpeg", vec![2]),
            Err(Error::DuplicateIdentifier(_))
        );
        store.put_overwrite("thumb", "image/png", vec![2]);
        assert_eq!(store.bytes("thumb").unwrap(), vec![2]);
    }

    #[test]
    fn missing_identifier_is_not_found() {
        let store = ResourceStore::new();
        assert_matches!(store.bytes("absent"), Err(Error::NotFound(_)));
    }

    #[test]
    fn file_backed_streaming_round_trip() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let payload = vec![0x5Au8; CHUNK_SIZE * 2 + 17];
        file.write_all(&payload).unwrap();

        let mut store = ResourceStore::new();
        store
            .put_file("big", "application/octet-stream", file.path())
            .unwrap();

        let mut out = Vec::new();
        let written = store.to_stream("big", &mut out).unwrap();
        assert_eq!(written, payload.len() as u64);
        assert_eq!(out, payload);
    }

    #[test]
    fn serialization_round_trips_and_preserves_order() {
        let mut store = ResourceStore::new();
        store.put("z-last-name", "text/plain", b"z".to_vec()).unwrap();
        store.put("a-first-name", "text/plain", b"a".to_vec()).unwrap();

        let wire = serde_cbor::to_vec(&store).unwrap();
        let restored: ResourceStore = serde_cbor::from_slice(&wire).unwrap();
        assert_eq!(
            restored.ids().collect::<Vec<_>>(),
            vec!["z-last-name", "a-first-name"]
        );
        assert_eq!(restored.bytes("z-last-name").unwrap(), b"z".to_vec());
        assert_eq!(serde_cbor::to_vec(&restored).unwrap(), wire);
    }
}
