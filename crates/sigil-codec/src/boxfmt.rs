//! Generic trailer box codec
//!
//! Appends the manifest box after the asset's own bytes, so it works for any
//! format that tolerates trailing data (and for opaque blobs). Wire layout:
//!
//! ```text
//! original asset bytes
//! header:  magic "SGBX" | version u32 BE | payload_len u64 BE
//! payload: manifest store bytes
//! footer:  total_box_len u64 BE | magic "SGBX"
//! ```
//!
//! `locate` reads the fixed-size footer from the end of the asset, so no
//! scan of the payload is needed and payload bytes that happen to contain
//! the magic are harmless. `strip(embed(a, m)) == a` byte-identically.

use tracing::debug;

use sigil_core::{ByteRange, Error, Result};

use crate::codec::ContainerCodec;

const MAGIC: &[u8; 4] = b"SGBX";
const VERSION: u32 = 1;
const HEADER_LEN: u64 = 16;
const FOOTER_LEN: u64 = 12;

/// Trailer box codec for content types without a dedicated parser
#[derive(Debug, Default, Clone, Copy)]
pub struct TrailerBoxCodec;

impl TrailerBoxCodec {
    /// Content types the generic codec claims by default
    pub const CONTENT_TYPES: &'static [&'static str] = &["application/octet-stream"];
}

fn read_u64(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(bytes);
    u64::from_be_bytes(buf)
}

fn read_u32(bytes: &[u8]) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(bytes);
    u32::from_be_bytes(buf)
}

impl ContainerCodec for TrailerBoxCodec {
    fn content_types(&self) -> &[&'static str] {
        Self::CONTENT_TYPES
    }

    fn locate(&self, asset: &[u8]) -> Result<Option<ByteRange>> {
        let len = asset.len() as u64;
        if len < FOOTER_LEN {
            return Ok(None);
        }
        let tail = &asset[(len - 4) as usize..];
        if tail != MAGIC {
            return Ok(None);
        }
        let total = read_u64(&asset[(len - FOOTER_LEN) as usize..(len - 4) as usize]);
        if total < HEADER_LEN + FOOTER_LEN || total > len {
            return Err(Error::malformed(format!(
                "box footer declares {total} bytes, asset has {len}"
            )));
        }
        let start = len - total;
        let header = &asset[start as usize..(start + HEADER_LEN) as usize];
        if &header[..4] != MAGIC {
            return Err(Error::malformed("box header magic missing"));
        }
        let version = read_u32(&header[4..8]);
        if version != VERSION {
            return Err(Error::malformed(format!(
                "unsupported box version {version}"
            )));
        }
        let payload_len = read_u64(&header[8..16]);
        if total != HEADER_LEN + payload_len + FOOTER_LEN {
            return Err(Error::malformed(format!(
                "box header payload length {payload_len} disagrees with footer total {total}"
            )));
        }
        Ok(Some(ByteRange::new(start, total)))
    }

    fn extract(&self, asset: &[u8]) -> Result<Option<Vec<u8>>> {
        match self.locate(asset)? {
            None => Ok(None),
            Some(range) => {
                let payload_start = (range.start + HEADER_LEN) as usize;
                let payload_end = (range.end() - FOOTER_LEN) as usize;
                Ok(Some(asset[payload_start..payload_end].to_vec()))
            }
        }
    }

    fn embed(&self, asset: &[u8], manifest_bytes: &[u8]) -> Result<Vec<u8>> {
        let base = self.strip(asset)?;
        let payload_len = manifest_bytes.len() as u64;
        let total = self.box_size(payload_len);
        debug!(
            asset_len = base.len(),
            box_len = total,
            "embedding manifest box"
        );

        let mut out = Vec::with_capacity(base.len() + total as usize);
        out.extend_from_slice(&base);
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&VERSION.to_be_bytes());
        out.extend_from_slice(&payload_len.to_be_bytes());
        out.extend_from_slice(manifest_bytes);
        out.extend_from_slice(&total.to_be_bytes());
        out.extend_from_slice(MAGIC);
        Ok(out)
    }

    fn strip(&self, asset: &[u8]) -> Result<Vec<u8>> {
        match self.locate(asset)? {
            None => Ok(asset.to_vec()),
            Some(range) => Ok(asset[..range.start as usize].to_vec()),
        }
    }

    fn box_size(&self, payload_len: u64) -> u64 {
        HEADER_LEN + payload_len + FOOTER_LEN
    }
}
