//! Byte ranges, exclusion sets, and hash bindings
//!
//! A hash binding is the digest of an asset's bytes with defined exclusions,
//! at minimum the region occupied by the manifest box itself (hashing that
//! region would be self-referential). The binding records both the covered
//! ranges and the exclusions so a validator can recompute the digest without
//! re-deriving the layout.

use serde::{Deserialize, Serialize};
use std::io::{Read, Seek, SeekFrom};

use crate::error::{Error, Result};
use crate::hash::{Hash32, Hasher, CHUNK_SIZE, DIGEST_ALG};

/// Half-open byte span `[start, start + len)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ByteRange {
    /// Offset of the first byte
    pub start: u64,
    /// Length in bytes
    pub len: u64,
}

impl ByteRange {
    /// Construct a range from offset and length
    pub fn new(start: u64, len: u64) -> Self {
        Self { start, len }
    }

    /// One past the last byte
    pub fn end(&self) -> u64 {
        self.start + self.len
    }

    /// True if `other` lies entirely within this range
    pub fn contains(&self, other: &ByteRange) -> bool {
        other.start >= self.start && other.end() <= self.end()
    }

    /// True if the two ranges share any byte
    pub fn overlaps(&self, other: &ByteRange) -> bool {
        self.start < other.end() && other.start < self.end()
    }
}

/// A normalized set of excluded byte ranges
///
/// Ranges are kept sorted and merged; empty ranges are dropped on insert.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExclusionSet {
    ranges: Vec<ByteRange>,
}

impl ExclusionSet {
    /// Empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// A set containing a single range
    pub fn single(range: ByteRange) -> Self {
        let mut set = Self::new();
        set.add(range);
        set
    }

    /// Insert a range, merging with any neighbors it touches
    pub fn add(&mut self, range: ByteRange) {
        if range.len == 0 {
            return;
        }
        self.ranges.push(range);
        self.ranges.sort_by_key(|r| r.start);
        let mut merged: Vec<ByteRange> = Vec::with_capacity(self.ranges.len());
        for r in self.ranges.drain(..) {
            match merged.last_mut() {
                Some(last) if r.start <= last.end() => {
                    let end = last.end().max(r.end());
                    last.len = end - last.start;
                }
                _ => merged.push(r),
            }
        }
        self.ranges = merged;
    }

    /// The normalized ranges, sorted by start offset
    pub fn ranges(&self) -> &[ByteRange] {
        &self.ranges
    }

    /// True if `range` is fully contained by some excluded range
    pub fn covers(&self, range: &ByteRange) -> bool {
        self.ranges.iter().any(|r| r.contains(range))
    }

    /// The included ranges: everything in `[0, total_len)` not excluded
    ///
    /// Relies on the decode-time invariant that no stored range overflows
    /// `start + len`; the wire decoder rejects such ranges.
    pub fn complement(&self, total_len: u64) -> Vec<ByteRange> {
        let mut included = Vec::new();
        let mut cursor = 0u64;
        for r in &self.ranges {
            let start = r.start.min(total_len);
            if start > cursor {
                included.push(ByteRange::new(cursor, start - cursor));
            }
            cursor = cursor.max(r.end().min(total_len));
        }
        if cursor < total_len {
            included.push(ByteRange::new(cursor, total_len - cursor));
        }
        included
    }
}

// Manifest stores are attacker-controlled input, so the wire form is
// validated here: a range whose end overflows u64 would wrap inside
// `complement` and hash the wrong bytes. Decoding also re-normalizes, since
// the derived form would accept an unsorted or overlapping list.
impl<'de> Deserialize<'de> for ExclusionSet {
    fn deserialize<D: serde::Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        use serde::de::Error as _;

        #[derive(Deserialize)]
        struct Wire {
            ranges: Vec<ByteRange>,
        }

        let wire = Wire::deserialize(deserializer)?;
        let mut set = ExclusionSet::new();
        for range in wire.ranges {
            if range.start.checked_add(range.len).is_none() {
                return Err(D::Error::custom(format!(
                    "exclusion range at offset {} overflows u64",
                    range.start
                )));
            }
            set.add(range);
        }
        Ok(set)
    }
}

/// Digest of an asset's bytes over defined ranges with defined exclusions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashBinding {
    /// Digest algorithm wire name
    pub alg: String,
    /// Byte ranges the digest covers, in offset order
    pub ranges: Vec<ByteRange>,
    /// Byte ranges excluded from hashing
    pub exclusions: ExclusionSet,
    /// The resulting digest
    pub digest: Hash32,
}

impl HashBinding {
    /// Compute a binding over `[0, total_len)` of `reader`, skipping
    /// `exclusions`
    ///
    /// Streams in bounded chunks; assets larger than memory are fine.
    pub fn compute<R: Read + Seek>(
        reader: &mut R,
        total_len: u64,
        exclusions: ExclusionSet,
    ) -> Result<Self> {
        let ranges = exclusions.complement(total_len);
        let digest = digest_ranges(reader, &ranges)?;
        Ok(Self {
            alg: DIGEST_ALG.to_string(),
            ranges,
            exclusions,
            digest,
        })
    }

    /// Recompute the digest from `reader` per this binding's own exclusion
    /// record and compare
    ///
    /// Returns `Ok(true)` on a match. The recorded `ranges` are not trusted;
    /// they are re-derived from the exclusions and the current asset length
    /// so a forged range list cannot mask appended bytes.
    pub fn verify<R: Read + Seek>(&self, reader: &mut R, total_len: u64) -> Result<bool> {
        if self.alg != DIGEST_ALG {
            return Err(Error::malformed(format!(
                "unsupported digest algorithm {}",
                self.alg
            )));
        }
        let ranges = self.exclusions.complement(total_len);
        let digest = digest_ranges(reader, &ranges)?;
        Ok(digest == self.digest)
    }
}

fn digest_ranges<R: Read + Seek>(reader: &mut R, ranges: &[ByteRange]) -> Result<Hash32> {
    let mut hasher = Hasher::new();
    let mut buf = vec![0u8; CHUNK_SIZE];
    for range in ranges {
        reader.seek(SeekFrom::Start(range.start))?;
        let mut remaining = range.len;
        while remaining > 0 {
            let want = remaining.min(buf.len() as u64) as usize;
            let n = reader.read(&mut buf[..want])?;
            if n == 0 {
                return Err(Error::malformed(format!(
                    "asset truncated inside hashed range at offset {}",
                    range.end() - remaining
                )));
            }
            hasher.update(&buf[..n]);
            remaining -= n as u64;
        }
    }
    Ok(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn exclusions_merge_and_sort() {
        let mut set = ExclusionSet::new();
        set.add(ByteRange::new(10, 5));
        set.add(ByteRange::new(0, 4));
        set.add(ByteRange::new(14, 6));
        assert_eq!(
            set.ranges(),
            &[ByteRange::new(0, 4), ByteRange::new(10, 10)]
        );
    }

    #[test]
    fn complement_covers_gaps_and_tail() {
        let mut set = ExclusionSet::new();
        set.add(ByteRange::new(2, 3));
        let included = set.complement(10);
        assert_eq!(included, vec![ByteRange::new(0, 2), ByteRange::new(5, 5)]);
    }

    #[test]
    fn binding_skips_excluded_bytes() {
        let data = b"aaaaXXXXbbbb".to_vec();
        let excl = ExclusionSet::single(ByteRange::new(4, 4));
        let binding =
            HashBinding::compute(&mut Cursor::new(&data), data.len() as u64, excl).unwrap();
        assert_eq!(binding.digest, crate::hash::hash(b"aaaabbbb"));
        assert!(binding
            .verify(&mut Cursor::new(&data), data.len() as u64)
            .unwrap());

        // Mutating an excluded byte does not disturb the binding
        let mut tampered_box = data.clone();
        tampered_box[5] = b'Y';
        assert!(binding
            .verify(&mut Cursor::new(&tampered_box), data.len() as u64)
            .unwrap());

        // Mutating a covered byte does
        let mut tampered = data;
        tampered[0] = b'z';
        assert!(!binding
            .verify(&mut Cursor::new(&tampered), tampered.len() as u64)
            .unwrap());
    }

    #[test]
    fn decode_rejects_overflowing_ranges() {
        let hostile = serde_json::json!({
            "ranges": [{"start": u64::MAX, "len": 2}]
        });
        assert!(serde_json::from_value::<ExclusionSet>(hostile).is_err());

        // A binding wrapping such a range is rejected before verify can run
        let binding = serde_json::json!({
            "alg": "sha256",
            "ranges": [],
            "exclusions": {"ranges": [{"start": u64::MAX, "len": 2}]},
            "digest": crate::hash::hash(b"asset").as_bytes().to_vec(),
        });
        assert!(serde_json::from_value::<HashBinding>(binding).is_err());
    }

    #[test]
    fn decode_normalizes_unordered_ranges() {
        let wire = serde_json::json!({
            "ranges": [
                {"start": 10, "len": 5},
                {"start": 0, "len": 4},
                {"start": 14, "len": 6}
            ]
        });
        let set: ExclusionSet = serde_json::from_value(wire).unwrap();
        assert_eq!(
            set.ranges(),
            &[ByteRange::new(0, 4), ByteRange::new(10, 10)]
        );
    }

    #[test]
    fn covers_requires_full_containment() {
        let set = ExclusionSet::single(ByteRange::new(100, 50));
        assert!(set.covers(&ByteRange::new(100, 50)));
        assert!(set.covers(&ByteRange::new(110, 10)));
        assert!(!set.covers(&ByteRange::new(90, 20)));
    }
}
