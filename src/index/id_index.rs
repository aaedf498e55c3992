//! ID Index - sorted, memory-mapped (id → offset) segments
//!
//! Layout:
//! ```text
//! ┌─────────────────────────────────────────┐
//! │ HEADER (64 bytes)                       │
//! │   magic: [u8; 4] = "GIDX"               │
//! │   version: u16                          │
//! │   reserved: u16                         │
//! │   container_checksum: u32               │
//! │   body_checksum: u32                    │
//! │   counts: [u64; 3] (node, way, relation)│
//! │   reserved: [u8; 20]                    │
//! │   checksum: u32 (CRC32 of bytes 0..60)  │
//! ├─────────────────────────────────────────┤
//! │ SEGMENTS                                │
//! │   node, way, relation; each entry:      │
//! │     id: u64                             │
//! │     offset: u64                         │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Performance
//! - Open: O(n), every entry is checked against the record it points at
//! - Lookup: O(log n) binary search in one type's segment
//!
//! # Validation
//! An index that is present is trusted without a fallback scan, so open
//! rejects anything that could produce a wrong answer: unsorted or
//! duplicate IDs, offsets outside their region, entry counts that differ
//! from the container (partial index), a container checksum that differs
//! from the one the index was built against (stale index), or an entry
//! that does not name the record starting at its offset.

use crate::index::IndexEntry;
use crate::storage::bytes::{u16_at, u32_at, u64_at};
use crate::storage::container::Container;
use crate::storage::error::{StoreError, StoreResult};
use crate::storage::types::{ByteRange, FeatureKey, FeatureType};
use memmap2::Mmap;
use std::cmp::Ordering;
use std::fs::File;
use std::path::{Path, PathBuf};

use super::IndexLayout;

/// Magic bytes for index file identification
pub const INDEX_MAGIC: [u8; 4] = *b"GIDX";

/// Current index format version
pub const INDEX_VERSION: u16 = 1;

/// Header size in bytes
pub const INDEX_HEADER_SIZE: usize = 64;

/// Size of one (id, offset) entry
pub const ENTRY_SIZE: usize = 16;

const COUNTS_OFFSET: usize = 16;
const CHECKSUM_OFFSET: usize = 60;

/// Index file header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexHeader {
    pub version: u16,
    /// Header checksum of the container this index was built from
    pub container_checksum: u32,
    /// CRC32 over all segment bytes
    pub body_checksum: u32,
    /// Entries per segment, indexed by `FeatureType::index`
    pub counts: [u64; FeatureType::COUNT],
    pub checksum: u32,
}

impl IndexHeader {
    pub fn new(container_checksum: u32, body_checksum: u32, counts: [u64; FeatureType::COUNT]) -> Self {
        Self {
            version: INDEX_VERSION,
            container_checksum,
            body_checksum,
            counts,
            checksum: 0,
        }
    }

    pub fn total_entries(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// Serialize header to bytes, filling in the checksum
    pub fn to_bytes(&mut self) -> [u8; INDEX_HEADER_SIZE] {
        let mut buf = [0u8; INDEX_HEADER_SIZE];

        buf[0..4].copy_from_slice(&INDEX_MAGIC);
        buf[4..6].copy_from_slice(&self.version.to_le_bytes());
        buf[8..12].copy_from_slice(&self.container_checksum.to_le_bytes());
        buf[12..16].copy_from_slice(&self.body_checksum.to_le_bytes());
        for (i, count) in self.counts.iter().enumerate() {
            let base = COUNTS_OFFSET + i * 8;
            buf[base..base + 8].copy_from_slice(&count.to_le_bytes());
        }

        self.checksum = crc32fast::hash(&buf[0..CHECKSUM_OFFSET]);
        buf[CHECKSUM_OFFSET..INDEX_HEADER_SIZE].copy_from_slice(&self.checksum.to_le_bytes());

        buf
    }

    /// Parse header from bytes
    pub fn from_bytes(buf: &[u8]) -> StoreResult<Self> {
        if buf.len() < INDEX_HEADER_SIZE {
            return Err(StoreError::CorruptIndex(format!(
                "file of {} bytes is smaller than the {} byte header",
                buf.len(),
                INDEX_HEADER_SIZE
            )));
        }

        if buf[0..4] != INDEX_MAGIC {
            return Err(StoreError::CorruptIndex(format!("Invalid magic: {:?}", &buf[0..4])));
        }

        let stored_checksum = u32_at(buf, CHECKSUM_OFFSET).unwrap_or_default();
        let computed_checksum = crc32fast::hash(&buf[0..CHECKSUM_OFFSET]);
        if stored_checksum != computed_checksum {
            return Err(StoreError::CorruptIndex(format!(
                "Header checksum mismatch: stored={}, computed={}",
                stored_checksum, computed_checksum
            )));
        }

        let version = u16_at(buf, 4).unwrap_or_default();
        if version != INDEX_VERSION {
            return Err(StoreError::CorruptIndex(format!(
                "Unsupported version: {} (supported: {})",
                version, INDEX_VERSION
            )));
        }

        let mut counts = [0u64; FeatureType::COUNT];
        for (i, count) in counts.iter_mut().enumerate() {
            *count = u64_at(buf, COUNTS_OFFSET + i * 8).unwrap_or_default();
        }

        Ok(Self {
            version,
            container_checksum: u32_at(buf, 8).unwrap_or_default(),
            body_checksum: u32_at(buf, 12).unwrap_or_default(),
            counts,
            checksum: stored_checksum,
        })
    }
}

/// Read-only, validated ID index
pub struct IdIndex {
    path: PathBuf,
    header: IndexHeader,
    /// Segment byte ranges, indexed by `FeatureType::index`
    segments: [ByteRange; FeatureType::COUNT],
    mmap: Mmap,
}

impl IdIndex {
    /// Open the index next to `base_path`, if one exists
    ///
    /// Absence is `Ok(None)`. A present but invalid index is an error,
    /// never a silently degraded index.
    pub fn open_if_present(
        base_path: &Path,
        layout: &IndexLayout,
        container: &Container,
    ) -> StoreResult<Option<Self>> {
        let dir = layout.index_dir(base_path);
        match std::fs::metadata(&dir) {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => {
                tracing::warn!(path = %dir.display(), "Index location is not a directory, ignoring");
                return Ok(None);
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %dir.display(), "No index directory");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        }

        let path = dir.join(&layout.file_name);
        if !path.exists() {
            tracing::debug!(path = %path.display(), "Index directory has no ID index");
            return Ok(None);
        }

        Self::open(&path, container).map(Some)
    }

    /// Open and validate an index file against its container
    pub fn open(path: impl AsRef<Path>, container: &Container) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        let file_len = file.metadata()?.len();

        if file_len < INDEX_HEADER_SIZE as u64 {
            return Err(StoreError::CorruptIndex(format!(
                "file of {} bytes is smaller than the {} byte header",
                file_len, INDEX_HEADER_SIZE
            )));
        }

        // SAFETY: index files are replaced by rename, never rewritten in place.
        let mmap = unsafe { Mmap::map(&file)? };
        let header = IndexHeader::from_bytes(&mmap)?;

        let expected_len = header
            .total_entries()
            .checked_mul(ENTRY_SIZE as u64)
            .and_then(|body| body.checked_add(INDEX_HEADER_SIZE as u64));
        if expected_len != Some(mmap.len() as u64) {
            return Err(StoreError::CorruptIndex(format!(
                "file is {} bytes but header declares {} entries",
                mmap.len(),
                header.total_entries()
            )));
        }

        let body_checksum = crc32fast::hash(&mmap[INDEX_HEADER_SIZE..]);
        if body_checksum != header.body_checksum {
            return Err(StoreError::CorruptIndex(format!(
                "Body checksum mismatch: stored={}, computed={}",
                header.body_checksum, body_checksum
            )));
        }

        if header.container_checksum != container.header().checksum {
            return Err(StoreError::CorruptIndex(format!(
                "index was built for another container (checksum {} != {}); rebuild it",
                header.container_checksum,
                container.header().checksum
            )));
        }

        let mut segments = [ByteRange::default(); FeatureType::COUNT];
        let mut pos = INDEX_HEADER_SIZE;
        for &t in FeatureType::all() {
            let count = header.counts[t.index()];
            if count != container.record_count(t) {
                return Err(StoreError::CorruptIndex(format!(
                    "{} segment has {} entries but the container has {} records",
                    t,
                    count,
                    container.record_count(t)
                )));
            }
            // Total size already matched the mapped length
            let len = count as usize * ENTRY_SIZE;
            segments[t.index()] = ByteRange::new(pos, pos + len);
            pos += len;
        }

        let index = Self {
            path,
            header,
            segments,
            mmap,
        };
        for &t in FeatureType::all() {
            index.validate_segment(t, container)?;
        }

        tracing::debug!(
            path = %index.path.display(),
            entries = index.header.total_entries(),
            "Opened ID index"
        );

        Ok(index)
    }

    /// Check one segment against the records of its region
    ///
    /// Entries must be strictly increasing, and entry `i` must name exactly
    /// the `i`-th record of the region in ID order, at that record's start
    /// offset. This binds the index to the container's content, not just
    /// its header.
    fn validate_segment(&self, feature_type: FeatureType, container: &Container) -> StoreResult<()> {
        let region = container.region_for(feature_type);

        let mut records = Vec::with_capacity(container.record_count(feature_type) as usize);
        for record in container.iter_records(feature_type) {
            let record = record?;
            records.push((record.id(), record.offset));
        }
        // Regions are written in ID order; this only reorders foreign files
        records.sort_unstable();

        let mut prev: Option<u64> = None;
        for (i, (entry, &(record_id, record_offset))) in
            self.entries(feature_type).zip(records.iter()).enumerate()
        {
            let id = entry.key.id;
            if let Some(prev) = prev {
                if id <= prev {
                    return Err(StoreError::CorruptIndex(format!(
                        "{} segment is not strictly increasing at entry {}: {} then {}",
                        feature_type, i, prev, id
                    )));
                }
            }
            prev = Some(id);

            let in_region = usize::try_from(entry.offset).map_or(false, |o| region.contains(o));
            if !in_region {
                return Err(StoreError::CorruptIndex(format!(
                    "{} offset {} lies outside the {} region [{}, {})",
                    entry.key, entry.offset, feature_type, region.start, region.end
                )));
            }

            if id != record_id || entry.offset != record_offset {
                return Err(StoreError::CorruptIndex(format!(
                    "{} at offset {} does not match container record {} at offset {}; rebuild the index",
                    entry.key,
                    entry.offset,
                    FeatureKey::new(feature_type, record_id),
                    record_offset
                )));
            }
        }

        Ok(())
    }

    fn segment(&self, feature_type: FeatureType) -> &[u8] {
        &self.mmap[self.segments[feature_type.index()].as_range()]
    }

    /// Offset of the record for `key`, if indexed
    pub fn lookup(&self, key: FeatureKey) -> Option<u64> {
        let segment = self.segment(key.feature_type);
        let mut lo = 0usize;
        let mut hi = segment.len() / ENTRY_SIZE;

        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let id = u64_at(segment, mid * ENTRY_SIZE)?;
            match id.cmp(&key.id) {
                Ordering::Less => lo = mid + 1,
                Ordering::Greater => hi = mid,
                Ordering::Equal => return u64_at(segment, mid * ENTRY_SIZE + 8),
            }
        }

        None
    }

    pub fn contains(&self, key: FeatureKey) -> bool {
        self.lookup(key).is_some()
    }

    /// Number of entries for one type
    pub fn len(&self, feature_type: FeatureType) -> u64 {
        self.header.counts[feature_type.index()]
    }

    pub fn is_empty(&self) -> bool {
        self.header.total_entries() == 0
    }

    /// Entries of one segment in on-disk order
    pub fn entries(&self, feature_type: FeatureType) -> impl Iterator<Item = IndexEntry> + '_ {
        self.segment(feature_type)
            .chunks_exact(ENTRY_SIZE)
            .filter_map(move |chunk| {
                let id = u64_at(chunk, 0)?;
                let offset = u64_at(chunk, 8)?;
                Some(IndexEntry::new(FeatureKey::new(feature_type, id), offset))
            })
    }

    pub fn header(&self) -> &IndexHeader {
        &self.header
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl std::fmt::Debug for IdIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdIndex")
            .field("path", &self.path)
            .field("header", &self.header)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{build_index, write_index_file};
    use crate::storage::builder::ContainerBuilder;
    use tempfile::{tempdir, TempDir};

    fn sample(ids: &[u64]) -> (TempDir, PathBuf, Container) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sample.gol");

        let mut builder = ContainerBuilder::new();
        for &id in ids {
            builder.add(FeatureKey::way(id), vec![], &[("ref", "x")]).unwrap();
        }
        builder.add(FeatureKey::node(4416197078), vec![], &[]).unwrap();
        builder.write(&path).unwrap();

        let container = Container::open(&path).unwrap();
        (dir, path, container)
    }

    fn way_entries(container: &Container) -> Vec<IndexEntry> {
        container
            .iter_records(FeatureType::Way)
            .map(|r| {
                let r = r.unwrap();
                IndexEntry::new(r.key, r.offset)
            })
            .collect()
    }

    fn node_entries(container: &Container) -> Vec<IndexEntry> {
        container
            .iter_records(FeatureType::Node)
            .map(|r| {
                let r = r.unwrap();
                IndexEntry::new(r.key, r.offset)
            })
            .collect()
    }

    #[test]
    fn test_header_roundtrip() {
        let mut header = IndexHeader::new(0xDEAD_BEEF, 42, [1, 2, 3]);
        let bytes = header.to_bytes();
        let restored = IndexHeader::from_bytes(&bytes).unwrap();
        assert_eq!(restored, header);
        assert_eq!(restored.total_entries(), 6);
    }

    #[test]
    fn test_absent_index_is_none() {
        let (_dir, path, container) = sample(&[1, 2, 3]);
        let index = IdIndex::open_if_present(&path, &IndexLayout::default(), &container).unwrap();
        assert!(index.is_none());
    }

    #[test]
    fn test_empty_index_dir_is_none() {
        let (_dir, path, container) = sample(&[1]);
        let layout = IndexLayout::default();
        std::fs::create_dir_all(layout.index_dir(&path)).unwrap();

        let index = IdIndex::open_if_present(&path, &layout, &container).unwrap();
        assert!(index.is_none());
    }

    #[test]
    fn test_lookup_hits_and_misses() {
        let ids = [0u64, 5, 626967072, u64::MAX];
        let (_dir, path, container) = sample(&ids);
        let layout = IndexLayout::default();
        build_index(&container, &layout).unwrap();

        let index = IdIndex::open_if_present(&path, &layout, &container)
            .unwrap()
            .expect("index should be present");

        for entry in way_entries(&container) {
            assert_eq!(index.lookup(entry.key), Some(entry.offset));
        }

        assert_eq!(index.lookup(FeatureKey::way(1)), None);
        assert_eq!(index.lookup(FeatureKey::way(626967073)), None);
        assert_eq!(index.lookup(FeatureKey::way(u64::MAX - 1)), None);
        // Same numeric ID, other type
        assert_eq!(index.lookup(FeatureKey::node(5)), None);
        // Empty segment
        assert_eq!(index.lookup(FeatureKey::relation(0)), None);
        assert!(index.contains(FeatureKey::node(4416197078)));
    }

    #[test]
    fn test_out_of_order_segment_rejected() {
        let (_dir, path, container) = sample(&[10, 20, 30]);
        let layout = IndexLayout::default();

        let mut ways = way_entries(&container);
        ways.swap(0, 2);
        write_index_file(
            &layout.id_index_path(&path),
            container.header().checksum,
            [node_entries(&container), ways, Vec::new()],
        )
        .unwrap();

        let err = IdIndex::open_if_present(&path, &layout, &container).unwrap_err();
        assert!(matches!(err, StoreError::CorruptIndex(_)));
        assert!(err.to_string().contains("strictly increasing"));
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let (_dir, path, container) = sample(&[10, 20]);
        let layout = IndexLayout::default();

        let mut ways = way_entries(&container);
        ways[1].key.id = 10;
        write_index_file(
            &layout.id_index_path(&path),
            container.header().checksum,
            [node_entries(&container), ways, Vec::new()],
        )
        .unwrap();

        let err = IdIndex::open_if_present(&path, &layout, &container).unwrap_err();
        assert!(matches!(err, StoreError::CorruptIndex(_)));
    }

    #[test]
    fn test_partial_index_rejected() {
        let (_dir, path, container) = sample(&[10, 20, 30]);
        let layout = IndexLayout::default();

        let mut ways = way_entries(&container);
        ways.pop();
        write_index_file(
            &layout.id_index_path(&path),
            container.header().checksum,
            [node_entries(&container), ways, Vec::new()],
        )
        .unwrap();

        let err = IdIndex::open_if_present(&path, &layout, &container).unwrap_err();
        assert!(err.to_string().contains("entries but the container has"));
    }

    #[test]
    fn test_stale_index_rejected() {
        let (_dir, path, container) = sample(&[10, 20]);
        let layout = IndexLayout::default();
        build_index(&container, &layout).unwrap();
        drop(container);

        // Rebuild the container with different content, keep the old index
        let mut builder = ContainerBuilder::new();
        builder.add(FeatureKey::way(10), vec![1, 2, 3], &[]).unwrap();
        builder.add(FeatureKey::way(20), vec![], &[]).unwrap();
        builder.add(FeatureKey::node(4416197078), vec![], &[]).unwrap();
        builder.write(&path).unwrap();
        let container = Container::open(&path).unwrap();

        let err = IdIndex::open_if_present(&path, &layout, &container).unwrap_err();
        assert!(err.to_string().contains("another container"));
    }

    #[test]
    fn test_offset_outside_region_rejected() {
        let (_dir, path, container) = sample(&[10]);
        let layout = IndexLayout::default();

        // Point the way entry at the node region
        let nodes = node_entries(&container);
        let ways = vec![IndexEntry::new(FeatureKey::way(10), nodes[0].offset)];
        write_index_file(
            &layout.id_index_path(&path),
            container.header().checksum,
            [nodes, ways, Vec::new()],
        )
        .unwrap();

        let err = IdIndex::open_if_present(&path, &layout, &container).unwrap_err();
        assert!(err.to_string().contains("outside"));
    }

    #[test]
    fn test_offset_inside_record_rejected() {
        let (_dir, path, container) = sample(&[10, 20]);
        let layout = IndexLayout::default();

        let mut ways = way_entries(&container);
        ways[1].offset += 1;
        write_index_file(
            &layout.id_index_path(&path),
            container.header().checksum,
            [node_entries(&container), ways, Vec::new()],
        )
        .unwrap();

        let err = IdIndex::open_if_present(&path, &layout, &container).unwrap_err();
        assert!(matches!(err, StoreError::CorruptIndex(_)));
        assert!(err.to_string().contains("does not match container record"));
    }

    #[test]
    fn test_renamed_id_with_same_layout_rejected() {
        let (_dir, path, container) = sample(&[10, 20]);
        let layout = IndexLayout::default();
        build_index(&container, &layout).unwrap();
        let old_checksum = container.header().checksum;
        drop(container);

        // Same sizes and counts, so the header checksum does not change
        let mut builder = ContainerBuilder::new();
        builder.add(FeatureKey::way(10), vec![], &[("ref", "x")]).unwrap();
        builder.add(FeatureKey::way(21), vec![], &[("ref", "x")]).unwrap();
        builder.add(FeatureKey::node(4416197078), vec![], &[]).unwrap();
        builder.write(&path).unwrap();
        let container = Container::open(&path).unwrap();
        assert_eq!(container.header().checksum, old_checksum);

        let err = IdIndex::open_if_present(&path, &layout, &container).unwrap_err();
        assert!(matches!(err, StoreError::CorruptIndex(_)));
        assert!(err.to_string().contains("way(20)"));
    }

    #[test]
    fn test_body_corruption_rejected() {
        let (_dir, path, container) = sample(&[10, 20]);
        let layout = IndexLayout::default();
        let index_path = build_index(&container, &layout).unwrap();

        let mut bytes = std::fs::read(&index_path).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;
        std::fs::write(&index_path, &bytes).unwrap();

        let err = IdIndex::open_if_present(&path, &layout, &container).unwrap_err();
        assert!(matches!(err, StoreError::CorruptIndex(_)));
    }

    #[test]
    fn test_truncated_index_rejected() {
        let (_dir, path, container) = sample(&[10, 20]);
        let layout = IndexLayout::default();
        let index_path = build_index(&container, &layout).unwrap();

        let bytes = std::fs::read(&index_path).unwrap();
        std::fs::write(&index_path, &bytes[..bytes.len() - ENTRY_SIZE]).unwrap();

        let err = IdIndex::open_if_present(&path, &layout, &container).unwrap_err();
        assert!(matches!(err, StoreError::CorruptIndex(_)));
    }

    #[test]
    fn test_unsupported_version_rejected() {
        let mut header = IndexHeader::new(0, 0, [0, 0, 0]);
        header.version = INDEX_VERSION + 1;
        let bytes = header.to_bytes();

        let err = IndexHeader::from_bytes(&bytes).unwrap_err();
        assert!(err.to_string().contains("Unsupported version"));
    }
}
