//! GOL container file format and reader
//!
//! Layout:
//! ```text
//! ┌─────────────────────────────────────────┐
//! │ HEADER (96 bytes)                       │
//! │   magic: [u8; 4] = "GOLF"               │
//! │   version: u16                          │
//! │   reserved: u16                         │
//! │   regions: 3 × {                        │
//! │     offset: u64                         │
//! │     length: u64                         │
//! │     count: u64                          │
//! │   }  (node, way, relation)              │
//! │   reserved: [u8; 12]                    │
//! │   checksum: u32 (CRC32 of bytes 0..92)  │
//! ├─────────────────────────────────────────┤
//! │ REGIONS (variable)                      │
//! │   records of one type, ascending ID     │
//! └─────────────────────────────────────────┘
//! ```
//!
//! The file is memory-mapped read-only; records are decoded on demand.

use crate::storage::bytes::{u16_at, u32_at, u64_at};
use crate::storage::error::{StoreError, StoreResult};
use crate::storage::record;
use crate::storage::types::{ByteRange, FeatureRecord, FeatureType};
use memmap2::Mmap;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Magic bytes for container identification
pub const CONTAINER_MAGIC: [u8; 4] = *b"GOLF";

/// Current container format version
pub const CONTAINER_VERSION: u16 = 1;

/// Header size in bytes
pub const HEADER_SIZE: usize = 96;

const REGION_TABLE_OFFSET: usize = 8;
const REGION_ENTRY_SIZE: usize = 24;
const CHECKSUM_OFFSET: usize = 92;

/// Location and size of one feature type's records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RegionInfo {
    /// Offset from start of file
    pub offset: u64,
    /// Length in bytes
    pub length: u64,
    /// Number of records
    pub count: u64,
}

impl RegionInfo {
    pub fn end(&self) -> u64 {
        self.offset + self.length
    }
}

/// Container file header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerHeader {
    /// Format version
    pub version: u16,
    /// Region table, indexed by `FeatureType::index`
    pub regions: [RegionInfo; FeatureType::COUNT],
    /// Header checksum; also binds an ID index to this container
    pub checksum: u32,
}

impl ContainerHeader {
    pub fn new(regions: [RegionInfo; FeatureType::COUNT]) -> Self {
        Self {
            version: CONTAINER_VERSION,
            regions,
            checksum: 0,
        }
    }

    pub fn region(&self, feature_type: FeatureType) -> &RegionInfo {
        &self.regions[feature_type.index()]
    }

    /// Serialize header to bytes, filling in the checksum
    pub fn to_bytes(&mut self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];

        buf[0..4].copy_from_slice(&CONTAINER_MAGIC);
        buf[4..6].copy_from_slice(&self.version.to_le_bytes());
        // bytes 6-7 reserved

        for (i, region) in self.regions.iter().enumerate() {
            let base = REGION_TABLE_OFFSET + i * REGION_ENTRY_SIZE;
            buf[base..base + 8].copy_from_slice(&region.offset.to_le_bytes());
            buf[base + 8..base + 16].copy_from_slice(&region.length.to_le_bytes());
            buf[base + 16..base + 24].copy_from_slice(&region.count.to_le_bytes());
        }
        // bytes 80-91 reserved

        self.checksum = crc32fast::hash(&buf[0..CHECKSUM_OFFSET]);
        buf[CHECKSUM_OFFSET..HEADER_SIZE].copy_from_slice(&self.checksum.to_le_bytes());

        buf
    }

    /// Parse and validate a header
    ///
    /// `file_len` is used to check that every region lies inside the file.
    pub fn from_bytes(buf: &[u8], file_len: u64) -> StoreResult<Self> {
        if buf.len() < HEADER_SIZE {
            return Err(StoreError::CorruptContainer(format!(
                "file of {} bytes is smaller than the {} byte header",
                buf.len(),
                HEADER_SIZE
            )));
        }

        // Check magic before the checksum so foreign files get a clear message
        if buf[0..4] != CONTAINER_MAGIC {
            return Err(StoreError::CorruptContainer(format!(
                "Invalid magic: {:?}",
                &buf[0..4]
            )));
        }

        let stored_checksum = u32_at(buf, CHECKSUM_OFFSET).unwrap_or_default();
        let computed_checksum = crc32fast::hash(&buf[0..CHECKSUM_OFFSET]);
        if stored_checksum != computed_checksum {
            return Err(StoreError::CorruptContainer(format!(
                "Header checksum mismatch: stored={}, computed={}",
                stored_checksum, computed_checksum
            )));
        }

        let version = u16_at(buf, 4).unwrap_or_default();
        if version != CONTAINER_VERSION {
            return Err(StoreError::CorruptContainer(format!(
                "Unsupported version: {} (supported: {})",
                version, CONTAINER_VERSION
            )));
        }

        let mut regions = [RegionInfo::default(); FeatureType::COUNT];
        for (i, region) in regions.iter_mut().enumerate() {
            let base = REGION_TABLE_OFFSET + i * REGION_ENTRY_SIZE;
            *region = RegionInfo {
                offset: u64_at(buf, base).unwrap_or_default(),
                length: u64_at(buf, base + 8).unwrap_or_default(),
                count: u64_at(buf, base + 16).unwrap_or_default(),
            };
        }

        let header = Self {
            version,
            regions,
            checksum: stored_checksum,
        };
        header.validate_regions(file_len)?;
        Ok(header)
    }

    fn validate_regions(&self, file_len: u64) -> StoreResult<()> {
        let mut spans: Vec<(u64, u64, FeatureType)> = Vec::with_capacity(FeatureType::COUNT);

        for &t in FeatureType::all() {
            let region = self.region(t);
            let end = region.offset.checked_add(region.length).ok_or_else(|| {
                StoreError::CorruptContainer(format!("{} region length overflows", t))
            })?;

            if region.length == 0 {
                if region.count != 0 {
                    return Err(StoreError::CorruptContainer(format!(
                        "{} region is empty but declares {} records",
                        t, region.count
                    )));
                }
                continue;
            }
            if region.offset < HEADER_SIZE as u64 || end > file_len {
                return Err(StoreError::CorruptContainer(format!(
                    "{} region [{}, {}) lies outside the file body [{}, {})",
                    t, region.offset, end, HEADER_SIZE, file_len
                )));
            }
            if region.count.saturating_mul(record::MIN_RECORD_SIZE as u64) > region.length {
                return Err(StoreError::CorruptContainer(format!(
                    "{} region of {} bytes cannot hold {} records",
                    t, region.length, region.count
                )));
            }
            spans.push((region.offset, end, t));
        }

        spans.sort();
        for pair in spans.windows(2) {
            let (_, prev_end, prev) = pair[0];
            let (next_start, _, next) = pair[1];
            if next_start < prev_end {
                return Err(StoreError::CorruptContainer(format!(
                    "{} and {} regions overlap",
                    prev, next
                )));
            }
        }

        Ok(())
    }
}

/// A read-only, memory-mapped GOL container
///
/// Owns the mapping for its whole lifetime; decoded records hold byte
/// ranges into it.
pub struct Container {
    /// File path
    path: PathBuf,
    /// Parsed header
    header: ContainerHeader,
    /// Read-only mapping of the whole file
    mmap: Mmap,
}

impl Container {
    /// Open and map an existing container file
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        let file_len = file.metadata()?.len();

        if file_len < HEADER_SIZE as u64 {
            return Err(StoreError::CorruptContainer(format!(
                "file of {} bytes is smaller than the {} byte header",
                file_len, HEADER_SIZE
            )));
        }

        // SAFETY: containers are immutable once written; builders replace
        // them by rename, never by writing in place.
        let mmap = unsafe { Mmap::map(&file)? };
        let header = ContainerHeader::from_bytes(&mmap, mmap.len() as u64)?;

        tracing::debug!(
            path = %path.display(),
            nodes = header.region(FeatureType::Node).count,
            ways = header.region(FeatureType::Way).count,
            relations = header.region(FeatureType::Relation).count,
            "Opened container"
        );

        Ok(Self { path, header, mmap })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn header(&self) -> &ContainerHeader {
        &self.header
    }

    /// The whole mapped file
    pub fn bytes(&self) -> &[u8] {
        &self.mmap
    }

    /// File size in bytes
    pub fn len(&self) -> u64 {
        self.mmap.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.total_records() == 0
    }

    /// Byte range holding all records of one type
    pub fn region_for(&self, feature_type: FeatureType) -> ByteRange {
        let region = self.header.region(feature_type);
        // Regions were validated against the mapped length at open
        ByteRange::new(region.offset as usize, region.end() as usize)
    }

    /// Number of records declared for one type
    pub fn record_count(&self, feature_type: FeatureType) -> u64 {
        self.header.region(feature_type).count
    }

    pub fn total_records(&self) -> u64 {
        self.header.regions.iter().map(|r| r.count).sum()
    }

    /// Lazily walk every record of one type
    ///
    /// Each call starts a new pass from the beginning of the region.
    pub fn iter_records(&self, feature_type: FeatureType) -> RecordIter<'_> {
        let region = self.region_for(feature_type);
        RecordIter {
            bytes: self.bytes(),
            feature_type,
            pos: region.start,
            end: region.end,
            remaining: self.record_count(feature_type),
            done: false,
        }
    }
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container")
            .field("path", &self.path)
            .field("header", &self.header)
            .field("len", &self.mmap.len())
            .finish()
    }
}

/// Sequential pass over one region
///
/// Yields `Err` at most once and then ends. Fails when a record belongs to
/// another type, spills past the region, or the record count does not
/// match the region's length.
pub struct RecordIter<'a> {
    bytes: &'a [u8],
    feature_type: FeatureType,
    pos: usize,
    end: usize,
    remaining: u64,
    done: bool,
}

impl RecordIter<'_> {
    fn fail(&mut self, reason: String) -> Option<StoreResult<FeatureRecord>> {
        self.done = true;
        Some(Err(StoreError::corrupt_record(self.pos as u64, reason)))
    }
}

impl Iterator for RecordIter<'_> {
    type Item = StoreResult<FeatureRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        if self.remaining == 0 {
            self.done = true;
            if self.pos != self.end {
                let left = self.end - self.pos;
                return self.fail(format!(
                    "{} region has {} bytes after its last declared record",
                    self.feature_type, left
                ));
            }
            return None;
        }

        let record = match record::decode_at(&self.bytes[..self.end], self.pos as u64) {
            Ok(record) => record,
            Err(e) => {
                self.done = true;
                return Some(Err(e));
            }
        };

        if record.feature_type() != self.feature_type {
            return self.fail(format!(
                "{} record found in {} region",
                record.feature_type(),
                self.feature_type
            ));
        }

        self.pos += record.encoded_len;
        self.remaining -= 1;
        Some(Ok(record))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.done {
            (0, Some(0))
        } else {
            (0, usize::try_from(self.remaining + 1).ok())
        }
    }
}

impl std::iter::FusedIterator for RecordIter<'_> {}
