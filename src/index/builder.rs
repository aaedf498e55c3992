//! ID index construction
//!
//! Building is an offline step: scan every region of a container, sort each
//! type's entries by ID, and replace the index file atomically.

use crate::index::id_index::{IndexHeader, ENTRY_SIZE};
use crate::index::{IndexEntry, IndexLayout};
use crate::storage::builder::write_atomically;
use crate::storage::container::Container;
use crate::storage::error::{StoreError, StoreResult};
use crate::storage::types::FeatureType;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Build (or rebuild) the ID index for `container`
///
/// Returns the path of the written index file.
pub fn build_index(container: &Container, layout: &IndexLayout) -> StoreResult<PathBuf> {
    let start = Instant::now();
    let path = layout.id_index_path(container.path());

    let mut segments: [Vec<IndexEntry>; FeatureType::COUNT] = Default::default();
    for &feature_type in FeatureType::all() {
        let entries = &mut segments[feature_type.index()];
        entries.reserve(container.record_count(feature_type) as usize);

        for record in container.iter_records(feature_type) {
            let record = record?;
            entries.push(IndexEntry::new(record.key, record.offset));
        }

        entries.sort_unstable_by_key(|e| e.key.id);
        if let Some(pair) = entries.windows(2).find(|w| w[0].key.id == w[1].key.id) {
            return Err(StoreError::DuplicateFeature(pair[1].key));
        }
    }

    let header = write_index_file(&path, container.header().checksum, segments)?;

    tracing::info!(
        path = %path.display(),
        entries = header.total_entries(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Built ID index"
    );

    Ok(path)
}

/// Write an index file with segments exactly as given
///
/// No sorting or validation happens here; `IdIndex::open` is the gate.
pub fn write_index_file(
    path: &Path,
    container_checksum: u32,
    segments: [Vec<IndexEntry>; FeatureType::COUNT],
) -> StoreResult<IndexHeader> {
    let total: usize = segments.iter().map(Vec::len).sum();
    let mut body = Vec::with_capacity(total * ENTRY_SIZE);
    let mut counts = [0u64; FeatureType::COUNT];

    for (i, entries) in segments.iter().enumerate() {
        counts[i] = entries.len() as u64;
        for entry in entries {
            body.extend_from_slice(&entry.key.id.to_le_bytes());
            body.extend_from_slice(&entry.offset.to_le_bytes());
        }
    }

    let mut header = IndexHeader::new(container_checksum, crc32fast::hash(&body), counts);
    let header_bytes = header.to_bytes();

    write_atomically(path, |writer| {
        writer.write_all(&header_bytes)?;
        writer.write_all(&body)?;
        Ok(())
    })?;

    Ok(header)
}
