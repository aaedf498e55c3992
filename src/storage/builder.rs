//! Container builder
//!
//! Collects features in memory, then writes a complete container in one
//! pass: header, then one region per feature type with records in
//! ascending ID order. The file is written next to its destination and
//! renamed into place, so readers never map a half-written container.

use crate::storage::container::{ContainerHeader, RegionInfo, HEADER_SIZE};
use crate::storage::error::{StoreError, StoreResult};
use crate::storage::record;
use crate::storage::tags::encode_tags;
use crate::storage::types::{FeatureKey, FeatureType};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

struct PendingRecord {
    geometry: Vec<u8>,
    tag_block: Vec<u8>,
}

/// Builder for creating containers
#[derive(Default)]
pub struct ContainerBuilder {
    /// Sorted by key, which is exactly the on-disk region order
    records: BTreeMap<FeatureKey, PendingRecord>,
}

impl ContainerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a feature with its tags in the order they should be stored
    pub fn add(
        &mut self,
        key: FeatureKey,
        geometry: Vec<u8>,
        tags: &[(&str, &str)],
    ) -> StoreResult<()> {
        let tag_block = encode_tags(tags.iter().copied())?;
        self.add_encoded(key, geometry, tag_block)
    }

    /// Add a feature whose tag block is already encoded
    pub fn add_encoded(
        &mut self,
        key: FeatureKey,
        geometry: Vec<u8>,
        tag_block: Vec<u8>,
    ) -> StoreResult<()> {
        if self.records.contains_key(&key) {
            return Err(StoreError::DuplicateFeature(key));
        }
        self.records.insert(key, PendingRecord { geometry, tag_block });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Encode all features and write the container to `path`
    pub fn write(&self, path: impl AsRef<Path>) -> StoreResult<ContainerHeader> {
        let path = path.as_ref();

        let mut body = Vec::new();
        let mut regions = [RegionInfo::default(); FeatureType::COUNT];

        for &feature_type in FeatureType::all() {
            let start = (HEADER_SIZE + body.len()) as u64;
            let mut count = 0u64;

            let lo = FeatureKey::new(feature_type, 0);
            let hi = FeatureKey::new(feature_type, u64::MAX);
            for (key, pending) in self.records.range(lo..=hi) {
                record::encode(*key, &pending.geometry, &pending.tag_block, &mut body)?;
                count += 1;
            }

            regions[feature_type.index()] = RegionInfo {
                offset: start,
                length: (HEADER_SIZE + body.len()) as u64 - start,
                count,
            };
        }

        let mut header = ContainerHeader::new(regions);
        let header_bytes = header.to_bytes();

        write_atomically(path, |writer| {
            writer.write_all(&header_bytes)?;
            writer.write_all(&body)?;
            Ok(())
        })?;

        tracing::info!(
            path = %path.display(),
            records = self.records.len(),
            bytes = HEADER_SIZE + body.len(),
            "Wrote container"
        );

        Ok(header)
    }
}

/// Write a file through a sibling temp file and rename it into place
pub(crate) fn write_atomically<F>(path: &Path, fill: F) -> StoreResult<()>
where
    F: FnOnce(&mut BufWriter<File>) -> StoreResult<()>,
{
    // Create parent directory if needed
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let tmp = temp_path(path);
    let result = (|| -> StoreResult<()> {
        let mut writer = BufWriter::new(File::create(&tmp)?);
        fill(&mut writer)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    })();

    if result.is_err() {
        let _ = std::fs::remove_file(&tmp);
    }
    result
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(format!(".tmp.{}", std::process::id()));
    path.with_file_name(name)
}
