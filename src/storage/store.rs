//! Feature store and lookup resolver
//!
//! The store ties the components together:
//! - Open: map container → validate header → open ID index if present
//! - Lookup (indexed): ID index → offset → record codec
//! - Lookup (scan): region walk → record codec per candidate
//! - Tags: record → tag block → lazy decoder, only when asked
//!
//! A store is immutable after open, so a shared reference (or an `Arc`)
//! can serve lookups from many threads without locking.

use crate::index::{IdIndex, IndexLayout};
use crate::storage::container::Container;
use crate::storage::error::{StoreError, StoreResult};
use crate::storage::record;
use crate::storage::tags::Tags;
use crate::storage::types::{ByteRange, FeatureId, FeatureKey, FeatureRecord, FeatureType};
use std::path::Path;

/// Whether the store may use an on-disk ID index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IndexMode {
    /// Use the index when present, scan otherwise
    #[default]
    Auto,
    /// Never open the index; always scan
    Disabled,
}

/// Options for opening a store
#[derive(Debug, Clone, Default)]
pub struct StoreOptions {
    /// Where to look for the index
    pub layout: IndexLayout,
    /// Whether to use it
    pub index_mode: IndexMode,
}

impl StoreOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn layout(mut self, layout: IndexLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn index_mode(mut self, mode: IndexMode) -> Self {
        self.index_mode = mode;
        self
    }
}

/// Which access path a store resolves lookups with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupPath {
    /// Binary search in the ID index
    Indexed,
    /// Linear walk of the type's region
    Scan,
}

impl std::fmt::Display for LookupPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LookupPath::Indexed => write!(f, "indexed"),
            LookupPath::Scan => write!(f, "scan"),
        }
    }
}

/// An open, read-only GOL store
#[derive(Debug)]
pub struct FeatureStore {
    container: Container,
    index: Option<IdIndex>,
}

impl FeatureStore {
    /// Open a container with default options
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        Self::open_with(path, &StoreOptions::default())
    }

    /// Open a container and, unless disabled, its ID index
    ///
    /// Everything mapped so far is released if any step fails.
    pub fn open_with(path: impl AsRef<Path>, options: &StoreOptions) -> StoreResult<Self> {
        let path = path.as_ref();
        let container = Container::open(path)?;

        let index = match options.index_mode {
            IndexMode::Auto => IdIndex::open_if_present(path, &options.layout, &container)?,
            IndexMode::Disabled => None,
        };

        match &index {
            Some(index) => tracing::info!(
                path = %path.display(),
                index = %index.path().display(),
                "Opened store with ID index"
            ),
            None if options.index_mode == IndexMode::Disabled => tracing::info!(
                path = %path.display(),
                "ID index disabled; lookups will scan"
            ),
            None => tracing::warn!(
                path = %path.display(),
                expected = %options.layout.index_dir(path).display(),
                "No ID index; lookups will scan (slower)"
            ),
        }

        Ok(Self { container, index })
    }

    /// Look up a feature by type and ID
    ///
    /// `Ok(None)` means the feature does not exist. With an index present
    /// the index is authoritative: a miss returns immediately, and a hit
    /// that does not decode to the requested key is `CorruptIndex`.
    pub fn lookup(&self, feature_type: FeatureType, id: FeatureId) -> StoreResult<Option<Feature<'_>>> {
        self.lookup_key(FeatureKey::new(feature_type, id))
    }

    pub fn lookup_key(&self, key: FeatureKey) -> StoreResult<Option<Feature<'_>>> {
        let record = match &self.index {
            Some(index) => self.resolve_indexed(index, key)?,
            None => self.resolve_scan(key)?,
        };
        Ok(record.map(|record| Feature {
            bytes: self.container.bytes(),
            record,
        }))
    }

    fn resolve_indexed(&self, index: &IdIndex, key: FeatureKey) -> StoreResult<Option<FeatureRecord>> {
        let offset = match index.lookup(key) {
            Some(offset) => offset,
            None => return Ok(None),
        };

        let region = self.container.region_for(key.feature_type);
        decode_index_hit(self.container.bytes(), region, key, offset).map(Some)
    }

    fn resolve_scan(&self, key: FeatureKey) -> StoreResult<Option<FeatureRecord>> {
        for record in self.container.iter_records(key.feature_type) {
            let record = record?;
            if record.id() == key.id {
                return Ok(Some(record));
            }
        }
        Ok(None)
    }

    pub fn node(&self, id: FeatureId) -> StoreResult<Option<Feature<'_>>> {
        self.lookup(FeatureType::Node, id)
    }

    pub fn way(&self, id: FeatureId) -> StoreResult<Option<Feature<'_>>> {
        self.lookup(FeatureType::Way, id)
    }

    pub fn relation(&self, id: FeatureId) -> StoreResult<Option<Feature<'_>>> {
        self.lookup(FeatureType::Relation, id)
    }

    /// Check existence without handing out the record
    pub fn contains(&self, key: FeatureKey) -> StoreResult<bool> {
        Ok(self.lookup_key(key)?.is_some())
    }

    pub fn has_index(&self) -> bool {
        self.index.is_some()
    }

    pub fn lookup_path(&self) -> LookupPath {
        if self.has_index() {
            LookupPath::Indexed
        } else {
            LookupPath::Scan
        }
    }

    pub fn container(&self) -> &Container {
        &self.container
    }

    pub fn index(&self) -> Option<&IdIndex> {
        self.index.as_ref()
    }

    pub fn path(&self) -> &Path {
        self.container.path()
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            nodes: self.container.record_count(FeatureType::Node),
            ways: self.container.record_count(FeatureType::Way),
            relations: self.container.record_count(FeatureType::Relation),
            file_size_bytes: self.container.len(),
            lookup_path: self.lookup_path(),
        }
    }
}

/// Decode the record an index entry points at
///
/// Decoding is bounded to the type's region, so an entry can never resolve
/// to bytes belonging to another region. Any failure, and any record whose
/// key differs from `key`, is `CorruptIndex`.
pub(crate) fn decode_index_hit(
    bytes: &[u8],
    region: ByteRange,
    key: FeatureKey,
    offset: u64,
) -> StoreResult<FeatureRecord> {
    let in_region = usize::try_from(offset).map_or(false, |o| region.contains(o));
    if !in_region || region.end > bytes.len() {
        return Err(StoreError::CorruptIndex(format!(
            "entry for {} at offset {} lies outside the {} region [{}, {})",
            key, offset, key.feature_type, region.start, region.end
        )));
    }

    match record::decode_matching(&bytes[..region.end], offset, key) {
        Ok(Some(record)) => Ok(record),
        Ok(None) => {
            tracing::warn!(%key, offset, "Index entry points at another feature");
            Err(StoreError::CorruptIndex(format!(
                "entry for {} at offset {} decodes to a different feature",
                key, offset
            )))
        }
        Err(e) => {
            tracing::warn!(%key, offset, error = %e, "Index entry does not decode");
            Err(StoreError::CorruptIndex(format!(
                "entry for {} at offset {} does not decode: {}",
                key, offset, e
            )))
        }
    }
}

/// A resolved feature, borrowing the store's mapping
///
/// Tags are not decoded until [`Feature::tags`] is called; a corrupt tag
/// block therefore only fails when tags are read.
#[derive(Clone, Copy)]
pub struct Feature<'s> {
    bytes: &'s [u8],
    record: FeatureRecord,
}

impl<'s> Feature<'s> {
    pub fn key(&self) -> FeatureKey {
        self.record.key
    }

    pub fn feature_type(&self) -> FeatureType {
        self.record.key.feature_type
    }

    pub fn id(&self) -> FeatureId {
        self.record.key.id
    }

    pub fn record(&self) -> &FeatureRecord {
        &self.record
    }

    pub fn tags(&self) -> StoreResult<Tags<'s>> {
        Tags::new(&self.bytes[self.record.tags.as_range()])
    }

    /// Opaque geometry payload
    pub fn geometry(&self) -> &'s [u8] {
        &self.bytes[self.record.geometry.as_range()]
    }
}

impl std::fmt::Debug for Feature<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Feature").field("record", &self.record).finish()
    }
}

impl PartialEq for Feature<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.record == other.record
    }
}

impl Eq for Feature<'_> {}

/// Store statistics
#[derive(Debug, Clone)]
pub struct StoreStats {
    pub nodes: u64,
    pub ways: u64,
    pub relations: u64,
    pub file_size_bytes: u64,
    pub lookup_path: LookupPath,
}

impl StoreStats {
    pub fn total_features(&self) -> u64 {
        self.nodes + self.ways + self.relations
    }
}

impl std::fmt::Display for StoreStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Nodes: {}, Ways: {}, Relations: {}, Size: {:.2} MB, Lookup: {}",
            self.nodes,
            self.ways,
            self.relations,
            self.file_size_bytes as f64 / (1024.0 * 1024.0),
            self.lookup_path
        )
    }
}
