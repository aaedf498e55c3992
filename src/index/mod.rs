//! Secondary ID index
//!
//! Maps (type, id) to the byte offset of a record in the base container:
//!
//! - **IdIndex**: memory-mapped, validated reader with O(log n) lookup
//! - **builder**: scans a container and writes a matching index file
//! - **IndexLayout**: where the index lives relative to its container
//!
//! # Location
//!
//! ```text
//! data/monaco.gol            base container
//! data/monaco-indexes/       index directory (".gol" stripped, suffix added)
//! data/monaco-indexes/ids.idx
//! ```
//!
//! A missing index directory is not an error; the store falls back to a
//! region scan.

mod builder;
mod id_index;

pub use builder::{build_index, write_index_file};
pub use id_index::{IdIndex, IndexHeader, ENTRY_SIZE, INDEX_HEADER_SIZE, INDEX_MAGIC, INDEX_VERSION};

use crate::storage::types::FeatureKey;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Default suffix appended to the container name to form the index directory
pub const DEFAULT_INDEX_SUFFIX: &str = "-indexes";

/// Default file name of the ID index inside the index directory
pub const DEFAULT_INDEX_FILE: &str = "ids.idx";

const CONTAINER_EXTENSION: &str = ".gol";

/// Naming convention that locates the index of a container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexLayout {
    /// Appended to the container file name (minus ".gol")
    pub suffix: String,
    /// ID index file name inside the index directory
    pub file_name: String,
}

impl Default for IndexLayout {
    fn default() -> Self {
        Self {
            suffix: DEFAULT_INDEX_SUFFIX.to_string(),
            file_name: DEFAULT_INDEX_FILE.to_string(),
        }
    }
}

impl IndexLayout {
    pub fn new(suffix: impl Into<String>, file_name: impl Into<String>) -> Self {
        Self {
            suffix: suffix.into(),
            file_name: file_name.into(),
        }
    }

    /// Index directory for a container: `monaco.gol` → `monaco-indexes`
    pub fn index_dir(&self, base: &Path) -> PathBuf {
        let name = base.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        let mut dir_name: OsString = match name.to_str() {
            Some(s) => s.strip_suffix(CONTAINER_EXTENSION).unwrap_or(s).into(),
            None => name,
        };
        dir_name.push(&self.suffix);
        base.with_file_name(dir_name)
    }

    /// Path of the ID index file for a container
    pub fn id_index_path(&self, base: &Path) -> PathBuf {
        self.index_dir(base).join(&self.file_name)
    }
}

/// One index entry: a key and the absolute offset of its record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IndexEntry {
    pub key: FeatureKey,
    pub offset: u64,
}

impl IndexEntry {
    pub fn new(key: FeatureKey, offset: u64) -> Self {
        Self { key, offset }
    }
}
