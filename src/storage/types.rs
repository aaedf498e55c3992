//! Core data types for the GOL lookup engine
//!
//! This module defines the fundamental types used throughout the store:
//! - `FeatureType`: node, way or relation
//! - `FeatureKey`: the (type, id) lookup key
//! - `FeatureRecord`: a decoded record, expressed as ranges into the container
//! - `ByteRange`: a half-open byte range inside a mapped file

use crate::storage::error::StoreError;
use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::str::FromStr;

/// Numeric feature identifier, unique only within its `FeatureType`
pub type FeatureId = u64;

/// Kind of feature stored in a container
///
/// The discriminant doubles as the on-disk type tag and as the region /
/// index segment position, so the declaration order is part of the format.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum FeatureType {
    Node = 0,
    Way = 1,
    Relation = 2,
}

impl FeatureType {
    /// Number of feature types (regions per container, segments per index)
    pub const COUNT: usize = 3;

    /// Get all feature types in on-disk order
    pub fn all() -> &'static [FeatureType; FeatureType::COUNT] {
        &[FeatureType::Node, FeatureType::Way, FeatureType::Relation]
    }

    /// Position of this type in region and segment tables
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FeatureType::Node => "node",
            FeatureType::Way => "way",
            FeatureType::Relation => "relation",
        }
    }
}

impl TryFrom<u8> for FeatureType {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(FeatureType::Node),
            1 => Ok(FeatureType::Way),
            2 => Ok(FeatureType::Relation),
            other => Err(other),
        }
    }
}

impl FromStr for FeatureType {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "node" | "n" => Ok(FeatureType::Node),
            "way" | "w" => Ok(FeatureType::Way),
            "relation" | "rel" | "r" => Ok(FeatureType::Relation),
            _ => Err(StoreError::InvalidFeatureType(s.to_string())),
        }
    }
}

impl std::fmt::Display for FeatureType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lookup key: feature type plus numeric ID
///
/// Ordering: type (node < way < relation), then ID ascending as unsigned.
/// Index segments are laid out in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FeatureKey {
    pub feature_type: FeatureType,
    pub id: FeatureId,
}

impl FeatureKey {
    pub fn new(feature_type: FeatureType, id: FeatureId) -> Self {
        Self { feature_type, id }
    }

    pub fn node(id: FeatureId) -> Self {
        Self::new(FeatureType::Node, id)
    }

    pub fn way(id: FeatureId) -> Self {
        Self::new(FeatureType::Way, id)
    }

    pub fn relation(id: FeatureId) -> Self {
        Self::new(FeatureType::Relation, id)
    }
}

impl std::fmt::Display for FeatureKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.feature_type, self.id)
    }
}

/// Half-open byte range `[start, end)` inside a mapped file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ByteRange {
    pub start: usize,
    pub end: usize,
}

impl ByteRange {
    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(start <= end, "ByteRange: start must not exceed end");
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Check if a byte position falls within this range
    pub fn contains(&self, pos: usize) -> bool {
        pos >= self.start && pos < self.end
    }

    pub fn as_range(&self) -> Range<usize> {
        self.start..self.end
    }
}

impl From<Range<usize>> for ByteRange {
    fn from(range: Range<usize>) -> Self {
        Self::new(range.start, range.end)
    }
}

/// A decoded feature record
///
/// Carries only positions; the bytes stay in the store's mapping. Resolve
/// ranges against the same container the record was decoded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FeatureRecord {
    /// Type and ID decoded from the record header
    pub key: FeatureKey,
    /// Absolute position of the record in the container
    pub offset: u64,
    /// Encoded size of the whole record in bytes
    pub encoded_len: usize,
    /// Location of the encoded tag block
    pub tags: ByteRange,
    /// Location of the opaque geometry payload
    pub geometry: ByteRange,
}

impl FeatureRecord {
    pub fn feature_type(&self) -> FeatureType {
        self.key.feature_type
    }

    pub fn id(&self) -> FeatureId {
        self.key.id
    }

    /// Position of the first byte after this record
    pub fn end_offset(&self) -> u64 {
        self.offset + self.encoded_len as u64
    }
}
