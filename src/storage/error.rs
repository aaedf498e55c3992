//! Store error types
//!
//! Defines all errors that can occur while opening or reading a GOL store.
//! A feature that does not exist is not an error: lookups return `Ok(None)`.

use crate::storage::types::FeatureKey;
use thiserror::Error;

/// Errors that can occur in the lookup engine
#[derive(Error, Debug)]
pub enum StoreError {
    /// File missing or unreadable
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Container header, magic, version or region table is invalid
    #[error("Corrupt container: {0}")]
    CorruptContainer(String),

    /// Index is structurally invalid, stale, partial, or promised an
    /// offset that does not resolve to the requested feature
    #[error("Corrupt index: {0}")]
    CorruptIndex(String),

    /// A record inside a container region cannot be decoded
    #[error("Corrupt record at offset {offset}: {reason}")]
    CorruptRecord { offset: u64, reason: String },

    /// A tag block's count/length fields disagree with its size
    #[error("Corrupt tag block: {0}")]
    CorruptTagBlock(String),

    /// Unknown feature type name
    #[error("Invalid feature type: {0} (expected node, way or relation)")]
    InvalidFeatureType(String),

    /// The same (type, id) was added twice while building
    #[error("Duplicate feature: {0}")]
    DuplicateFeature(FeatureKey),

    /// Import source could not be parsed
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl StoreError {
    pub(crate) fn corrupt_record(offset: u64, reason: impl Into<String>) -> Self {
        StoreError::CorruptRecord {
            offset,
            reason: reason.into(),
        }
    }

    /// True for every variant that signals damaged on-disk data
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            StoreError::CorruptContainer(_)
                | StoreError::CorruptIndex(_)
                | StoreError::CorruptRecord { .. }
                | StoreError::CorruptTagBlock(_)
        )
    }

    /// What the user can do about a corruption error, if anything
    pub fn recovery_hint(&self) -> Option<&'static str> {
        match self {
            StoreError::CorruptIndex(_) => {
                Some("rebuild the ID index with `gol index <gol>`, or pass --no-index")
            }
            err if err.is_corruption() => Some("the container is damaged; re-pack it from its source"),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

/// Result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::types::FeatureType;

    #[test]
    fn test_error_display() {
        let err = StoreError::CorruptIndex("segment way out of order".to_string());
        assert_eq!(err.to_string(), "Corrupt index: segment way out of order");

        let err = StoreError::corrupt_record(96, "truncated header");
        assert_eq!(err.to_string(), "Corrupt record at offset 96: truncated header");

        let err = StoreError::DuplicateFeature(FeatureKey::new(FeatureType::Way, 7));
        assert_eq!(err.to_string(), "Duplicate feature: way(7)");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let store_err: StoreError = io_err.into();
        assert!(matches!(store_err, StoreError::Io(_)));
        assert!(!store_err.is_corruption());
    }

    #[test]
    fn test_corruption_classification() {
        assert!(StoreError::CorruptContainer("bad magic".into()).is_corruption());
        assert!(StoreError::CorruptTagBlock("short".into()).is_corruption());
        assert!(!StoreError::InvalidFeatureType("area".into()).is_corruption());
    }

    #[test]
    fn test_recovery_hint() {
        let hint = StoreError::CorruptIndex("stale".into()).recovery_hint().unwrap();
        assert!(hint.contains("gol index"));

        let hint = StoreError::corrupt_record(96, "bad flags").recovery_hint().unwrap();
        assert!(hint.contains("re-pack"));

        assert!(StoreError::DuplicateFeature(FeatureKey::way(1)).recovery_hint().is_none());
    }
}
