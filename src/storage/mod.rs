//! GOL Storage
//!
//! This module provides the read side of a GOL container plus the builder
//! that produces one:
//!
//! - **types**: Core data structures (FeatureType, FeatureKey, FeatureRecord)
//! - **tags**: Tag block encoding and lazy decoding
//! - **record**: Per-feature record codec
//! - **container**: Container file format and memory-mapped reader
//! - **builder**: Container writer
//! - **store**: Store handle and lookup resolver
//! - **error**: Error types
//!
//! # Architecture
//!
//! ```text
//! Lookup, indexed:
//!   (type, id) → IdIndex → offset → decode_at → Feature
//!
//! Lookup, scan:
//!   (type, id) → region of type → decode each record → first ID match
//!
//! Tags:
//!   Feature → tag block range → Tags::iter (lazy)
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use gol_lookup::storage::FeatureStore;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = FeatureStore::open("data/monaco.gol")?;
//!
//!     if let Some(way) = store.way(626967072)? {
//!         for tag in way.tags()? {
//!             println!("{}", tag?);
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```

pub(crate) mod bytes;

pub mod builder;
pub mod container;
pub mod error;
pub mod record;
pub mod store;
pub mod tags;
pub mod types;

// Re-export commonly used types
pub use builder::ContainerBuilder;
pub use container::{Container, ContainerHeader, RecordIter, RegionInfo};
pub use error::{StoreError, StoreResult};
pub use store::{Feature, FeatureStore, IndexMode, LookupPath, StoreOptions, StoreStats};
pub use tags::{encode_tags, TagBlockEncoder, TagEntry, TagIter, Tags};
pub use types::{ByteRange, FeatureId, FeatureKey, FeatureRecord, FeatureType};
