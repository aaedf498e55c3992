//! # gol-lookup
//!
//! Feature lookup by type and ID over a GOL container, with an optional
//! on-disk ID index and a region-scan fallback.
//!
//! ## Features
//!
//! - **Memory-mapped reads**: records and tags borrow straight from the file
//! - **Indexed lookup**: binary search in a sorted, checksummed ID index
//! - **Scan fallback**: linear walk of one type's region when no index exists
//! - **Lazy tags**: tag blocks decode only when iterated
//!
//! ## Modules
//!
//! - [`storage`]: Container format, record and tag codecs, lookup resolver
//! - [`index`]: ID index reader and builder
//! - [`import`]: JSON-lines to container packing
//! - [`config`]: TOML configuration with environment overrides
//! - [`report`]: Lookup, check and info output for the binaries
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use gol_lookup::storage::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = FeatureStore::open("data/monaco.gol")?;
//!     println!("{}", store.stats());
//!
//!     match store.lookup(FeatureType::Way, 626967072)? {
//!         Some(way) => {
//!             for tag in way.tags()? {
//!                 println!("  {}", tag?);
//!             }
//!         }
//!         None => println!("way(626967072): not found"),
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod import;
pub mod index;
pub mod logging;
pub mod report;
pub mod storage;

// Re-export top-level types for convenience
pub use storage::{
    Container, ContainerBuilder, Feature, FeatureId, FeatureKey, FeatureRecord, FeatureStore,
    FeatureType, IndexMode, LookupPath, StoreError, StoreOptions, StoreResult, StoreStats,
    TagEntry, Tags,
};

pub use index::{build_index, IdIndex, IndexLayout};

pub use import::{pack, PackReport, SourceFeature};

pub use config::{Config, ConfigError, LoggingConfig};
