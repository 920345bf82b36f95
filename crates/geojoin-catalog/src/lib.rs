//! The geojoin catalog: a sorted map from normalized spatial identifiers to
//! per-source data.
//!
//! All operations are in-memory and single-threaded. Entries can be opened
//! ahead of time from a cover so later insertion is restricted to a region
//! of interest.
//!
//! # Key Types
//!
//! - [`Catalog`] -- the identifier -> entry map
//! - [`CatalogEntry`] -- data for one cell, grouped by source
//! - [`DataEntry`] -- one datum with its original identifier
//! - [`SourceIdIndex`] -- per-source identifier lists for JSON dumps

pub mod catalog;
pub mod collect;
pub mod config;
pub mod dump;
pub mod entry;
pub mod error;
pub mod sources;

pub use catalog::Catalog;
pub use collect::{collect, Collected, CollectedCell};
pub use config::CatalogConfig;
pub use dump::SourceIdIndex;
pub use entry::{CatalogEntry, DataEntry, SourceIndex};
pub use error::{CatalogError, CatalogResult};
pub use sources::SourceTable;
