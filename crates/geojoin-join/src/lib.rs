//! The geojoin join engine.
//!
//! Sources are inserted into a [`Catalog`](geojoin_catalog::Catalog) at a
//! shared resolution and walked in ascending key order; every primary
//! sample yields one [`JoinRecord`] carrying the mean of each secondary
//! source in its cell. Time-sliced secondaries are first reduced to the
//! slices coincident with the primary's acquisition time.
//!
//! # Key Types
//!
//! - [`JoinEngine`] -- runs joins under a [`JoinConfig`]
//! - [`SampleSource`] -- the seam for external readers; [`SourceData`] is the
//!   in-memory implementation
//! - [`SlicedSource`] -- a secondary product with several time slices
//! - [`TemporalMatcher`] -- coincidence search over sorted temporal ids
//! - [`RecordTable`] -- the binary record container

pub mod config;
pub mod container;
pub mod engine;
pub mod error;
pub mod source;
pub mod temporal;

pub use config::{GeojoinConfig, JoinConfig};
pub use container::{decode_value, encode_value, ContainerFile, RecordTable, ABSENT};
pub use engine::{
    aggregate, progress_step, JoinCover, JoinEngine, JoinOutput, JoinRecord, JoinStats,
    SecondaryMatch,
};
pub use error::{ContainerError, JoinError, JoinResult};
pub use source::{SampleSource, SlicedSource, SourceData};
pub use temporal::{mean_over_slices, TemporalMatcher};
