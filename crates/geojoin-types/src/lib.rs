//! Foundation types for geojoin.
//!
//! This crate provides the identifier codec every other geojoin crate builds
//! on. All operations are pure and allocation-free apart from formatting.
//!
//! # Key Types
//!
//! - [`SpatialId`] -- hierarchical spatial identifier (face, digit path, resolution)
//! - [`Resolution`] -- validated spatial resolution level
//! - [`TemporalId`] -- instant plus resolution-scaled interval
//! - [`TemporalResolution`] -- validated temporal resolution level
//! - [`SourceKey`] -- tag naming the product a datum came from

pub mod error;
pub mod source;
pub mod spatial;
pub mod temporal;

pub use error::{TypeError, TypeResult};
pub use source::SourceKey;
pub use spatial::{Resolution, SpatialId, FACE_COUNT, MAX_RESOLUTION};
pub use temporal::{temporal_coincidence, TemporalId, TemporalResolution, MAX_TEMPORAL_RESOLUTION};
