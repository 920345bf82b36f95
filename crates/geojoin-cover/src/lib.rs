//! Cover generation and cell geometry for geojoin.
//!
//! Identifiers name cells of an octahedral triangle mesh on the unit
//! sphere. This crate turns points and regions into identifiers and
//! identifiers back into triangles.
//!
//! # Key Types
//!
//! - [`Region`] -- a spherical cap or convex hull to cover
//! - [`CoverConfig`] -- result size limit and fallback resolution
//! - [`CellGeometry`] -- sorted cell set producing a [`Triangulation`]
//! - [`Triangle`] -- one spherical cell

pub mod config;
pub mod cover;
pub mod error;
pub mod geometry;
pub mod mesh;
pub mod region;
pub mod vector;

pub use config::CoverConfig;
pub use cover::{cover, cover_with_fallback, expand};
pub use error::{CoverError, CoverResult};
pub use geometry::{CellGeometry, Triangulation};
pub use mesh::{cell_center, cell_triangle, cell_vertices, locate, Triangle};
pub use region::{Cap, ConvexPolygon, Region};
pub use vector::Vec3;
