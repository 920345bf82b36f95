//! Error types for the catalog crate.

use geojoin_cover::CoverError;
use geojoin_types::{SpatialId, TypeError};

/// Errors that can occur during catalog operations.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// No entry exists for the normalized identifier.
    #[error("no catalog entry for {0}")]
    NotFound(SpatialId),

    /// Expanding a seed identifier failed.
    #[error("cover error: {0}")]
    Cover(#[from] CoverError),

    /// Identifier codec error.
    #[error("identifier error: {0}")]
    Type(#[from] TypeError),

    /// Serialization or deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for CatalogError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

impl From<std::io::Error> for CatalogError {
    fn from(e: std::io::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// Convenience alias for catalog results.
pub type CatalogResult<T> = Result<T, CatalogError>;
