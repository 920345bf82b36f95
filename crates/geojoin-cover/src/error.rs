//! Error types for cover generation.

use geojoin_types::TypeError;

/// Errors that can occur while building covers or locating points.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CoverError {
    /// The cover at the requested resolution needs more identifiers than
    /// the configured limit allows.
    #[error("cover at resolution {resolution} exceeds the limit of {limit} identifiers")]
    RegionTooLarge { resolution: u8, limit: usize },

    /// The region descriptor cannot describe a region.
    #[error("invalid region: {0}")]
    InvalidRegion(String),

    /// A latitude/longitude is outside the sphere's coordinate range.
    #[error("invalid coordinate: lat {lat}, lon {lon}")]
    InvalidCoordinate { lat: f64, lon: f64 },

    /// Identifier codec error.
    #[error("identifier error: {0}")]
    Type(#[from] TypeError),
}

/// Convenience alias for cover results.
pub type CoverResult<T> = Result<T, CoverError>;
