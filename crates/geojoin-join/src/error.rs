//! Error types for the join crate.

use geojoin_catalog::CatalogError;
use geojoin_cover::CoverError;
use geojoin_types::{TemporalId, TypeError};

/// Errors that can occur while joining sources.
#[derive(Debug, thiserror::Error)]
pub enum JoinError {
    /// A source delivered no sample with a valid identifier.
    #[error("source {0} has no valid samples")]
    NoValidSources(String),

    /// An aggregate was requested over no values.
    #[error("nothing to aggregate for {0}")]
    EmptyAggregation(String),

    /// No time slice is coincident with the primary temporal identifier.
    #[error("no time slice coincides with {0}")]
    NoTemporalMatch(TemporalId),

    /// Temporal candidates are not in ascending order.
    #[error("temporal candidates are not sorted at index {index}")]
    Unsorted { index: usize },

    /// Parallel arrays disagree in length.
    #[error("{what}: expected {expected} values, got {actual}")]
    ShapeMismatch {
        what: String,
        expected: usize,
        actual: usize,
    },

    /// Catalog error.
    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// Cover generation error.
    #[error("cover error: {0}")]
    Cover(#[from] CoverError),

    /// Identifier codec error.
    #[error("identifier error: {0}")]
    Type(#[from] TypeError),

    /// Invalid or unreadable configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Record container error.
    #[error("container error: {0}")]
    Container(#[from] ContainerError),
}

/// Errors reading or writing the record container.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ContainerError {
    #[error("invalid container magic: expected GJRC, got {actual}")]
    InvalidMagic { actual: String },

    #[error("unsupported container version: {0}")]
    UnsupportedVersion(u32),

    #[error("container checksum mismatch: stored {stored:08x}, computed {computed:08x}")]
    ChecksumMismatch { stored: u32, computed: u32 },

    #[error("corrupt container at offset {offset}: {reason}")]
    Corrupt { offset: usize, reason: String },
}

/// Convenience alias for join results.
pub type JoinResult<T> = Result<T, JoinError>;
