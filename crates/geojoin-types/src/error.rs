use thiserror::Error;

/// Errors produced by identifier operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid spatial resolution: {0} (maximum is {max})", max = crate::spatial::MAX_RESOLUTION)]
    InvalidResolution(u8),

    #[error("invalid temporal resolution: {0} (maximum is {max})", max = crate::temporal::MAX_TEMPORAL_RESOLUTION)]
    InvalidTemporalResolution(u8),

    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("time out of encodable range: {0} ms")]
    TimeOutOfRange(i64),
}

/// Result alias for type operations.
pub type TypeResult<T> = Result<T, TypeError>;
