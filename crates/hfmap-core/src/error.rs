//! Core error types
//!
//! Malformed input (bad callsigns, bad grid locators, garbled records) is
//! always recoverable: callers skip the offending field or record and keep
//! going with a partial model.

use thiserror::Error;

/// Errors from validating core value types
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    /// Callsign does not match the allowed pattern
    #[error("invalid callsign: {0:?}")]
    InvalidCallsign(String),

    /// Group addresses have no geographic location and are not tracked
    #[error("group address is not a station: {0:?}")]
    GroupAddress(String),

    /// Grid locator does not match `[A-R][A-R][0-9][0-9]`
    #[error("invalid grid locator: {0:?}")]
    InvalidGrid(String),

    /// A coordinate outside the representable range
    #[error("coordinate out of range: longitude {longitude}, latitude {latitude}")]
    CoordinateOutOfRange { longitude: f64, latitude: f64 },
}

/// Result type for core operations
pub type CoreResult<T> = Result<T, CoreError>;
