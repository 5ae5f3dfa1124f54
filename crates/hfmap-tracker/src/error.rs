//! Tracker error types

use thiserror::Error;

pub use hfmap_core::CoreError;

/// Errors from the tracking engine
///
/// Almost everything in the tracker degrades instead of failing: bad
/// input is skipped, a missing callbook file becomes an empty book. The
/// remaining errors are I/O on the callbook append path and startup
/// misuse.
#[derive(Debug, Error)]
pub enum TrackerError {
    /// Core validation error
    #[error("core error: {0}")]
    Core(#[from] CoreError),

    /// Callbook file I/O failed
    #[error("callbook I/O failed: {0}")]
    CallbookIo(#[from] std::io::Error),

    /// The local station was assigned twice
    #[error("local station already assigned to {0}")]
    LocalAlreadyAssigned(String),
}

/// Result type for tracker operations
pub type TrackerResult<T> = Result<T, TrackerError>;
