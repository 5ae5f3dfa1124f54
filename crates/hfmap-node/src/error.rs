//! Node error types

use thiserror::Error;

pub use hfmap_tracker::TrackerError;

/// Errors from the node coordinator and transport adapters
#[derive(Debug, Error)]
pub enum NodeError {
    /// Tracker error
    #[error("tracker error: {0}")]
    Tracker(#[from] TrackerError),

    /// Socket or file I/O failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A datagram could not be decoded into a transport event
    #[error("undecodable frame: {0}")]
    Decode(String),

    /// Exploratory transmission was requested without a local callsign
    #[error("no local callsign configured")]
    NoLocalCallsign,
}

/// Result type for node operations
pub type NodeResult<T> = Result<T, NodeError>;
