//! Topology inference engine for hfmap
//!
//! This crate is the tracking core: given an unordered, lossy, possibly
//! malformed stream of decoded activity records, it maintains a live
//! best-effort model of the observed network - which stations exist,
//! where they are, who has recently talked to whom, and how congested
//! the shared channel is.
//!
//! - [`Callbook`]: durable cross-session callsign -> grid store
//! - [`Station`] / [`StationState`]: per-station state machine
//! - [`StationRegistry`]: session-scoped entity registry and all
//!   cross-station operations
//! - [`ActivityProcessor`]: record classification dispatch
//! - [`CongestionMonitor`]: rolling channel activity estimate
//! - [`QueryQueue`]: deduplicated, backoff-throttled outbound queries
//! - [`RedrawSignal`]: dirty flag toward the renderer collaborator
//!
//! The model only reflects what has been overheard; there is no claim of
//! global topology correctness.

pub mod callbook;
pub mod congestion;
pub mod error;
pub mod processor;
pub mod query;
pub mod redraw;
pub mod registry;
pub mod station;

pub use callbook::Callbook;
pub use congestion::CongestionMonitor;
pub use error::{TrackerError, TrackerResult};
pub use processor::ActivityProcessor;
pub use query::{OutboundQuery, QueryKind, QueryQueue, QueryRateLimiter};
pub use redraw::RedrawSignal;
pub use registry::StationRegistry;
pub use station::{Station, StationAction, StationState};
