//! Core types for hfmap
//!
//! hfmap passively infers the topology of a JS8-style store-and-forward
//! HF network by listening to decoded activity records. This crate holds
//! the leaf value types everything else is built from:
//!
//! - [`Callsign`]: validated station identity
//! - [`GridLocator`]: 4-character Maidenhead-style location with
//!   coordinate conversion both ways
//! - [`ActivityRecord`] / [`CommandKind`]: one decoded unit of overheard
//!   traffic with its closed command classification
//!
//! Nothing here holds state or does I/O; the tracking engine lives in
//! `hfmap-tracker`.

pub mod callsign;
pub mod error;
pub mod grid;
pub mod record;

pub use callsign::Callsign;
pub use error::{CoreError, CoreResult};
pub use grid::{GridLocator, UNKNOWN_COORDINATE, grid_to_coordinate};
pub use record::{ActivityRecord, CommandKind};
