//! Transport and renderer collaborator interfaces
//!
//! The core never does blocking network I/O and never draws anything.
//! Incoming traffic arrives through an [`ActivitySource`] that is polled
//! without blocking; outbound queries leave through a
//! [`QueryTransmitter`]; the renderer is handed the registry to pull
//! from whenever the redraw flag was set. Framing and decode errors are
//! the transport's problem and stop at this boundary.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info, trace};

use hfmap_core::ActivityRecord;
use hfmap_tracker::{OutboundQuery, StationRegistry};

use crate::error::NodeResult;

/// One event delivered by the transport layer
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// A decoded activity record from another station
    Activity(ActivityRecord),
    /// The local station transmitted; counts toward congestion
    OwnTransmission,
    /// The radio retuned; carries the new dial frequency
    DialChange {
        /// Dial frequency in Hz
        hz: u64,
    },
}

/// Non-blocking source of transport events
#[async_trait]
pub trait ActivitySource: Send {
    /// Poll for the next pending event
    ///
    /// Returns `Ok(None)` when nothing is waiting; absence of data is
    /// not an error, just nothing to do this tick. Must never block
    /// beyond a bounded time.
    async fn poll(&mut self) -> NodeResult<Option<TransportEvent>>;
}

/// Sink for outbound exploratory queries
#[async_trait]
pub trait QueryTransmitter: Send + Sync {
    /// Hand one query to the radio; best effort, no delivery guarantee
    async fn transmit(&self, query: &OutboundQuery) -> NodeResult<()>;
}

/// Renderer collaborator
///
/// Called with the registry when the model changed; the renderer pulls
/// whatever station state it needs. `bounds_changed` hints that a
/// station position moved and the viewport should be recomputed.
pub trait Renderer: Send + Sync {
    /// Repaint from current registry state
    fn repaint(&self, registry: &StationRegistry, bounds_changed: bool);
}

/// Renderer that just logs; stands in when no map is attached
#[derive(Debug)]
pub struct LogRenderer {
    station_timeout: Duration,
}

impl LogRenderer {
    /// Create a log renderer using the given timeout for display states
    pub fn new(station_timeout: Duration) -> Self {
        Self { station_timeout }
    }
}

impl Default for LogRenderer {
    fn default() -> Self {
        Self::new(Duration::from_secs(30 * 60))
    }
}

impl Renderer for LogRenderer {
    fn repaint(&self, registry: &StationRegistry, bounds_changed: bool) {
        debug!(
            stations = registry.len(),
            bounds_changed, "model changed"
        );
        let now = Utc::now();
        registry.for_each(|station| {
            trace!("{}", station.summary(now, self.station_timeout));
        });
    }
}

/// Transmitter that logs instead of keying the radio
#[derive(Debug, Default)]
pub struct LogTransmitter;

#[async_trait]
impl QueryTransmitter for LogTransmitter {
    async fn transmit(&self, query: &OutboundQuery) -> NodeResult<()> {
        info!(%query, "sending");
        Ok(())
    }
}

/// Scripted activity source for tests
#[derive(Debug, Default)]
pub struct MockActivitySource {
    events: VecDeque<TransportEvent>,
}

impl MockActivitySource {
    /// Create a source that will deliver the given events in order
    pub fn new(events: impl IntoIterator<Item = TransportEvent>) -> Self {
        Self {
            events: events.into_iter().collect(),
        }
    }
}

#[async_trait]
impl ActivitySource for MockActivitySource {
    async fn poll(&mut self) -> NodeResult<Option<TransportEvent>> {
        Ok(self.events.pop_front())
    }
}

/// Transmitter that records what would have gone out
#[derive(Debug, Default)]
pub struct MockTransmitter {
    sent: Mutex<Vec<String>>,
}

impl MockTransmitter {
    /// Create an empty recording transmitter
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything transmitted so far, in order
    pub fn sent(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl QueryTransmitter for MockTransmitter {
    async fn transmit(&self, query: &OutboundQuery) -> NodeResult<()> {
        self.sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(query.to_string());
        Ok(())
    }
}
