//! Outbound exploratory query queue
//!
//! The local station can optionally ask other stations for information we
//! have not overheard - their grid, or who they are hearing. The channel
//! is narrow and shared, so outbound queries are deduplicated, throttled
//! per destination, and spaced out by a backoff tied to the congestion
//! estimate. Delivery is best effort; a lost query is simply never
//! answered.

use std::collections::VecDeque;
use std::fmt::{self, Display};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::Notify;
use tracing::{debug, trace};

use hfmap_core::Callsign;

use crate::congestion::CongestionMonitor;
use crate::station::Station;

/// How long a destination is left alone after being queried
const BOTHER_WINDOW: Duration = Duration::from_secs(20 * 60);

/// What to ask a station for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    /// Ask for the station's grid locator
    Grid,
    /// Ask which stations it is hearing
    Hearing,
}

/// One pending exploratory query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundQuery {
    /// Destination station
    pub callsign: Callsign,
    /// What to ask for
    pub kind: QueryKind,
}

impl Display for OutboundQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            QueryKind::Grid => write!(f, "{} GRID?", self.callsign),
            QueryKind::Hearing => write!(f, "{} HEARING?", self.callsign),
        }
    }
}

/// Per-destination rate limiter with an explicit time window
///
/// Do not bother the same station more than once per window, no matter
/// what kind of query is being considered.
#[derive(Debug)]
pub struct QueryRateLimiter {
    last_query: DashMap<Callsign, DateTime<Utc>>,
    window: Duration,
}

impl QueryRateLimiter {
    /// Create a limiter with the given per-destination window
    pub fn new(window: Duration) -> Self {
        Self {
            last_query: DashMap::new(),
            window,
        }
    }

    /// Check whether a destination may be queried now
    ///
    /// Records the query time when allowed.
    pub fn allow(&self, call: &Callsign, now: DateTime<Utc>) -> bool {
        if let Some(last) = self.last_query.get(call) {
            let elapsed = (now - *last).to_std().unwrap_or(Duration::ZERO);
            if elapsed < self.window {
                return false;
            }
        }
        self.last_query.insert(call.clone(), now);
        true
    }
}

impl Default for QueryRateLimiter {
    fn default() -> Self {
        Self::new(BOTHER_WINDOW)
    }
}

/// Backoff-throttled FIFO of exploratory queries
pub struct QueryQueue {
    /// Exploratory transmission is off unless explicitly enabled
    enabled: bool,
    queue: Mutex<VecDeque<OutboundQuery>>,
    limiter: QueryRateLimiter,
    monitor: Arc<CongestionMonitor>,
    /// Wakes the drain task when work arrives on an empty queue
    notify: Notify,
}

impl QueryQueue {
    /// Create a queue
    ///
    /// With `enabled` false, every enqueue is a no-op and nothing is
    /// ever transmitted.
    pub fn new(enabled: bool, monitor: Arc<CongestionMonitor>) -> Self {
        Self {
            enabled,
            queue: Mutex::new(VecDeque::new()),
            limiter: QueryRateLimiter::default(),
            monitor,
            notify: Notify::new(),
        }
    }

    /// Whether exploratory transmission is enabled at all
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Queue an exploratory query
    ///
    /// Returns whether the query was actually queued: duplicates of a
    /// pending query and destinations inside the bother window are
    /// silently dropped.
    pub fn enqueue(&self, callsign: Callsign, kind: QueryKind) -> bool {
        if !self.enabled {
            return false;
        }

        let query = OutboundQuery { callsign, kind };
        let mut queue = self
            .queue
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if queue.contains(&query) {
            trace!(%query, "duplicate query dropped");
            return false;
        }
        if !self.limiter.allow(&query.callsign, Utc::now()) {
            trace!(%query, "destination queried too recently");
            return false;
        }

        debug!(%query, "query queued");
        queue.push_back(query);
        drop(queue);
        self.notify.notify_one();
        true
    }

    /// Ask a station for its grid, if we have actually heard it
    pub fn request_grid(&self, station: &Station) -> bool {
        station.last_heard_at.is_some() && self.enqueue(station.callsign().clone(), QueryKind::Grid)
    }

    /// Ask a station who it hears, if we have actually heard it
    pub fn request_hearing(&self, station: &Station) -> bool {
        station.last_heard_at.is_some()
            && self.enqueue(station.callsign().clone(), QueryKind::Hearing)
    }

    /// Pop the oldest pending query
    pub fn pop(&self) -> Option<OutboundQuery> {
        self.queue
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop_front()
    }

    /// Number of pending queries
    pub fn len(&self) -> usize {
        self.queue
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    /// Check whether nothing is pending
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Wait until the queue has work
    ///
    /// Used by the drain task so it only reschedules itself while the
    /// queue is non-empty.
    pub async fn wait_for_work(&self) {
        while self.is_empty() {
            self.notify.notified().await;
        }
    }

    /// Delay before the next transmission, from the congestion estimate
    ///
    /// `1000ms * floor((congestion + 10) / 10)`: a quiet channel gets one
    /// query per second, a busy one spaces them much further apart.
    pub fn backoff(&self) -> Duration {
        let congestion = self.monitor.congestion();
        Duration::from_millis(1000 * ((congestion + 10) / 10))
    }
}
