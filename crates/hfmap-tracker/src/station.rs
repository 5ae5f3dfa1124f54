//! Per-station state
//!
//! One [`Station`] exists per callsign known in the running session. The
//! display state is a small state machine evaluated lazily whenever
//! somebody asks - there is no timer flipping stations between states:
//!
//! ```text
//! Unheard -> Recent -> Fading        (by age against station_timeout)
//!            Local                   (absorbing, the operator's station)
//! ```
//!
//! A station holds no knowledge of the collection it lives in; every
//! operation that touches two stations (linking, heard-lists, the local
//! check) goes through the registry.

use std::collections::HashSet;
use std::fmt::Write as _;
use std::time::Duration;

use chrono::{DateTime, Utc};

use hfmap_core::{Callsign, GridLocator};

/// Display state of a station
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StationState {
    /// Known (e.g. from the callbook) but not seen this session
    Unheard,
    /// Heard within the station timeout
    Recent,
    /// Heard this session, but not recently
    Fading,
    /// The operator's own station; never leaves this state
    Local,
}

/// What a station was last observed doing, for map annotations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StationAction {
    /// Sent a heartbeat
    Heartbeat,
    /// Called CQ
    Calling,
}

/// One station in the observed network
#[derive(Debug, Clone)]
pub struct Station {
    callsign: Callsign,
    /// Announced or callbook-seeded grid locator
    pub grid: Option<GridLocator>,
    /// Longitude in degrees, derived from the grid
    pub longitude: Option<f64>,
    /// Latitude in degrees, derived from the grid
    pub latitude: Option<f64>,
    /// True for the operator's own station
    local: bool,
    /// Most recent observed activity involving this station
    pub last_heard_at: Option<DateTime<Utc>>,
    /// Any activity referencing this station seen this session
    pub reported_this_session: bool,
    /// This station is known to have received the local station
    pub heard_me: bool,
    /// Stations this one is actively communicating with, recency-bounded
    pub links: HashSet<Callsign>,
    /// Stations this one has reported receiving, kept for the session
    pub hears: HashSet<Callsign>,
    /// Free-text annotation supplied by the station itself
    pub info: Option<String>,
    /// Last observed signal-to-noise ratio in dB
    pub snr: Option<i32>,
    /// Last observed time drift in seconds
    pub time_drift: Option<f64>,
    /// Last observed audio offset in Hz
    pub offset: Option<i32>,
    /// Last notable activity, for map annotations
    pub last_action: Option<StationAction>,
}

impl Station {
    /// Create an untracked, unheard station
    pub fn new(callsign: Callsign) -> Self {
        Self {
            callsign,
            grid: None,
            longitude: None,
            latitude: None,
            local: false,
            last_heard_at: None,
            reported_this_session: false,
            heard_me: false,
            links: HashSet::new(),
            hears: HashSet::new(),
            info: None,
            snr: None,
            time_drift: None,
            offset: None,
            last_action: None,
        }
    }

    /// Create the operator's own station
    pub fn new_local(callsign: Callsign) -> Self {
        let mut station = Self::new(callsign);
        station.local = true;
        station.reported_this_session = true;
        station
    }

    /// The station's callsign; immutable for the station's lifetime
    pub fn callsign(&self) -> &Callsign {
        &self.callsign
    }

    /// Whether this is the operator's own station
    pub fn is_local(&self) -> bool {
        self.local
    }

    /// Time since the station was last heard
    ///
    /// `None` if it has not been heard this session.
    pub fn age(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.last_heard_at
            .map(|heard| (now - heard).to_std().unwrap_or(Duration::ZERO))
    }

    /// Evaluate the display state
    ///
    /// Pull-based: called whenever the station is about to be rendered or
    /// queried. Local never changes; otherwise the state follows how
    /// recently the station was heard.
    pub fn state(&self, now: DateTime<Utc>, station_timeout: Duration) -> StationState {
        if self.local {
            return StationState::Local;
        }
        if !self.reported_this_session {
            return StationState::Unheard;
        }
        match self.age(now) {
            Some(age) if age < station_timeout => StationState::Recent,
            Some(_) => StationState::Fading,
            None => StationState::Unheard,
        }
    }

    /// Note observed activity involving this station
    ///
    /// `last_heard_at` only moves forward, even if records arrive out of
    /// order.
    pub fn mark_heard(&mut self, at: DateTime<Utc>) {
        self.reported_this_session = true;
        self.last_heard_at = Some(match self.last_heard_at {
            Some(previous) if previous > at => previous,
            _ => at,
        });
    }

    /// Record signal metadata from the latest transmission
    pub fn note_signal(&mut self, snr: i32, time_drift: f64, offset: i32) {
        self.snr = Some(snr);
        self.time_drift = Some(time_drift);
        self.offset = Some(offset);
    }

    /// Apply a validated grid locator and its derived coordinates
    pub(crate) fn apply_grid(&mut self, grid: GridLocator) {
        let (longitude, latitude) = grid.coordinate();
        self.longitude = Some(longitude);
        self.latitude = Some(latitude);
        self.grid = Some(grid);
    }

    /// One-line description of everything known about the station
    pub fn summary(&self, now: DateTime<Utc>, station_timeout: Duration) -> String {
        let mut flags = String::new();
        if self.heard_me {
            flags.push('H');
        }
        if self.info.is_some() {
            flags.push('I');
        }
        let state = match self.state(now, station_timeout) {
            StationState::Unheard => "Old",
            StationState::Recent => "Active",
            StationState::Fading => "Fading",
            StationState::Local => "Me",
        };
        let grid = self
            .grid
            .as_ref()
            .map(|g| g.as_str())
            .unwrap_or("????");

        let mut line = format!("{} at {} |{}| {}", self.callsign, grid, flags, state);
        if !self.hears.is_empty() {
            let mut heard: Vec<&str> = self.hears.iter().map(|c| c.as_str()).collect();
            heard.sort_unstable();
            let _ = write!(line, " hears {}", heard.join(" "));
        }
        line
    }
}
