//! Configuration contract for the node coordinator
//!
//! These are the values the core depends on; where they come from (INI
//! file, command line, both) is the CLI's business. Defaults match the
//! conventional JS8 setup: UDP API on port 2242, links fade after 15
//! minutes, stations after 30.

use std::path::PathBuf;
use std::time::Duration;

/// Configuration for a [`Node`](crate::Node)
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// The operator's callsign; without one, heard-me tracking and
    /// exploratory transmission are unavailable
    pub callsign: Option<String>,
    /// The operator's grid locator, overriding the callbook
    pub grid: Option<String>,
    /// Path of the append-only callbook file
    pub callbook_path: PathBuf,
    /// UDP port the activity source listens on
    pub port: u16,
    /// Age past which a link is considered dead
    pub link_timeout: Duration,
    /// How often to sweep for dead links
    pub link_check_interval: Duration,
    /// Age past which a station starts fading
    pub station_timeout: Duration,
    /// Congestion measurement period
    pub measurement_interval: Duration,
    /// How often to poll the activity source
    pub poll_interval: Duration,
    /// Allow exploratory queries to be transmitted
    pub tx_enabled: bool,
}

impl Default for NodeConfig {
    fn default() -> Self {
        let link_timeout = Duration::from_secs(15 * 60);
        Self {
            callsign: None,
            grid: None,
            callbook_path: PathBuf::from("callbook.dat"),
            port: 2242,
            link_timeout,
            link_check_interval: link_timeout,
            station_timeout: Duration::from_secs(30 * 60),
            measurement_interval: Duration::from_secs(10 * 60),
            poll_interval: Duration::from_millis(550),
            tx_enabled: false,
        }
    }
}

impl NodeConfig {
    /// Set the local station
    pub fn with_station(mut self, callsign: impl Into<String>, grid: Option<String>) -> Self {
        self.callsign = Some(callsign.into());
        self.grid = grid;
        self
    }

    /// Set the callbook file path
    pub fn with_callbook_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.callbook_path = path.into();
        self
    }

    /// Set the link timeout (the sweep interval follows it)
    pub fn with_link_timeout(mut self, timeout: Duration) -> Self {
        self.link_timeout = timeout;
        self.link_check_interval = timeout;
        self
    }

    /// Set the station timeout
    pub fn with_station_timeout(mut self, timeout: Duration) -> Self {
        self.station_timeout = timeout;
        self
    }

    /// Set the congestion measurement interval
    pub fn with_measurement_interval(mut self, interval: Duration) -> Self {
        self.measurement_interval = interval;
        self
    }

    /// Enable or disable exploratory transmission
    pub fn with_tx_enabled(mut self, enabled: bool) -> Self {
        self.tx_enabled = enabled;
        self
    }
}
