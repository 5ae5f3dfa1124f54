//! Durable callsign-to-grid callbook
//!
//! The callbook remembers where stations were last known to be across
//! sessions. The backing file is append-only UTF-8 text, one
//! `callsign,locator` record per line; `#`-prefixed and blank lines are
//! ignored. The file is never rewritten or compacted - on load, later
//! lines win, so the in-memory entry for a callsign is the most recent
//! locator ever learned for it.
//!
//! This is intentionally decoupled from the per-session station registry:
//! the registry is ephemeral per run, the callbook persists.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

use dashmap::DashMap;
use tracing::{debug, info, warn};

use hfmap_core::{Callsign, GridLocator};

use crate::error::TrackerResult;

/// Append-only store of last-known station locations
pub struct Callbook {
    /// Current entries, later file lines having won over earlier ones
    entries: DashMap<Callsign, GridLocator>,
    /// Backing file path
    path: PathBuf,
    /// Serializes appends; the file is the only shared I/O in the core
    append_lock: Mutex<()>,
}

impl Callbook {
    /// Load the callbook from its backing file
    ///
    /// A missing file is not an error - the book starts empty and the
    /// file is created on the first append. Malformed lines are skipped
    /// with a warning.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = DashMap::new();

        match fs::read_to_string(&path) {
            Ok(contents) => {
                for (lineno, line) in contents.lines().enumerate() {
                    let line = line.trim();
                    if line.is_empty() || line.starts_with('#') {
                        continue;
                    }
                    match Self::parse_line(line) {
                        Ok((call, grid)) => {
                            entries.insert(call, grid);
                        }
                        Err(err) => {
                            warn!(line = lineno + 1, %err, "skipping malformed callbook line");
                        }
                    }
                }
                info!(
                    path = %path.display(),
                    stations = entries.len(),
                    "callbook loaded"
                );
            }
            Err(err) => {
                warn!(path = %path.display(), %err, "no callbook file, starting empty");
            }
        }

        Self {
            entries,
            path,
            append_lock: Mutex::new(()),
        }
    }

    fn parse_line(line: &str) -> TrackerResult<(Callsign, GridLocator)> {
        let (call, grid) = line.split_once(',').unwrap_or((line, ""));
        Ok((Callsign::parse(call)?, GridLocator::parse(grid)?))
    }

    /// Look up the last-known grid for a callsign
    pub fn lookup(&self, call: &Callsign) -> Option<GridLocator> {
        self.entries.get(call).map(|entry| entry.clone())
    }

    /// Record a newly learned location
    ///
    /// Appends one line to the backing file and updates the in-memory
    /// entry. Appends are serialized; the file is never rewritten.
    pub fn record(&self, call: &Callsign, grid: &GridLocator) -> TrackerResult<()> {
        let guard = self
            .append_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{},{}", call, grid)?;
        drop(guard);

        debug!(%call, %grid, "callbook entry recorded");
        self.entries.insert(call.clone(), grid.clone());
        Ok(())
    }

    /// Number of known stations
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check whether the book is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
