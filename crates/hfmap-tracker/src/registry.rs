//! Session-scoped station registry
//!
//! The [`StationRegistry`] is the single creation authority for stations:
//! every callsign coming off the air is resolved here, and resolving the
//! same callsign twice yields the same station for the whole session.
//! Station sets are scoped to one frequency band, so a band change resets
//! the registry (the local station survives).
//!
//! All operations touching more than one station - linking, heard-lists,
//! grid updates with their callbook side effects - live here rather than
//! on [`Station`], which keeps the entity free of collection knowledge.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::{debug, info, trace, warn};

use hfmap_core::{Callsign, GridLocator};

use crate::callbook::Callbook;
use crate::error::{TrackerError, TrackerResult};
use crate::redraw::RedrawSignal;
use crate::station::Station;

/// In-memory set of stations tracked this session
pub struct StationRegistry {
    stations: DashMap<Callsign, Station>,
    callbook: Arc<Callbook>,
    redraw: Arc<RedrawSignal>,
    /// The operator's callsign, assigned once at startup
    local: OnceLock<Callsign>,
}

impl StationRegistry {
    /// Create an empty registry
    pub fn new(callbook: Arc<Callbook>, redraw: Arc<RedrawSignal>) -> Self {
        Self {
            stations: DashMap::new(),
            callbook,
            redraw,
            local: OnceLock::new(),
        }
    }

    /// Assign the operator's own station
    ///
    /// Called once at startup. An explicitly configured grid wins over
    /// whatever the callbook remembers; neither is persisted back.
    pub fn init_local(&self, raw_call: &str, grid: Option<&str>) -> TrackerResult<Callsign> {
        let call = Callsign::parse(raw_call)?;
        if let Some(existing) = self.local.get() {
            return Err(TrackerError::LocalAlreadyAssigned(existing.to_string()));
        }

        self.stations
            .insert(call.clone(), Station::new_local(call.clone()));

        match grid {
            Some(raw_grid) => self.set_grid(&call, raw_grid, false),
            None => {
                if let Some(known) = self.callbook.lookup(&call) {
                    self.set_grid(&call, known.as_str(), false);
                }
            }
        }

        // Cannot race: we are the only writer before this returns.
        let _ = self.local.set(call.clone());
        info!(%call, "local station assigned");
        Ok(call)
    }

    /// The operator's callsign, if assigned
    pub fn local_callsign(&self) -> Option<&Callsign> {
        self.local.get()
    }

    /// Whether a callsign names the operator's own station
    pub fn is_local(&self, call: &Callsign) -> bool {
        self.local.get() == Some(call)
    }

    /// Resolve a raw callsign to a tracked station
    ///
    /// Validates and normalizes; group addresses and garbled callsigns
    /// yield `None`. Unknown callsigns create a new station on the spot,
    /// seeded with the callbook's last-known grid if there is one.
    pub fn resolve(&self, raw: &str) -> Option<Callsign> {
        let call = match Callsign::parse(raw) {
            Ok(call) => call,
            Err(err) => {
                debug!(callsign = raw, %err, "ignoring unusable callsign");
                return None;
            }
        };

        if self.stations.contains_key(&call) {
            return Some(call);
        }

        let mut station = Station::new(call.clone());
        if let Some(known) = self.callbook.lookup(&call) {
            station.apply_grid(known);
            self.redraw.mark_bounds("callbook seed");
        }
        trace!(%call, "new station tracked");
        self.stations.insert(call.clone(), station);
        Some(call)
    }

    /// A station has announced its location
    ///
    /// Rare but important information. The raw locator is validated (and
    /// extended locators truncated); invalid input is a logged no-op. A
    /// locator that differs from the callbook entry is a move. With
    /// `persist`, genuinely new information is appended to the callbook.
    pub fn set_grid(&self, call: &Callsign, raw_grid: &str, persist: bool) {
        let grid = match GridLocator::parse(raw_grid) {
            Ok(grid) => grid,
            Err(err) => {
                debug!(%call, grid = raw_grid, %err, "ignoring unusable grid");
                return;
            }
        };

        let known = self.callbook.lookup(call);
        match &known {
            Some(old) if *old != grid => {
                info!(%call, from = %old, to = %grid, "station has moved");
            }
            None => debug!(%call, %grid, "station reports new location"),
            Some(_) => {}
        }

        match self.stations.get_mut(call) {
            Some(mut station) => station.apply_grid(grid.clone()),
            None => {
                warn!(%call, "grid for untracked station dropped");
                return;
            }
        }

        // Position changed, so the viewport may need to grow.
        self.redraw.mark_bounds("set grid");

        if persist && known.as_ref() != Some(&grid) {
            if let Err(err) = self.callbook.record(call, &grid) {
                warn!(%call, %err, "failed to persist callbook entry");
            }
            self.redraw.mark("callbook update");
        }
    }

    /// Record that `hearer` has received `heard`
    ///
    /// Idempotent. Hearing the local station additionally sets the
    /// hearer's `heard_me` flag.
    pub fn add_heard(&self, hearer: &Callsign, heard: &Callsign) {
        if hearer == heard {
            return;
        }
        let heard_is_local = self.is_local(heard);

        let Some(mut station) = self.stations.get_mut(hearer) else {
            return;
        };
        if station.hears.insert(heard.clone()) {
            trace!(%hearer, %heard, "heard");
        }
        if heard_is_local && !station.heard_me {
            station.heard_me = true;
            drop(station);
            self.redraw.mark("heard me");
        }
    }

    /// Record a communication edge from `a` to `b`
    ///
    /// Communicating implies having heard, so this routes through
    /// [`add_heard`](Self::add_heard). A no-op if either endpoint is
    /// unknown.
    pub fn link(&self, a: &Callsign, b: &Callsign) {
        if a == b || !self.stations.contains_key(a) || !self.stations.contains_key(b) {
            return;
        }

        self.add_heard(a, b);
        if let Some(mut station) = self.stations.get_mut(a)
            && station.links.insert(b.clone())
        {
            drop(station);
            self.redraw.mark("link");
        }
    }

    /// Remove links whose partner has gone quiet
    ///
    /// A link is dropped when the partner's age exceeds `link_timeout`,
    /// is unknown, or the partner is no longer tracked. `hears` entries
    /// are never purged.
    pub fn purge_links(&self, link_timeout: Duration, now: DateTime<Utc>) {
        // Ages first, so no station guard is held while another is read.
        let ages: std::collections::HashMap<Callsign, Option<Duration>> = self
            .stations
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().age(now)))
            .collect();

        let mut purged = 0usize;
        for call in ages.keys() {
            if let Some(mut station) = self.stations.get_mut(call) {
                let before = station.links.len();
                station.links.retain(|partner| {
                    matches!(ages.get(partner), Some(Some(age)) if *age <= link_timeout)
                });
                purged += before - station.links.len();
            }
        }

        if purged > 0 {
            debug!(purged, "stale links removed");
            self.redraw.mark("purge links");
        }
    }

    /// Discard everything but the local station
    ///
    /// Used on a frequency-band change: the stations we will hear on the
    /// new band are a different population. The local station survives
    /// with its links and heard-list cleared.
    pub fn reset(&self) {
        let local = self.local.get().cloned();
        self.stations.retain(|call, station| {
            if Some(call) == local.as_ref() {
                station.links.clear();
                station.hears.clear();
                true
            } else {
                trace!(%call, "station discarded");
                false
            }
        });
        self.redraw.mark("reset");
    }

    /// Stations reported this session whose grid was never learned
    pub fn missing_grids(&self) -> Vec<Callsign> {
        let mut missing: Vec<Callsign> = self
            .stations
            .iter()
            .filter(|entry| entry.reported_this_session && entry.grid.is_none())
            .map(|entry| entry.key().clone())
            .collect();
        missing.sort_unstable();
        missing
    }

    /// Run a closure against one station, if tracked
    pub fn with_station<R>(&self, call: &Callsign, f: impl FnOnce(&Station) -> R) -> Option<R> {
        self.stations.get(call).map(|entry| f(entry.value()))
    }

    /// Run a closure against one station mutably, if tracked
    pub(crate) fn with_station_mut<R>(
        &self,
        call: &Callsign,
        f: impl FnOnce(&mut Station) -> R,
    ) -> Option<R> {
        self.stations.get_mut(call).map(|mut entry| f(entry.value_mut()))
    }

    /// Iterate all tracked stations in unspecified order
    pub fn for_each(&self, mut f: impl FnMut(&Station)) {
        for entry in self.stations.iter() {
            f(entry.value());
        }
    }

    /// Clone the current station set, for rendering pulls
    pub fn snapshot(&self) -> Vec<Station> {
        self.stations.iter().map(|e| e.value().clone()).collect()
    }

    /// Number of tracked stations
    pub fn len(&self) -> usize {
        self.stations.len()
    }

    /// Check whether no stations are tracked
    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    fn make_registry() -> (StationRegistry, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let callbook = Arc::new(Callbook::load(dir.path().join("callbook.dat")));
        let registry = StationRegistry::new(callbook, Arc::new(RedrawSignal::new()));
        (registry, dir)
    }

    fn call(s: &str) -> Callsign {
        Callsign::parse(s).unwrap()
    }

    #[test]
    fn test_resolve_is_identity_stable() {
        let (registry, _dir) = make_registry();
        let first = registry.resolve("W1AW").unwrap();
        let second = registry.resolve("w1aw").unwrap();
        assert_eq!(first, second);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_resolve_rejects_groups_and_garbage() {
        let (registry, _dir) = make_registry();
        assert!(registry.resolve("@ALLCALL").is_none());
        assert!(registry.resolve("W1 AW").is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_resolve_seeds_grid_from_callbook() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("callbook.dat");
        std::fs::write(&path, "W1AW,FN31\n").unwrap();

        let callbook = Arc::new(Callbook::load(&path));
        let registry = StationRegistry::new(callbook, Arc::new(RedrawSignal::new()));

        let w1aw = registry.resolve("W1AW").unwrap();
        let grid = registry
            .with_station(&w1aw, |s| s.grid.clone())
            .unwrap()
            .unwrap();
        assert_eq!(grid.as_str(), "FN31");
    }

    #[test]
    fn test_local_survives_reset() {
        let (registry, _dir) = make_registry();
        let local = registry.init_local("W1AW", Some("FN31")).unwrap();
        let other = registry.resolve("K1ABC").unwrap();
        registry.link(&other, &local);

        registry.reset();

        assert_eq!(registry.len(), 1);
        assert!(registry.is_local(&local));
        // Resolving the discarded callsign yields a fresh station
        let again = registry.resolve("K1ABC").unwrap();
        let reported = registry.with_station(&again, |s| s.reported_this_session);
        assert_eq!(reported, Some(false));
    }

    #[test]
    fn test_reset_clears_local_links_and_hears() {
        let (registry, _dir) = make_registry();
        let local = registry.init_local("W1AW", None).unwrap();
        let other = registry.resolve("K1ABC").unwrap();
        registry.link(&local, &other);

        registry.reset();

        registry
            .with_station(&local, |s| {
                assert!(s.links.is_empty());
                assert!(s.hears.is_empty());
            })
            .unwrap();
    }

    #[test]
    fn test_init_local_only_once() {
        let (registry, _dir) = make_registry();
        registry.init_local("W1AW", None).unwrap();
        assert!(matches!(
            registry.init_local("K1ABC", None),
            Err(TrackerError::LocalAlreadyAssigned(_))
        ));
    }

    #[test]
    fn test_add_heard_is_idempotent() {
        let (registry, _dir) = make_registry();
        let a = registry.resolve("K1ABC").unwrap();
        let b = registry.resolve("N1XYZ").unwrap();

        registry.add_heard(&a, &b);
        registry.add_heard(&a, &b);

        let hears = registry.with_station(&a, |s| s.hears.len()).unwrap();
        assert_eq!(hears, 1);
    }

    #[test]
    fn test_hearing_local_sets_heard_me() {
        let (registry, _dir) = make_registry();
        let local = registry.init_local("W1AW", None).unwrap();
        let other = registry.resolve("K1ABC").unwrap();

        registry.add_heard(&other, &local);

        assert_eq!(registry.with_station(&other, |s| s.heard_me), Some(true));
    }

    #[test]
    fn test_link_implies_hears() {
        let (registry, _dir) = make_registry();
        let a = registry.resolve("K1ABC").unwrap();
        let b = registry.resolve("N1XYZ").unwrap();

        registry.link(&a, &b);

        registry
            .with_station(&a, |s| {
                assert!(s.links.contains(&b));
                assert!(s.hears.contains(&b));
            })
            .unwrap();
    }

    #[test]
    fn test_link_unknown_endpoint_is_noop() {
        let (registry, _dir) = make_registry();
        let a = registry.resolve("K1ABC").unwrap();

        registry.link(&a, &call("N1XYZ"));

        assert_eq!(registry.with_station(&a, |s| s.links.len()), Some(0));
    }

    #[test]
    fn test_purge_links_leaves_hears() {
        let (registry, _dir) = make_registry();
        let now = Utc::now();
        let timeout = Duration::from_secs(600);

        let a = registry.resolve("K1ABC").unwrap();
        let fresh = registry.resolve("N1XYZ").unwrap();
        let stale = registry.resolve("W2DEF").unwrap();

        registry.with_station_mut(&a, |s| s.mark_heard(now));
        registry.with_station_mut(&fresh, |s| s.mark_heard(now));
        registry.with_station_mut(&stale, |s| s.mark_heard(now - TimeDelta::minutes(20)));

        registry.link(&a, &fresh);
        registry.link(&a, &stale);

        registry.purge_links(timeout, now);

        registry
            .with_station(&a, |s| {
                assert!(s.links.contains(&fresh));
                assert!(!s.links.contains(&stale));
                assert!(s.hears.contains(&fresh));
                assert!(s.hears.contains(&stale));
            })
            .unwrap();
    }

    #[test]
    fn test_purge_links_drops_unknown_age() {
        let (registry, _dir) = make_registry();
        let now = Utc::now();

        let a = registry.resolve("K1ABC").unwrap();
        let never_heard = registry.resolve("N1XYZ").unwrap();
        registry.with_station_mut(&a, |s| s.mark_heard(now));
        registry.link(&a, &never_heard);

        registry.purge_links(Duration::from_secs(600), now);

        assert_eq!(registry.with_station(&a, |s| s.links.len()), Some(0));
    }

    #[test]
    fn test_set_grid_persists_new_information_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("callbook.dat");
        let callbook = Arc::new(Callbook::load(&path));
        let registry = StationRegistry::new(callbook.clone(), Arc::new(RedrawSignal::new()));

        let w1aw = registry.resolve("W1AW").unwrap();
        registry.set_grid(&w1aw, "FN31", true);
        registry.set_grid(&w1aw, "FN31", true);

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "W1AW,FN31\n");
    }

    #[test]
    fn test_set_grid_move_replaces_callbook_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("callbook.dat");
        std::fs::write(&path, "W1AW,FN31\n").unwrap();

        let callbook = Arc::new(Callbook::load(&path));
        let registry = StationRegistry::new(callbook.clone(), Arc::new(RedrawSignal::new()));

        let w1aw = registry.resolve("W1AW").unwrap();
        registry.set_grid(&w1aw, "EM48", true);

        assert_eq!(
            callbook.lookup(&w1aw).unwrap().as_str(),
            "EM48",
            "move should replace the callbook entry"
        );
    }

    #[test]
    fn test_set_grid_invalid_is_noop() {
        let (registry, _dir) = make_registry();
        let w1aw = registry.resolve("W1AW").unwrap();
        registry.set_grid(&w1aw, "GRID IS DOWN", true);
        assert_eq!(
            registry.with_station(&w1aw, |s| s.grid.is_none()),
            Some(true)
        );
    }

    #[test]
    fn test_missing_grids() {
        let (registry, _dir) = make_registry();
        let now = Utc::now();

        let a = registry.resolve("K1ABC").unwrap();
        let b = registry.resolve("N1XYZ").unwrap();
        registry.with_station_mut(&a, |s| s.mark_heard(now));
        registry.with_station_mut(&b, |s| s.mark_heard(now));
        registry.set_grid(&b, "FN42", false);

        assert_eq!(registry.missing_grids(), vec![a]);
    }
}
