//! Node coordinator for hfmap
//!
//! A [`Node`] owns the tracking core and runs the background tasks that
//! keep the model current:
//!
//! - transport poll: drain the activity source each tick, apply events,
//!   and hand the registry to the renderer when the redraw flag is set
//! - link sweep: drop communication edges whose partner has gone quiet
//! - congestion measurement: publish the hourly activity rate
//! - query drain: space out enabled exploratory queries by the
//!   congestion backoff and hand them to the transmitter
//!
//! All tasks stop on the shared shutdown broadcast; the node then logs
//! which stations were heard this session without ever revealing a grid.

pub mod config;
pub mod error;
pub mod transport;
pub mod udp;

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use hfmap_tracker::{
    ActivityProcessor, Callbook, CongestionMonitor, QueryQueue, RedrawSignal, StationRegistry,
};

pub use config::NodeConfig;
pub use error::{NodeError, NodeResult};
pub use transport::{
    ActivitySource, LogRenderer, LogTransmitter, QueryTransmitter, Renderer, TransportEvent,
};
pub use udp::UdpActivitySource;

/// The assembled tracking node
pub struct Node {
    config: NodeConfig,
    registry: Arc<StationRegistry>,
    redraw: Arc<RedrawSignal>,
    monitor: Arc<CongestionMonitor>,
    queue: Arc<QueryQueue>,
    processor: ActivityProcessor,
}

impl Node {
    /// Assemble a node from configuration
    ///
    /// Loads the callbook and, when a callsign is configured, assigns the
    /// local station.
    pub fn new(config: NodeConfig) -> NodeResult<Self> {
        let callbook = Arc::new(Callbook::load(&config.callbook_path));
        let redraw = Arc::new(RedrawSignal::new());
        let registry = Arc::new(StationRegistry::new(callbook, Arc::clone(&redraw)));
        let monitor = Arc::new(CongestionMonitor::new(config.measurement_interval));
        let queue = Arc::new(QueryQueue::new(config.tx_enabled, Arc::clone(&monitor)));
        let processor = ActivityProcessor::new(Arc::clone(&registry), Arc::clone(&monitor));

        if let Some(callsign) = &config.callsign {
            registry.init_local(callsign, config.grid.as_deref())?;
        } else if config.tx_enabled {
            return Err(NodeError::NoLocalCallsign);
        }

        Ok(Self {
            config,
            registry,
            redraw,
            monitor,
            queue,
            processor,
        })
    }

    /// The station registry
    pub fn registry(&self) -> &Arc<StationRegistry> {
        &self.registry
    }

    /// The outbound query queue
    pub fn queue(&self) -> &Arc<QueryQueue> {
        &self.queue
    }

    /// The congestion monitor
    pub fn monitor(&self) -> &Arc<CongestionMonitor> {
        &self.monitor
    }

    /// Apply one transport event to the model
    ///
    /// `band_mhz` is the caller's record of the current dial band; a
    /// retune to a different whole-MHz band discards the session's
    /// station set, since the stations audible there are a different
    /// population.
    pub fn handle_event(&self, event: TransportEvent, band_mhz: &mut Option<u64>) {
        match event {
            TransportEvent::Activity(record) => self.processor.process(&record),
            TransportEvent::OwnTransmission => {
                // Our own tones occupy the channel like anyone else's.
                self.monitor.record_activity();
            }
            TransportEvent::DialChange { hz } => {
                let mhz = hz / 1_000_000;
                match band_mhz {
                    Some(current) if *current != mhz => {
                        info!(from = *current, to = mhz, "band changed, new station set");
                        *current = mhz;
                        self.registry.reset();
                    }
                    Some(_) => {}
                    None => {
                        debug!(mhz, "dial reported");
                        *band_mhz = Some(mhz);
                    }
                }
            }
        }
    }

    /// Run the node until shutdown
    ///
    /// Spawns the four background tasks and waits for all of them; each
    /// stops when `shutdown` fires. On the way out, stations whose grid
    /// was never learned are reported so the operator can go ask.
    pub async fn run(
        self: Arc<Self>,
        mut source: Box<dyn ActivitySource>,
        transmitter: Arc<dyn QueryTransmitter>,
        renderer: Arc<dyn Renderer>,
        shutdown: broadcast::Sender<()>,
    ) -> NodeResult<()> {
        info!(
            stations = self.registry.len(),
            tx_enabled = self.queue.is_enabled(),
            "node running"
        );

        let poll_task = {
            let node = Arc::clone(&self);
            let mut shutdown_rx = shutdown.subscribe();
            tokio::spawn(async move {
                let mut band_mhz: Option<u64> = None;
                let mut tick = tokio::time::interval(node.config.poll_interval);
                loop {
                    tokio::select! {
                        _ = shutdown_rx.recv() => {
                            info!("transport poll stopping");
                            break;
                        }
                        _ = tick.tick() => {
                            loop {
                                match source.poll().await {
                                    Ok(Some(event)) => node.handle_event(event, &mut band_mhz),
                                    Ok(None) => break,
                                    Err(err) => {
                                        warn!(%err, "transport poll failed");
                                        break;
                                    }
                                }
                            }
                            if node.redraw.take() {
                                renderer.repaint(&node.registry, node.redraw.take_bounds());
                            }
                        }
                    }
                }
            })
        };

        let sweep_task = {
            let node = Arc::clone(&self);
            let mut shutdown_rx = shutdown.subscribe();
            tokio::spawn(async move {
                let mut tick = tokio::time::interval(node.config.link_check_interval);
                // The first tick fires immediately; nothing to sweep yet.
                tick.tick().await;
                loop {
                    tokio::select! {
                        _ = shutdown_rx.recv() => break,
                        _ = tick.tick() => {
                            node.registry.purge_links(node.config.link_timeout, Utc::now());
                        }
                    }
                }
            })
        };

        let measure_task = {
            let node = Arc::clone(&self);
            let mut shutdown_rx = shutdown.subscribe();
            tokio::spawn(async move {
                let mut tick = tokio::time::interval(node.monitor.measurement_interval());
                tick.tick().await;
                loop {
                    tokio::select! {
                        _ = shutdown_rx.recv() => break,
                        _ = tick.tick() => {
                            node.monitor.measure();
                            node.redraw.mark("congestion measured");
                        }
                    }
                }
            })
        };

        let drain_task = {
            let node = Arc::clone(&self);
            let mut shutdown_rx = shutdown.subscribe();
            tokio::spawn(async move {
                if !node.queue.is_enabled() {
                    return;
                }
                loop {
                    tokio::select! {
                        _ = shutdown_rx.recv() => break,
                        _ = node.queue.wait_for_work() => {
                            let backoff = node.queue.backoff();
                            tokio::select! {
                                _ = shutdown_rx.recv() => break,
                                _ = tokio::time::sleep(backoff) => {}
                            }
                            if let Some(query) = node.queue.pop()
                                && let Err(err) = transmitter.transmit(&query).await
                            {
                                warn!(%query, %err, "query transmission failed");
                            }
                        }
                    }
                }
            })
        };

        let _ = tokio::join!(poll_task, sweep_task, measure_task, drain_task);

        self.report_missing_grids();
        info!("node stopped");
        Ok(())
    }

    /// Log stations heard this session that never revealed a position
    fn report_missing_grids(&self) {
        let missing = self.registry.missing_grids();
        if missing.is_empty() {
            return;
        }
        info!(
            count = missing.len(),
            "stations heard this session without a known grid"
        );
        for call in missing {
            info!(%call, "no grid learned");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use hfmap_core::{ActivityRecord, CommandKind};
    use hfmap_tracker::QueryKind;

    use crate::transport::{MockActivitySource, MockTransmitter};
    use crate::udp::decode_frame;

    fn test_config(dir: &tempfile::TempDir) -> NodeConfig {
        NodeConfig::default().with_callbook_path(dir.path().join("callbook.dat"))
    }

    fn heartbeat(from: &str, grid: &str) -> ActivityRecord {
        ActivityRecord {
            command: CommandKind::Heartbeat,
            from: from.to_string(),
            to: Some("@HB".to_string()),
            snr: -10,
            time_drift: 0.0,
            offset: 1500,
            grid: Some(grid.to_string()),
            payload: Vec::new(),
        }
    }

    #[test]
    fn test_activity_event_reaches_registry() {
        let dir = tempfile::tempdir().unwrap();
        let node = Node::new(test_config(&dir)).unwrap();
        let mut band = None;

        node.handle_event(TransportEvent::Activity(heartbeat("W1AW", "FN31")), &mut band);

        let w1aw = node.registry().resolve("W1AW").unwrap();
        let grid = node
            .registry()
            .with_station(&w1aw, |s| s.grid.clone())
            .unwrap()
            .unwrap();
        assert_eq!(grid.as_str(), "FN31");
    }

    #[test]
    fn test_own_transmission_counts_toward_congestion() {
        let dir = tempfile::tempdir().unwrap();
        let node = Node::new(test_config(&dir)).unwrap();
        let mut band = None;

        node.handle_event(TransportEvent::OwnTransmission, &mut band);

        // One record over the default 10 minute window is 6 per hour
        assert_eq!(node.monitor().measure(), 6);
    }

    #[test]
    fn test_band_change_resets_station_set() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(&dir).with_station("W1AW", Some("FN31".to_string()));
        let node = Node::new(config).unwrap();
        let mut band = None;

        node.handle_event(TransportEvent::Activity(heartbeat("K1ABC", "EM48")), &mut band);
        node.handle_event(TransportEvent::DialChange { hz: 7_078_000 }, &mut band);
        assert_eq!(node.registry().len(), 2, "first dial report is not a change");

        node.handle_event(TransportEvent::DialChange { hz: 14_078_500 }, &mut band);
        assert_eq!(node.registry().len(), 1, "only the local station survives");
        assert_eq!(band, Some(14));
    }

    #[test]
    fn test_same_band_retune_keeps_stations() {
        let dir = tempfile::tempdir().unwrap();
        let node = Node::new(test_config(&dir)).unwrap();
        let mut band = None;

        node.handle_event(TransportEvent::DialChange { hz: 7_078_000 }, &mut band);
        node.handle_event(TransportEvent::Activity(heartbeat("K1ABC", "EM48")), &mut band);
        node.handle_event(TransportEvent::DialChange { hz: 7_079_000 }, &mut band);

        assert_eq!(node.registry().len(), 1);
    }

    #[test]
    fn test_tx_enabled_requires_callsign() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(&dir).with_tx_enabled(true);
        assert!(matches!(Node::new(config), Err(NodeError::NoLocalCallsign)));
    }

    #[test]
    fn test_decoded_frame_lands_in_callbook() {
        let dir = tempfile::tempdir().unwrap();
        let node = Node::new(test_config(&dir)).unwrap();
        let mut band = None;

        let frame = r#"{
            "params": {
                "CMD": "GRID",
                "FROM": "W1AW",
                "TO": "K1ABC",
                "SNR": -4,
                "TDRIFT": 0.0,
                "OFFSET": 1500,
                "GRID": "FN31",
                "TEXT": "W1AW: K1ABC GRID FN31 ♢"
            }
        }"#;
        let event = decode_frame(frame.as_bytes()).unwrap().unwrap();
        node.handle_event(event, &mut band);

        let contents = std::fs::read_to_string(dir.path().join("callbook.dat")).unwrap();
        assert_eq!(contents, "W1AW,FN31\n");
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_transmits_queued_query() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(&dir)
            .with_station("W1AW", Some("FN31".to_string()))
            .with_tx_enabled(true);
        let node = Arc::new(Node::new(config).unwrap());

        // Hear a station first; unheard destinations are never queried.
        let mut band = None;
        node.handle_event(TransportEvent::Activity(heartbeat("K1ABC", "EM48")), &mut band);
        let k1abc = node.registry().resolve("K1ABC").unwrap();
        assert!(node.queue().enqueue(k1abc, QueryKind::Hearing));

        let transmitter = Arc::new(MockTransmitter::new());
        let (shutdown, _) = broadcast::channel(1);
        let handle = tokio::spawn(Arc::clone(&node).run(
            Box::new(MockActivitySource::default()),
            transmitter.clone(),
            Arc::new(LogRenderer::default()),
            shutdown.clone(),
        ));

        // Paused clock: sleeps auto-advance once every task is idle.
        tokio::time::sleep(Duration::from_secs(5)).await;
        shutdown.send(()).unwrap();
        handle.await.unwrap().unwrap();

        assert_eq!(transmitter.sent(), vec!["K1ABC HEARING?"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_applies_source_events() {
        let dir = tempfile::tempdir().unwrap();
        let node = Arc::new(Node::new(test_config(&dir)).unwrap());

        let source = MockActivitySource::new([
            TransportEvent::Activity(heartbeat("W1AW", "FN31")),
            TransportEvent::Activity(heartbeat("K1ABC", "EM48")),
        ]);
        let (shutdown, _) = broadcast::channel(1);
        let handle = tokio::spawn(Arc::clone(&node).run(
            Box::new(source),
            Arc::new(LogTransmitter),
            Arc::new(LogRenderer::default()),
            shutdown.clone(),
        ));

        tokio::time::sleep(Duration::from_secs(2)).await;
        shutdown.send(()).unwrap();
        handle.await.unwrap().unwrap();

        assert_eq!(node.registry().len(), 2);
    }
}
