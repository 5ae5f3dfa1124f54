//! Activity record processing
//!
//! The [`ActivityProcessor`] turns one decoded activity record into
//! registry and station mutations. Dispatch is over the closed
//! [`CommandKind`] enumeration; classifications outside the known set are
//! ignored so unseen activity types never break processing.
//!
//! Before command-specific dispatch, two generic facts are recorded for
//! every record: both parties were just heard, and a record addressed to
//! a known recipient implies the recipient is in range of the sender
//! (the recipient is marked as hearing the sender). The inference is
//! applied uniformly here rather than per command.
//!
//! At most one assumption is drawn per observed fact; everything else
//! must be overheard separately.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, trace};

use hfmap_core::{ActivityRecord, CommandKind};

use crate::congestion::CongestionMonitor;
use crate::registry::StationRegistry;
use crate::station::StationAction;

/// Applies decoded activity records to the station registry
pub struct ActivityProcessor {
    registry: Arc<StationRegistry>,
    monitor: Arc<CongestionMonitor>,
}

impl ActivityProcessor {
    /// Create a processor over the given registry and congestion monitor
    pub fn new(registry: Arc<StationRegistry>, monitor: Arc<CongestionMonitor>) -> Self {
        Self { registry, monitor }
    }

    /// Process one activity record
    ///
    /// A record with an unusable sender callsign is dropped whole;
    /// unusable fields inside an otherwise good record (a garbled grid, a
    /// group recipient) degrade to skipping just that field. Never fails.
    pub fn process(&self, record: &ActivityRecord) {
        let Some(sender) = self.registry.resolve(&record.from) else {
            debug!(from = %record.from, "record from unusable callsign dropped");
            return;
        };
        let recipient = record
            .to
            .as_deref()
            .and_then(|to| self.registry.resolve(to));

        trace!(
            from = %sender,
            to = record.to.as_deref().unwrap_or("-"),
            command = ?record.command,
            snr = record.snr,
            "activity"
        );

        let now = Utc::now();
        self.registry.with_station_mut(&sender, |station| {
            station.mark_heard(now);
            station.note_signal(record.snr, record.time_drift, record.offset);
        });
        if let Some(recipient) = &recipient {
            self.registry
                .with_station_mut(recipient, |station| station.mark_heard(now));
            // Addressed traffic implies the recipient is in range of the
            // sender, whatever the command turns out to be.
            self.registry.add_heard(recipient, &sender);
        }

        match &record.command {
            CommandKind::Directed => {
                if let Some(recipient) = &recipient {
                    self.registry.link(&sender, recipient);
                }
            }

            CommandKind::Heartbeat | CommandKind::Grid => {
                // Six-character announcements arrive with a blank grid
                // field and the locator at the end of the text instead.
                let locator = match record.grid.as_deref().filter(|g| !g.trim().is_empty()) {
                    Some(grid) => Some(grid),
                    None => record.trailing_token(),
                };
                if record.command == CommandKind::Heartbeat {
                    self.registry.with_station_mut(&sender, |station| {
                        station.last_action = Some(StationAction::Heartbeat);
                    });
                }
                if let Some(locator) = locator {
                    self.registry.set_grid(&sender, locator, true);
                }
            }

            CommandKind::Hearing => {
                // The best way to learn about stations we cannot hear
                // ourselves: the payload is the sender's heard list.
                if let Some(recipient) = &recipient {
                    self.registry.link(&sender, recipient);
                }
                for raw in &record.payload {
                    if let Some(heard) = self.registry.resolve(raw) {
                        self.registry.add_heard(&sender, &heard);
                    }
                }
            }

            CommandKind::HeartbeatSnr | CommandKind::Snr => {
                // A signal report presumes the reporter heard the
                // reported station; treat the pair as talking.
                if let Some(recipient) = &recipient {
                    self.registry.add_heard(recipient, &sender);
                    self.registry.link(&sender, recipient);
                    self.registry.link(recipient, &sender);
                }
            }

            CommandKind::SnrQuery => {
                if let Some(recipient) = &recipient {
                    self.registry.link(&sender, recipient);
                }
            }

            CommandKind::No | CommandKind::Yes => {
                // Replying at all proves the query was received.
                if let Some(recipient) = &recipient {
                    self.registry.link(&sender, recipient);
                    self.registry.add_heard(recipient, &sender);
                }
            }

            CommandKind::Info => {
                let text = record.payload_text();
                self.registry.with_station_mut(&sender, |station| {
                    station.info = Some(text);
                });
            }

            CommandKind::Cq => {
                // "CQ CQ CQ FN31" style calls trail their grid.
                if let Some(token) = record.trailing_token()
                    && token.len() == 4
                {
                    self.registry.set_grid(&sender, token, true);
                }
                self.registry.with_station_mut(&sender, |station| {
                    station.last_action = Some(StationAction::Calling);
                });
            }

            CommandKind::Msg => {
                let text = record.payload_text();
                self.registry.with_station_mut(&sender, |station| {
                    station.info = Some(text);
                });
                if let Some(recipient) = &recipient {
                    self.registry.add_heard(recipient, &sender);
                }
            }

            CommandKind::Ack | CommandKind::HwCopy => {
                if let Some(recipient) = &recipient {
                    self.registry.add_heard(recipient, &sender);
                    self.registry.link(&sender, recipient);
                }
            }

            CommandKind::Other(command) => {
                debug!(command, "unrecognized command ignored");
            }
        }

        self.monitor.record_activity();
    }
}
