//! Decoded activity records
//!
//! One [`ActivityRecord`] describes a single overheard transmission: who
//! sent it, who it was addressed to, the command classification, signal
//! metadata and whatever payload text came along. The transport layer
//! decodes raw datagrams into this type; everything downstream works on
//! the typed value.
//!
//! Command classification is a closed enumeration decoded exactly once at
//! the boundary. Classifications outside the known set are carried as
//! [`CommandKind::Other`] and ignored by the processor, so unseen activity
//! types stay forward compatible instead of being errors.

use serde::{Deserialize, Serialize};

/// Known activity command classifications
///
/// Matching against the wire text is case-sensitive and exact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandKind {
    /// Empty classification: a plain directed transmission
    Directed,
    /// `HEARTBEAT` - periodic presence announcement, usually with a grid
    Heartbeat,
    /// `GRID` - explicit location announcement
    Grid,
    /// `HEARING` - sender lists the callsigns it can currently receive
    Hearing,
    /// `HEARTBEAT SNR` - signal report in reply to a heartbeat
    HeartbeatSnr,
    /// `SNR` - signal report
    Snr,
    /// `SNR?` - signal report query
    SnrQuery,
    /// `NO` - negative reply
    No,
    /// `YES` - affirmative reply
    Yes,
    /// `INFO` - free-text station information
    Info,
    /// `CQ` - general call, often trailed by a grid locator
    Cq,
    /// `MSG` - stored message delivery
    Msg,
    /// `ACK` - acknowledgement
    Ack,
    /// `HW CPY?` - "how copy" query
    HwCopy,
    /// Anything else, kept verbatim for diagnostics
    Other(String),
}

impl CommandKind {
    /// Classify raw command text from the wire
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "" => Self::Directed,
            "HEARTBEAT" => Self::Heartbeat,
            "GRID" => Self::Grid,
            "HEARING" => Self::Hearing,
            "HEARTBEAT SNR" => Self::HeartbeatSnr,
            "SNR" => Self::Snr,
            "SNR?" => Self::SnrQuery,
            "NO" => Self::No,
            "YES" => Self::Yes,
            "INFO" => Self::Info,
            "CQ" => Self::Cq,
            "MSG" => Self::Msg,
            "ACK" => Self::Ack,
            "HW CPY?" => Self::HwCopy,
            other => Self::Other(other.to_string()),
        }
    }
}

/// One decoded unit of observed network traffic
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityRecord {
    /// Command classification
    pub command: CommandKind,
    /// Sender callsign, as heard (not yet validated)
    pub from: String,
    /// Recipient callsign, if the transmission was addressed
    pub to: Option<String>,
    /// Signal-to-noise ratio in dB
    pub snr: i32,
    /// Time drift in seconds
    pub time_drift: f64,
    /// Audio frequency offset in Hz
    pub offset: i32,
    /// Grid locator field, when the record carried one
    pub grid: Option<String>,
    /// Payload tokens: the free text after addressing, with the
    /// end-of-transmission marker already stripped
    pub payload: Vec<String>,
}

impl ActivityRecord {
    /// The payload joined back into one free-text string
    pub fn payload_text(&self) -> String {
        self.payload.join(" ")
    }

    /// The trailing payload token, where grids tend to hide
    ///
    /// Six-character grid announcements and `CQ CQ CQ FN31` style calls
    /// put the locator at the end of the text.
    pub fn trailing_token(&self) -> Option<&str> {
        self.payload.last().map(String::as_str)
    }
}
