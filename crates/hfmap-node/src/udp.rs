//! UDP activity source
//!
//! Listens for the JSON API datagrams a JS8-style modem broadcasts and
//! decodes them into [`TransportEvent`]s. One datagram is one JSON
//! object; the interesting payload sits under `params`:
//!
//! - a `CMD` key means a decoded transmission from another station
//! - a `TONES` key means our own radio just transmitted
//! - a `DIAL` key means the radio retuned
//!
//! Anything else is chatter we do not care about. A frame that fails to
//! decode - bad JSON, a missing sender, an unparseable numeric field -
//! poisons only itself: it is logged and skipped, never surfaced to the
//! scheduler.

use serde_json::Value;
use tokio::net::UdpSocket;
use tracing::{info, warn};

use async_trait::async_trait;

use hfmap_core::{ActivityRecord, CommandKind};

use crate::error::{NodeError, NodeResult};
use crate::transport::{ActivitySource, TransportEvent};

const MAX_DATAGRAM: usize = 2048;

/// Activity source reading the modem's UDP JSON API
pub struct UdpActivitySource {
    socket: UdpSocket,
    buf: Vec<u8>,
}

impl UdpActivitySource {
    /// Bind the listening socket
    ///
    /// Failure to bind is one of the few fatal conditions in the whole
    /// system, so it is surfaced instead of degraded.
    pub async fn bind(port: u16) -> NodeResult<Self> {
        let socket = UdpSocket::bind(("0.0.0.0", port)).await?;
        info!(port, "listening for activity datagrams");
        Ok(Self {
            socket,
            buf: vec![0u8; MAX_DATAGRAM],
        })
    }
}

#[async_trait]
impl ActivitySource for UdpActivitySource {
    async fn poll(&mut self) -> NodeResult<Option<TransportEvent>> {
        match self.socket.try_recv_from(&mut self.buf) {
            Ok((len, _addr)) => match decode_frame(&self.buf[..len]) {
                Ok(event) => Ok(event),
                Err(err) => {
                    warn!(%err, "skipping undecodable frame");
                    Ok(None)
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}

/// Decode one datagram into a transport event
///
/// Returns `Ok(None)` for frames that are valid JSON but carry nothing
/// the tracker cares about.
pub fn decode_frame(bytes: &[u8]) -> NodeResult<Option<TransportEvent>> {
    let value: Value =
        serde_json::from_slice(bytes).map_err(|err| NodeError::Decode(err.to_string()))?;
    let Some(params) = value.get("params").and_then(Value::as_object) else {
        return Ok(None);
    };

    if params.contains_key("CMD") {
        return Ok(Some(TransportEvent::Activity(decode_activity(params)?)));
    }
    if params.contains_key("TONES") {
        return Ok(Some(TransportEvent::OwnTransmission));
    }
    if params.contains_key("DIAL") {
        // FREQ carries dial + offset; either names the band well enough
        let key = if params.contains_key("FREQ") { "FREQ" } else { "DIAL" };
        let hz = field_u64(params, key)?;
        return Ok(Some(TransportEvent::DialChange { hz }));
    }

    Ok(None)
}

fn decode_activity(params: &serde_json::Map<String, Value>) -> NodeResult<ActivityRecord> {
    let command = CommandKind::parse(field_str(params, "CMD"));
    let from = field_str(params, "FROM").trim().to_string();
    if from.is_empty() {
        return Err(NodeError::Decode("record without a sender".to_string()));
    }
    let to = Some(field_str(params, "TO").trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string);
    let grid = Some(field_str(params, "GRID").trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    // The text starts with addressing ("CALL1: CALL2 CMD ...") and ends
    // with the end-of-transmission marker; the payload is what remains.
    let mut payload: Vec<String> = field_str(params, "TEXT")
        .split_whitespace()
        .skip(3)
        .map(str::to_string)
        .collect();
    payload.pop();

    Ok(ActivityRecord {
        command,
        from,
        to,
        snr: field_i64(params, "SNR")? as i32,
        time_drift: field_f64(params, "TDRIFT")?,
        offset: field_i64(params, "OFFSET")? as i32,
        grid,
        payload,
    })
}

fn field_str<'a>(params: &'a serde_json::Map<String, Value>, key: &str) -> &'a str {
    params.get(key).and_then(Value::as_str).unwrap_or("")
}

/// Numeric fields arrive as JSON numbers or as quoted strings depending
/// on the modem version; accept both.
fn field_i64(params: &serde_json::Map<String, Value>, key: &'static str) -> NodeResult<i64> {
    match params.get(key) {
        None => Ok(0),
        Some(Value::Number(n)) if n.as_i64().is_some() => Ok(n.as_i64().unwrap_or(0)),
        Some(Value::String(s)) if s.trim().parse::<i64>().is_ok() => {
            Ok(s.trim().parse().unwrap_or(0))
        }
        Some(other) => Err(NodeError::Decode(format!(
            "unparseable {key} field: {other}"
        ))),
    }
}

fn field_f64(params: &serde_json::Map<String, Value>, key: &'static str) -> NodeResult<f64> {
    match params.get(key) {
        None => Ok(0.0),
        Some(Value::Number(n)) => Ok(n.as_f64().unwrap_or(0.0)),
        Some(Value::String(s)) if s.trim().parse::<f64>().is_ok() => {
            Ok(s.trim().parse().unwrap_or(0.0))
        }
        Some(other) => Err(NodeError::Decode(format!(
            "unparseable {key} field: {other}"
        ))),
    }
}

fn field_u64(params: &serde_json::Map<String, Value>, key: &'static str) -> NodeResult<u64> {
    Ok(field_i64(params, key)?.max(0) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_cmd_frame() {
        let frame = r#"{
            "type": "RX.DIRECTED",
            "params": {
                "CMD": "HEARTBEAT",
                "FROM": "W1AW",
                "TO": "@HB",
                "SNR": -12,
                "TDRIFT": 0.25,
                "OFFSET": 1500,
                "GRID": "FN31",
                "TEXT": "W1AW: @HB HEARTBEAT FN31 ♢"
            }
        }"#;

        let event = decode_frame(frame.as_bytes()).unwrap().unwrap();
        let TransportEvent::Activity(record) = event else {
            panic!("expected activity");
        };
        assert_eq!(record.command, CommandKind::Heartbeat);
        assert_eq!(record.from, "W1AW");
        assert_eq!(record.to.as_deref(), Some("@HB"));
        assert_eq!(record.snr, -12);
        assert_eq!(record.grid.as_deref(), Some("FN31"));
        // addressing and the EOT marker are stripped from the payload,
        // leaving the announced locator
        assert_eq!(record.payload, vec!["FN31"]);
    }

    #[test]
    fn test_decode_hearing_payload() {
        let frame = r#"{
            "params": {
                "CMD": "HEARING",
                "FROM": "K1ABC",
                "TO": "W1AW",
                "SNR": "-3",
                "TDRIFT": "0.1",
                "OFFSET": "1210",
                "TEXT": "K1ABC: W1AW HEARING N1XYZ W2DEF ♢"
            }
        }"#;

        let TransportEvent::Activity(record) = decode_frame(frame.as_bytes()).unwrap().unwrap()
        else {
            panic!("expected activity");
        };
        assert_eq!(record.payload, vec!["N1XYZ", "W2DEF"]);
        assert_eq!(record.snr, -3);
    }

    #[test]
    fn test_decode_own_transmission() {
        let frame = br#"{"params": {"TONES": "1 2 3"}}"#;
        assert!(matches!(
            decode_frame(frame).unwrap(),
            Some(TransportEvent::OwnTransmission)
        ));
    }

    #[test]
    fn test_decode_dial_change() {
        let frame = br#"{"params": {"DIAL": 7078000, "FREQ": 7079500}}"#;
        assert!(matches!(
            decode_frame(frame).unwrap(),
            Some(TransportEvent::DialChange { hz: 7_079_500 })
        ));
    }

    #[test]
    fn test_decode_dial_without_freq() {
        let frame = br#"{"params": {"DIAL": 7078000}}"#;
        assert!(matches!(
            decode_frame(frame).unwrap(),
            Some(TransportEvent::DialChange { hz: 7_078_000 })
        ));
    }

    #[test]
    fn test_decode_unknown_frame_is_nothing() {
        let frame = br#"{"params": {"PTT": true}}"#;
        assert!(decode_frame(frame).unwrap().is_none());
    }

    #[test]
    fn test_bad_numeric_field_rejects_record() {
        let frame = br#"{
            "params": {
                "CMD": "SNR",
                "FROM": "W1AW",
                "TO": "K1ABC",
                "SNR": "loud",
                "TEXT": ""
            }
        }"#;
        assert!(matches!(decode_frame(frame), Err(NodeError::Decode(_))));
    }

    #[test]
    fn test_bad_json_rejects_frame() {
        assert!(matches!(
            decode_frame(b"not json at all"),
            Err(NodeError::Decode(_))
        ));
    }

    #[test]
    fn test_missing_sender_rejects_record() {
        let frame = br#"{"params": {"CMD": "CQ", "TEXT": ""}}"#;
        assert!(matches!(decode_frame(frame), Err(NodeError::Decode(_))));
    }
}
