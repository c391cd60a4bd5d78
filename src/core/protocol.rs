//! Pipe-delimited text sub-protocol spoken over the engine callback.
//!
//! The engine delivers `Incoming` notifications and peer announcements as
//! flat `|`-separated strings. Everything here is a pure function: the
//! payload shape is decided exactly once at this boundary and handed to the
//! rest of the crate as a tagged variant, so no internal code ever pattern
//! matches on ambiguous strings. Malformed input decodes to `Unrecognized`
//! (or `None`), is logged, and is dropped — never fatal.

use crate::core::engine::CallbackData;
use crate::core::error::CoreError;
use std::fmt::{Display, Formatter};
use tracing::{debug, warn};

/// Marker preceding an inbound transfer offer:
/// `[[REQUEST]]|<filename>|<filesize>|<sender_name>|<sender_device>`.
pub const PREFIX_REQUEST: &str = "[[REQUEST]]|";

/// Marker preceding a transfer-start notification: `[[START]]|<filename>`.
pub const PREFIX_START: &str = "[[START]]|";

// ── Incoming payloads ────────────────────────────────────────────────────────

/// Decoded form of an `Incoming` payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Incoming {
    /// A transfer offer awaiting an accept/reject verdict.
    Request {
        filename: String,
        filesize: u64,
        sender_name: String,
        sender_device: String,
    },
    /// The peer started sending without waiting for a verdict.
    Start { filename: String },
    /// Anything else. Logged and dropped by the caller.
    Unrecognized,
}

/// Decode an `Incoming` payload.
///
/// A request needs exactly four `|`-separated fields after the prefix;
/// fewer fields yield `Unrecognized`. Field values are not validated
/// beyond parse-ability — an empty sender name is accepted as-is, and a
/// filesize that fails to parse degrades to zero rather than dropping an
/// otherwise well-formed offer.
pub fn decode_incoming(raw: &str) -> Incoming {
    if let Some(rest) = raw.strip_prefix(PREFIX_REQUEST) {
        let parts: Vec<&str> = rest.split('|').collect();
        if parts.len() < 4 {
            warn!(
                event = "malformed_request",
                error = %CoreError::ProtocolDecode(raw.to_string()),
                "Incoming request has fewer than 4 fields, dropping"
            );
            return Incoming::Unrecognized;
        }
        let filesize = parts[1].parse::<u64>().unwrap_or_else(|_| {
            debug!(
                event = "unparseable_filesize",
                value = %parts[1],
                "Filesize field did not parse, defaulting to 0"
            );
            0
        });
        Incoming::Request {
            filename: parts[0].to_string(),
            filesize,
            sender_name: parts[2].to_string(),
            sender_device: parts[3].to_string(),
        }
    } else if let Some(filename) = raw.strip_prefix(PREFIX_START) {
        Incoming::Start {
            filename: filename.to_string(),
        }
    } else {
        debug!(event = "unrecognized_incoming", payload = %raw, "Ignoring incoming payload");
        Incoming::Unrecognized
    }
}

// ── Peer announcements ───────────────────────────────────────────────────────

/// Transport a peer advertises in its announcement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Transport {
    #[default]
    Tcp,
    Quic,
    Lan,
    Unknown,
}

impl Transport {
    /// Parse the announcement field. Absent fields default to TCP; an
    /// unexpected value maps to `Unknown` rather than dropping the peer.
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "TCP" => Transport::Tcp,
            "QUIC" => Transport::Quic,
            "LAN" => Transport::Lan,
            _ => Transport::Unknown,
        }
    }
}

impl Display for Transport {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Transport::Tcp => "TCP",
            Transport::Quic => "QUIC",
            Transport::Lan => "LAN",
            Transport::Unknown => "Unknown",
        };
        f.write_str(label)
    }
}

/// Decoded peer-found announcement: `name|ip|port[|ssid][|transport]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerAnnouncement {
    pub name: String,
    pub ip: String,
    pub port: u16,
    pub ssid: Option<String>,
    pub transport: Transport,
}

/// Decode a peer announcement. A port that fails to parse as an unsigned
/// integer drops the whole announcement with a log line.
pub fn decode_peer_announcement(raw: &str) -> Option<PeerAnnouncement> {
    let parts: Vec<&str> = raw.split('|').collect();
    if parts.len() < 3 {
        warn!(
            event = "malformed_peer_announcement",
            error = %CoreError::ProtocolDecode(raw.to_string()),
            "Dropping announcement"
        );
        return None;
    }
    let port = match parts[2].parse::<u16>() {
        Ok(p) => p,
        Err(_) => {
            warn!(
                event = "invalid_peer_port",
                value = %parts[2],
                "Peer announcement port did not parse, dropping"
            );
            return None;
        }
    };
    let transport = parts
        .get(4)
        .map(|t| Transport::parse(t))
        .unwrap_or_default();
    Some(PeerAnnouncement {
        name: parts[0].to_string(),
        ip: parts[1].to_string(),
        port,
        ssid: parts.get(3).map(|s| s.to_string()),
        transport,
    })
}

// ── Progress updates ─────────────────────────────────────────────────────────

/// Decode a progress payload into `(current, total)`.
///
/// Progress arrives either as a `"current|total"` string or as a
/// structured pair; both forms decode to the same value. Failure is
/// non-fatal — the update is dropped with a log line.
pub fn decode_progress(data: &CallbackData) -> Option<(u64, u64)> {
    match data {
        CallbackData::Pair(current, total) => Some((*current, *total)),
        CallbackData::Text(s) => {
            let (current, total) = s.split_once('|')?;
            match (current.parse::<u64>(), total.parse::<u64>()) {
                (Ok(c), Ok(t)) => Some((c, t)),
                _ => {
                    debug!(event = "malformed_progress", payload = %s, "Dropping progress update");
                    None
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_fields_round_trip_verbatim() {
        let decoded = decode_incoming("[[REQUEST]]|report.pdf|204800|Alice|iPhone");
        assert_eq!(
            decoded,
            Incoming::Request {
                filename: "report.pdf".to_string(),
                filesize: 204800,
                sender_name: "Alice".to_string(),
                sender_device: "iPhone".to_string(),
            }
        );
    }

    #[test]
    fn request_accepts_empty_sender_name() {
        let decoded = decode_incoming("[[REQUEST]]|a.bin|1||unknown");
        assert!(matches!(
            decoded,
            Incoming::Request { sender_name, .. } if sender_name.is_empty()
        ));
    }

    #[test]
    fn request_with_too_few_fields_is_unrecognized() {
        assert_eq!(
            decode_incoming("[[REQUEST]]|only|three|fields"),
            Incoming::Unrecognized
        );
        assert_eq!(decode_incoming("[[REQUEST]]|"), Incoming::Unrecognized);
    }

    #[test]
    fn unparseable_filesize_defaults_to_zero() {
        let decoded = decode_incoming("[[REQUEST]]|f|not-a-number|n|d");
        assert!(matches!(decoded, Incoming::Request { filesize: 0, .. }));
    }

    #[test]
    fn start_payload() {
        assert_eq!(
            decode_incoming("[[START]]|report.pdf"),
            Incoming::Start {
                filename: "report.pdf".to_string()
            }
        );
    }

    #[test]
    fn arbitrary_text_is_unrecognized() {
        assert_eq!(decode_incoming("hello world"), Incoming::Unrecognized);
        assert_eq!(decode_incoming(""), Incoming::Unrecognized);
    }

    #[test]
    fn peer_announcement_full() {
        let ann = decode_peer_announcement("Alice-MBP|192.168.1.7|9400|HomeWifi|QUIC").unwrap();
        assert_eq!(ann.name, "Alice-MBP");
        assert_eq!(ann.ip, "192.168.1.7");
        assert_eq!(ann.port, 9400);
        assert_eq!(ann.ssid.as_deref(), Some("HomeWifi"));
        assert_eq!(ann.transport, Transport::Quic);
    }

    #[test]
    fn peer_announcement_transport_defaults_to_tcp() {
        let ann = decode_peer_announcement("Bob|10.0.0.2|8080").unwrap();
        assert_eq!(ann.transport, Transport::Tcp);
        assert_eq!(ann.ssid, None);
    }

    #[test]
    fn peer_announcement_bad_port_is_dropped() {
        assert!(decode_peer_announcement("Bob|10.0.0.2|not-a-port").is_none());
        assert!(decode_peer_announcement("Bob|10.0.0.2").is_none());
    }

    #[test]
    fn unknown_transport_maps_to_unknown() {
        let ann = decode_peer_announcement("Bob|10.0.0.2|8080|ssid|carrier-pigeon").unwrap();
        assert_eq!(ann.transport, Transport::Unknown);
    }

    #[test]
    fn progress_string_and_pair_agree() {
        let from_text = decode_progress(&CallbackData::Text("1024|2048".to_string()));
        let from_pair = decode_progress(&CallbackData::Pair(1024, 2048));
        assert_eq!(from_text, Some((1024, 2048)));
        assert_eq!(from_pair, Some((1024, 2048)));
    }

    #[test]
    fn malformed_progress_is_dropped() {
        assert_eq!(
            decode_progress(&CallbackData::Text("abc|def".to_string())),
            None
        );
        assert_eq!(decode_progress(&CallbackData::Text("1024".to_string())), None);
    }
}
