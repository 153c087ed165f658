//! Signaling event wire shapes.
//!
//! Every frame on a relay connection is a JSON object:
//!
//! ```text
//! { "type": "offer", "data": <opaque>, "timestamp": "<RFC 3339>", "sender_id": "<client id>" }
//! ```
//!
//! `SignalPayload` is the typed form of `type` + `data`. Negotiation payloads
//! (`offer`, `answer`, `ice-candidate`) wrap opaque JSON values; the relay
//! routes on the tag and never looks inside them.

use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error code carried by `error` events sent back for an unparseable frame.
pub const INVALID_SIGNAL_CODE: &str = "INVALID_SIGNAL";

/// Opaque session description (SDP offer or answer).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionDescription(pub Value);

/// Opaque connectivity candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IceCandidate(pub Value);

/// Public view of a room participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerInfo {
    pub client_id: String,
    pub user_id: String,
    pub username: String,
    pub joined_at: DateTime<Utc>,
    #[serde(default)]
    pub is_recording: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recording_id: Option<String>,
}

/// Sent to a newly connected client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Welcome {
    pub client_id: String,
    pub room_id: String,
    /// Participants already in the room, excluding the new client.
    pub participants: Vec<PeerInfo>,
}

/// Why a participant left its room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeaveReason {
    /// Explicit leave (inbound `leave` frame or administrative request).
    Left,
    /// Transport closed or failed.
    Disconnected,
    /// No inbound frame within the idle timeout.
    Timeout,
    /// Relay shutting down.
    Shutdown,
}

impl LeaveReason {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            LeaveReason::Left => "left",
            LeaveReason::Disconnected => "disconnected",
            LeaveReason::Timeout => "timeout",
            LeaveReason::Shutdown => "shutdown",
        }
    }
}

impl fmt::Display for LeaveReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sent to remaining peers when a participant is torn down.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerLeft {
    pub peer: PeerInfo,
    pub reason: LeaveReason,
}

/// Sent to a client whose frame could not be handled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorNotice {
    pub code: String,
    pub message: String,
}

/// The `type` tag of a signaling event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalKind {
    Offer,
    Answer,
    IceCandidate,
    Leave,
    Welcome,
    PeerJoined,
    PeerLeft,
    Error,
}

impl SignalKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SignalKind::Offer => "offer",
            SignalKind::Answer => "answer",
            SignalKind::IceCandidate => "ice-candidate",
            SignalKind::Leave => "leave",
            SignalKind::Welcome => "welcome",
            SignalKind::PeerJoined => "peer-joined",
            SignalKind::PeerLeft => "peer-left",
            SignalKind::Error => "error",
        }
    }

    /// Negotiation primitives fanned out to the whole room.
    #[must_use]
    pub fn is_negotiation(self) -> bool {
        matches!(
            self,
            SignalKind::Offer | SignalKind::Answer | SignalKind::IceCandidate
        )
    }

    /// Whether a client may send this type.
    #[must_use]
    pub fn is_client_originated(self) -> bool {
        self.is_negotiation() || self == SignalKind::Leave
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignalKind {
    type Err = SignalParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "offer" => Ok(SignalKind::Offer),
            "answer" => Ok(SignalKind::Answer),
            "ice-candidate" => Ok(SignalKind::IceCandidate),
            "leave" => Ok(SignalKind::Leave),
            "welcome" => Ok(SignalKind::Welcome),
            "peer-joined" => Ok(SignalKind::PeerJoined),
            "peer-left" => Ok(SignalKind::PeerLeft),
            "error" => Ok(SignalKind::Error),
            other => Err(SignalParseError::UnknownType(other.to_string())),
        }
    }
}

/// Typed signaling payload, one case per recognized `type`.
#[derive(Debug, Clone, PartialEq)]
pub enum SignalPayload {
    Offer(SessionDescription),
    Answer(SessionDescription),
    IceCandidate(IceCandidate),
    Leave,
    Welcome(Welcome),
    PeerJoined(PeerInfo),
    PeerLeft(PeerLeft),
    Error(ErrorNotice),
}

impl SignalPayload {
    #[must_use]
    pub fn kind(&self) -> SignalKind {
        match self {
            SignalPayload::Offer(_) => SignalKind::Offer,
            SignalPayload::Answer(_) => SignalKind::Answer,
            SignalPayload::IceCandidate(_) => SignalKind::IceCandidate,
            SignalPayload::Leave => SignalKind::Leave,
            SignalPayload::Welcome(_) => SignalKind::Welcome,
            SignalPayload::PeerJoined(_) => SignalKind::PeerJoined,
            SignalPayload::PeerLeft(_) => SignalKind::PeerLeft,
            SignalPayload::Error(_) => SignalKind::Error,
        }
    }

    fn from_parts(kind: SignalKind, data: Value) -> Result<Self, SignalParseError> {
        let invalid = |e: serde_json::Error| SignalParseError::InvalidData {
            kind: kind.as_str(),
            reason: e.to_string(),
        };

        Ok(match kind {
            SignalKind::Offer => SignalPayload::Offer(SessionDescription(data)),
            SignalKind::Answer => SignalPayload::Answer(SessionDescription(data)),
            SignalKind::IceCandidate => SignalPayload::IceCandidate(IceCandidate(data)),
            SignalKind::Leave => SignalPayload::Leave,
            SignalKind::Welcome => {
                SignalPayload::Welcome(serde_json::from_value(data).map_err(invalid)?)
            }
            SignalKind::PeerJoined => {
                SignalPayload::PeerJoined(serde_json::from_value(data).map_err(invalid)?)
            }
            SignalKind::PeerLeft => {
                SignalPayload::PeerLeft(serde_json::from_value(data).map_err(invalid)?)
            }
            SignalKind::Error => {
                SignalPayload::Error(serde_json::from_value(data).map_err(invalid)?)
            }
        })
    }
}

/// Errors from parsing an inbound frame. The connection stays open.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SignalParseError {
    #[error("malformed signal frame: {0}")]
    InvalidJson(String),

    #[error("unknown signal type: {0}")]
    UnknownType(String),

    #[error("invalid data for {kind}: {reason}")]
    InvalidData { kind: &'static str, reason: String },

    #[error("signal type {0} cannot be sent by clients")]
    ServerOnlyType(&'static str),
}

impl SignalParseError {
    /// Short label for metrics.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            SignalParseError::InvalidJson(_) => "invalid_json",
            SignalParseError::UnknownType(_) => "unknown_type",
            SignalParseError::InvalidData { .. } => "invalid_data",
            SignalParseError::ServerOnlyType(_) => "server_only_type",
        }
    }
}

#[derive(Deserialize)]
struct WireEvent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Value,
    #[serde(default)]
    timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    sender_id: Option<String>,
}

/// A signaling event as relayed between participants.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "WireEvent")]
pub struct SignalEvent {
    pub payload: SignalPayload,
    pub timestamp: DateTime<Utc>,
    pub sender_id: Option<String>,
}

impl TryFrom<WireEvent> for SignalEvent {
    type Error = SignalParseError;

    fn try_from(wire: WireEvent) -> Result<Self, Self::Error> {
        let kind: SignalKind = wire.kind.parse()?;
        Ok(SignalEvent {
            payload: SignalPayload::from_parts(kind, wire.data)?,
            timestamp: wire.timestamp.unwrap_or_else(Utc::now),
            sender_id: wire.sender_id,
        })
    }
}

impl Serialize for SignalEvent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("type", self.payload.kind().as_str())?;
        match &self.payload {
            SignalPayload::Offer(sdp) | SignalPayload::Answer(sdp) => {
                map.serialize_entry("data", sdp)?;
            }
            SignalPayload::IceCandidate(candidate) => map.serialize_entry("data", candidate)?,
            SignalPayload::Leave => map.serialize_entry("data", &Value::Null)?,
            SignalPayload::Welcome(welcome) => map.serialize_entry("data", welcome)?,
            SignalPayload::PeerJoined(peer) => map.serialize_entry("data", peer)?,
            SignalPayload::PeerLeft(left) => map.serialize_entry("data", left)?,
            SignalPayload::Error(notice) => map.serialize_entry("data", notice)?,
        }
        map.serialize_entry("timestamp", &self.timestamp)?;
        if let Some(sender_id) = &self.sender_id {
            map.serialize_entry("sender_id", sender_id)?;
        }
        map.end()
    }
}

impl SignalEvent {
    /// Server-originated event stamped now, without a sender.
    #[must_use]
    pub fn new(payload: SignalPayload) -> Self {
        Self {
            payload,
            timestamp: Utc::now(),
            sender_id: None,
        }
    }

    /// Event stamped with `sender_id` and the current time.
    #[must_use]
    pub fn from_sender(payload: SignalPayload, sender_id: &str) -> Self {
        Self {
            payload,
            timestamp: Utc::now(),
            sender_id: Some(sender_id.to_string()),
        }
    }

    #[must_use]
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Self::new(SignalPayload::Error(ErrorNotice {
            code: code.to_string(),
            message: message.into(),
        }))
    }

    #[must_use]
    pub fn kind(&self) -> SignalKind {
        self.payload.kind()
    }

    /// Parse a frame received from a client.
    ///
    /// Client-supplied `timestamp` and `sender_id` are discarded; only the
    /// payload survives, and server-only types are rejected.
    ///
    /// # Errors
    ///
    /// Returns `SignalParseError` for malformed JSON, unknown or server-only
    /// types, and structurally invalid data.
    pub fn parse_inbound(frame: &str) -> Result<SignalPayload, SignalParseError> {
        let wire: WireEvent = serde_json::from_str(frame)
            .map_err(|e| SignalParseError::InvalidJson(e.to_string()))?;
        let kind: SignalKind = wire.kind.parse()?;
        if !kind.is_client_originated() {
            return Err(SignalParseError::ServerOnlyType(kind.as_str()));
        }
        SignalPayload::from_parts(kind, wire.data)
    }

    /// Serialize to a text frame.
    ///
    /// # Errors
    ///
    /// Returns the serializer error; not expected for well-formed payloads.
    pub fn to_frame(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn peer(client_id: &str) -> PeerInfo {
        PeerInfo {
            client_id: client_id.to_string(),
            user_id: format!("user-{client_id}"),
            username: client_id.to_string(),
            joined_at: Utc::now(),
            is_recording: false,
            recording_id: None,
        }
    }

    #[test]
    fn test_parse_inbound_offer_keeps_data_opaque() {
        let frame = json!({
            "type": "offer",
            "data": {"sdp": "v=0\r\no=- 46117 2 IN IP4 127.0.0.1", "type": "offer", "extra": [1, 2]}
        })
        .to_string();

        let payload = SignalEvent::parse_inbound(&frame).unwrap();
        assert_eq!(
            payload,
            SignalPayload::Offer(SessionDescription(json!({
                "sdp": "v=0\r\no=- 46117 2 IN IP4 127.0.0.1",
                "type": "offer",
                "extra": [1, 2]
            })))
        );
    }

    #[test]
    fn test_parse_inbound_ice_candidate_and_leave() {
        let ice = json!({
            "type": "ice-candidate",
            "data": {"candidate": "candidate:1 1 udp 2122260223 10.0.0.1 54400 typ host"}
        });
        let payload = SignalEvent::parse_inbound(&ice.to_string()).unwrap();
        assert_eq!(payload.kind(), SignalKind::IceCandidate);

        let payload = SignalEvent::parse_inbound(r#"{"type":"leave"}"#).unwrap();
        assert_eq!(payload, SignalPayload::Leave);
    }

    #[test]
    fn test_parse_inbound_ignores_client_supplied_sender() {
        let frame = json!({
            "type": "answer",
            "data": "v=0",
            "sender_id": "spoofed",
            "timestamp": "2020-01-01T00:00:00Z"
        })
        .to_string();

        let payload = SignalEvent::parse_inbound(&frame).unwrap();
        let event = SignalEvent::from_sender(payload, "real-client");
        assert_eq!(event.sender_id.as_deref(), Some("real-client"));
        assert!(event.timestamp.timestamp() > 1_600_000_000);
    }

    #[test]
    fn test_parse_inbound_rejects_malformed_json() {
        let err = SignalEvent::parse_inbound("{not json").unwrap_err();
        assert!(matches!(err, SignalParseError::InvalidJson(_)));
        assert_eq!(err.label(), "invalid_json");
    }

    #[test]
    fn test_parse_inbound_rejects_unknown_type() {
        let err = SignalEvent::parse_inbound(r#"{"type":"renegotiate","data":{}}"#).unwrap_err();
        assert_eq!(err, SignalParseError::UnknownType("renegotiate".to_string()));
    }

    #[test]
    fn test_parse_inbound_rejects_server_only_types() {
        for kind in ["welcome", "peer-joined", "peer-left", "error"] {
            let frame = json!({"type": kind, "data": {}}).to_string();
            let err = SignalEvent::parse_inbound(&frame).unwrap_err();
            assert!(
                matches!(err, SignalParseError::ServerOnlyType(k) if k == kind),
                "{kind} should be rejected"
            );
        }
    }

    #[test]
    fn test_wire_shape_of_relayed_event() {
        let event = SignalEvent::from_sender(
            SignalPayload::IceCandidate(IceCandidate(json!({"candidate": "c1"}))),
            "client-a",
        );

        let value: Value = serde_json::from_str(&event.to_frame().unwrap()).unwrap();
        assert_eq!(value["type"], "ice-candidate");
        assert_eq!(value["data"], json!({"candidate": "c1"}));
        assert_eq!(value["sender_id"], "client-a");
        assert!(value["timestamp"].as_str().unwrap().contains('T'));
    }

    #[test]
    fn test_sender_id_omitted_when_absent() {
        let event = SignalEvent::error(INVALID_SIGNAL_CODE, "bad frame");
        let value: Value = serde_json::from_str(&event.to_frame().unwrap()).unwrap();

        assert!(value.get("sender_id").is_none());
        assert_eq!(value["type"], "error");
        assert_eq!(value["data"]["code"], INVALID_SIGNAL_CODE);
    }

    #[test]
    fn test_server_events_deserialize_from_frames() {
        let welcome = SignalEvent::new(SignalPayload::Welcome(Welcome {
            client_id: "c2".to_string(),
            room_id: "standup".to_string(),
            participants: vec![peer("c1")],
        }));
        let parsed: SignalEvent = serde_json::from_str(&welcome.to_frame().unwrap()).unwrap();
        assert_eq!(parsed, welcome);

        let left = SignalEvent::new(SignalPayload::PeerLeft(PeerLeft {
            peer: peer("c1"),
            reason: LeaveReason::Timeout,
        }));
        let frame = left.to_frame().unwrap();
        assert!(frame.contains(r#""reason":"timeout""#));
        let parsed: SignalEvent = serde_json::from_str(&frame).unwrap();
        assert_eq!(parsed, left);
    }

    #[test]
    fn test_structured_payload_rejects_wrong_shape() {
        let err = serde_json::from_str::<SignalEvent>(r#"{"type":"peer-joined","data":42}"#)
            .unwrap_err();
        assert!(err.to_string().contains("invalid data for peer-joined"));
    }

    #[test]
    fn test_kind_classification() {
        assert!(SignalKind::Offer.is_negotiation());
        assert!(SignalKind::IceCandidate.is_negotiation());
        assert!(!SignalKind::Leave.is_negotiation());
        assert!(SignalKind::Leave.is_client_originated());
        assert!(!SignalKind::Welcome.is_client_originated());
        assert_eq!("ice-candidate".parse::<SignalKind>().unwrap(), SignalKind::IceCandidate);
    }
}
