//! QUIC (transport protocol) payloads
//!
//! Transport traces are dense and frequently produced by different implementations, so
//! almost every field is optional and compared only when both sides carry it.

use super::{agrees, RawInfo};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuicEventKind {
    ConnectionStarted,
    PacketSent,
    PacketReceived,
    StreamStateUpdated,
}

impl QuicEventKind {
    pub fn from_short_name(short: &str) -> Option<Self> {
        if short.starts_with("connection_started") {
            Some(QuicEventKind::ConnectionStarted)
        } else if short.starts_with("packet_sent") {
            Some(QuicEventKind::PacketSent)
        } else if short.starts_with("packet_received") {
            Some(QuicEventKind::PacketReceived)
        } else if short.starts_with("stream_state_updated") {
            Some(QuicEventKind::StreamStateUpdated)
        } else {
            None
        }
    }
}

/// Decoded QUIC payload
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum QuicPayload {
    ConnectionStarted(ConnectionStarted),
    PacketSent(PacketEvent),
    PacketReceived(PacketEvent),
    StreamStateUpdated(StreamStateUpdated),
}

impl QuicPayload {
    pub fn decode(kind: QuicEventKind, data: &Value) -> Result<Self, serde_json::Error> {
        Ok(match kind {
            QuicEventKind::ConnectionStarted => {
                QuicPayload::ConnectionStarted(ConnectionStarted::deserialize(data)?)
            }
            QuicEventKind::PacketSent => QuicPayload::PacketSent(PacketEvent::deserialize(data)?),
            QuicEventKind::PacketReceived => {
                QuicPayload::PacketReceived(PacketEvent::deserialize(data)?)
            }
            QuicEventKind::StreamStateUpdated => {
                QuicPayload::StreamStateUpdated(StreamStateUpdated::deserialize(data)?)
            }
        })
    }

    pub fn corresponds(&self, other: &QuicPayload) -> bool {
        match (self, other) {
            (QuicPayload::PacketSent(sent), QuicPayload::PacketReceived(received))
            | (QuicPayload::PacketReceived(received), QuicPayload::PacketSent(sent)) => {
                sent.corresponds(received)
            }
            (QuicPayload::StreamStateUpdated(a), QuicPayload::StreamStateUpdated(b)) => {
                a.corresponds(b)
            }
            (QuicPayload::ConnectionStarted(a), QuicPayload::ConnectionStarted(b)) => {
                a.corresponds(b)
            }
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionStarted {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src_ip: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dst_ip: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src_port: Option<u16>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dst_port: Option<u16>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src_cid: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dst_cid: Option<String>,
}

impl ConnectionStarted {
    /// Address/port pairs must agree as an unordered set; each endpoint may log the
    /// connection from its own perspective.
    pub fn corresponds(&self, other: &ConnectionStarted) -> bool {
        let same_endpoint = |ip_a: &Option<String>,
                             port_a: &Option<u16>,
                             ip_b: &Option<String>,
                             port_b: &Option<u16>| {
            agrees(ip_a, ip_b) && agrees(port_a, port_b)
        };

        let direct = same_endpoint(&self.src_ip, &self.src_port, &other.src_ip, &other.src_port)
            && same_endpoint(&self.dst_ip, &self.dst_port, &other.dst_ip, &other.dst_port);
        let mirrored = same_endpoint(&self.src_ip, &self.src_port, &other.dst_ip, &other.dst_port)
            && same_endpoint(&self.dst_ip, &self.dst_port, &other.src_ip, &other.src_port);

        agrees(&self.ip_version, &other.ip_version)
            && agrees(&self.protocol, &other.protocol)
            && (direct || mirrored)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacketHeader {
    /// initial, handshake, 0RTT, 1RTT, retry, ...
    pub packet_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub packet_number: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scid: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dcid: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<u64>,
}

impl PacketHeader {
    pub fn corresponds(&self, other: &PacketHeader) -> bool {
        self.packet_type == other.packet_type
            && agrees(&self.packet_number, &other.packet_number)
            && agrees(&self.version, &other.version)
            && agrees(&self.scid, &other.scid)
            && agrees(&self.dcid, &other.dcid)
            && agrees(&self.length, &other.length)
    }
}

/// A frame inside a packet. Only the frame type is interpreted; all other fields are
/// compared structurally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuicFrame {
    pub frame_type: String,

    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl QuicFrame {
    pub fn corresponds(&self, other: &QuicFrame) -> bool {
        self.frame_type == other.frame_type
            && self
                .fields
                .iter()
                .all(|(key, value)| other.fields.get(key).map_or(true, |v| v == value))
    }
}

/// Payload of both `packet_sent` and `packet_received`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PacketEvent {
    pub header: PacketHeader,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frames: Option<Vec<QuicFrame>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<RawInfo>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datagram_id: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger: Option<String>,
}

impl PacketEvent {
    pub fn corresponds(&self, other: &PacketEvent) -> bool {
        let frames_agree = match (&self.frames, &other.frames) {
            (Some(a), Some(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(fa, fb)| fa.corresponds(fb))
            }
            _ => true,
        };
        let raw_agrees = match (&self.raw, &other.raw) {
            (Some(a), Some(b)) => a.corresponds(b),
            _ => true,
        };

        self.header.corresponds(&other.header) && frames_agree && raw_agrees
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuicStreamType {
    Unidirectional,
    Bidirectional,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamSide {
    Sending,
    Receiving,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamStateUpdated {
    pub stream_id: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream_type: Option<QuicStreamType>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old: Option<String>,

    pub new: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream_side: Option<StreamSide>,
}

impl StreamStateUpdated {
    /// Both endpoints report the same transition from opposite sides of the stream
    pub fn corresponds(&self, other: &StreamStateUpdated) -> bool {
        let opposite_sides = match (self.stream_side, other.stream_side) {
            (Some(a), Some(b)) => a != b,
            _ => true,
        };

        self.stream_id == other.stream_id
            && agrees(&self.stream_type, &other.stream_type)
            && agrees(&self.old, &other.old)
            && self.new == other.new
            && opposite_sides
    }

    pub fn is_sending(&self) -> bool {
        self.stream_side == Some(StreamSide::Sending)
    }
}
