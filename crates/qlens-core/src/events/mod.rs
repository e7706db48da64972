//! Trace event model
//!
//! Every record in a trace carries a qualified name (`<category>:<event>`). The category
//! selects a protocol family and the event part selects a payload variant, so the payload
//! type of an event is fully determined by its name:
//!
//! - `moq*:` - Media over QUIC, the application protocol ([`moq`])
//! - `quic*:` - QUIC, the transport protocol ([`quic`])
//!
//! Decoding goes through one factory, [`PayloadData::decode`], which matches exhaustively on
//! the parsed [`EventKind`].

pub mod moq;
pub mod quic;

pub use moq::*;
pub use quic::*;

use crate::error::{TraceError, TraceResult};
use crate::trace_file::TimeFormat;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;

/// Protocol families a trace may carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Protocol {
    /// QUIC transport events
    Quic,
    /// Media over QUIC application events
    Moq,
}

impl Protocol {
    /// Resolve the protocol from the category part of a qualified name
    pub fn from_category(category: &str) -> Option<Self> {
        if category.starts_with("moq") {
            Some(Protocol::Moq)
        } else if category.starts_with("quic") {
            Some(Protocol::Quic)
        } else {
            None
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, Protocol::Quic)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Quic => "quic",
            Protocol::Moq => "moq",
        }
    }
}

/// Sending-side or receiving-side observation of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Created,
    Parsed,
}

impl Action {
    pub fn opposite(&self) -> Action {
        match self {
            Action::Created => Action::Parsed,
            Action::Parsed => Action::Created,
        }
    }
}

/// Normalized event kind, one closed family per protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Moq(MoqEventKind),
    Quic(QuicEventKind),
}

/// A parsed qualified event name such as `moq:announce_created`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventName {
    qualified: String,
    /// Byte offset where the short name starts
    short_start: usize,
    /// Byte offset (from the start of `qualified`) where the action suffix starts
    base_end: usize,
    protocol: Protocol,
    kind: EventKind,
    action: Option<Action>,
}

impl EventName {
    /// Parse a qualified name, returning a reason on failure
    pub fn parse(qualified: &str) -> Result<Self, String> {
        let (category, short_start) = match qualified.rfind(':') {
            Some(idx) => (&qualified[..idx], idx + 1),
            None => (qualified, 0),
        };
        let protocol = Protocol::from_category(category)
            .ok_or_else(|| format!("unknown protocol category '{}'", category))?;

        let short = &qualified[short_start..];
        let action = if short.ends_with("created") {
            Some(Action::Created)
        } else if short.ends_with("parsed") {
            Some(Action::Parsed)
        } else {
            None
        };
        let base_len = match (short.find("_created"), short.find("_parsed")) {
            (Some(c), Some(p)) => c.max(p),
            (Some(idx), None) | (None, Some(idx)) => idx,
            (None, None) => short.len(),
        };
        let base = &short[..base_len];

        let kind = match protocol {
            Protocol::Moq => MoqEventKind::from_base_name(base).map(EventKind::Moq),
            Protocol::Quic => QuicEventKind::from_short_name(short).map(EventKind::Quic),
        }
        .ok_or_else(|| format!("unknown {} event '{}'", protocol.as_str(), short))?;

        Ok(Self {
            qualified: qualified.to_string(),
            short_start,
            base_end: short_start + base_len,
            protocol,
            kind,
            action,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.qualified
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// `_created` / `_parsed` suffix, if any
    pub fn action(&self) -> Option<Action> {
        self.action
    }

    /// Name without the category, e.g. `announce_created`
    pub fn short_name(&self) -> &str {
        &self.qualified[self.short_start..]
    }

    /// Short name without the action suffix, e.g. `announce`
    pub fn base_name(&self) -> &str {
        &self.qualified[self.short_start..self.base_end]
    }

    pub fn ends_with(&self, suffix: &str) -> bool {
        self.qualified.ends_with(suffix)
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.qualified)
    }
}

impl Serialize for EventName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.qualified)
    }
}

/// Protocol-specific payload of an event
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PayloadData {
    Moq(MoqPayload),
    Quic(QuicPayload),
}

impl PayloadData {
    /// Decode the payload variant selected by `name`
    pub fn decode(name: &EventName, data: &Value) -> Result<Self, serde_json::Error> {
        match name.kind() {
            EventKind::Moq(kind) => MoqPayload::decode(kind, data).map(PayloadData::Moq),
            EventKind::Quic(kind) => QuicPayload::decode(kind, data).map(PayloadData::Quic),
        }
    }

    /// Whether `other` is the semantically compatible counterpart of this payload
    pub fn corresponds(&self, other: &PayloadData) -> bool {
        match (self, other) {
            (PayloadData::Moq(a), PayloadData::Moq(b)) => a.corresponds(b),
            (PayloadData::Quic(a), PayloadData::Quic(b)) => a.corresponds(b),
            _ => false,
        }
    }

    /// Display-oriented merge of both sides: this side's fields win, fields only the other
    /// side carries are added.
    pub fn summarize(&self, other: &PayloadData) -> Map<String, Value> {
        let mut summary = to_object(self);
        for (key, value) in to_object(other) {
            summary.entry(key).or_insert(value);
        }
        summary
    }

    pub fn protocol(&self) -> Protocol {
        match self {
            PayloadData::Moq(_) => Protocol::Moq,
            PayloadData::Quic(_) => Protocol::Quic,
        }
    }
}

fn to_object<T: Serialize>(value: &T) -> Map<String, Value> {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    }
}

/// Raw byte information attached to frames and packets
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload_length: Option<u64>,

    /// Hex-encoded bytes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

impl RawInfo {
    /// Fields missing on either side never conflict
    pub fn corresponds(&self, other: &RawInfo) -> bool {
        agrees(&self.length, &other.length)
            && agrees(&self.payload_length, &other.payload_length)
            && agrees(&self.data, &other.data)
    }
}

/// Equal when both sides are present, otherwise non-conflicting
pub(crate) fn agrees<T: PartialEq>(a: &Option<T>, b: &Option<T>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a == b,
        _ => true,
    }
}

/// Optional per-event system context
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemInformation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processor_id: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process_id: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<u64>,
}

/// One decoded trace record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    /// Absolute event time (relative formats are resolved by the owning trace file)
    pub time: i64,

    pub name: EventName,

    pub data: PayloadData,

    /// Connection / group identifier correlating events across endpoints
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_format: Option<TimeFormat>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol_types: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_information: Option<SystemInformation>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_fields: Option<Value>,
}

impl Event {
    /// Decode one raw event record.
    ///
    /// Missing `time`/`name` fail the whole file; an unknown name or an incomplete payload
    /// fails only this event.
    pub fn from_record(record: &Value, file_name: &str, group_id_field: &str) -> TraceResult<Self> {
        let obj = record
            .as_object()
            .ok_or_else(|| TraceError::malformed(file_name, "event record is not an object"))?;

        let raw_time = obj
            .get("time")
            .ok_or_else(|| TraceError::malformed(file_name, "event record without 'time'"))?;
        let time = parse_time(raw_time).ok_or_else(|| {
            TraceError::malformed(file_name, format!("event time '{}' is not a number", raw_time))
        })?;
        let raw_name = obj
            .get("name")
            .ok_or_else(|| TraceError::malformed(file_name, "event record without 'name'"))?;
        let name_str = match raw_name {
            Value::String(s) => s.as_str(),
            other => {
                return Err(TraceError::malformed(
                    file_name,
                    format!("event name '{}' is not a string", other),
                ))
            }
        };

        let data = obj
            .get("data")
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new()));

        let name = EventName::parse(name_str)
            .map_err(|reason| TraceError::unrecognized(file_name, name_str, &data, reason))?;
        let payload = PayloadData::decode(&name, &data).map_err(|err| {
            TraceError::unrecognized(file_name, name_str, &data, err.to_string())
        })?;

        let time_format = match obj.get("time_format") {
            Some(Value::String(s)) => Some(TimeFormat::parse(s).ok_or_else(|| {
                TraceError::malformed(file_name, format!("unknown time format '{}'", s))
            })?),
            _ => None,
        };

        Ok(Self {
            time,
            name,
            data: payload,
            group_id: obj.get(group_id_field).and_then(group_id_string),
            path: obj.get("path").and_then(Value::as_str).map(str::to_string),
            time_format,
            protocol_types: obj
                .get("protocol_types")
                .and_then(|v| Vec::<String>::deserialize(v).ok()),
            system_information: obj
                .get("system_information")
                .and_then(|v| SystemInformation::deserialize(v).ok()),
            custom_fields: obj.get("custom_fields").cloned(),
        })
    }

    pub fn protocol(&self) -> Protocol {
        self.name.protocol()
    }
}

/// Event times are integers; fractional values are truncated and numeric strings accepted
pub(crate) fn parse_time(value: &Value) -> Option<i64> {
    let float = match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                return Some(i);
            }
            n.as_f64()?
        }
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    float.is_finite().then(|| float.trunc() as i64)
}

/// Group ids are opaque; numeric ids are kept in their textual form
pub(crate) fn group_id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
