//! Trace files
//!
//! A trace file is a JSON text sequence (records separated by `0x1E`), or newline-delimited
//! JSON when no separator is present. Record 0 describes the file; every following record
//! is one [`Event`].

use crate::error::{TraceError, TraceResult};
use crate::events::{parse_time, Event};
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// ASCII record separator used by JSON text sequences
pub const RECORD_SEPARATOR: char = '\u{1e}';

/// Default event key carrying the connection / group identifier
pub const DEFAULT_GROUP_ID_FIELD: &str = "group_id";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeFormat {
    RelativeToEpoch,
    RelativeToPreviousEvent,
}

impl TimeFormat {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "relative_to_epoch" => Some(TimeFormat::RelativeToEpoch),
            "relative_to_previous_event" => Some(TimeFormat::RelativeToPreviousEvent),
            _ => None,
        }
    }
}

/// Declared role of the endpoint that produced a trace
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VantagePointType {
    Client,
    Server,
    Network,
    #[default]
    Unknown,
}

impl VantagePointType {
    pub fn as_str(&self) -> &'static str {
        match self {
            VantagePointType::Client => "client",
            VantagePointType::Server => "server",
            VantagePointType::Network => "network",
            VantagePointType::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VantagePoint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(rename = "type")]
    pub kind: VantagePointType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flow: Option<VantagePointType>,
}

/// Clock epoch: either unknown or a fixed point in time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Epoch {
    Unknown,
    At(DateTime<FixedOffset>),
}

impl TryFrom<String> for Epoch {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value == "unknown" {
            return Ok(Epoch::Unknown);
        }
        DateTime::parse_from_rfc3339(&value)
            .map(Epoch::At)
            .map_err(|e| format!("invalid epoch '{}': {}", value, e))
    }
}

impl From<Epoch> for String {
    fn from(epoch: Epoch) -> Self {
        match epoch {
            Epoch::Unknown => "unknown".to_string(),
            Epoch::At(at) => at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceTime {
    /// "system", "monotonic" or implementation specific
    pub clock_type: String,

    pub epoch: Epoch,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wall_clock_time: Option<DateTime<FixedOffset>>,
}

/// Fields shared by every event of a trace
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommonFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_format: Option<TimeFormat>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_time: Option<ReferenceTime>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol_types: Option<Vec<String>>,

    /// Group id applied to events that carry none
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_fields: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TraceInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub common_fields: Option<CommonFields>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vantage_point: Option<VantagePoint>,
}

/// File-level metadata (record 0)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileDetails {
    pub file_schema: String,

    pub serialization_format: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub event_schemas: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace: Option<TraceInfo>,
}

impl FileDetails {
    pub fn common_fields(&self) -> Option<&CommonFields> {
        self.trace.as_ref()?.common_fields.as_ref()
    }

    pub fn vantage_point(&self) -> Option<&VantagePoint> {
        self.trace.as_ref()?.vantage_point.as_ref()
    }
}

/// Options controlling how records are decoded
#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// Event key carrying the connection / group id
    pub group_id_field: String,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            group_id_field: DEFAULT_GROUP_ID_FIELD.to_string(),
        }
    }
}

/// An event record dropped during parsing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedEvent {
    /// 1-based record index after the file details
    pub record: usize,
    pub name: Option<String>,
    pub data: Value,
    pub reason: String,
}

/// One endpoint's full, decoded log
#[derive(Debug, Clone)]
pub struct TraceFile {
    pub name: String,

    pub details: FileDetails,

    /// Events in file order; shared read-only with every network built from this file
    pub events: Vec<Arc<Event>>,

    /// Events dropped because their name or payload could not be decoded
    pub rejected: Vec<RejectedEvent>,

    /// Event key the group id was read from; serialization writes it back under the same key
    pub group_id_field: String,
}

impl TraceFile {
    /// Parse the full content of a trace file
    pub fn parse(name: &str, content: &str, options: &ParseOptions) -> TraceResult<Self> {
        let records = split_records(content);

        if records.len() < 2 {
            return Err(TraceError::malformed(
                name,
                format!(
                    "expected file details and at least one event, found {} record(s)",
                    records.len()
                ),
            ));
        }

        let header: Value = serde_json::from_str(records[0]).map_err(|e| {
            TraceError::malformed(name, format!("file details are not valid JSON: {}", e))
        })?;
        let details = FileDetails::deserialize(&header)
            .map_err(|e| TraceError::malformed(name, format!("invalid file details: {}", e)))?;

        let common = details.common_fields();
        let file_time_format = common.and_then(|c| c.time_format);
        let default_group_id = common
            .and_then(|c| c.group_id.as_ref())
            .and_then(crate::events::group_id_string);

        let mut events = Vec::with_capacity(records.len() - 1);
        let mut rejected = Vec::new();
        let mut previous_time = 0i64;

        for (index, record) in records[1..].iter().enumerate() {
            let value: Value = serde_json::from_str(record).map_err(|e| {
                TraceError::malformed(
                    name,
                    format!("record {} is not valid JSON: {}", index + 1, e),
                )
            })?;

            let relative = record_time_format(&value).or(file_time_format)
                == Some(TimeFormat::RelativeToPreviousEvent);

            match Event::from_record(&value, name, &options.group_id_field) {
                Ok(mut event) => {
                    if relative {
                        event.time = event.time.saturating_add(previous_time);
                        event.time_format = Some(TimeFormat::RelativeToEpoch);
                    }
                    previous_time = event.time;

                    if event.group_id.is_none() {
                        event.group_id = default_group_id.clone();
                    }
                    events.push(Arc::new(event));
                }
                Err(err) if !err.is_file_level() => {
                    warn!("Dropping event {} in {}: {}", index + 1, name, err);
                    // Keep the clock running for relative timestamps
                    if let Some(time) = value.get("time").and_then(parse_time) {
                        previous_time = if relative {
                            previous_time.saturating_add(time)
                        } else {
                            time
                        };
                    }
                    rejected.push(RejectedEvent {
                        record: index + 1,
                        name: value.get("name").and_then(Value::as_str).map(str::to_string),
                        data: value.get("data").cloned().unwrap_or(Value::Null),
                        reason: err.to_string(),
                    });
                }
                Err(err) => return Err(err),
            }
        }

        info!(
            "Parsed {}: {} events, {} rejected",
            name,
            events.len(),
            rejected.len()
        );
        debug!("{} declares role {}", name, role_of(&details).as_str());

        Ok(Self {
            name: name.to_string(),
            details,
            events,
            rejected,
            group_id_field: options.group_id_field.clone(),
        })
    }

    /// Declared endpoint role
    pub fn role(&self) -> VantagePointType {
        role_of(&self.details)
    }

    /// Declared `file_schema`
    pub fn schema(&self) -> &str {
        &self.details.file_schema
    }

    /// File title, falling back to the trace title
    pub fn title(&self) -> Option<&str> {
        self.details
            .title
            .as_deref()
            .or_else(|| self.details.trace.as_ref()?.title.as_deref())
    }

    /// Serialize back into JSON text sequence form
    pub fn to_json_seq(&self) -> Result<String, serde_json::Error> {
        let mut out = String::new();
        out.push(RECORD_SEPARATOR);
        out.push_str(&serde_json::to_string(&self.details)?);
        out.push('\n');
        for event in &self.events {
            out.push(RECORD_SEPARATOR);
            if self.group_id_field == DEFAULT_GROUP_ID_FIELD {
                out.push_str(&serde_json::to_string(event.as_ref())?);
            } else {
                let mut record = serde_json::to_value(event.as_ref())?;
                if let Some(obj) = record.as_object_mut() {
                    if let Some(id) = obj.remove(DEFAULT_GROUP_ID_FIELD) {
                        obj.insert(self.group_id_field.clone(), id);
                    }
                }
                out.push_str(&serde_json::to_string(&record)?);
            }
            out.push('\n');
        }
        Ok(out)
    }
}

fn role_of(details: &FileDetails) -> VantagePointType {
    details.vantage_point().map(|vp| vp.kind).unwrap_or_default()
}

fn record_time_format(value: &Value) -> Option<TimeFormat> {
    value
        .get("time_format")
        .and_then(Value::as_str)
        .and_then(TimeFormat::parse)
}

/// Split file content into trimmed, non-empty records
pub fn split_records(content: &str) -> Vec<&str> {
    if content.contains(RECORD_SEPARATOR) {
        content
            .split(RECORD_SEPARATOR)
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .collect()
    } else {
        content
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect()
    }
}
