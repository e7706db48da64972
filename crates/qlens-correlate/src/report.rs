//! Display projections of correlation results

use crate::connection::{Connection, ConnectionKey};
use crate::correlator::{MatchedPair, Role, UnmatchedEvent};
use crate::network::{ConnectionGraph, Network};
use serde::Serialize;
use serde_json::{Map, Value};

/// Both halves of a message, merged for detail panels
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessageSummary {
    /// `"<created> / <parsed>"`
    pub name: String,
    pub time_sent: i64,
    pub time_received: i64,
    pub latency: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_id: Option<String>,
    pub created_file: String,
    pub parsed_file: String,
    pub created_event_num: usize,
    pub parsed_event_num: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nesting_slot: Option<usize>,
    pub data: Map<String, Value>,
}

/// A message half without counterpart
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HalfMessageSummary {
    pub name: String,
    pub time: i64,
    pub file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_id: Option<String>,
    pub role: Role,
    pub expected_file: String,
    pub event_num: usize,
    pub data: Value,
}

impl MatchedPair {
    pub fn summary(&self) -> MessageSummary {
        let created = &self.created.event;
        let parsed = &self.parsed.event;
        MessageSummary {
            name: format!("{} / {}", created.name, parsed.name),
            time_sent: created.time,
            time_received: parsed.time,
            latency: self.latency(),
            connection_id: created.group_id.clone(),
            created_file: self.created.file_name.clone(),
            parsed_file: self.parsed.file_name.clone(),
            created_event_num: self.created.event_num,
            parsed_event_num: self.parsed.event_num,
            nesting_slot: self.nesting_slot,
            data: created.data.summarize(&parsed.data),
        }
    }
}

impl UnmatchedEvent {
    pub fn summary(&self) -> HalfMessageSummary {
        let event = &self.event.event;
        HalfMessageSummary {
            name: event.name.to_string(),
            time: event.time,
            file: self.event.file_name.clone(),
            connection_id: event.group_id.clone(),
            role: self.role,
            expected_file: self.expected_file.clone(),
            event_num: self.event.event_num,
            data: serde_json::to_value(&event.data).unwrap_or(Value::Null),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ConnectionReport {
    #[serde(flatten)]
    pub key: ConnectionKey,
    pub messages: Vec<MessageSummary>,
    pub half_messages: Vec<HalfMessageSummary>,
    pub standalone_events: usize,
    pub max_nesting_depth: usize,
}

impl From<&Connection> for ConnectionReport {
    fn from(connection: &Connection) -> Self {
        Self {
            key: connection.key(),
            messages: connection
                .matched_pairs
                .iter()
                .map(MatchedPair::summary)
                .collect(),
            half_messages: connection
                .unmatched_events
                .iter()
                .map(UnmatchedEvent::summary)
                .collect(),
            standalone_events: connection.standalone_events.len(),
            max_nesting_depth: connection.max_nesting_depth(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EndpointReport {
    pub file: String,
    pub connection_id: String,
    pub events: usize,
}

/// Serializable summary of a network or selection
#[derive(Debug, Clone, Serialize)]
pub struct NetworkReport {
    pub nodes: Vec<String>,
    pub max_event_num: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<i64>,
    pub contains_transport_events: bool,
    pub connections: Vec<ConnectionReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ungrouped_events: Option<usize>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unpaired_endpoints: Vec<EndpointReport>,
}

impl NetworkReport {
    /// Summarize any network or selection
    pub fn from_graph<G: ConnectionGraph>(graph: &G) -> Self {
        Self {
            nodes: graph.nodes().to_vec(),
            max_event_num: graph.max_event_num(),
            start_time: graph.start_time(),
            contains_transport_events: graph.contains_transport_events(),
            connections: graph.connections().iter().map(ConnectionReport::from).collect(),
            ungrouped_events: None,
            unpaired_endpoints: Vec::new(),
        }
    }

    /// Includes events outside any connection
    pub fn from_network(network: &Network) -> Self {
        let mut report = Self::from_graph(network);
        report.ungrouped_events = Some(network.ungrouped_events.len());
        report.unpaired_endpoints = network
            .unpaired_endpoints
            .iter()
            .map(|view| EndpointReport {
                file: view.file_name.clone(),
                connection_id: view.connection_id.clone(),
                events: view.events.len(),
            })
            .collect();
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correlator::correlate;
    use crate::grouper::EndpointView;
    use crate::testing::traced;
    use serde_json::json;

    fn view(file: &str, events: Vec<crate::TracedEvent>) -> EndpointView {
        EndpointView {
            file_name: file.to_string(),
            connection_id: "c1".to_string(),
            events,
        }
    }

    #[test]
    fn test_message_summary() {
        let sent = traced(
            "a",
            2,
            "quic:packet_sent",
            "c1",
            json!({"header": {"packet_type": "1RTT", "packet_number": 7}, "datagram_id": 3}),
        );
        let received = traced(
            "b",
            9,
            "quic:packet_received",
            "c1",
            json!({
                "header": {"packet_type": "1RTT", "packet_number": 7},
                "trigger": "keys_available"
            }),
        );
        let a = view("a", vec![sent]);
        let b = view("b", vec![received]);

        let correlation = correlate(&a, &b);
        let summary = correlation.matched[0].summary();
        assert_eq!(summary.name, "quic:packet_sent / quic:packet_received");
        assert_eq!(summary.time_sent, 2);
        assert_eq!(summary.time_received, 9);
        assert_eq!(summary.latency, 7);
        assert_eq!(summary.connection_id.as_deref(), Some("c1"));
        assert_eq!(summary.created_file, "a");
        assert_eq!(summary.parsed_file, "b");
        assert_eq!(summary.data.get("datagram_id"), Some(&json!(3)));
        assert_eq!(summary.data.get("trigger"), Some(&json!("keys_available")));
    }

    #[test]
    fn test_half_message_summary() {
        let update = traced(
            "a",
            1,
            "moq:subscription_update_created",
            "c1",
            json!({"track_priority": 1, "group_order": 0, "group_min": 0, "group_max": 4}),
        );
        let a = view("a", vec![update]);
        let b = view("b", vec![]);

        let correlation = correlate(&a, &b);
        let summary = correlation.unmatched[0].summary();
        assert_eq!(summary.name, "moq:subscription_update_created");
        assert_eq!(summary.role, Role::Created);
        assert_eq!(summary.file, "a");
        assert_eq!(summary.expected_file, "b");
        assert_eq!(summary.data["group_max"], json!(4));

        let value = serde_json::to_value(&summary).unwrap();
        assert_eq!(value["role"], json!("created"));
    }
}
