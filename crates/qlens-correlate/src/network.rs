//! Network aggregates
//!
//! A [`Network`] is rebuilt from scratch for every set of active files and visibility
//! filter. A [`NetworkSelection`] recomputes rows and nesting over a subset of its
//! connections.

use crate::connection::{Connection, ConnectionKey};
use crate::grouper::{group_endpoints, EndpointView};
use crate::ordinal::assign_ordinals;
use crate::pairer::{pair_endpoints, unpaired};
use crate::traced::{ProtocolFilter, TracedEvent};
use qlens_core::{Protocol, TraceFile};
use std::collections::HashMap;
use tracing::{info, warn};

/// Read-only view shared by [`Network`] and [`NetworkSelection`]
pub trait ConnectionGraph {
    /// Participating file names
    fn nodes(&self) -> &[String];
    fn connections(&self) -> &[Connection];
    /// Number of diagram rows
    fn max_event_num(&self) -> usize;
    /// Earliest surviving event time
    fn start_time(&self) -> Option<i64>;
    fn contains_transport_events(&self) -> bool;
}

/// The reconstructed multi-file session
#[derive(Debug, Clone)]
pub struct Network {
    pub nodes: Vec<String>,
    pub connections: Vec<Connection>,
    /// Events without a connection id
    pub ungrouped_events: Vec<TracedEvent>,
    /// Endpoints whose counterpart file was never imported
    pub unpaired_endpoints: Vec<EndpointView>,
    pub max_event_num: usize,
    pub start_time: Option<i64>,
    pub contains_transport_events: bool,
    pub filter: ProtocolFilter,
}

impl Network {
    /// Reconstruct every connection across `files`, keeping only events `filter` allows
    pub fn build(files: &[&TraceFile], filter: ProtocolFilter) -> Self {
        let mut streams: Vec<Vec<TracedEvent>> = files
            .iter()
            .map(|file| {
                let mut stream: Vec<TracedEvent> = file
                    .events
                    .iter()
                    .filter(|event| filter.allows(event.protocol()))
                    .map(|event| TracedEvent::new(event.clone(), file.name.as_str()))
                    .collect();
                stream.sort_by_key(TracedEvent::time);
                stream
            })
            .collect();

        let max_event_num = assign_ordinals(&mut streams);
        let start_time = earliest(&streams);
        let contains_transport_events = has_transport(&streams);

        let grouping = group_endpoints(streams.into_iter().flatten());
        let pairs = pair_endpoints(&grouping.views);
        let unpaired_endpoints: Vec<EndpointView> = unpaired(&grouping.views, &pairs)
            .into_iter()
            .map(|i| grouping.views[i].clone())
            .collect();
        let connections: Vec<Connection> = pairs
            .iter()
            .map(|&(i, j)| Connection::new(grouping.views[i].clone(), grouping.views[j].clone()))
            .collect();

        info!(
            "Built network over {} files: {} connections, {} rows",
            files.len(),
            connections.len(),
            max_event_num
        );

        Self {
            nodes: files.iter().map(|f| f.name.clone()).collect(),
            connections,
            ungrouped_events: grouping.ungrouped,
            unpaired_endpoints,
            max_event_num,
            start_time,
            contains_transport_events,
            filter,
        }
    }

    /// Look up a connection by its key
    pub fn connection(&self, key: &ConnectionKey) -> Option<&Connection> {
        self.connections.iter().find(|c| &c.key() == key)
    }

    /// All connections sharing a connection id (more than one when three or more files carry it)
    pub fn connections_with_id<'a>(
        &'a self,
        id: &'a str,
    ) -> impl Iterator<Item = &'a Connection> {
        self.connections
            .iter()
            .filter(move |c| c.connection_id() == id)
    }
}

impl ConnectionGraph for Network {
    fn nodes(&self) -> &[String] {
        &self.nodes
    }

    fn connections(&self) -> &[Connection] {
        &self.connections
    }

    fn max_event_num(&self) -> usize {
        self.max_event_num
    }

    fn start_time(&self) -> Option<i64> {
        self.start_time
    }

    fn contains_transport_events(&self) -> bool {
        self.contains_transport_events
    }
}

/// A network restricted to selected connections, with its own rows and nesting
#[derive(Debug, Clone)]
pub struct NetworkSelection {
    pub nodes: Vec<String>,
    pub connections: Vec<Connection>,
    pub max_event_num: usize,
    pub start_time: Option<i64>,
    pub contains_transport_events: bool,
}

impl NetworkSelection {
    /// Rebuild `connections` on their own, with fresh rows and nesting slots
    pub fn build(connections: &[&Connection], filter: ProtocolFilter) -> Self {
        // Collect each endpoint once, then restore per-file order
        let mut seen: Vec<(String, String)> = Vec::new();
        let mut nodes: Vec<String> = Vec::new();
        let mut per_file: HashMap<String, Vec<TracedEvent>> = HashMap::new();

        let endpoints = connections
            .iter()
            .flat_map(|c| [&c.starting, &c.accepting]);
        for view in endpoints {
            let key = (view.file_name.clone(), view.connection_id.clone());
            if seen.contains(&key) {
                continue;
            }
            seen.push(key);

            if !nodes.contains(&view.file_name) {
                nodes.push(view.file_name.clone());
            }
            per_file.entry(view.file_name.clone()).or_default().extend(
                view.events
                    .iter()
                    .filter(|e| filter.allows(e.protocol()))
                    .cloned(),
            );
        }

        let mut streams: Vec<Vec<TracedEvent>> = nodes
            .iter()
            .map(|node| {
                let mut stream = per_file.remove(node).unwrap_or_default();
                stream.sort_by_key(|e| e.order_num);
                stream
            })
            .collect();

        let max_event_num = assign_ordinals(&mut streams);
        let start_time = earliest(&streams);
        let contains_transport_events = has_transport(&streams);

        let grouping = group_endpoints(streams.into_iter().flatten());
        let mut rebuilt = Vec::with_capacity(connections.len());
        for connection in connections {
            let find = |file: &str| {
                grouping
                    .views
                    .iter()
                    .find(|v| v.file_name == file && v.connection_id == connection.connection_id())
                    .cloned()
            };
            match (
                find(&connection.starting.file_name),
                find(&connection.accepting.file_name),
            ) {
                (Some(starting), Some(accepting)) => {
                    rebuilt.push(Connection::new(starting, accepting))
                }
                _ => warn!(
                    "Connection {} has no visible events under the current filter",
                    connection.key()
                ),
            }
        }

        info!(
            "Built selection of {} connections, {} rows",
            rebuilt.len(),
            max_event_num
        );

        Self {
            nodes,
            connections: rebuilt,
            max_event_num,
            start_time,
            contains_transport_events,
        }
    }
}

impl ConnectionGraph for NetworkSelection {
    fn nodes(&self) -> &[String] {
        &self.nodes
    }

    fn connections(&self) -> &[Connection] {
        &self.connections
    }

    fn max_event_num(&self) -> usize {
        self.max_event_num
    }

    fn start_time(&self) -> Option<i64> {
        self.start_time
    }

    fn contains_transport_events(&self) -> bool {
        self.contains_transport_events
    }
}

/// Connections picked by the caller, in selection order
#[derive(Debug, Clone, Default)]
pub struct ConnectionSelection {
    keys: Vec<ConnectionKey>,
}

impl ConnectionSelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if already selected
    pub fn select(&mut self, key: ConnectionKey) -> bool {
        if self.contains(&key) {
            return false;
        }
        self.keys.push(key);
        true
    }

    /// Select every connection of `network` with this id; returns how many were added
    pub fn select_id(&mut self, network: &Network, id: &str) -> usize {
        network
            .connections_with_id(id)
            .filter(|c| self.select(c.key()))
            .count()
    }

    /// Returns false if the key was not selected
    pub fn deselect(&mut self, key: &ConnectionKey) -> bool {
        let before = self.keys.len();
        self.keys.retain(|k| k != key);
        self.keys.len() != before
    }

    pub fn contains(&self, key: &ConnectionKey) -> bool {
        self.keys.contains(key)
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn keys(&self) -> &[ConnectionKey] {
        &self.keys
    }

    /// Build the selection view over `network`. Keys missing from it are skipped.
    pub fn build(&self, network: &Network, filter: ProtocolFilter) -> NetworkSelection {
        let connections: Vec<&Connection> = self
            .keys
            .iter()
            .filter_map(|key| {
                let connection = network.connection(key);
                if connection.is_none() {
                    warn!("Selected connection {} is not part of the network", key);
                }
                connection
            })
            .collect();
        NetworkSelection::build(&connections, filter)
    }
}

fn earliest(streams: &[Vec<TracedEvent>]) -> Option<i64> {
    streams.iter().filter_map(|s| s.first()).map(TracedEvent::time).min()
}

fn has_transport(streams: &[Vec<TracedEvent>]) -> bool {
    streams
        .iter()
        .flatten()
        .any(|e| e.protocol() == Protocol::Quic)
}

#[cfg(test)]
mod tests {
    use super::*;
    use qlens_core::ParseOptions;
    use serde_json::{json, Value};

    fn trace(name: &str, role: &str, events: &[Value]) -> TraceFile {
        let mut content = format!(
            "\u{1e}{}\n",
            json!({
                "file_schema": "urn:ietf:params:qlog:file:sequential",
                "serialization_format": "application/qlog+json-seq",
                "trace": {"vantage_point": {"type": role}}
            })
        );
        for event in events {
            content.push_str(&format!("\u{1e}{}\n", event));
        }
        TraceFile::parse(name, &content, &ParseOptions::default()).unwrap()
    }

    fn group(time: i64, action: &str, id: &str, seq: u64) -> Value {
        json!({"time": time, "name": format!("moq:group_{}", action), "group_id": id,
               "data": {"subscribe_id": 1, "group_sequence": seq}})
    }

    fn packet(time: i64, name: &str, id: &str, number: u64) -> Value {
        json!({"time": time, "name": format!("quic:{}", name), "group_id": id,
               "data": {"header": {"packet_type": "1RTT", "packet_number": number}}})
    }

    #[test]
    fn test_build_empty() {
        let network = Network::build(&[], ProtocolFilter::default());
        assert!(network.connections.is_empty());
        assert_eq!(network.max_event_num, 0);
        assert_eq!(network.start_time, None);
        assert!(!network.contains_transport_events);
    }

    #[test]
    fn test_build_network() {
        let client = trace(
            "client.sqlog",
            "client",
            &[
                group(0, "created", "c1", 0),
                packet(1, "packet_sent", "c1", 0),
                group(2, "created", "c2", 0),
                json!({"time": 3, "name": "moq:stream_created", "data": {"stream_type": "group"}}),
            ],
        );
        let server = trace(
            "server.sqlog",
            "server",
            &[group(4, "parsed", "c1", 0), packet(4, "packet_received", "c1", 0)],
        );

        let network = Network::build(&[&client, &server], ProtocolFilter::default());
        assert_eq!(network.nodes, vec!["client.sqlog", "server.sqlog"]);
        assert_eq!(network.connections.len(), 1);
        assert_eq!(network.ungrouped_events.len(), 1);
        assert_eq!(network.unpaired_endpoints.len(), 1);
        assert_eq!(network.unpaired_endpoints[0].connection_id, "c2");
        assert_eq!(network.start_time, Some(0));
        assert!(network.contains_transport_events);

        let connection = &network.connections[0];
        assert_eq!(connection.starting.file_name, "client.sqlog");
        assert_eq!(connection.matched_pairs.len(), 2);
        assert!(connection.unmatched_events.is_empty());
        // rows: 0, 1, 2, 3 on the client; both server events at t=4 need two rows
        assert_eq!(network.max_event_num, 6);
    }

    #[test]
    fn test_filter_hides_transport() {
        let client = trace(
            "a",
            "client",
            &[group(0, "created", "c1", 0), packet(1, "packet_sent", "c1", 0)],
        );
        let server = trace(
            "b",
            "server",
            &[group(2, "parsed", "c1", 0), packet(3, "packet_received", "c1", 0)],
        );

        let filter = ProtocolFilter {
            show_transport: false,
            show_application: true,
        };
        let network = Network::build(&[&client, &server], filter);
        assert!(!network.contains_transport_events);
        assert_eq!(network.max_event_num, 2);
        assert_eq!(network.connections[0].matched_pairs.len(), 1);
    }

    #[test]
    fn test_selection_recomputes_rows() {
        let a = trace(
            "a",
            "client",
            &[
                group(0, "created", "c1", 0),
                group(1, "created", "c2", 0),
                group(2, "created", "c1", 1),
            ],
        );
        let b = trace(
            "b",
            "server",
            &[
                group(3, "parsed", "c1", 0),
                group(4, "parsed", "c2", 0),
                group(5, "parsed", "c1", 1),
            ],
        );
        let network = Network::build(&[&a, &b], ProtocolFilter::default());
        assert_eq!(network.max_event_num, 6);

        let mut selection = ConnectionSelection::new();
        assert_eq!(selection.select_id(&network, "c1"), 1);
        assert_eq!(selection.select_id(&network, "c1"), 0);

        let view = selection.build(&network, ProtocolFilter::default());
        assert_eq!(view.nodes, vec!["a", "b"]);
        assert_eq!(view.connections.len(), 1);
        assert_eq!(view.max_event_num, 4);

        let pairs = &view.connections[0].matched_pairs;
        let spans: Vec<(usize, usize)> = pairs.iter().map(|p| p.span()).collect();
        assert_eq!(spans, vec![(0, 2), (1, 3)]);

        // The network itself keeps its own rows
        let original = network.connections_with_id("c1").next().unwrap();
        assert_eq!(original.matched_pairs[0].span(), (0, 3));
    }

    #[test]
    fn test_selection_bookkeeping() {
        let key = ConnectionKey {
            connection_id: "c1".to_string(),
            starting_file: "a".to_string(),
            accepting_file: "b".to_string(),
        };
        let mut selection = ConnectionSelection::new();
        assert!(selection.is_empty());
        assert!(selection.select(key.clone()));
        assert!(!selection.select(key.clone()));
        assert!(selection.contains(&key));
        assert_eq!(selection.len(), 1);
        assert!(selection.deselect(&key));
        assert!(!selection.deselect(&key));

        // Unknown keys build an empty view
        selection.select(key);
        let network = Network::build(&[], ProtocolFilter::default());
        let view = selection.build(&network, ProtocolFilter::default());
        assert!(view.connections.is_empty());
        assert_eq!(view.max_event_num, 0);
    }
}
