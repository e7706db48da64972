//! End-to-end correlation scenarios

use qlens_core::loader::load_trace_files;
use qlens_core::{ParseOptions, TraceFile, TraceSet};
use qlens_correlate::nesting::assign_slots;
use qlens_correlate::{
    ConnectionSelection, Network, NetworkReport, ProtocolFilter, Role,
};
use serde_json::{json, Value};
use std::io::Write;
use std::path::PathBuf;
use tempfile::NamedTempFile;

fn content(role: &str, events: &[Value]) -> String {
    let details = json!({
        "file_schema": "urn:ietf:params:qlog:file:sequential",
        "serialization_format": "application/qlog+json-seq",
        "trace": {
            "common_fields": {"time_format": "relative_to_epoch"},
            "vantage_point": {"type": role}
        }
    });
    std::iter::once(&details)
        .chain(events)
        .map(|record| format!("\u{1e}{}\n", record))
        .collect()
}

fn trace(name: &str, role: &str, events: &[Value]) -> TraceFile {
    TraceFile::parse(name, &content(role, events), &ParseOptions::default()).unwrap()
}

fn moq(time: i64, name: &str, id: &str, data: Value) -> Value {
    json!({"time": time, "name": format!("moq:{}", name), "group_id": id, "data": data})
}

fn quic(time: i64, name: &str, id: &str, number: u64) -> Value {
    json!({"time": time, "name": format!("quic:{}", name), "group_id": id,
           "data": {"header": {"packet_type": "1RTT", "packet_number": number},
                    "frames": [{"frame_type": "stream", "stream_id": 0, "offset": number * 100}]}})
}

fn group(seq: u64) -> Value {
    json!({"subscribe_id": 1, "group_sequence": seq})
}

fn subscription() -> Value {
    json!({
        "subscribe_id": 1,
        "track_path_parts": ["live"],
        "track_priority": 0,
        "group_order": 0,
        "group_min": 0,
        "group_max": 9
    })
}

/// A client/server session with both protocols and a few in-flight messages
fn session() -> (TraceFile, TraceFile) {
    let client = trace(
        "client.sqlog",
        "client",
        &[
            moq(
                0,
                "session_started",
                "c1",
                json!({"supported_versions": [1, 2], "extension_ids": [], "tracing_id": 1}),
            ),
            quic(1, "packet_sent", "c1", 0),
            moq(2, "subscription_started", "c1", subscription()),
            quic(3, "packet_received", "c1", 0),
            moq(8, "group_parsed", "c1", group(0)),
            moq(9, "group_parsed", "c1", group(1)),
            moq(12, "group_parsed", "c1", group(2)),
        ],
    );
    let server = trace(
        "server.sqlog",
        "server",
        &[
            quic(2, "packet_received", "c1", 0),
            quic(2, "packet_sent", "c1", 0),
            moq(5, "session_started", "c1", json!({"selected_version": 2, "extension_ids": []})),
            moq(6, "subscription_started", "c1", subscription()),
            moq(7, "group_created", "c1", group(0)),
            moq(7, "group_created", "c1", group(1)),
            moq(10, "group_created", "c1", group(2)),
            moq(11, "group_created", "c1", group(3)),
        ],
    );
    (client, server)
}

#[test]
fn session_started_pairs_client_with_server() {
    let a = trace(
        "a.sqlog",
        "client",
        &[moq(
            0,
            "session_started",
            "c1",
            json!({"supported_versions": [1], "extension_ids": [], "tracing_id": 4}),
        )],
    );
    let b = trace(
        "b.sqlog",
        "server",
        &[moq(5, "session_started", "c1", json!({"selected_version": 1, "extension_ids": []}))],
    );

    let network = Network::build(&[&a, &b], ProtocolFilter::default());
    assert_eq!(network.connections.len(), 1);

    let connection = &network.connections[0];
    assert_eq!(connection.starting.file_name, "a.sqlog");
    assert_eq!(connection.matched_pairs.len(), 1);
    assert_eq!(connection.matched_pairs[0].created.file_name, "a.sqlog");
    assert_eq!(connection.matched_pairs[0].parsed.file_name, "b.sqlog");
}

#[test]
fn created_event_without_counterpart_is_half_message() {
    let a = trace(
        "a.sqlog",
        "client",
        &[moq(0, "announce_please_created", "c1", json!({"track_prefix_parts": ["room"]}))],
    );
    let b = trace(
        "b.sqlog",
        "server",
        &[moq(4, "info_please_parsed", "c1", json!({"track_path_parts": ["room", "cam"]}))],
    );

    let network = Network::build(&[&a, &b], ProtocolFilter::default());
    let connection = &network.connections[0];
    assert!(connection.matched_pairs.is_empty());

    let from_a: Vec<_> = connection
        .unmatched_events
        .iter()
        .filter(|u| u.event.file_name == "a.sqlog")
        .collect();
    assert_eq!(from_a.len(), 1);
    assert_eq!(from_a[0].event.name(), "moq:announce_please_created");
    assert_eq!(from_a[0].role, Role::Created);
    assert_eq!(from_a[0].expected_file, "b.sqlog");
}

#[test]
fn three_simultaneous_events_share_one_row() {
    let files: Vec<TraceFile> = ["a", "b", "c"]
        .iter()
        .map(|name| trace(name, "unknown", &[moq(10, "group_created", name, group(0))]))
        .collect();
    let refs: Vec<&TraceFile> = files.iter().collect();

    let network = Network::build(&refs, ProtocolFilter::default());
    assert_eq!(network.max_event_num, 1);
    assert_eq!(network.unpaired_endpoints.len(), 3);
    assert!(network
        .unpaired_endpoints
        .iter()
        .all(|view| view.events[0].event_num == 0));
}

#[test]
fn pairs_ending_on_one_row_get_distinct_slots() {
    assert_eq!(assign_slots(&[(0, 5), (1, 5)]), vec![0, 1]);

    let a = trace(
        "a.sqlog",
        "client",
        &[moq(0, "group_created", "c1", group(0)), moq(1, "group_created", "c1", group(1))],
    );
    let b = trace(
        "b.sqlog",
        "server",
        &[moq(5, "group_parsed", "c1", group(0)), moq(5, "group_parsed", "c1", group(1))],
    );
    let network = Network::build(&[&a, &b], ProtocolFilter::default());
    let slots: Vec<Option<usize>> = network.connections[0]
        .matched_pairs
        .iter()
        .map(|p| p.nesting_slot)
        .collect();
    assert_eq!(slots, vec![Some(0), Some(1)]);
}

#[test]
fn connection_and_pair_ordering_hold() {
    let (client, server) = session();
    let network = Network::build(&[&server, &client], ProtocolFilter::default());

    assert_eq!(network.connections.len(), 1);
    for connection in &network.connections {
        assert!(connection.starting.first_time() <= connection.accepting.first_time());
        for pair in &connection.matched_pairs {
            assert!(pair.created.time() <= pair.parsed.time());
        }
    }

    let connection = &network.connections[0];
    assert_eq!(connection.starting.file_name, "client.sqlog");
    // session, subscription, two packets and three groups
    assert_eq!(connection.matched_pairs.len(), 7);
    assert_eq!(connection.unmatched_events.len(), 1);
    assert_eq!(connection.unmatched_events[0].role, Role::Created);
    assert_eq!(connection.unmatched_events[0].expected_file, "client.sqlog");
}

#[test]
fn building_twice_is_identical() {
    let (client, server) = session();
    let files = [&client, &server];

    let first = Network::build(&files, ProtocolFilter::default());
    let second = Network::build(&files, ProtocolFilter::default());

    let positions = |network: &Network| -> Vec<(usize, usize, Option<usize>)> {
        network
            .connections
            .iter()
            .flat_map(|c| &c.matched_pairs)
            .map(|p| (p.created.event_num, p.parsed.event_num, p.nesting_slot))
            .collect()
    };
    assert_eq!(positions(&first), positions(&second));
    assert_eq!(first.max_event_num, second.max_event_num);
}

#[test]
fn ordinals_follow_timestamps() {
    let (client, server) = session();
    let network = Network::build(&[&client, &server], ProtocolFilter::default());
    let connection = &network.connections[0];

    let mut events: Vec<_> = connection
        .starting
        .events
        .iter()
        .chain(&connection.accepting.events)
        .collect();
    events.sort_by_key(|e| e.order_num);

    for (i, a) in events.iter().enumerate() {
        for b in &events[i + 1..] {
            if a.time() < b.time() {
                assert!(a.event_num < b.event_num);
            }
            if a.time() == b.time() && a.file_name == b.file_name {
                assert_ne!(a.event_num, b.event_num);
            }
        }
    }

    // client t=2 and first server t=2 share a row
    let row = |file: &str, time: i64| {
        events
            .iter()
            .find(|e| e.file_name == file && e.time() == time)
            .map(|e| e.event_num)
    };
    assert_eq!(row("client.sqlog", 2), row("server.sqlog", 2));
}

#[test]
fn overlapping_pairs_never_share_a_slot() {
    let (client, server) = session();
    let network = Network::build(&[&client, &server], ProtocolFilter::default());

    for connection in &network.connections {
        let nested: Vec<_> = connection
            .matched_pairs
            .iter()
            .filter(|p| p.nesting_slot.is_some())
            .filter(|p| p.created.event_num != p.parsed.event_num)
            .collect();
        assert!(!nested.is_empty());

        for (i, a) in nested.iter().enumerate() {
            for b in &nested[i + 1..] {
                let (a0, a1) = a.span();
                let (b0, b1) = b.span();
                let (a0, a1) = (a0.min(a1), a0.max(a1));
                let (b0, b1) = (b0.min(b1), b0.max(b1));
                if a0 <= b1 && b0 <= a1 {
                    assert_ne!(a.nesting_slot, b.nesting_slot);
                }
            }
        }

        let transport = connection
            .matched_pairs
            .iter()
            .filter(|p| p.created.name().starts_with("quic"));
        for pair in transport {
            assert_eq!(pair.nesting_slot, None);
        }
    }
}

#[test]
fn selection_over_trace_set() {
    let (client, server) = session();
    let relay = trace(
        "relay.sqlog",
        "server",
        &[
            moq(20, "group_parsed", "c1", group(3)),
            moq(21, "fetch_update_parsed", "c9", json!({"track_priority": 1})),
        ],
    );

    let mut set = TraceSet::new();
    set.add(client).unwrap();
    set.add(server).unwrap();
    set.add(relay).unwrap();

    let network = Network::build(&set.active_files(), ProtocolFilter::default());
    assert_eq!(network.connections.len(), 3);

    let mut selection = ConnectionSelection::new();
    let key = network
        .connections
        .iter()
        .map(|c| c.key())
        .find(|k| k.accepting_file == "relay.sqlog" && k.starting_file == "server.sqlog")
        .unwrap();
    assert!(selection.select(key));

    let view = selection.build(&network, ProtocolFilter::default());
    assert_eq!(view.nodes, vec!["server.sqlog", "relay.sqlog"]);
    assert_eq!(view.connections.len(), 1);
    let pairs = &view.connections[0].matched_pairs;
    assert_eq!(pairs.len(), 1);
    assert_eq!(pairs[0].created.time(), 11);

    // Deactivating a file only affects networks built afterwards
    set.set_active("relay.sqlog", false);
    let smaller = Network::build(&set.active_files(), ProtocolFilter::default());
    assert_eq!(smaller.connections.len(), 1);
    assert_eq!(network.connections.len(), 3);

    let report = serde_json::to_value(NetworkReport::from_network(&smaller)).unwrap();
    assert_eq!(report["connections"][0]["connection_id"], json!("c1"));
    assert_eq!(report["ungrouped_events"], json!(0));
}

#[test]
fn hiding_application_events_keeps_transport_pairs() {
    let (client, server) = session();
    let filter = ProtocolFilter {
        show_transport: true,
        show_application: false,
    };
    let network = Network::build(&[&client, &server], filter);

    let connection = &network.connections[0];
    assert_eq!(connection.matched_pairs.len(), 2);
    assert!(connection.unmatched_events.is_empty());
    assert!(network.contains_transport_events);
    assert_eq!(network.start_time, Some(1));
}

#[tokio::test]
async fn loads_files_and_skips_broken_ones() {
    let (client, server) = session();
    let mut paths = Vec::new();
    let mut handles = Vec::new();

    for text in [
        client.to_json_seq().unwrap(),
        "\u{1e}{\"file_schema\": 1}\n".to_string(),
        server.to_json_seq().unwrap(),
    ] {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(text.as_bytes()).unwrap();
        file.flush().unwrap();
        paths.push(file.path().to_path_buf());
        handles.push(file);
    }
    paths.push(PathBuf::from("/nonexistent/missing.sqlog"));

    let results = load_trace_files(&paths, &ParseOptions::default()).await;
    let loaded: Vec<TraceFile> = results.into_iter().filter_map(|(_, r)| r.ok()).collect();
    assert_eq!(loaded.len(), 2);

    let refs: Vec<&TraceFile> = loaded.iter().collect();
    let network = Network::build(&refs, ProtocolFilter::default());
    assert_eq!(network.connections.len(), 1);
    assert_eq!(network.connections[0].matched_pairs.len(), 7);
}
