//! Bidirectional connections between two endpoints

use crate::correlator::{correlate, MatchedPair, UnmatchedEvent};
use crate::grouper::EndpointView;
use crate::nesting::assign_slots;
use crate::traced::TracedEvent;
use qlens_core::Protocol;
use serde::Serialize;
use std::fmt;
use tracing::debug;

/// Identifies a connection within a network
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ConnectionKey {
    pub connection_id: String,
    pub starting_file: String,
    pub accepting_file: String,
}

impl fmt::Display for ConnectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} -> {})",
            self.connection_id, self.starting_file, self.accepting_file
        )
    }
}

/// Two endpoints of different files sharing a connection id
#[derive(Debug, Clone)]
pub struct Connection {
    /// Endpoint whose first event is earlier
    pub starting: EndpointView,
    pub accepting: EndpointView,
    pub matched_pairs: Vec<MatchedPair>,
    pub unmatched_events: Vec<UnmatchedEvent>,
    /// Non-message events of both endpoints
    pub standalone_events: Vec<TracedEvent>,
}

impl Connection {
    /// Build a connection and correlate its events. Ties on the first event time keep `a`
    /// as the starting endpoint.
    pub fn new(a: EndpointView, b: EndpointView) -> Self {
        let (starting, accepting) = if b.first_time() < a.first_time() {
            (b, a)
        } else {
            (a, b)
        };

        let correlation = correlate(&starting, &accepting);
        let mut connection = Self {
            starting,
            accepting,
            matched_pairs: correlation.matched,
            unmatched_events: correlation.unmatched,
            standalone_events: correlation.standalone,
        };
        connection.assign_nesting();

        debug!(
            "Connection {}: {} matched, {} unmatched, {} standalone",
            connection.key(),
            connection.matched_pairs.len(),
            connection.unmatched_events.len(),
            connection.standalone_events.len()
        );

        connection
    }

    pub fn key(&self) -> ConnectionKey {
        ConnectionKey {
            connection_id: self.connection_id().to_string(),
            starting_file: self.starting.file_name.clone(),
            accepting_file: self.accepting.file_name.clone(),
        }
    }

    pub fn connection_id(&self) -> &str {
        &self.starting.connection_id
    }

    /// Application-protocol pairs get nesting slots; transport pairs are drawn flat
    fn assign_nesting(&mut self) {
        let nested: Vec<usize> = self
            .matched_pairs
            .iter()
            .enumerate()
            .filter(|(_, pair)| pair.created.protocol() == Protocol::Moq)
            .map(|(i, _)| i)
            .collect();

        let spans: Vec<(usize, usize)> = nested
            .iter()
            .map(|&i| self.matched_pairs[i].span())
            .collect();

        for (&i, slot) in nested.iter().zip(assign_slots(&spans)) {
            self.matched_pairs[i].nesting_slot = Some(slot);
        }
    }

    /// Number of slots used by nested pairs; zero without any
    pub fn max_nesting_depth(&self) -> usize {
        self.matched_pairs
            .iter()
            .filter_map(|p| p.nesting_slot)
            .map(|slot| slot + 1)
            .max()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{group_data, traced};
    use serde_json::json;

    fn view(file: &str, events: Vec<TracedEvent>) -> EndpointView {
        EndpointView {
            file_name: file.to_string(),
            connection_id: "c1".to_string(),
            events,
        }
    }

    fn at(mut event: TracedEvent, event_num: usize) -> TracedEvent {
        event.event_num = event_num;
        event
    }

    #[test]
    fn test_starting_endpoint_is_earlier() {
        let a = view("a", vec![traced("a", 7, "moq:group_parsed", "c1", group_data(0, 0))]);
        let b = view("b", vec![traced("b", 2, "moq:group_created", "c1", group_data(0, 0))]);

        let connection = Connection::new(a, b);
        assert_eq!(connection.starting.file_name, "b");
        assert_eq!(connection.accepting.file_name, "a");
        assert_eq!(
            connection.key(),
            ConnectionKey {
                connection_id: "c1".to_string(),
                starting_file: "b".to_string(),
                accepting_file: "a".to_string(),
            }
        );
    }

    #[test]
    fn test_tie_keeps_first_endpoint() {
        let a = view("a", vec![traced("a", 3, "moq:group_parsed", "c1", group_data(0, 0))]);
        let b = view("b", vec![traced("b", 3, "moq:group_created", "c1", group_data(0, 0))]);
        assert_eq!(Connection::new(a, b).starting.file_name, "a");
    }

    #[test]
    fn test_nesting_only_for_application_pairs() {
        let header = json!({"header": {"packet_type": "1RTT", "packet_number": 1}});
        let a = view(
            "a",
            vec![
                at(traced("a", 0, "moq:group_created", "c1", group_data(1, 0)), 0),
                at(traced("a", 1, "moq:group_created", "c1", group_data(1, 1)), 1),
                at(traced("a", 2, "quic:packet_sent", "c1", header.clone()), 2),
            ],
        );
        let b = view(
            "b",
            vec![
                at(traced("b", 5, "moq:group_parsed", "c1", group_data(1, 0)), 4),
                at(traced("b", 5, "moq:group_parsed", "c1", group_data(1, 1)), 5),
                at(traced("b", 6, "quic:packet_received", "c1", header), 6),
            ],
        );

        let connection = Connection::new(a, b);
        let slots: Vec<Option<usize>> =
            connection.matched_pairs.iter().map(|p| p.nesting_slot).collect();
        assert_eq!(slots, vec![Some(0), Some(1), None]);
        assert_eq!(connection.max_nesting_depth(), 2);
    }
}
