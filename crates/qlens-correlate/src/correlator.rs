//! Matching created events on one endpoint with parsed events on the other
//!
//! Matching is greedy: each message event of the starting endpoint takes the first
//! corresponding event of the accepting endpoint, in file order.

use crate::grouper::EndpointView;
use crate::rules::{is_corresponding, is_created_event, is_message_event};
use crate::traced::TracedEvent;
use serde::Serialize;
use tracing::trace;

/// The two halves of one message
#[derive(Debug, Clone)]
pub struct MatchedPair {
    pub created: TracedEvent,
    pub parsed: TracedEvent,
    /// Set for application-protocol pairs only
    pub nesting_slot: Option<usize>,
}

impl MatchedPair {
    /// Receive time minus send time; negative under clock skew
    pub fn latency(&self) -> i64 {
        self.parsed.time() - self.created.time()
    }

    /// Diagram rows spanned by this pair
    pub fn span(&self) -> (usize, usize) {
        (self.created.event_num, self.parsed.event_num)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Created,
    Parsed,
}

/// A message half without a counterpart
#[derive(Debug, Clone)]
pub struct UnmatchedEvent {
    pub event: TracedEvent,
    pub role: Role,
    /// File the counterpart should have appeared in
    pub expected_file: String,
}

/// Output of [`correlate`]
#[derive(Debug, Default)]
pub struct Correlation {
    pub matched: Vec<MatchedPair>,
    pub unmatched: Vec<UnmatchedEvent>,
    /// Events of either side that are not message halves
    pub standalone: Vec<TracedEvent>,
}

/// Pair every message event of `starting` with the first corresponding, not yet matched
/// event of `accepting`. Accepting-side message events left over become half messages.
pub fn correlate(starting: &EndpointView, accepting: &EndpointView) -> Correlation {
    let mut correlation = Correlation::default();
    // Private working copy; matched events are removed as we go
    let mut remaining: Vec<&TracedEvent> = accepting.events.iter().collect();

    for event in &starting.events {
        if !is_message_event(&event.event) {
            correlation.standalone.push(event.clone());
            continue;
        }

        let hit = remaining
            .iter()
            .position(|candidate| is_corresponding(&event.event, &candidate.event));

        match hit {
            Some(index) => {
                let other = remaining.remove(index);
                trace!(
                    "Matched {} ({}) with {} ({})",
                    event.name(),
                    event.file_name,
                    other.name(),
                    other.file_name
                );
                let (created, parsed) = if is_created_event(&event.event) {
                    (event.clone(), other.clone())
                } else {
                    (other.clone(), event.clone())
                };
                correlation.matched.push(MatchedPair {
                    created,
                    parsed,
                    nesting_slot: None,
                });
            }
            None => correlation
                .unmatched
                .push(unmatched(event, &accepting.file_name)),
        }
    }

    for event in remaining {
        if is_message_event(&event.event) {
            correlation
                .unmatched
                .push(unmatched(event, &starting.file_name));
        } else {
            correlation.standalone.push(event.clone());
        }
    }

    correlation
}

fn unmatched(event: &TracedEvent, expected_file: &str) -> UnmatchedEvent {
    let role = if is_created_event(&event.event) {
        Role::Created
    } else {
        Role::Parsed
    };
    UnmatchedEvent {
        event: event.clone(),
        role,
        expected_file: expected_file.to_string(),
    }
}
