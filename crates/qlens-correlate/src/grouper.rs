//! Partitioning events into per-file connection endpoints

use crate::traced::TracedEvent;
use std::collections::HashMap;

/// One file's events for one connection id
#[derive(Debug, Clone)]
pub struct EndpointView {
    pub file_name: String,
    pub connection_id: String,
    pub events: Vec<TracedEvent>,
}

impl EndpointView {
    /// Time of the first event; views are never empty
    pub fn first_time(&self) -> i64 {
        self.events.first().map_or(i64::MAX, TracedEvent::time)
    }

    pub fn is_same_endpoint(&self, other: &EndpointView) -> bool {
        self.file_name == other.file_name && self.connection_id == other.connection_id
    }
}

/// Result of [`group_endpoints`]
#[derive(Debug, Default)]
pub struct Grouping {
    /// Views in order of first appearance
    pub views: Vec<EndpointView>,
    /// Events without a connection id
    pub ungrouped: Vec<TracedEvent>,
}

/// Group events by `(file, connection id)`, keeping input order inside each view
pub fn group_endpoints<I>(events: I) -> Grouping
where
    I: IntoIterator<Item = TracedEvent>,
{
    let mut grouping = Grouping::default();
    let mut index: HashMap<(String, String), usize> = HashMap::new();

    for event in events {
        let Some(connection_id) = event.connection_id().map(str::to_string) else {
            grouping.ungrouped.push(event);
            continue;
        };

        let key = (event.file_name.clone(), connection_id);
        match index.get(&key) {
            Some(&i) => grouping.views[i].events.push(event),
            None => {
                index.insert(key.clone(), grouping.views.len());
                grouping.views.push(EndpointView {
                    file_name: key.0,
                    connection_id: key.1,
                    events: vec![event],
                });
            }
        }
    }

    grouping
}
