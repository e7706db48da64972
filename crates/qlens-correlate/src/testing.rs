//! Event builders shared by unit tests

use crate::traced::TracedEvent;
use qlens_core::Event;
use serde_json::{json, Value};
use std::sync::Arc;

pub(crate) fn event(time: i64, name: &str, group: Option<&str>, data: Value) -> Arc<Event> {
    let mut record = json!({"time": time, "name": name, "data": data});
    if let Some(group) = group {
        record["group_id"] = json!(group);
    }
    Arc::new(Event::from_record(&record, "test.sqlog", "group_id").unwrap())
}

pub(crate) fn traced(file: &str, time: i64, name: &str, group: &str, data: Value) -> TracedEvent {
    TracedEvent::new(event(time, name, Some(group), data), file)
}

pub(crate) fn group_data(subscribe_id: u64, sequence: u64) -> Value {
    json!({"subscribe_id": subscribe_id, "group_sequence": sequence})
}
