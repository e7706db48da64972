//! Events decorated with diagram positions

use qlens_core::config::ViewSettings;
use qlens_core::{Event, Protocol};
use serde::Serialize;
use std::sync::Arc;

/// An [`Event`] placed in a network.
///
/// The event itself is shared with the owning trace file; position data belongs to the
/// network that produced this value.
#[derive(Debug, Clone)]
pub struct TracedEvent {
    pub event: Arc<Event>,
    pub file_name: String,
    /// Position in the global merge output
    pub order_num: usize,
    /// Diagram row; equal for simultaneous events of different files
    pub event_num: usize,
}

impl TracedEvent {
    pub fn new(event: Arc<Event>, file_name: impl Into<String>) -> Self {
        Self {
            event,
            file_name: file_name.into(),
            order_num: 0,
            event_num: 0,
        }
    }

    pub fn time(&self) -> i64 {
        self.event.time
    }

    pub fn connection_id(&self) -> Option<&str> {
        self.event.group_id.as_deref()
    }

    pub fn protocol(&self) -> Protocol {
        self.event.protocol()
    }

    pub fn name(&self) -> &str {
        self.event.name.as_str()
    }
}

/// Which protocol layers take part in a network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProtocolFilter {
    pub show_transport: bool,
    pub show_application: bool,
}

impl ProtocolFilter {
    pub fn allows(&self, protocol: Protocol) -> bool {
        if protocol.is_transport() {
            self.show_transport
        } else {
            self.show_application
        }
    }
}

impl Default for ProtocolFilter {
    fn default() -> Self {
        Self {
            show_transport: true,
            show_application: true,
        }
    }
}

impl From<&ViewSettings> for ProtocolFilter {
    fn from(view: &ViewSettings) -> Self {
        Self {
            show_transport: view.show_transport,
            show_application: view.show_application,
        }
    }
}
