//! Protocol-specific correlation rules
//!
//! Three predicates drive the correlator:
//!
//! - [`is_message_event`]: the event is one half of a message exchanged between endpoints
//! - [`is_corresponding`]: two events are the two halves of the same message
//! - [`is_created_event`]: the event is the sending-side half

use qlens_core::events::{Action, EventKind, MoqEventKind, QuicEventKind};
use qlens_core::{Event, PayloadData, QuicPayload};

/// Whether the event is half of a message between endpoints (every QUIC event, MoQ
/// created/parsed events and the MoQ `*_started` events)
pub fn is_message_event(event: &Event) -> bool {
    match event.name.kind() {
        EventKind::Moq(kind) => event.name.action().is_some() || kind.is_started(),
        EventKind::Quic(_) => true,
    }
}

/// Whether `a` and `b` are the two halves of the same message
pub fn is_corresponding(a: &Event, b: &Event) -> bool {
    match (a.name.kind(), b.name.kind()) {
        (EventKind::Moq(kind_a), EventKind::Moq(kind_b)) => {
            let halves = match (a.name.action(), b.name.action()) {
                (Some(x), Some(y)) => x == y.opposite(),
                // Both endpoints log the started event itself
                (None, None) => kind_a.is_started() && kind_a == kind_b,
                _ => false,
            };
            halves && a.name.base_name() == b.name.base_name() && a.data.corresponds(&b.data)
        }
        (EventKind::Quic(_), EventKind::Quic(_)) => a.data.corresponds(&b.data),
        _ => false,
    }
}

/// Whether the event is the sending-side half of its message
pub fn is_created_event(event: &Event) -> bool {
    match event.name.kind() {
        EventKind::Moq(kind) => match event.name.action() {
            Some(Action::Created) => true,
            Some(Action::Parsed) => false,
            None => match (&event.data, kind) {
                (PayloadData::Moq(payload), MoqEventKind::SessionStarted) => {
                    payload.is_session_client()
                }
                _ => true,
            },
        },
        EventKind::Quic(kind) => match (kind, &event.data) {
            (QuicEventKind::PacketSent, _) => true,
            (QuicEventKind::PacketReceived, _) => false,
            (
                QuicEventKind::StreamStateUpdated,
                PayloadData::Quic(QuicPayload::StreamStateUpdated(update)),
            ) => update.is_sending(),
            _ => true,
        },
    }
}
