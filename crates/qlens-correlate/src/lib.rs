//! Connection reconstruction for qlens
//!
//! Turns a set of decoded trace files into a [`Network`]:
//!
//! - **Grouping**: each file's events are split per connection id into endpoint views
//! - **Pairing**: views of different files with the same id form a [`Connection`]
//! - **Correlation**: created and parsed halves of each message are matched
//! - **Ordering**: all files are merged into shared diagram rows
//! - **Nesting**: overlapping application exchanges get distinct slots

pub mod connection;
pub mod correlator;
pub mod grouper;
pub mod nesting;
pub mod network;
pub mod ordinal;
pub mod pairer;
pub mod report;
pub mod rules;
pub mod traced;

#[cfg(test)]
mod testing;

pub use connection::{Connection, ConnectionKey};
pub use correlator::{MatchedPair, Role, UnmatchedEvent};
pub use grouper::EndpointView;
pub use network::{ConnectionGraph, ConnectionSelection, Network, NetworkSelection};
pub use report::{HalfMessageSummary, MessageSummary, NetworkReport};
pub use traced::{ProtocolFilter, TracedEvent};
