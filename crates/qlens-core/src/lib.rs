//! qlens core - trace event model and trace file parsing
//!
//! This crate provides the read side of qlens:
//!
//! - **Events**: typed MoQ and QUIC event payloads with correspondence rules
//! - **Trace files**: JSON text sequence parsing with per-event error recovery
//! - **Trace sets**: imported files and their active flags
//! - **Config**: TOML configuration with environment overrides

pub mod config;
pub mod error;
pub mod events;
pub mod loader;
pub mod trace_file;
pub mod workspace;

// Re-export commonly used types
pub use config::{ConfigError, ConfigLoader, ConfigResult, QlensConfig};
pub use error::{TraceError, TraceResult};
pub use events::{
    Action, Event, EventKind, EventName, MoqEventKind, MoqPayload, PayloadData, Protocol,
    QuicEventKind, QuicPayload,
};
pub use trace_file::{FileDetails, ParseOptions, RejectedEvent, TraceFile, VantagePointType};
pub use workspace::TraceSet;

/// qlens version
pub const QLENS_VERSION: &str = env!("CARGO_PKG_VERSION");
