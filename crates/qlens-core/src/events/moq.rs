//! Media over QUIC (application protocol) payloads

use super::RawInfo;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// MoQ event kinds, resolved from the base name (action suffix removed)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MoqEventKind {
    Stream,
    SessionStarted,
    SessionUpdate,
    AnnouncePlease,
    Announce,
    SubscriptionStarted,
    SubscriptionUpdate,
    SubscriptionGap,
    InfoPlease,
    Info,
    FetchUpdate,
    Fetch,
    Group,
    Frame,
}

impl MoqEventKind {
    /// Prefix table; longer prefixes sharing a stem come first
    const PREFIXES: [(&'static str, MoqEventKind); 14] = [
        ("stream", MoqEventKind::Stream),
        ("session_started", MoqEventKind::SessionStarted),
        ("session_update", MoqEventKind::SessionUpdate),
        ("announce_please", MoqEventKind::AnnouncePlease),
        ("announce", MoqEventKind::Announce),
        ("subscription_started", MoqEventKind::SubscriptionStarted),
        ("subscription_update", MoqEventKind::SubscriptionUpdate),
        ("subscription_gap", MoqEventKind::SubscriptionGap),
        ("info_please", MoqEventKind::InfoPlease),
        ("info", MoqEventKind::Info),
        ("fetch_update", MoqEventKind::FetchUpdate),
        ("fetch", MoqEventKind::Fetch),
        ("group", MoqEventKind::Group),
        ("frame", MoqEventKind::Frame),
    ];

    /// Resolve the kind from an event base name by prefix, first match wins
    pub fn from_base_name(base: &str) -> Option<Self> {
        Self::PREFIXES
            .iter()
            .find(|(prefix, _)| base.starts_with(prefix))
            .map(|(_, kind)| *kind)
    }

    /// `*_started` events are exchanged without a created/parsed suffix
    pub fn is_started(&self) -> bool {
        matches!(
            self,
            MoqEventKind::SessionStarted | MoqEventKind::SubscriptionStarted
        )
    }
}

/// Decoded MoQ payload
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MoqPayload {
    Stream(StreamEvent),
    SessionClient(SessionClient),
    SessionServer(SessionServer),
    SessionUpdate(SessionUpdate),
    AnnouncePlease(AnnouncePlease),
    Announce(Announce),
    Subscribe(Subscribe),
    SubscribeUpdate(SubscribeUpdate),
    SubscribeGap(SubscribeGap),
    InfoPlease(InfoPlease),
    Info(Info),
    FetchUpdate(FetchUpdate),
    Fetch(Fetch),
    Group(Group),
    Frame(Frame),
}

impl MoqPayload {
    pub fn decode(kind: MoqEventKind, data: &Value) -> Result<Self, serde_json::Error> {
        Ok(match kind {
            MoqEventKind::Stream => MoqPayload::Stream(StreamEvent::deserialize(data)?),
            MoqEventKind::SessionStarted => {
                if data.get("selected_version").is_some() {
                    MoqPayload::SessionServer(SessionServer::deserialize(data)?)
                } else {
                    MoqPayload::SessionClient(SessionClient::deserialize(data)?)
                }
            }
            MoqEventKind::SessionUpdate => {
                MoqPayload::SessionUpdate(SessionUpdate::deserialize(data)?)
            }
            MoqEventKind::AnnouncePlease => {
                MoqPayload::AnnouncePlease(AnnouncePlease::deserialize(data)?)
            }
            MoqEventKind::Announce => MoqPayload::Announce(Announce::deserialize(data)?),
            MoqEventKind::SubscriptionStarted => {
                MoqPayload::Subscribe(Subscribe::deserialize(data)?)
            }
            MoqEventKind::SubscriptionUpdate => {
                MoqPayload::SubscribeUpdate(SubscribeUpdate::deserialize(data)?)
            }
            MoqEventKind::SubscriptionGap => {
                MoqPayload::SubscribeGap(SubscribeGap::deserialize(data)?)
            }
            MoqEventKind::InfoPlease => MoqPayload::InfoPlease(InfoPlease::deserialize(data)?),
            MoqEventKind::Info => MoqPayload::Info(Info::deserialize(data)?),
            MoqEventKind::FetchUpdate => MoqPayload::FetchUpdate(FetchUpdate::deserialize(data)?),
            MoqEventKind::Fetch => MoqPayload::Fetch(Fetch::deserialize(data)?),
            MoqEventKind::Group => MoqPayload::Group(Group::deserialize(data)?),
            MoqEventKind::Frame => MoqPayload::Frame(Frame::deserialize(data)?),
        })
    }

    /// Whether two payloads describe the same message
    pub fn corresponds(&self, other: &MoqPayload) -> bool {
        match (self, other) {
            (MoqPayload::SessionClient(client), MoqPayload::SessionServer(server))
            | (MoqPayload::SessionServer(server), MoqPayload::SessionClient(client)) => {
                client.supported_versions.contains(&server.selected_version)
            }
            (MoqPayload::Frame(a), MoqPayload::Frame(b)) => a.payload.corresponds(&b.payload),
            // Every other variant carries only required fields
            (MoqPayload::Stream(a), MoqPayload::Stream(b)) => a == b,
            (MoqPayload::SessionClient(a), MoqPayload::SessionClient(b)) => a == b,
            (MoqPayload::SessionServer(a), MoqPayload::SessionServer(b)) => a == b,
            (MoqPayload::SessionUpdate(a), MoqPayload::SessionUpdate(b)) => a == b,
            (MoqPayload::AnnouncePlease(a), MoqPayload::AnnouncePlease(b)) => a == b,
            (MoqPayload::Announce(a), MoqPayload::Announce(b)) => a == b,
            (MoqPayload::Subscribe(a), MoqPayload::Subscribe(b)) => a == b,
            (MoqPayload::SubscribeUpdate(a), MoqPayload::SubscribeUpdate(b)) => a == b,
            (MoqPayload::SubscribeGap(a), MoqPayload::SubscribeGap(b)) => a == b,
            (MoqPayload::InfoPlease(a), MoqPayload::InfoPlease(b)) => a == b,
            (MoqPayload::Info(a), MoqPayload::Info(b)) => a == b,
            (MoqPayload::FetchUpdate(a), MoqPayload::FetchUpdate(b)) => a == b,
            (MoqPayload::Fetch(a), MoqPayload::Fetch(b)) => a == b,
            (MoqPayload::Group(a), MoqPayload::Group(b)) => a == b,
            _ => false,
        }
    }

    pub fn is_session_client(&self) -> bool {
        matches!(self, MoqPayload::SessionClient(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamType {
    Session,
    Announced,
    Subscribe,
    Fetch,
    Info,
    Group,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamEvent {
    pub stream_type: StreamType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClient {
    pub supported_versions: Vec<u64>,
    pub extension_ids: Vec<u64>,
    pub tracing_id: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionServer {
    pub selected_version: u64,
    pub extension_ids: Vec<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUpdate {
    pub session_bitrate: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnouncePlease {
    pub track_prefix_parts: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnounceStatus {
    Ended,
    Active,
    Live,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Announce {
    pub announce_status: AnnounceStatus,
    pub track_suffix_parts: Vec<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscribe {
    pub subscribe_id: u64,
    pub track_path_parts: Vec<String>,
    pub track_priority: u64,
    pub group_order: u64,
    pub group_min: u64,
    pub group_max: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscribeUpdate {
    pub track_priority: u64,
    pub group_order: u64,
    pub group_min: u64,
    pub group_max: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscribeGap {
    pub group_start: u64,
    pub group_count: u64,
    pub group_error_code: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Info {
    pub track_priority: u64,
    pub group_latest: u64,
    pub group_order: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfoPlease {
    pub track_path_parts: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fetch {
    pub track_path_parts: Vec<String>,
    pub track_priority: u64,
    pub group_sequence: u64,
    pub frame_sequence: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchUpdate {
    pub track_priority: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub subscribe_id: u64,
    pub group_sequence: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    pub payload: RawInfo,
}
