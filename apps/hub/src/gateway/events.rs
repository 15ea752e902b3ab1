//! Wire-format frames: the typed decoder for client frames and the tagged
//! serializer for hub frames. Every frame is one UTF-8 JSON object with a
//! string `type` discriminant.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::stats::VoiceStats;
use crate::ice::IceConfig;

// ---------------------------------------------------------------------------
// Client → Hub
// ---------------------------------------------------------------------------

/// Frame types the decoder recognizes. Anything else is `UNKNOWN_TYPE`.
const KNOWN_TYPES: &[&str] = &[
    "setName",
    "callStart",
    "callAccept",
    "callReject",
    "callHangup",
    "signal",
    "chatSend",
    "pushSubscribe",
    "pushUnsubscribe",
];

/// A decoded inbound frame.
///
/// `setName.name` and `chatSend.text` stay raw [`Value`]s: the protocol
/// answers a wrong-typed name or body with `nameResult invalid` / `BAD_CHAT`
/// rather than a decode error, so validation happens downstream.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientFrame {
    SetName {
        #[serde(default)]
        name: Value,
    },
    CallStart {
        to: String,
    },
    #[serde(rename_all = "camelCase")]
    CallAccept {
        from: String,
        room_id: String,
    },
    #[serde(rename_all = "camelCase")]
    CallReject {
        from: String,
        #[serde(default)]
        room_id: Option<String>,
    },
    CallHangup,
    Signal {
        to: String,
        payload: Value,
    },
    ChatSend {
        #[serde(default)]
        text: Value,
    },
    PushSubscribe {
        subscription: Value,
    },
    PushUnsubscribe,
}

/// Why an inbound frame failed to decode.
#[derive(Debug, PartialEq, Eq)]
pub enum DecodeError {
    /// Not valid JSON at all.
    BadJson,
    /// Valid JSON but not an object with a string `type`, or a recognized
    /// type with missing/mistyped required fields.
    BadMessage,
    /// An object with a string `type` the hub does not speak.
    UnknownType,
}

/// Decode one inbound text frame.
pub fn decode(text: &str) -> Result<ClientFrame, DecodeError> {
    let value: Value = serde_json::from_str(text).map_err(|_| DecodeError::BadJson)?;
    let ty = value
        .as_object()
        .and_then(|o| o.get("type"))
        .and_then(Value::as_str)
        .ok_or(DecodeError::BadMessage)?;
    if !KNOWN_TYPES.contains(&ty) {
        return Err(DecodeError::UnknownType);
    }
    serde_json::from_value(value).map_err(|_| DecodeError::BadMessage)
}

// ---------------------------------------------------------------------------
// Hub → Client
// ---------------------------------------------------------------------------

/// Error codes carried by `{"type":"error"}` frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    RateLimit,
    BadJson,
    BadMessage,
    NoName,
    BadChat,
    PmNotFound,
    PmSelf,
    UnknownType,
}

/// A named session as it appears in presence and room frames.
#[derive(Debug, Clone, Serialize)]
pub struct PeerInfo {
    pub id: String,
    pub name: String,
}

/// One row of the presence snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct PresenceUser {
    pub id: String,
    pub name: String,
    pub busy: bool,
}

/// An outbound frame. Serialized with the same `type`-tagged shape the
/// client sends.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerFrame {
    #[serde(rename_all = "camelCase")]
    Hello {
        id: String,
        turn: IceConfig,
        https: bool,
        client_ip: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        turn_warning: Option<&'static str>,
        voice: VoiceStats,
    },
    NameResult {
        ok: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<&'static str>,
    },
    Presence {
        users: Vec<PresenceUser>,
        voice: VoiceStats,
    },
    #[serde(rename_all = "camelCase")]
    Chat {
        at_iso: String,
        from: Option<String>,
        from_name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        to: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        to_name: Option<String>,
        text: String,
        private: bool,
    },
    #[serde(rename_all = "camelCase")]
    IncomingCall {
        from: String,
        from_name: String,
        room_id: String,
    },
    CallStartResult {
        ok: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<&'static str>,
    },
    CallRejected {
        reason: &'static str,
    },
    CallEnded {
        reason: &'static str,
    },
    #[serde(rename_all = "camelCase")]
    RoomPeers {
        room_id: String,
        peers: Vec<PeerInfo>,
    },
    #[serde(rename_all = "camelCase")]
    RoomPeerJoined {
        room_id: String,
        peer: PeerInfo,
    },
    #[serde(rename_all = "camelCase")]
    RoomPeerLeft {
        room_id: String,
        peer_id: String,
    },
    #[serde(rename_all = "camelCase")]
    Signal {
        from: String,
        from_name: String,
        payload: Value,
    },
    Error {
        code: ErrorCode,
    },
}

impl ServerFrame {
    pub fn error(code: ErrorCode) -> Self {
        Self::Error { code }
    }
}
