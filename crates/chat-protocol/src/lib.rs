// chat-protocol: wire envelope and frame kinds for the real-time chat core.
//
// Every WebSocket frame is a single JSON object `{ "type": <tag>, "payload":
// <object|null> }`.  `InboundFrame` and `OutboundFrame` are the closed sets of
// frame kinds a session may decode or encode; both are adjacently tagged on
// `type`/`payload` so the wire shape matches the contract exactly rather than
// serde's default internally-tagged layout.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque room identity. The core never interprets the value.
pub type RoomId = String;
/// Opaque user identity; doubles as the session token.
pub type UserId = String;
/// Opaque message identity, assigned by storage.
pub type MessageId = String;

/// Maximum size, in bytes, of a single inbound text frame. Frames larger than
/// this close the connection (see `Session::read_loop`).
pub const MAX_FRAME_BYTES: usize = 4096;

/// Frozen outbound error codes (§7 of the spec).
pub mod error_codes {
    pub const INVALID_PAYLOAD: &str = "INVALID_PAYLOAD";
    pub const NOT_MEMBER: &str = "NOT_MEMBER";
    pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
}

// ---------------------------------------------------------------------------
// Shared sub-types
// ---------------------------------------------------------------------------

/// A bare room reference, used by the inbound kinds whose payload is just
/// `{ room_id }` (join, leave, typing start/stop).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomRef {
    pub room_id: RoomId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresenceStatus {
    Online,
    Offline,
}

// ---------------------------------------------------------------------------
// Inbound (client -> server) payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageSendPayload {
    pub room_id: RoomId,
    pub content: String,
}

/// RFC 3339 timestamp, as sent by the client for `message.read`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageReadPayload {
    pub room_id: RoomId,
    pub timestamp: DateTime<Utc>,
}

/// The closed set of frame kinds a client may send.
///
/// Unknown `type` tags and payloads that fail to decode are the caller's
/// responsibility to drop silently (§7); this type only models the kinds
/// that parse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum InboundFrame {
    #[serde(rename = "message.send")]
    MessageSend(MessageSendPayload),
    #[serde(rename = "room.join")]
    RoomJoin(RoomRef),
    #[serde(rename = "room.leave")]
    RoomLeave(RoomRef),
    #[serde(rename = "typing.start")]
    TypingStart(RoomRef),
    #[serde(rename = "typing.stop")]
    TypingStop(RoomRef),
    #[serde(rename = "message.read")]
    MessageRead(MessageReadPayload),
    #[serde(rename = "ping")]
    Ping,
}

// ---------------------------------------------------------------------------
// Outbound (server -> client) payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageNewPayload {
    pub id: MessageId,
    pub room_id: RoomId,
    pub sender_id: UserId,
    pub sender_username: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypingUpdatePayload {
    pub room_id: RoomId,
    pub user_id: UserId,
    pub username: String,
    pub is_typing: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceUpdatePayload {
    pub user_id: UserId,
    pub username: String,
    pub status: PresenceStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadReceiptUpdatePayload {
    pub room_id: RoomId,
    pub user_id: UserId,
    pub username: String,
    pub last_read_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnreadUpdatePayload {
    pub room_id: RoomId,
    pub count: i64,
}

/// Shared shape for `room.member_joined` and `room.member_left`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberEventPayload {
    pub room_id: RoomId,
    pub user_id: UserId,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub message: String,
    pub code: String,
}

/// The closed set of frame kinds the server may send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum OutboundFrame {
    #[serde(rename = "message.new")]
    MessageNew(MessageNewPayload),
    #[serde(rename = "typing.update")]
    TypingUpdate(TypingUpdatePayload),
    #[serde(rename = "presence.update")]
    PresenceUpdate(PresenceUpdatePayload),
    #[serde(rename = "read_receipt.update")]
    ReadReceiptUpdate(ReadReceiptUpdatePayload),
    #[serde(rename = "unread.update")]
    UnreadUpdate(UnreadUpdatePayload),
    #[serde(rename = "room.member_joined")]
    RoomMemberJoined(MemberEventPayload),
    #[serde(rename = "room.member_left")]
    RoomMemberLeft(MemberEventPayload),
    #[serde(rename = "error")]
    Error(ErrorPayload),
    #[serde(rename = "pong")]
    Pong,
}

impl OutboundFrame {
    #[must_use]
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        OutboundFrame::Error(ErrorPayload {
            code: code.to_owned(),
            message: message.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inbound_message_send_matches_wire_contract() {
        let json = r#"{"type":"message.send","payload":{"room_id":"r1","content":"hi"}}"#;
        let frame: InboundFrame = serde_json::from_str(json).unwrap();
        assert_eq!(
            frame,
            InboundFrame::MessageSend(MessageSendPayload {
                room_id: "r1".to_owned(),
                content: "hi".to_owned(),
            })
        );
        assert_eq!(serde_json::to_string(&frame).unwrap(), json);
    }

    #[test]
    fn inbound_ping_has_null_payload() {
        let json = r#"{"type":"ping","payload":null}"#;
        let frame: InboundFrame = serde_json::from_str(json).unwrap();
        assert_eq!(frame, InboundFrame::Ping);
        assert_eq!(serde_json::to_string(&frame).unwrap(), json);
    }

    #[test]
    fn inbound_room_join_and_leave_share_payload_shape() {
        let join: InboundFrame =
            serde_json::from_str(r#"{"type":"room.join","payload":{"room_id":"r1"}}"#).unwrap();
        let leave: InboundFrame =
            serde_json::from_str(r#"{"type":"room.leave","payload":{"room_id":"r1"}}"#).unwrap();
        assert_eq!(
            join,
            InboundFrame::RoomJoin(RoomRef {
                room_id: "r1".to_owned()
            })
        );
        assert_eq!(
            leave,
            InboundFrame::RoomLeave(RoomRef {
                room_id: "r1".to_owned()
            })
        );
    }

    #[test]
    fn inbound_message_read_parses_rfc3339_timestamp() {
        let json =
            r#"{"type":"message.read","payload":{"room_id":"r1","timestamp":"2026-01-01T00:00:00Z"}}"#;
        let frame: InboundFrame = serde_json::from_str(json).unwrap();
        match frame {
            InboundFrame::MessageRead(p) => {
                assert_eq!(p.room_id, "r1");
                assert_eq!(p.timestamp.to_rfc3339(), "2026-01-01T00:00:00+00:00");
            }
            other => panic!("expected MessageRead, got {other:?}"),
        }
    }

    #[test]
    fn inbound_malformed_json_fails_to_parse() {
        assert!(serde_json::from_str::<InboundFrame>("{not-json").is_err());
    }

    #[test]
    fn inbound_unknown_type_tag_fails_to_parse() {
        let json = r#"{"type":"something.unknown","payload":{}}"#;
        assert!(serde_json::from_str::<InboundFrame>(json).is_err());
    }

    #[test]
    fn outbound_message_new_round_trips() {
        let payload = MessageNewPayload {
            id: "m1".to_owned(),
            room_id: "r1".to_owned(),
            sender_id: "u1".to_owned(),
            sender_username: "alice".to_owned(),
            content: "hi".to_owned(),
            created_at: DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
        };
        let frame = OutboundFrame::MessageNew(payload.clone());
        let json = serde_json::to_string(&frame).unwrap();
        let decoded: OutboundFrame = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, OutboundFrame::MessageNew(payload));
    }

    #[test]
    fn outbound_presence_update_serializes_status_as_snake_case() {
        let frame = OutboundFrame::PresenceUpdate(PresenceUpdatePayload {
            user_id: "u1".to_owned(),
            username: "alice".to_owned(),
            status: PresenceStatus::Online,
        });
        let json = serde_json::to_string(&frame).unwrap();
        assert!(json.contains(r#""status":"online""#));
    }

    #[test]
    fn outbound_pong_has_null_payload() {
        let json = serde_json::to_string(&OutboundFrame::Pong).unwrap();
        assert_eq!(json, r#"{"type":"pong","payload":null}"#);
    }

    #[test]
    fn outbound_error_helper_builds_expected_payload() {
        let frame = OutboundFrame::error(error_codes::NOT_MEMBER, "not a member");
        assert_eq!(
            frame,
            OutboundFrame::Error(ErrorPayload {
                code: "NOT_MEMBER".to_owned(),
                message: "not a member".to_owned(),
            })
        );
    }
}
