use std::sync::Arc;

use chat_protocol::{
    MemberEventPayload, MessageNewPayload, MessageReadPayload, MessageSendPayload,
    OutboundFrame, ReadReceiptUpdatePayload, RoomRef, TypingUpdatePayload, UnreadUpdatePayload,
};
use chrono::Utc;
use tracing::{debug, warn};

use crate::errors::DomainError;
use crate::hub::Hub;
use crate::session::Session;
use crate::storage::Storage;

/// Rejects an empty room id or message body before touching storage.
fn require_non_empty(field: &str, value: &str) -> Result<(), DomainError> {
    if value.trim().is_empty() {
        return Err(DomainError::InvalidPayload(format!("{field} must not be empty")));
    }
    Ok(())
}

/// Appends the message, fans it out to the room with no exclusion (the
/// sender sees its own message), then recomputes and pushes each other
/// member's unread count off the read loop's critical path.
pub async fn send_message(
    session: &Arc<Session>,
    hub: &Arc<Hub>,
    storage: &Arc<dyn Storage>,
    payload: MessageSendPayload,
) -> Result<(), DomainError> {
    require_non_empty("room_id", &payload.room_id)?;
    require_non_empty("content", &payload.content)?;

    if !storage.is_member(&payload.room_id, &session.user_id).await? {
        return Err(DomainError::NotMember);
    }

    let appended = storage
        .append_message(&payload.room_id, &session.user_id, &payload.content)
        .await?;

    hub.broadcast(
        &payload.room_id,
        None,
        OutboundFrame::MessageNew(MessageNewPayload {
            id: appended.id,
            room_id: payload.room_id.clone(),
            sender_id: session.user_id.clone(),
            sender_username: appended.sender_username,
            content: payload.content,
            created_at: appended.created_at,
        }),
    )
    .await;

    spawn_unread_fanout(Arc::clone(hub), Arc::clone(storage), payload.room_id, session.user_id.clone());

    Ok(())
}

fn spawn_unread_fanout(hub: Arc<Hub>, storage: Arc<dyn Storage>, room_id: String, sender_id: String) {
    tokio::spawn(async move {
        let members = match storage.get_members(&room_id).await {
            Ok(members) => members,
            Err(err) => {
                warn!(room_id = %room_id, error = %err, "failed to load members for unread fan-out");
                return;
            }
        };
        for member in members {
            if member.user_id == sender_id {
                continue;
            }
            match storage.unread_count(&room_id, &member.user_id).await {
                Ok(count) => {
                    hub.send_to_user(
                        &member.user_id,
                        OutboundFrame::UnreadUpdate(UnreadUpdatePayload {
                            room_id: room_id.clone(),
                            count,
                        }),
                    )
                    .await;
                }
                Err(err) => {
                    warn!(user_id = %member.user_id, room_id = %room_id, error = %err, "failed to recompute unread count");
                }
            }
        }
    });
}

/// Adds the membership (idempotent), extends the session's subscribed-room
/// set, and announces the join to the room.
pub async fn join_room(
    session: &Arc<Session>,
    hub: &Arc<Hub>,
    storage: &Arc<dyn Storage>,
    payload: RoomRef,
) -> Result<(), DomainError> {
    require_non_empty("room_id", &payload.room_id)?;

    storage.add_member(&payload.room_id, &session.user_id).await?;
    session.add_room(payload.room_id.clone());

    debug!(user_id = %session.user_id, room_id = %payload.room_id, "joined room");
    hub.broadcast(
        &payload.room_id,
        None,
        OutboundFrame::RoomMemberJoined(MemberEventPayload {
            room_id: payload.room_id,
            user_id: session.user_id.clone(),
            username: session.username.clone(),
        }),
    )
    .await;

    Ok(())
}

/// Removes the membership, drops the room from the session's subscribed
/// set, and announces the departure.
pub async fn leave_room(
    session: &Arc<Session>,
    hub: &Arc<Hub>,
    storage: &Arc<dyn Storage>,
    payload: RoomRef,
) -> Result<(), DomainError> {
    require_non_empty("room_id", &payload.room_id)?;

    storage.remove_member(&payload.room_id, &session.user_id).await?;
    session.remove_room(&payload.room_id);

    debug!(user_id = %session.user_id, room_id = %payload.room_id, "left room");
    hub.broadcast(
        &payload.room_id,
        None,
        OutboundFrame::RoomMemberLeft(MemberEventPayload {
            room_id: payload.room_id,
            user_id: session.user_id.clone(),
            username: session.username.clone(),
        }),
    )
    .await;

    Ok(())
}

/// Typing indicators are never persisted and never time out server-side;
/// the client is responsible for sending a matching stop.
pub async fn typing(session: &Arc<Session>, hub: &Arc<Hub>, payload: RoomRef, is_typing: bool) {
    if payload.room_id.trim().is_empty() {
        return;
    }
    hub.broadcast(
        &payload.room_id,
        Some(&session.user_id),
        OutboundFrame::TypingUpdate(TypingUpdatePayload {
            room_id: payload.room_id,
            user_id: session.user_id.clone(),
            username: session.username.clone(),
            is_typing,
        }),
    )
    .await;
}

/// Clamps the client-reported timestamp to `now` so a skewed clock can never
/// push `last_read_at` into the future, then advances it monotonically.
pub async fn mark_read(
    session: &Arc<Session>,
    hub: &Arc<Hub>,
    storage: &Arc<dyn Storage>,
    payload: MessageReadPayload,
) -> Result<(), DomainError> {
    require_non_empty("room_id", &payload.room_id)?;

    if !storage.is_member(&payload.room_id, &session.user_id).await? {
        return Err(DomainError::NotMember);
    }

    let clamped = payload.timestamp.min(Utc::now());
    storage
        .update_last_read(&payload.room_id, &session.user_id, clamped)
        .await?;

    hub.broadcast(
        &payload.room_id,
        Some(&session.user_id),
        OutboundFrame::ReadReceiptUpdate(ReadReceiptUpdatePayload {
            room_id: payload.room_id.clone(),
            user_id: session.user_id.clone(),
            username: session.username.clone(),
            last_read_at: clamped,
        }),
    )
    .await;

    hub.send_to_user(
        &session.user_id,
        OutboundFrame::UnreadUpdate(UnreadUpdatePayload {
            room_id: payload.room_id,
            count: 0,
        }),
    )
    .await;

    Ok(())
}
