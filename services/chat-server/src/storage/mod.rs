pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chat_protocol::{RoomId, UserId};
use chrono::{DateTime, Utc};

pub use crate::errors::StorageError;

/// A room member as returned by [`Storage::get_members`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberInfo {
    pub user_id: UserId,
    pub username: String,
}

/// The row produced by appending a message, as the caller needs it to build
/// the `message.new` broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppendedMessage {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub sender_username: String,
}

/// The eight storage operations the chat core depends on. The Hub, Session,
/// and Domain Operations never depend on a concrete database through this
/// boundary.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn get_memberships(&self, user_id: &str) -> Result<Vec<RoomId>, StorageError>;
    async fn is_member(&self, room_id: &str, user_id: &str) -> Result<bool, StorageError>;
    async fn add_member(&self, room_id: &str, user_id: &str) -> Result<(), StorageError>;
    async fn remove_member(&self, room_id: &str, user_id: &str) -> Result<(), StorageError>;
    async fn get_members(&self, room_id: &str) -> Result<Vec<MemberInfo>, StorageError>;
    async fn append_message(
        &self,
        room_id: &str,
        sender_id: &str,
        content: &str,
    ) -> Result<AppendedMessage, StorageError>;
    async fn update_last_read(
        &self,
        room_id: &str,
        user_id: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<(), StorageError>;
    async fn unread_count(&self, room_id: &str, user_id: &str) -> Result<i64, StorageError>;
}
