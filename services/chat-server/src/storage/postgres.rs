use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{AppendedMessage, MemberInfo, Storage, StorageError};

/// Thin wrapper over a `sqlx::PgPool` implementing `Storage` against the
/// `users`/`memberships`/`messages` schema, so it can be passed around as
/// `Arc<dyn Storage>`.
pub struct PgStorage {
    pool: PgPool,
}

impl PgStorage {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Storage for PgStorage {
    async fn get_memberships(&self, user_id: &str) -> Result<Vec<String>, StorageError> {
        let rows = sqlx::query!(
            "SELECT room_id FROM memberships WHERE user_id = $1",
            user_id
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|r| r.room_id).collect())
    }

    async fn is_member(&self, room_id: &str, user_id: &str) -> Result<bool, StorageError> {
        let row = sqlx::query!(
            r#"SELECT EXISTS(
                SELECT 1 FROM memberships WHERE room_id = $1 AND user_id = $2
            ) AS "exists!""#,
            room_id,
            user_id
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(row.exists)
    }

    async fn add_member(&self, room_id: &str, user_id: &str) -> Result<(), StorageError> {
        sqlx::query!(
            r#"INSERT INTO memberships (room_id, user_id) VALUES ($1, $2)
               ON CONFLICT (room_id, user_id) DO NOTHING"#,
            room_id,
            user_id
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn remove_member(&self, room_id: &str, user_id: &str) -> Result<(), StorageError> {
        sqlx::query!(
            "DELETE FROM memberships WHERE room_id = $1 AND user_id = $2",
            room_id,
            user_id
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_members(&self, room_id: &str) -> Result<Vec<MemberInfo>, StorageError> {
        let rows = sqlx::query!(
            r#"SELECT u.id AS user_id, u.username
               FROM memberships ms
               JOIN users u ON u.id = ms.user_id
               WHERE ms.room_id = $1"#,
            room_id
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|r| MemberInfo {
                user_id: r.user_id,
                username: r.username,
            })
            .collect())
    }

    async fn append_message(
        &self,
        room_id: &str,
        sender_id: &str,
        content: &str,
    ) -> Result<AppendedMessage, StorageError> {
        let id = Uuid::new_v4().to_string();
        let row = sqlx::query!(
            r#"INSERT INTO messages (id, room_id, sender_id, content)
               VALUES ($1, $2, $3, $4)
               RETURNING created_at"#,
            id,
            room_id,
            sender_id,
            content
        )
        .fetch_one(&self.pool)
        .await?;
        let sender = sqlx::query!("SELECT username FROM users WHERE id = $1", sender_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(AppendedMessage {
            id,
            created_at: row.created_at,
            sender_username: sender.username,
        })
    }

    async fn update_last_read(
        &self,
        room_id: &str,
        user_id: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        sqlx::query!(
            r#"UPDATE memberships SET last_read_at = GREATEST(last_read_at, $3)
               WHERE room_id = $1 AND user_id = $2"#,
            room_id,
            user_id,
            timestamp
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn unread_count(&self, room_id: &str, user_id: &str) -> Result<i64, StorageError> {
        let row = sqlx::query!(
            r#"SELECT COUNT(*) AS "count!" FROM messages m
               JOIN memberships ms ON ms.room_id = m.room_id AND ms.user_id = $2
               WHERE m.room_id = $1 AND m.created_at > ms.last_read_at AND m.sender_id <> $2"#,
            room_id,
            user_id
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(row.count)
    }
}
