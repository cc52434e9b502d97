use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{AppendedMessage, MemberInfo, Storage, StorageError};

#[derive(Clone)]
struct MembershipRecord {
    last_read_at: DateTime<Utc>,
}

#[derive(Clone)]
struct StoredMessage {
    id: String,
    sender_id: String,
    content: String,
    created_at: DateTime<Utc>,
}

#[derive(Default)]
struct Inner {
    usernames: HashMap<String, String>,
    memberships: HashMap<String, HashMap<String, MembershipRecord>>,
    messages: HashMap<String, Vec<StoredMessage>>,
}

/// In-process `Storage` fake. Stands in for the real relational store in
/// tests that exercise the Hub/Session/Domain-Operations layers without a
/// database.
#[derive(Default)]
pub struct InMemoryStorage {
    inner: RwLock<Inner>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a display name for `user_id`. The core's storage contract
    /// has no operation for minting users (that's the external REST
    /// surface's job); tests call this directly to seed fixtures.
    pub async fn seed_user(&self, user_id: impl Into<String>, username: impl Into<String>) {
        self.inner
            .write()
            .await
            .usernames
            .insert(user_id.into(), username.into());
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn get_memberships(&self, user_id: &str) -> Result<Vec<String>, StorageError> {
        let inner = self.inner.read().await;
        Ok(inner
            .memberships
            .iter()
            .filter(|(_, members)| members.contains_key(user_id))
            .map(|(room_id, _)| room_id.clone())
            .collect())
    }

    async fn is_member(&self, room_id: &str, user_id: &str) -> Result<bool, StorageError> {
        let inner = self.inner.read().await;
        Ok(inner
            .memberships
            .get(room_id)
            .is_some_and(|members| members.contains_key(user_id)))
    }

    async fn add_member(&self, room_id: &str, user_id: &str) -> Result<(), StorageError> {
        let mut inner = self.inner.write().await;
        inner
            .memberships
            .entry(room_id.to_owned())
            .or_default()
            .entry(user_id.to_owned())
            .or_insert(MembershipRecord {
                last_read_at: DateTime::<Utc>::MIN_UTC,
            });
        Ok(())
    }

    async fn remove_member(&self, room_id: &str, user_id: &str) -> Result<(), StorageError> {
        let mut inner = self.inner.write().await;
        if let Some(members) = inner.memberships.get_mut(room_id) {
            members.remove(user_id);
        }
        Ok(())
    }

    async fn get_members(&self, room_id: &str) -> Result<Vec<MemberInfo>, StorageError> {
        let inner = self.inner.read().await;
        let Some(members) = inner.memberships.get(room_id) else {
            return Ok(Vec::new());
        };
        Ok(members
            .keys()
            .map(|user_id| MemberInfo {
                user_id: user_id.clone(),
                username: inner
                    .usernames
                    .get(user_id)
                    .cloned()
                    .unwrap_or_else(|| user_id.clone()),
            })
            .collect())
    }

    async fn append_message(
        &self,
        room_id: &str,
        sender_id: &str,
        content: &str,
    ) -> Result<AppendedMessage, StorageError> {
        let mut inner = self.inner.write().await;
        let id = Uuid::new_v4().to_string();
        let created_at = Utc::now();
        inner
            .messages
            .entry(room_id.to_owned())
            .or_default()
            .push(StoredMessage {
                id: id.clone(),
                sender_id: sender_id.to_owned(),
                content: content.to_owned(),
                created_at,
            });
        let sender_username = inner
            .usernames
            .get(sender_id)
            .cloned()
            .unwrap_or_else(|| sender_id.to_owned());
        Ok(AppendedMessage {
            id,
            created_at,
            sender_username,
        })
    }

    async fn update_last_read(
        &self,
        room_id: &str,
        user_id: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let mut inner = self.inner.write().await;
        if let Some(record) = inner
            .memberships
            .get_mut(room_id)
            .and_then(|members| members.get_mut(user_id))
        {
            record.last_read_at = record.last_read_at.max(timestamp);
        }
        Ok(())
    }

    async fn unread_count(&self, room_id: &str, user_id: &str) -> Result<i64, StorageError> {
        let inner = self.inner.read().await;
        let last_read_at = inner
            .memberships
            .get(room_id)
            .and_then(|members| members.get(user_id))
            .map(|r| r.last_read_at)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let count = inner
            .messages
            .get(room_id)
            .map(|messages| {
                messages
                    .iter()
                    .filter(|m| m.created_at > last_read_at && m.sender_id != user_id)
                    .count()
            })
            .unwrap_or(0);
        Ok(count as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn add_member_is_idempotent_and_preserves_last_read_at() {
        let storage = InMemoryStorage::new();
        storage.add_member("r1", "u1").await.unwrap();
        let ts = Utc::now();
        storage.update_last_read("r1", "u1", ts).await.unwrap();
        storage.add_member("r1", "u1").await.unwrap();
        assert!(storage.is_member("r1", "u1").await.unwrap());
        // last_read_at survives the duplicate join
        assert_eq!(storage.unread_count("r1", "u1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn unread_count_excludes_own_messages_and_respects_last_read_at() {
        let storage = InMemoryStorage::new();
        storage.seed_user("u1", "alice").await;
        storage.seed_user("u2", "bob").await;
        storage.add_member("r1", "u1").await.unwrap();
        storage.add_member("r1", "u2").await.unwrap();

        storage.append_message("r1", "u1", "hi").await.unwrap();
        assert_eq!(storage.unread_count("r1", "u1").await.unwrap(), 0);
        assert_eq!(storage.unread_count("r1", "u2").await.unwrap(), 1);

        let now = Utc::now();
        storage.update_last_read("r1", "u2", now).await.unwrap();
        assert_eq!(storage.unread_count("r1", "u2").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn update_last_read_is_monotonic() {
        let storage = InMemoryStorage::new();
        storage.add_member("r1", "u1").await.unwrap();
        let later = Utc::now();
        let earlier = later - chrono::Duration::seconds(60);

        storage.update_last_read("r1", "u1", later).await.unwrap();
        storage.update_last_read("r1", "u1", earlier).await.unwrap();

        storage.append_message("r1", "u2", "hi").await.unwrap();
        // last_read_at should still be `later`, so the message sent after
        // `earlier` but before `later` would already be read -- but this
        // message was appended after both, so it's unread.
        assert_eq!(storage.unread_count("r1", "u1").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn remove_member_drops_membership() {
        let storage = InMemoryStorage::new();
        storage.add_member("r1", "u1").await.unwrap();
        storage.remove_member("r1", "u1").await.unwrap();
        assert!(!storage.is_member("r1", "u1").await.unwrap());
        assert_eq!(storage.get_memberships("u1").await.unwrap(), Vec::<String>::new());
    }
}
