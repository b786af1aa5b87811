use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::id_types::{MessageId, RoomId, UserId};
use crate::participant::User;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("room {0} not found")]
    RoomNotFound(RoomId),
    #[error("user {0} not found")]
    UserNotFound(String),
    #[error("message {0} not found")]
    MessageNotFound(MessageId),
    #[error("not authorized")]
    NotAuthorized,
    #[error("{user} is already hosting {count} rooms")]
    MaxRoomsHosted { user: String, count: u32 },
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone)]
pub struct RoomInfo {
    pub id: RoomId,
    pub max_participants: usize,
}

#[derive(Debug, Clone)]
pub struct KickOutcome {
    pub expired_at: chrono::DateTime<chrono::Utc>,
}

/// Stored chat message record, the DM persistence path's shape.
#[derive(Debug, Clone)]
pub struct StoredMessage {
    pub id: MessageId,
    pub content: String,
    pub from: UserId,
    pub to: UserId,
}

/// Seam onto the relational store backing durable users, rooms and DMs.
/// The core never depends on a concrete Postgres client — only this trait.
#[async_trait]
pub trait Store: Send + Sync {
    async fn get_user_by_name(&self, name: &str) -> Result<User, StoreError>;
    async fn get_user_from_session(&self, session_cookie: &str) -> Result<Option<User>, StoreError>;
    async fn get_room(&self, id: &RoomId) -> Result<RoomInfo, StoreError>;
    async fn get_rooms(&self) -> Result<Vec<RoomInfo>, StoreError>;

    async fn create_message(
        &self,
        room_id: Option<RoomId>,
        to: UserId,
        from: UserId,
        content: String,
    ) -> Result<StoredMessage, StoreError>;
    async fn edit_message(
        &self,
        message_id: &MessageId,
        requester: &UserId,
        content: String,
    ) -> Result<(), StoreError>;
    async fn delete_message(
        &self,
        message_id: &MessageId,
        requester: &UserId,
    ) -> Result<(), StoreError>;
    async fn react_to_message(
        &self,
        message_id: &MessageId,
        requester: &UserId,
        reaction: String,
    ) -> Result<(), StoreError>;

    async fn can_clear_chat(&self, room_id: &RoomId, requester: &UserId) -> Result<bool, StoreError>;
    async fn assign_role(
        &self,
        room_id: &RoomId,
        requester: &UserId,
        target: &UserId,
        role: String,
    ) -> Result<(), StoreError>;
    async fn update_welcome_message(
        &self,
        room_id: &RoomId,
        requester: &UserId,
        message: String,
    ) -> Result<(), StoreError>;
    async fn kick_participant(
        &self,
        room_id: &RoomId,
        requester: &UserId,
        target: &UserId,
        duration: Duration,
    ) -> Result<KickOutcome, StoreError>;
}

/// In-memory fake used in tests and local runs.
pub struct InMemoryStore {
    users: DashMap<UserId, User>,
    usernames: DashMap<String, UserId>,
    rooms: DashMap<RoomId, RoomInfo>,
    messages: DashMap<MessageId, StoredMessage>,
    hosted_rooms: DashMap<UserId, u32>,
    max_rooms_hosted: u32,
}

impl InMemoryStore {
    pub fn new(max_rooms_hosted: u32) -> Self {
        InMemoryStore {
            users: DashMap::new(),
            usernames: DashMap::new(),
            rooms: DashMap::new(),
            messages: DashMap::new(),
            hosted_rooms: DashMap::new(),
            max_rooms_hosted,
        }
    }

    pub fn seed_user(&self, user: User) {
        self.usernames.insert(user.username.clone(), user.id.clone());
        self.users.insert(user.id.clone(), user);
    }

    pub fn seed_room(&self, room: RoomInfo) {
        self.rooms.insert(room.id.clone(), room);
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn get_user_by_name(&self, name: &str) -> Result<User, StoreError> {
        let id = self
            .usernames
            .get(name)
            .ok_or_else(|| StoreError::UserNotFound(name.to_string()))?;
        self.users
            .get(id.value())
            .map(|u| u.clone())
            .ok_or_else(|| StoreError::UserNotFound(name.to_string()))
    }

    async fn get_user_from_session(&self, session_cookie: &str) -> Result<Option<User>, StoreError> {
        Ok(self.users.get(&UserId::from(session_cookie)).map(|u| u.clone()))
    }

    async fn get_room(&self, id: &RoomId) -> Result<RoomInfo, StoreError> {
        self.rooms
            .get(id)
            .map(|r| r.clone())
            .ok_or_else(|| StoreError::RoomNotFound(id.clone()))
    }

    async fn get_rooms(&self) -> Result<Vec<RoomInfo>, StoreError> {
        Ok(self.rooms.iter().map(|e| e.value().clone()).collect())
    }

    async fn create_message(
        &self,
        _room_id: Option<RoomId>,
        to: UserId,
        from: UserId,
        content: String,
    ) -> Result<StoredMessage, StoreError> {
        let msg = StoredMessage {
            id: MessageId::generate(),
            content,
            from,
            to,
        };
        self.messages.insert(msg.id.clone(), msg.clone());
        Ok(msg)
    }

    async fn edit_message(
        &self,
        message_id: &MessageId,
        requester: &UserId,
        content: String,
    ) -> Result<(), StoreError> {
        let mut msg = self
            .messages
            .get_mut(message_id)
            .ok_or_else(|| StoreError::MessageNotFound(message_id.clone()))?;
        if &msg.from != requester {
            return Err(StoreError::NotAuthorized);
        }
        msg.content = content;
        Ok(())
    }

    async fn delete_message(
        &self,
        message_id: &MessageId,
        requester: &UserId,
    ) -> Result<(), StoreError> {
        let msg = self
            .messages
            .get(message_id)
            .ok_or_else(|| StoreError::MessageNotFound(message_id.clone()))?;
        if &msg.from != requester {
            return Err(StoreError::NotAuthorized);
        }
        drop(msg);
        self.messages.remove(message_id);
        Ok(())
    }

    async fn react_to_message(
        &self,
        message_id: &MessageId,
        _requester: &UserId,
        _reaction: String,
    ) -> Result<(), StoreError> {
        if !self.messages.contains_key(message_id) {
            return Err(StoreError::MessageNotFound(message_id.clone()));
        }
        Ok(())
    }

    async fn can_clear_chat(&self, _room_id: &RoomId, _requester: &UserId) -> Result<bool, StoreError> {
        Ok(true)
    }

    async fn assign_role(
        &self,
        room_id: &RoomId,
        _requester: &UserId,
        target: &UserId,
        role: String,
    ) -> Result<(), StoreError> {
        // Only the "host" role is capacity-limited by `max_rooms_hosted`;
        // every other role assignment is unconditional in this fake.
        if role == "host" {
            let mut count = self.hosted_rooms.entry(target.clone()).or_insert(0);
            if *count >= self.max_rooms_hosted {
                return Err(StoreError::MaxRoomsHosted {
                    user: target.to_string(),
                    count: *count,
                });
            }
            *count += 1;
        }
        let _ = room_id;
        Ok(())
    }

    async fn update_welcome_message(
        &self,
        _room_id: &RoomId,
        _requester: &UserId,
        _message: String,
    ) -> Result<(), StoreError> {
        Ok(())
    }

    async fn kick_participant(
        &self,
        _room_id: &RoomId,
        _requester: &UserId,
        _target: &UserId,
        duration: Duration,
    ) -> Result<KickOutcome, StoreError> {
        let expired_at = chrono::Utc::now()
            + chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::seconds(60));
        Ok(KickOutcome { expired_at })
    }
}

pub type SharedStore = Arc<dyn Store>;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_user_by_name() {
        let store = InMemoryStore::new(3);
        store.seed_user(User {
            id: UserId::from("bot"),
            username: "Cybertown Bot".into(),
        });
        let user = store.get_user_by_name("Cybertown Bot").await.unwrap();
        assert_eq!(user.id, UserId::from("bot"));
    }

    #[tokio::test]
    async fn test_get_user_by_name_missing_is_error() {
        let store = InMemoryStore::new(3);
        assert!(store.get_user_by_name("nobody").await.is_err());
    }

    #[tokio::test]
    async fn test_edit_message_requires_author() {
        let store = InMemoryStore::new(3);
        let msg = store
            .create_message(None, UserId::from("u2"), UserId::from("u1"), "hi".into())
            .await
            .unwrap();

        assert!(matches!(
            store
                .edit_message(&msg.id, &UserId::from("u2"), "hacked".into())
                .await,
            Err(StoreError::NotAuthorized)
        ));
        assert!(store
            .edit_message(&msg.id, &UserId::from("u1"), "edited".into())
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_assign_role_enforces_max_rooms_hosted() {
        let store = InMemoryStore::new(1);
        let target = UserId::from("u1");
        assert!(store
            .assign_role(&RoomId::from("1"), &UserId::from("host"), &target, "host".to_string())
            .await
            .is_ok());
        assert!(matches!(
            store
                .assign_role(&RoomId::from("2"), &UserId::from("host"), &target, "host".to_string())
                .await,
            Err(StoreError::MaxRoomsHosted { .. })
        ));
    }
}
