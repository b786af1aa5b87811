use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;

use crate::id_types::{MessageId, RoomId, UserId};

/// Seam onto the key-value cache used for AI-reply context lookups. The
/// core never depends on a concrete Redis client — only this trait.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Returns the prior AI reply text for `(room_id, msg_id)` if that
    /// message was itself an AI-authored reply, so the worker can carry
    /// context forward when a user replies to the bot.
    async fn is_reply_to_ai(&self, room_id: &RoomId, msg_id: &MessageId) -> Option<String>;

    async fn set_ai_reply(
        &self,
        room_id: &RoomId,
        msg_id: &MessageId,
        from_user_id: &UserId,
        question: &str,
        reply: &str,
    );
}

#[derive(Clone)]
struct AiReplyEntry {
    #[allow(dead_code)]
    from_user_id: UserId,
    question: String,
    reply: String,
}

pub struct InMemoryCache {
    replies: DashMap<(RoomId, MessageId), AiReplyEntry>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        InMemoryCache {
            replies: DashMap::new(),
        }
    }
}

impl Default for InMemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Cache for InMemoryCache {
    async fn is_reply_to_ai(&self, room_id: &RoomId, msg_id: &MessageId) -> Option<String> {
        self.replies
            .get(&(room_id.clone(), msg_id.clone()))
            .map(|e| e.reply.clone())
    }

    async fn set_ai_reply(
        &self,
        room_id: &RoomId,
        msg_id: &MessageId,
        from_user_id: &UserId,
        question: &str,
        reply: &str,
    ) {
        self.replies.insert(
            (room_id.clone(), msg_id.clone()),
            AiReplyEntry {
                from_user_id: from_user_id.clone(),
                question: question.to_string(),
                reply: reply.to_string(),
            },
        );
    }
}

pub type SharedCache = Arc<dyn Cache>;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_and_check_ai_reply() {
        let cache = InMemoryCache::new();
        let room = RoomId::from("1");
        let msg = MessageId::from("m1");
        assert!(cache.is_reply_to_ai(&room, &msg).await.is_none());

        cache
            .set_ai_reply(&room, &msg, &UserId::from("bot"), "hi", "hello there")
            .await;
        assert_eq!(
            cache.is_reply_to_ai(&room, &msg).await,
            Some("hello there".to_string())
        );
    }
}
