use async_trait::async_trait;
use std::sync::Arc;

use crate::id_types::{RoomId, UserId};

#[derive(Debug, thiserror::Error)]
pub enum AiProviderError {
    #[error("ai provider unavailable: {0}")]
    Unavailable(String),
}

/// Seam onto the external AI reply provider.
#[async_trait]
pub trait AiProvider: Send + Sync {
    async fn get_reply(
        &self,
        room_id: &RoomId,
        from_user_id: &UserId,
        content: &str,
        prior_reply: Option<&str>,
    ) -> Result<String, AiProviderError>;
}

/// Deterministic fake for tests and local runs: echoes the question back
/// with an acknowledgement, folding in prior context when present.
pub struct EchoAiProvider;

#[async_trait]
impl AiProvider for EchoAiProvider {
    async fn get_reply(
        &self,
        _room_id: &RoomId,
        _from_user_id: &UserId,
        content: &str,
        prior_reply: Option<&str>,
    ) -> Result<String, AiProviderError> {
        match prior_reply {
            Some(prior) => Ok(format!("(following up on \"{}\") you said: {}", prior, content)),
            None => Ok(format!("you said: {}", content)),
        }
    }
}

pub type SharedAiProvider = Arc<dyn AiProvider>;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_echo_provider_replies() {
        let provider = EchoAiProvider;
        let reply = provider
            .get_reply(&RoomId::from("1"), &UserId::from("u1"), "hello", None)
            .await
            .unwrap();
        assert_eq!(reply, "you said: hello");
    }

    #[tokio::test]
    async fn test_echo_provider_carries_prior_reply() {
        let provider = EchoAiProvider;
        let reply = provider
            .get_reply(
                &RoomId::from("1"),
                &UserId::from("u1"),
                "and then?",
                Some("first answer"),
            )
            .await
            .unwrap();
        assert!(reply.contains("first answer"));
    }
}
