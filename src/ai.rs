use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::ai_provider::SharedAiProvider;
use crate::cache::SharedCache;
use crate::chat::{self, MessageKind};
use crate::connection::SharedConnectionRegistry;
use crate::id_types::{RoomId, UserId};
use crate::metrics;
use crate::participant::{SharedParticipantIndex, User};
use crate::room::SharedRoomRegistry;
use crate::types::AI_QUEUE_CAPACITY;

/// Queued record bundling a chat event with the metadata the worker needs
/// to compose and address the bot's reply (§4.7).
#[derive(Debug, Clone)]
pub struct AiMessageRequest {
    pub kind: MessageKind,
    pub room_id: RoomId,
    pub from_user_id: UserId,
    pub participant_id: Option<UserId>,
    pub content: String,
    pub prior_reply: Option<String>,
}

#[derive(Clone)]
pub struct AiPipeline {
    sender: mpsc::Sender<AiMessageRequest>,
}

impl AiPipeline {
    /// Spawns the worker task and returns a handle holding the queue's
    /// sending half. One task per request is spawned by the worker loop
    /// (unordered, fire-and-forget per §4.7), not by this constructor.
    pub fn spawn(
        bot: User,
        provider: SharedAiProvider,
        cache: SharedCache,
        connections: SharedConnectionRegistry,
        participants: SharedParticipantIndex,
        rooms: SharedRoomRegistry,
    ) -> Self {
        let (tx, mut rx) = mpsc::channel::<AiMessageRequest>(AI_QUEUE_CAPACITY);

        tokio::spawn(async move {
            while let Some(request) = rx.recv().await {
                let bot = bot.clone();
                let provider = provider.clone();
                let cache = cache.clone();
                let connections = connections.clone();
                let participants = participants.clone();
                let rooms = rooms.clone();
                tokio::spawn(async move {
                    process_request(request, bot, provider, cache, connections, participants, rooms)
                        .await;
                });
            }
        });

        AiPipeline { sender: tx }
    }

    /// Pushes a request onto the bounded queue. On a full queue the request
    /// is dropped and logged; the dispatcher must never block on this call.
    pub fn enqueue(&self, request: AiMessageRequest) {
        match self.sender.try_send(request) {
            Ok(()) => metrics::AI_REQUESTS_QUEUED_TOTAL.inc(),
            Err(mpsc::error::TrySendError::Full(_)) => {
                metrics::AI_REQUESTS_DROPPED_TOTAL.inc();
                warn!("AI request queue full, dropping request");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!("AI request queue closed, dropping request");
            }
        }
    }
}

async fn process_request(
    request: AiMessageRequest,
    bot: User,
    provider: SharedAiProvider,
    cache: SharedCache,
    connections: SharedConnectionRegistry,
    participants: SharedParticipantIndex,
    rooms: SharedRoomRegistry,
) {
    let reply = match provider
        .get_reply(
            &request.room_id,
            &request.from_user_id,
            &request.content,
            request.prior_reply.as_deref(),
        )
        .await
    {
        Ok(text) => text,
        Err(e) => {
            warn!(error = %e, "AI provider call failed, dropping reply");
            return;
        }
    };

    let target_user = match request.kind {
        MessageKind::PrivateRoomMsg => request
            .participant_id
            .as_ref()
            .and_then(|uid| participants.get_user(uid)),
        _ => None,
    };

    let mut message = chat::Message::new_room_message(request.room_id.clone(), bot.clone(), reply.clone());
    message.participant = target_user;

    cache
        .set_ai_reply(
            &request.room_id,
            &message.id,
            &request.from_user_id,
            &request.content,
            &reply,
        )
        .await;

    chat::broadcast_new_message(&connections, &participants, &rooms, request.kind, &message).await;

    metrics::AI_REQUESTS_COMPLETED_TOTAL.inc();
    info!(room = %request.room_id, "AI reply delivered");
}

pub type SharedAiPipeline = Arc<AiPipeline>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai_provider::EchoAiProvider;
    use crate::cache::InMemoryCache;

    #[tokio::test]
    async fn test_enqueue_and_process_round_trip() {
        let connections = Arc::new(crate::connection::ConnectionRegistry::new());
        let participants = Arc::new(crate::participant::ParticipantIndex::new());
        let rooms = Arc::new(crate::room::RoomRegistry::new());
        rooms.populate(vec![RoomId::from("1")]);
        let bot = User {
            id: UserId::from("bot"),
            username: "Cybertown Bot".into(),
        };

        let pipeline = AiPipeline::spawn(
            bot,
            Arc::new(EchoAiProvider),
            Arc::new(InMemoryCache::new()),
            connections,
            participants,
            rooms,
        );

        pipeline.enqueue(AiMessageRequest {
            kind: MessageKind::RoomMsg,
            room_id: RoomId::from("1"),
            from_user_id: UserId::from("u1"),
            participant_id: None,
            content: "@ai hello".to_string(),
            prior_reply: None,
        });

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        // No panics and the metric counters moved is the behavioral
        // assertion available without a live connection to observe.
        assert!(metrics::AI_REQUESTS_QUEUED_TOTAL.get() >= 1);
    }
}
