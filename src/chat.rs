use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use crate::app::AppState;
use crate::connection::ConnectionRegistry;
use crate::envelope::{names, Envelope};
use crate::id_types::{MessageId, RoomId, SessionId, UserId};
use crate::participant::{ParticipantIndex, Status, User};
use crate::room::RoomRegistry;
use crate::store::StoreError;

/// A chat message as broadcast on the wire. For `RoomMsg`/`PrivateRoomMsg`
/// the id is minted in-process; for `DMMsg` the store assigns it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub content: String,
    pub from: User,
    pub created_at: DateTime<Utc>,
    pub room_id: Option<RoomId>,
    pub participant: Option<User>,
    pub reply_to: Option<MessageId>,
}

impl Message {
    pub fn new_room_message(room_id: RoomId, from: User, content: String) -> Self {
        Message {
            id: MessageId::generate(),
            content,
            from,
            created_at: Utc::now(),
            room_id: Some(room_id),
            participant: None,
            reply_to: None,
        }
    }
}

/// Message kind chosen by `(roomId, participantId)` presence (§4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    RoomMsg,
    PrivateRoomMsg,
    DMMsg,
    Unknown,
}

pub fn classify(room_id: &Option<RoomId>, participant_id: &Option<UserId>) -> MessageKind {
    match (room_id.is_some(), participant_id.is_some()) {
        (true, false) => MessageKind::RoomMsg,
        (true, true) => MessageKind::PrivateRoomMsg,
        (false, true) => MessageKind::DMMsg,
        (false, false) => MessageKind::Unknown,
    }
}

/// Content addressed to the bot, e.g. "@ai explain this" — trigger (i) of
/// the AI-reply predicate in §4.5b.
pub fn is_ai_addressed(content: &str) -> bool {
    content.trim_start().to_lowercase().starts_with("@ai")
}

async fn send_to(connections: &ConnectionRegistry, sid: &SessionId, envelope: &Envelope) {
    if let Some(handle) = connections.get(sid) {
        if let Ok(message) = envelope.to_message() {
            handle.send(message).await;
        }
    }
}

async fn broadcast_to(connections: &ConnectionRegistry, sids: &[SessionId], envelope: &Envelope) {
    for sid in sids {
        send_to(connections, sid, envelope).await;
    }
}

/// Fans out a `NEW_MESSAGE_BROADCAST` per the kind's fan-out rule. Exposed
/// standalone (not an `AppState` method) so the AI worker — which does not
/// hold a full `AppState` to avoid an ownership cycle — can reuse it.
pub async fn broadcast_new_message(
    connections: &ConnectionRegistry,
    participants: &ParticipantIndex,
    rooms: &RoomRegistry,
    kind: MessageKind,
    message: &Message,
) {
    let envelope = match Envelope::new(names::NEW_MESSAGE_BROADCAST, message) {
        Ok(e) => e,
        Err(e) => {
            warn!(error = %e, "failed to encode NEW_MESSAGE_BROADCAST");
            return;
        }
    };

    match kind {
        MessageKind::RoomMsg => {
            if let Some(room_id) = &message.room_id {
                let sids: Vec<SessionId> = rooms
                    .members_of(room_id, participants)
                    .into_iter()
                    .map(|p| p.sid)
                    .collect();
                broadcast_to(connections, &sids, &envelope).await;
                crate::metrics::MESSAGES_RELAYED_TOTAL.with_label_values(&["room"]).inc();
            }
        }
        MessageKind::PrivateRoomMsg | MessageKind::DMMsg => {
            let mut user_ids = vec![message.from.id.clone()];
            if let Some(p) = &message.participant {
                user_ids.push(p.id.clone());
            }
            let sids = participants.sessions_of_users(&user_ids);
            broadcast_to(connections, &sids, &envelope).await;
            let label = if kind == MessageKind::DMMsg { "dm" } else { "private_room" };
            crate::metrics::MESSAGES_RELAYED_TOTAL.with_label_values(&[label]).inc();
        }
        MessageKind::Unknown => {}
    }
}

async fn send_error(
    connections: &ConnectionRegistry,
    sid: &SessionId,
    room_id: Option<&RoomId>,
    title: &str,
    content: &str,
) {
    let envelope = Envelope::new(
        names::ERROR_BROADCAST,
        &json!({ "roomID": room_id, "title": title, "content": content }),
    )
    .expect("static payload always serializes");
    send_to(connections, sid, &envelope).await;
}

#[derive(Debug, Deserialize)]
pub struct JoinRoomPayload {
    pub room_id: RoomId,
    #[serde(default)]
    pub key: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct NewMessagePayload {
    #[serde(default)]
    pub room_id: Option<RoomId>,
    #[serde(default)]
    pub participant_id: Option<UserId>,
    pub content: String,
    #[serde(default)]
    pub reply_to: Option<MessageId>,
}

#[derive(Debug, Deserialize)]
pub struct EditMessagePayload {
    #[serde(default)]
    pub room_id: Option<RoomId>,
    #[serde(default)]
    pub participant_id: Option<UserId>,
    pub id: MessageId,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct DeleteMessagePayload {
    #[serde(default)]
    pub room_id: Option<RoomId>,
    #[serde(default)]
    pub participant_id: Option<UserId>,
    pub id: MessageId,
}

#[derive(Debug, Deserialize)]
pub struct ReactionPayload {
    #[serde(default)]
    pub room_id: Option<RoomId>,
    #[serde(default)]
    pub participant_id: Option<UserId>,
    pub id: MessageId,
    pub reaction: String,
}

#[derive(Debug, Deserialize)]
pub struct ClearChatPayload {
    pub room_id: RoomId,
}

#[derive(Debug, Deserialize)]
pub struct AssignRolePayload {
    pub room_id: RoomId,
    pub user_id: UserId,
    pub role: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateWelcomeMessagePayload {
    pub room_id: RoomId,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct SetStatusPayload {
    pub room_id: RoomId,
    pub status: Status,
}

#[derive(Debug, Deserialize)]
pub struct KickParticipantPayload {
    pub room_id: RoomId,
    pub user_id: UserId,
    pub duration: String,
    #[serde(default)]
    pub clear_chat: bool,
}

impl AppState {
    /// §4.5a. Requires the requester to not already be a member (R1), and
    /// the room to exist and have capacity.
    pub async fn on_join_room(
        &self,
        sid: &SessionId,
        payload: JoinRoomPayload,
    ) -> anyhow::Result<()> {
        if self.rooms.is_in_room(&payload.room_id, sid) {
            warn!(room = %payload.room_id, session = %sid, "joined room already");
            return Ok(());
        }

        let info = match self.store.get_room(&payload.room_id).await {
            Ok(info) => info,
            Err(e) => {
                warn!(room = %payload.room_id, error = %e, "join rejected: room lookup failed");
                return Ok(());
            }
        };

        if self.rooms.member_count(&payload.room_id) >= info.max_participants {
            send_error(&self.connections, sid, Some(&payload.room_id), "Room Full", "").await;
            return Ok(());
        }

        self.rooms.add_member(&payload.room_id, sid.clone());
        if let Some(handle) = self.connections.get(sid) {
            handle.set_last_room(Some(payload.room_id.clone())).await;
        }
        crate::metrics::ACTIVE_ROOMS.set(self.rooms.room_count());

        let participant = self.participants.get(sid);
        let user = participant.as_ref().and_then(|p| p.user.clone());

        let existing_tracks = self.rooms.tracks_of(&payload.room_id);
        let stream_map: std::collections::HashMap<String, String> = existing_tracks
            .iter()
            .map(|t| (t.origin.to_string(), t.stream_id.to_string()))
            .collect();
        if let Ok(envelope) = Envelope::new(
            names::PEER_STREAMS,
            &json!({ "roomID": payload.room_id, "streams": stream_map }),
        ) {
            send_to(&self.connections, sid, &envelope).await;
        }

        if let Ok(envelope) = Envelope::new(
            names::JOINED_ROOM_BROADCAST,
            &json!({ "roomID": payload.room_id, "user": user, "sid": sid, "key": payload.key }),
        ) {
            let all: Vec<SessionId> = self.connections.active_session_ids();
            broadcast_to(&self.connections, &all, &envelope).await;
        }

        if let Err(e) = self.establish_peer_session(sid, &payload.room_id).await {
            warn!(room = %payload.room_id, session = %sid, error = %e, "failed to establish peer session");
        }

        info!(room = %payload.room_id, session = %sid, "joined room");
        Ok(())
    }

    /// Server-initiated leave: used by `close()` cleanup and by kicks.
    pub async fn leave_room(&self, room_id: &RoomId, sid: &SessionId) {
        if self.rooms.remove_member(room_id, sid) {
            crate::metrics::ACTIVE_ROOMS.set(self.rooms.room_count());
            if let Ok(envelope) =
                Envelope::new(names::LEFT_ROOM_BROADCAST, &json!({ "roomID": room_id, "sid": sid }))
            {
                let all = self.connections.active_session_ids();
                broadcast_to(&self.connections, &all, &envelope).await;
            }
            self.peers.remove(&(room_id.clone(), sid.clone()));
        }
    }

    pub async fn on_new_message(&self, sid: &SessionId, payload: NewMessagePayload) -> anyhow::Result<()> {
        if let Err(e) = crate::validation::validate_content(&payload.content) {
            warn!(error = %e, "NEW_MESSAGE rejected: invalid content");
            return Ok(());
        }

        let kind = classify(&payload.room_id, &payload.participant_id);
        let participant = match self.participants.get(sid) {
            Some(p) => p,
            None => return Ok(()),
        };
        let from = match participant.user.clone() {
            Some(u) => u,
            None => return Ok(()),
        };

        let target_user = match &payload.participant_id {
            Some(uid) => self.participants.get_user(uid),
            None => None,
        };

        let message = match kind {
            MessageKind::DMMsg => {
                let target = match &target_user {
                    Some(u) => u.clone(),
                    None => return Ok(()),
                };
                let stored = self
                    .store
                    .create_message(None, target.id.clone(), from.id.clone(), payload.content.clone())
                    .await?;
                Message {
                    id: stored.id,
                    content: stored.content,
                    from,
                    created_at: Utc::now(),
                    room_id: None,
                    participant: Some(target),
                    reply_to: payload.reply_to.clone(),
                }
            }
            MessageKind::RoomMsg | MessageKind::PrivateRoomMsg => Message {
                id: MessageId::generate(),
                content: payload.content.clone(),
                from,
                created_at: Utc::now(),
                room_id: payload.room_id.clone(),
                participant: target_user,
                reply_to: payload.reply_to.clone(),
            },
            MessageKind::Unknown => {
                warn!("NEW_MESSAGE dropped: neither roomId nor participantId present");
                return Ok(());
            }
        };

        broadcast_new_message(&self.connections, &self.participants, &self.rooms, kind, &message).await;

        if kind != MessageKind::DMMsg {
            self.maybe_trigger_ai_reply(kind, &message).await;
        }

        Ok(())
    }

    async fn maybe_trigger_ai_reply(&self, kind: MessageKind, message: &Message) {
        let room_id = match &message.room_id {
            Some(r) => r.clone(),
            None => return,
        };

        let mut prior_reply = None;
        let mut triggered = is_ai_addressed(&message.content);
        if let Some(reply_to) = &message.reply_to {
            if let Some(prior) = self.cache.is_reply_to_ai(&room_id, reply_to).await {
                triggered = true;
                prior_reply = Some(prior);
            }
        }

        if !triggered {
            return;
        }

        self.ai.enqueue(crate::ai::AiMessageRequest {
            kind,
            room_id,
            from_user_id: message.from.id.clone(),
            participant_id: message.participant.as_ref().map(|p| p.id.clone()),
            content: message.content.clone(),
            prior_reply,
        });
    }

    pub async fn on_edit_message(&self, sid: &SessionId, payload: EditMessagePayload) -> anyhow::Result<()> {
        let kind = classify(&payload.room_id, &payload.participant_id);
        let participant = match self.participants.get(sid) {
            Some(p) => p,
            None => return Ok(()),
        };

        match kind {
            MessageKind::RoomMsg | MessageKind::PrivateRoomMsg => {
                let room_id = payload.room_id.clone().expect("classify guarantees room_id");
                // Edit-path authorization gap (spec.md §9): a non-member
                // editing a room/private-room message is rejected outright.
                if !self.rooms.is_in_room(&room_id, sid) {
                    warn!(room = %room_id, session = %sid, "edit rejected: not a room member");
                    return Ok(());
                }
                let from = match &participant.user {
                    Some(u) => u.clone(),
                    None => return Ok(()),
                };
                let target_user = match &payload.participant_id {
                    Some(uid) => self.participants.get_user(uid),
                    None => None,
                };
                let message = Message {
                    id: payload.id,
                    content: payload.content,
                    from,
                    created_at: Utc::now(),
                    room_id: Some(room_id),
                    participant: target_user,
                    reply_to: None,
                };
                let envelope = Envelope::new(names::EDIT_MESSAGE_BROADCAST, &message)?;
                let sids = self.fanout_sids(kind, &message);
                broadcast_to(&self.connections, &sids, &envelope).await;
            }
            MessageKind::DMMsg => {
                let user = match &participant.user {
                    Some(u) => u.clone(),
                    None => return Ok(()),
                };
                match self.store.edit_message(&payload.id, &user.id, payload.content.clone()).await {
                    Ok(()) => {
                        let target_user = match &payload.participant_id {
                            Some(uid) => self.participants.get_user(uid),
                            None => None,
                        };
                        let message = Message {
                            id: payload.id,
                            content: payload.content,
                            from: user,
                            created_at: Utc::now(),
                            room_id: None,
                            participant: target_user,
                            reply_to: None,
                        };
                        let envelope = Envelope::new(names::EDIT_MESSAGE_BROADCAST, &message)?;
                        let sids = self.fanout_sids(kind, &message);
                        broadcast_to(&self.connections, &sids, &envelope).await;
                    }
                    Err(StoreError::NotAuthorized) => {
                        warn!(session = %sid, "edit rejected: not message author");
                    }
                    Err(e) => warn!(error = %e, "edit_message store call failed"),
                }
            }
            MessageKind::Unknown => {}
        }

        Ok(())
    }

    fn fanout_sids(&self, kind: MessageKind, message: &Message) -> Vec<SessionId> {
        match kind {
            MessageKind::RoomMsg => message
                .room_id
                .as_ref()
                .map(|r| {
                    self.rooms
                        .members_of(r, &self.participants)
                        .into_iter()
                        .map(|p| p.sid)
                        .collect()
                })
                .unwrap_or_default(),
            MessageKind::PrivateRoomMsg | MessageKind::DMMsg => {
                let mut ids = vec![message.from.id.clone()];
                if let Some(p) = &message.participant {
                    ids.push(p.id.clone());
                }
                self.participants.sessions_of_users(&ids)
            }
            MessageKind::Unknown => Vec::new(),
        }
    }

    pub async fn on_delete_message(
        &self,
        sid: &SessionId,
        payload: DeleteMessagePayload,
    ) -> anyhow::Result<()> {
        let kind = classify(&payload.room_id, &payload.participant_id);
        let participant = match self.participants.get(sid) {
            Some(p) => p,
            None => return Ok(()),
        };
        let user = match &participant.user {
            Some(u) => u.clone(),
            None => return Ok(()),
        };

        match kind {
            MessageKind::DMMsg => {
                if let Err(e) = self.store.delete_message(&payload.id, &user.id).await {
                    warn!(error = %e, "delete_message rejected");
                    return Ok(());
                }
            }
            MessageKind::RoomMsg | MessageKind::PrivateRoomMsg => {
                let room_id = payload.room_id.clone().expect("classify guarantees room_id");
                if !self.rooms.is_in_room(&room_id, sid) {
                    warn!(room = %room_id, session = %sid, "delete rejected: not a room member");
                    return Ok(());
                }
            }
            MessageKind::Unknown => return Ok(()),
        }

        let target_user = match &payload.participant_id {
            Some(uid) => self.participants.get_user(uid),
            None => None,
        };
        let message = Message {
            id: payload.id,
            content: String::new(),
            from: user,
            created_at: Utc::now(),
            room_id: payload.room_id,
            participant: target_user,
            reply_to: None,
        };
        let envelope = Envelope::new(names::DELETE_MESSAGE_BROADCAST, &message)?;
        let sids = self.fanout_sids(kind, &message);
        broadcast_to(&self.connections, &sids, &envelope).await;
        Ok(())
    }

    pub async fn on_reaction_to_message(
        &self,
        sid: &SessionId,
        payload: ReactionPayload,
    ) -> anyhow::Result<()> {
        if !self.emojis.contains(&payload.reaction) {
            warn!(reaction = %payload.reaction, "reaction rejected: unknown emoji key");
            return Ok(());
        }

        let kind = classify(&payload.room_id, &payload.participant_id);
        let participant = match self.participants.get(sid) {
            Some(p) => p,
            None => return Ok(()),
        };
        let user = match &participant.user {
            Some(u) => u.clone(),
            None => return Ok(()),
        };

        match kind {
            MessageKind::DMMsg => {
                if let Err(e) = self
                    .store
                    .react_to_message(&payload.id, &user.id, payload.reaction.clone())
                    .await
                {
                    warn!(error = %e, "react_to_message rejected");
                    return Ok(());
                }
            }
            MessageKind::RoomMsg | MessageKind::PrivateRoomMsg => {
                let room_id = payload.room_id.clone().expect("classify guarantees room_id");
                if !self.rooms.is_in_room(&room_id, sid) {
                    return Ok(());
                }
            }
            MessageKind::Unknown => return Ok(()),
        }

        let target_user = match &payload.participant_id {
            Some(uid) => self.participants.get_user(uid),
            None => None,
        };
        let envelope = Envelope::new(
            names::REACTION_TO_MESSAGE_BROADCAST,
            &json!({
                "id": payload.id,
                "reaction": payload.reaction,
                "roomId": payload.room_id,
                "from": user,
            }),
        )?;
        let message = Message {
            id: payload.id,
            content: String::new(),
            from: user,
            created_at: Utc::now(),
            room_id: payload.room_id,
            participant: target_user,
            reply_to: None,
        };
        let sids = self.fanout_sids(kind, &message);
        broadcast_to(&self.connections, &sids, &envelope).await;
        Ok(())
    }

    async fn require_membership(&self, sid: &SessionId, room_id: &RoomId) -> bool {
        self.rooms.is_in_room(room_id, sid)
    }

    pub async fn on_clear_chat(&self, sid: &SessionId, payload: ClearChatPayload) -> anyhow::Result<()> {
        if !self.require_membership(sid, &payload.room_id).await {
            warn!(room = %payload.room_id, "clear chat rejected: not a member");
            return Ok(());
        }
        let user = self.require_user(sid).await;
        let user = match user {
            Some(u) => u,
            None => return Ok(()),
        };
        match self.store.can_clear_chat(&payload.room_id, &user.id).await {
            Ok(true) => {}
            _ => {
                warn!(room = %payload.room_id, "clear chat rejected by store");
                return Ok(());
            }
        }
        self.broadcast_clear_chat(&payload.room_id).await;
        Ok(())
    }

    async fn broadcast_clear_chat(&self, room_id: &RoomId) {
        if let Ok(envelope) = Envelope::new(names::CLEAR_CHAT_BROADCAST, &json!({ "roomID": room_id })) {
            let sids: Vec<SessionId> = self
                .rooms
                .members_of(room_id, &self.participants)
                .into_iter()
                .map(|p| p.sid)
                .collect();
            broadcast_to(&self.connections, &sids, &envelope).await;
        }
    }

    async fn require_user(&self, sid: &SessionId) -> Option<User> {
        self.participants.get(sid).and_then(|p| p.user)
    }

    pub async fn on_assign_role(&self, sid: &SessionId, payload: AssignRolePayload) -> anyhow::Result<()> {
        if !self.require_membership(sid, &payload.room_id).await {
            return Ok(());
        }
        let requester = match self.require_user(sid).await {
            Some(u) => u,
            None => return Ok(()),
        };

        match self
            .store
            .assign_role(&payload.room_id, &requester.id, &payload.user_id, payload.role.clone())
            .await
        {
            Ok(()) => {
                let participant = self.participants.get_user(&payload.user_id);
                if let Ok(envelope) = Envelope::new(
                    names::ASSIGN_ROLE_BROADCAST,
                    &json!({
                        "roomID": payload.room_id,
                        "by": requester,
                        "role": payload.role,
                        "participant": participant,
                    }),
                ) {
                    let sids: Vec<SessionId> = self
                        .rooms
                        .members_of(&payload.room_id, &self.participants)
                        .into_iter()
                        .map(|p| p.sid)
                        .collect();
                    broadcast_to(&self.connections, &sids, &envelope).await;
                }
            }
            Err(StoreError::MaxRoomsHosted { user, count }) => {
                send_error(
                    &self.connections,
                    sid,
                    Some(&payload.room_id),
                    "Transfer Room",
                    &format!("{} is already hosting {} rooms", user, count),
                )
                .await;
            }
            Err(e) => warn!(error = %e, "assign_role store call failed"),
        }
        Ok(())
    }

    pub async fn on_update_welcome_message(
        &self,
        sid: &SessionId,
        payload: UpdateWelcomeMessagePayload,
    ) -> anyhow::Result<()> {
        if !self.require_membership(sid, &payload.room_id).await {
            return Ok(());
        }
        if let Err(e) = crate::validation::validate_welcome_message(&payload.message) {
            warn!(error = %e, "welcome message rejected: invalid content");
            return Ok(());
        }
        let requester = match self.require_user(sid).await {
            Some(u) => u,
            None => return Ok(()),
        };
        if let Err(e) = self
            .store
            .update_welcome_message(&payload.room_id, &requester.id, payload.message.clone())
            .await
        {
            warn!(error = %e, "update_welcome_message store call failed");
            return Ok(());
        }

        if let Ok(envelope) = Envelope::new(
            names::UPDATE_WELCOME_MESSAGE_BROADCAST,
            &json!({ "roomID": payload.room_id, "message": payload.message }),
        ) {
            let sids: Vec<SessionId> = self
                .rooms
                .members_of(&payload.room_id, &self.participants)
                .into_iter()
                .map(|p| p.sid)
                .collect();
            broadcast_to(&self.connections, &sids, &envelope).await;
        }
        Ok(())
    }

    /// The only chat-control event that mutates in-memory participant state
    /// directly rather than delegating to the store. Room-scoped like every
    /// other room-control event (§4.5d).
    pub async fn on_set_status(&self, sid: &SessionId, payload: SetStatusPayload) -> anyhow::Result<()> {
        if !self.require_membership(sid, &payload.room_id).await {
            return Ok(());
        }
        if crate::validation::validate_status(&payload.status).is_err() {
            return Ok(());
        }
        let requester = match self.require_user(sid).await {
            Some(u) => u,
            None => return Ok(()),
        };
        if !self.participants.set_status(sid, payload.status) {
            return Ok(());
        }
        if let Ok(envelope) = Envelope::new(
            names::SET_STATUS_BROADCAST,
            &json!({ "roomID": payload.room_id, "status": payload.status, "by": requester }),
        ) {
            let sids: Vec<SessionId> = self
                .rooms
                .members_of(&payload.room_id, &self.participants)
                .into_iter()
                .map(|p| p.sid)
                .collect();
            broadcast_to(&self.connections, &sids, &envelope).await;
        }
        Ok(())
    }

    pub async fn on_kick_participant(
        &self,
        sid: &SessionId,
        payload: KickParticipantPayload,
    ) -> anyhow::Result<()> {
        if !self.require_membership(sid, &payload.room_id).await {
            return Ok(());
        }
        let requester = match self.require_user(sid).await {
            Some(u) => u,
            None => return Ok(()),
        };

        let duration = match humantime::parse_duration(&payload.duration) {
            Ok(d) if d >= std::time::Duration::from_secs(60) => d,
            Ok(_) => {
                warn!(duration = %payload.duration, "kick rejected: duration under 60s");
                return Ok(());
            }
            Err(e) => {
                warn!(duration = %payload.duration, error = %e, "kick rejected: invalid duration");
                return Ok(());
            }
        };

        let outcome = match self
            .store
            .kick_participant(&payload.room_id, &requester.id, &payload.user_id, duration)
            .await
        {
            Ok(o) => o,
            Err(e) => {
                warn!(error = %e, "kick_participant store call failed");
                return Ok(());
            }
        };

        if payload.clear_chat {
            self.broadcast_clear_chat(&payload.room_id).await;
        }

        if let Ok(envelope) = Envelope::new(
            names::KICK_PARTICIPANT_BROADCAST,
            &json!({
                "by": requester,
                "participant": payload.user_id,
                "roomID": payload.room_id,
                "expiredAt": outcome.expired_at,
            }),
        ) {
            let sids: Vec<SessionId> = self
                .rooms
                .members_of(&payload.room_id, &self.participants)
                .into_iter()
                .map(|p| p.sid)
                .collect();
            broadcast_to(&self.connections, &sids, &envelope).await;
        }

        crate::metrics::KICKS_ISSUED_TOTAL.inc();

        let victim_sessions = self.participants.sessions_of(&payload.user_id);
        for victim_sid in victim_sessions {
            if self.rooms.is_in_room(&payload.room_id, &victim_sid) {
                self.leave_room(&payload.room_id, &victim_sid).await;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_room_msg() {
        assert_eq!(
            classify(&Some(RoomId::from("1")), &None),
            MessageKind::RoomMsg
        );
    }

    #[test]
    fn test_classify_private_room_msg() {
        assert_eq!(
            classify(&Some(RoomId::from("1")), &Some(UserId::from("u1"))),
            MessageKind::PrivateRoomMsg
        );
    }

    #[test]
    fn test_classify_dm_msg() {
        assert_eq!(
            classify(&None, &Some(UserId::from("u1"))),
            MessageKind::DMMsg
        );
    }

    #[test]
    fn test_classify_unknown() {
        assert_eq!(classify(&None, &None), MessageKind::Unknown);
    }

    #[test]
    fn test_is_ai_addressed() {
        assert!(is_ai_addressed("@ai tell me a joke"));
        assert!(is_ai_addressed("  @AI hi"));
        assert!(!is_ai_addressed("hello everyone"));
    }
}
