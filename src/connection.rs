use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::id_types::{RoomId, SessionId};
use crate::participant::{Participant, ParticipantIndex, User};
use crate::types::{OutboundSender, SharedOutbound};

/// A live duplex channel: its outbound write half, plus the one room it is
/// currently a member of (tracked here so `close` can route cleanup without
/// the dispatcher threading room state through every call).
pub struct ConnectionHandle {
    pub sid: SessionId,
    outbound: SharedOutbound,
    last_room: Mutex<Option<RoomId>>,
}

impl ConnectionHandle {
    pub async fn send(&self, message: warp::ws::Message) {
        let guard = self.outbound.lock().await;
        if let Some(tx) = guard.as_ref() {
            let _ = tx.send(message);
        }
    }

    pub async fn set_last_room(&self, room_id: Option<RoomId>) {
        *self.last_room.lock().await = room_id;
    }

    pub async fn last_room(&self) -> Option<RoomId> {
        self.last_room.lock().await.clone()
    }
}

/// C1: tracks live client channels and their ephemeral session ids.
pub struct ConnectionRegistry {
    conns: DashMap<SessionId, Arc<ConnectionHandle>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        ConnectionRegistry {
            conns: DashMap::new(),
        }
    }

    /// Mints a session id, registers the connection and its participant.
    /// `accept` and `close` are mutually exclusive per channel by virtue of
    /// each connection owning exactly one dispatcher task.
    pub fn accept(
        &self,
        outbound: OutboundSender,
        user: Option<User>,
        participants: &ParticipantIndex,
    ) -> (SessionId, Participant) {
        let sid = SessionId::generate();
        let handle = Arc::new(ConnectionHandle {
            sid: sid.clone(),
            outbound: Arc::new(Mutex::new(Some(outbound))),
            last_room: Mutex::new(None),
        });
        self.conns.insert(sid.clone(), handle);
        let participant = participants.insert(sid.clone(), user);
        (sid, participant)
    }

    pub fn get(&self, sid: &SessionId) -> Option<Arc<ConnectionHandle>> {
        self.conns.get(sid).map(|e| e.value().clone())
    }

    /// Removes the connection's bookkeeping. The caller (dispatcher) is
    /// responsible for invoking `leaveRoom` against the last-joined room
    /// and the participant index cleanup before or after this call.
    pub fn remove(&self, sid: &SessionId) -> Option<Arc<ConnectionHandle>> {
        self.conns.remove(sid).map(|(_, h)| h)
    }

    pub fn active_count(&self) -> i64 {
        self.conns.len() as i64
    }

    /// Every live session id, used by the globally-scoped broadcasts
    /// (`JOINED_ROOM_BROADCAST`, `LEFT_ROOM_BROADCAST`).
    pub fn active_session_ids(&self) -> Vec<SessionId> {
        self.conns.iter().map(|e| e.key().clone()).collect()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

pub type SharedConnectionRegistry = Arc<ConnectionRegistry>;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_accept_registers_connection_and_participant() {
        let registry = ConnectionRegistry::new();
        let participants = ParticipantIndex::new();
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();

        let (sid, participant) = registry.accept(tx, None, &participants);
        assert!(registry.get(&sid).is_some());
        assert!(participant.is_guest());
        assert_eq!(registry.active_count(), 1);
    }

    #[tokio::test]
    async fn test_remove_clears_connection() {
        let registry = ConnectionRegistry::new();
        let participants = ParticipantIndex::new();
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();

        let (sid, _) = registry.accept(tx, None, &participants);
        assert!(registry.remove(&sid).is_some());
        assert!(registry.get(&sid).is_none());
        assert_eq!(registry.active_count(), 0);
    }

    #[tokio::test]
    async fn test_last_room_roundtrip() {
        let registry = ConnectionRegistry::new();
        let participants = ParticipantIndex::new();
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();

        let (sid, _) = registry.accept(tx, None, &participants);
        let handle = registry.get(&sid).unwrap();
        handle.set_last_room(Some(RoomId::from("7"))).await;
        assert_eq!(handle.last_room().await, Some(RoomId::from("7")));
    }
}
