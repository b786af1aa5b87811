use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::id_types::{SessionId, UserId};

/// Durable identity snapshot embedded into a `Participant` at accept time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub username: String,
}

/// In-room status a participant may broadcast to others (`SET_STATUS`).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub enum Status {
    None,
    Busy,
    Away,
}

impl Default for Status {
    fn default() -> Self {
        Status::None
    }
}

/// Ephemeral in-room identity bound to one live connection.
#[derive(Debug, Clone, Serialize)]
pub struct Participant {
    pub sid: SessionId,
    pub user: Option<User>,
    pub status: Status,
    pub joined_at: DateTime<Utc>,
}

impl Participant {
    pub fn new(sid: SessionId, user: Option<User>) -> Self {
        Participant {
            sid,
            user,
            status: Status::None,
            joined_at: Utc::now(),
        }
    }

    pub fn is_guest(&self) -> bool {
        self.user.is_none()
    }
}

/// C2: maps session id to `Participant`, and user id to its live sessions.
pub struct ParticipantIndex {
    participants: DashMap<SessionId, Participant>,
    users: DashMap<UserId, Vec<SessionId>>,
}

impl ParticipantIndex {
    pub fn new() -> Self {
        ParticipantIndex {
            participants: DashMap::new(),
            users: DashMap::new(),
        }
    }

    /// Registers a freshly accepted connection's participant. If `user` is
    /// present its session id is appended to `users[user.id]`.
    pub fn insert(&self, sid: SessionId, user: Option<User>) -> Participant {
        let participant = Participant::new(sid.clone(), user.clone());
        self.participants.insert(sid.clone(), participant.clone());
        if let Some(u) = user {
            self.users.entry(u.id).or_default().push(sid);
        }
        participant
    }

    /// Removes a session on disconnect, keeping invariant 3: user lists with
    /// no remaining sessions are dropped entirely.
    pub fn remove(&self, sid: &SessionId) -> Option<Participant> {
        let (_, participant) = self.participants.remove(sid)?;
        if let Some(user) = &participant.user {
            if let Some(mut sessions) = self.users.get_mut(&user.id) {
                sessions.retain(|s| s != sid);
                if sessions.is_empty() {
                    drop(sessions);
                    self.users.remove(&user.id);
                }
            }
        }
        Some(participant)
    }

    pub fn get(&self, sid: &SessionId) -> Option<Participant> {
        self.participants.get(sid).map(|p| p.clone())
    }

    /// Returns the user snapshot from the first live session found for this
    /// user id. Stable under concurrent accepts because `User` is a value
    /// snapshot; any live session's copy suffices.
    pub fn get_user(&self, user_id: &UserId) -> Option<User> {
        let sessions = self.users.get(user_id)?;
        let first = sessions.first()?;
        self.participants.get(first).and_then(|p| p.user.clone())
    }

    pub fn sessions_of(&self, user_id: &UserId) -> Vec<SessionId> {
        self.users
            .get(user_id)
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    pub fn sessions_of_users(&self, user_ids: &[UserId]) -> Vec<SessionId> {
        user_ids.iter().flat_map(|u| self.sessions_of(u)).collect()
    }

    /// Mutates a participant's status in place (`SET_STATUS` never persists).
    pub fn set_status(&self, sid: &SessionId, status: Status) -> bool {
        if let Some(mut p) = self.participants.get_mut(sid) {
            p.status = status;
            true
        } else {
            false
        }
    }

    pub fn active_count(&self) -> i64 {
        self.participants.len() as i64
    }
}

impl Default for ParticipantIndex {
    fn default() -> Self {
        Self::new()
    }
}

pub type SharedParticipantIndex = Arc<ParticipantIndex>;

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: &str) -> User {
        User {
            id: UserId::from(id),
            username: id.to_string(),
        }
    }

    #[test]
    fn test_insert_and_get() {
        let idx = ParticipantIndex::new();
        let sid = SessionId::generate();
        idx.insert(sid.clone(), Some(user("u1")));
        let p = idx.get(&sid).unwrap();
        assert_eq!(p.user.unwrap().id, UserId::from("u1"));
    }

    #[test]
    fn test_get_user_returns_first_session_snapshot() {
        let idx = ParticipantIndex::new();
        let sid1 = SessionId::generate();
        let sid2 = SessionId::generate();
        idx.insert(sid1, Some(user("u1")));
        idx.insert(sid2, Some(user("u1")));
        assert_eq!(idx.sessions_of(&UserId::from("u1")).len(), 2);
        assert_eq!(idx.get_user(&UserId::from("u1")).unwrap().username, "u1");
    }

    #[test]
    fn test_remove_drops_empty_user_list() {
        let idx = ParticipantIndex::new();
        let sid = SessionId::generate();
        idx.insert(sid.clone(), Some(user("u1")));
        idx.remove(&sid);
        assert!(idx.get_user(&UserId::from("u1")).is_none());
        assert!(idx.sessions_of(&UserId::from("u1")).is_empty());
    }

    #[test]
    fn test_guest_has_no_user() {
        let idx = ParticipantIndex::new();
        let sid = SessionId::generate();
        let p = idx.insert(sid, None);
        assert!(p.is_guest());
    }

    #[test]
    fn test_set_status() {
        let idx = ParticipantIndex::new();
        let sid = SessionId::generate();
        idx.insert(sid.clone(), Some(user("u1")));
        assert!(idx.set_status(&sid, Status::Busy));
        assert_eq!(idx.get(&sid).unwrap().status, Status::Busy);
    }
}
