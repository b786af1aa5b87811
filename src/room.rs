use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::info;
use webrtc::track::track_local::track_local_static_rtp::TrackLocalStaticRTP;

use crate::id_types::{RoomId, SessionId, StreamId, TrackId};
use crate::participant::{Participant, ParticipantIndex};

/// A republishable audio track, forwarding one publisher's RTP to the room.
#[derive(Clone)]
pub struct RoomTrack {
    pub origin: SessionId,
    pub track_id: TrackId,
    pub stream_id: StreamId,
    pub local_track: Arc<TrackLocalStaticRTP>,
}

/// In-memory record of one room: membership, last-activity stamp, and the
/// track table of every audio stream currently published into it.
pub struct Room {
    pub id: RoomId,
    members: Vec<SessionId>,
    pub last_activity: DateTime<Utc>,
    tracks: DashMap<TrackId, RoomTrack>,
}

impl Room {
    fn new(id: RoomId) -> Self {
        Room {
            id,
            members: Vec::new(),
            last_activity: Utc::now(),
            tracks: DashMap::new(),
        }
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn is_member(&self, sid: &SessionId) -> bool {
        self.members.contains(sid)
    }

    pub fn tracks(&self) -> Vec<RoomTrack> {
        self.tracks.iter().map(|e| e.value().clone()).collect()
    }
}

/// C3: room registry plus the per-room media-track tables.
pub struct RoomRegistry {
    rooms: DashMap<RoomId, Room>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        RoomRegistry {
            rooms: DashMap::new(),
        }
    }

    /// Seeds the registry from persisted room ids at startup (`populateRooms`).
    pub fn populate(&self, room_ids: impl IntoIterator<Item = RoomId>) {
        for id in room_ids {
            self.rooms.entry(id.clone()).or_insert_with(|| Room::new(id));
        }
    }

    pub fn is_in_room(&self, room_id: &RoomId, sid: &SessionId) -> bool {
        self.rooms
            .get(room_id)
            .map(|r| r.is_member(sid))
            .unwrap_or(false)
    }

    pub fn member_count(&self, room_id: &RoomId) -> usize {
        self.rooms.get(room_id).map(|r| r.member_count()).unwrap_or(0)
    }

    pub fn exists(&self, room_id: &RoomId) -> bool {
        self.rooms.contains_key(room_id)
    }

    /// Participants currently in the room, stable-sorted by `joined_at` (P3).
    pub fn members_of(&self, room_id: &RoomId, index: &ParticipantIndex) -> Vec<Participant> {
        let sids = match self.rooms.get(room_id) {
            Some(r) => r.members.clone(),
            None => return Vec::new(),
        };
        let mut participants: Vec<Participant> =
            sids.iter().filter_map(|s| index.get(s)).collect();
        participants.sort_by_key(|p| p.joined_at);
        participants
    }

    /// Adds a member and bumps `last_activity`. Returns false if the room
    /// doesn't exist (the caller must check `JOIN_ROOM` preconditions first).
    pub fn add_member(&self, room_id: &RoomId, sid: SessionId) -> bool {
        match self.rooms.get_mut(room_id) {
            Some(mut room) => {
                if !room.members.contains(&sid) {
                    room.members.push(sid);
                }
                room.last_activity = Utc::now();
                true
            }
            None => false,
        }
    }

    /// Removes a member and bumps `last_activity`. Returns true if the
    /// session was actually present (the caller emits `LEFT_ROOM_BROADCAST`).
    pub fn remove_member(&self, room_id: &RoomId, sid: &SessionId) -> bool {
        match self.rooms.get_mut(room_id) {
            Some(mut room) => {
                let before = room.members.len();
                room.members.retain(|s| s != sid);
                room.last_activity = Utc::now();
                room.members.len() != before
            }
            None => false,
        }
    }

    /// Registers a newly published local track, per `addTrack` (§4.3).
    pub fn add_track(&self, room_id: &RoomId, track: RoomTrack) {
        if let Some(room) = self.rooms.get(room_id) {
            info!(room = %room_id, track = %track.track_id, "track published");
            room.tracks.insert(track.track_id.clone(), track);
        }
    }

    pub fn remove_track(&self, room_id: &RoomId, track_id: &TrackId) {
        if let Some(room) = self.rooms.get(room_id) {
            room.tracks.remove(track_id);
        }
    }

    pub fn tracks_of(&self, room_id: &RoomId) -> Vec<RoomTrack> {
        self.rooms.get(room_id).map(|r| r.tracks()).unwrap_or_default()
    }

    /// Evicts every room whose member set is empty and whose `last_activity`
    /// predates `threshold`. Returns the count evicted (for metrics).
    pub fn evict_inactive(&self, threshold: DateTime<Utc>) -> usize {
        let stale: Vec<RoomId> = self
            .rooms
            .iter()
            .filter(|e| e.member_count() == 0 && e.last_activity < threshold)
            .map(|e| e.key().clone())
            .collect();
        for id in &stale {
            self.rooms.remove(id);
            info!(room = %id, "reaper evicted idle room");
        }
        stale.len()
    }

    pub fn room_count(&self) -> i64 {
        self.rooms.len() as i64
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new()
    }
}

pub type SharedRoomRegistry = Arc<RoomRegistry>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id_types::UserId;
    use crate::participant::User;

    #[test]
    fn test_populate_and_exists() {
        let reg = RoomRegistry::new();
        reg.populate(vec![RoomId::from("1"), RoomId::from("2")]);
        assert!(reg.exists(&RoomId::from("1")));
        assert!(!reg.exists(&RoomId::from("3")));
    }

    #[test]
    fn test_add_remove_member() {
        let reg = RoomRegistry::new();
        let room = RoomId::from("1");
        reg.populate(vec![room.clone()]);
        let sid = SessionId::generate();

        assert!(reg.add_member(&room, sid.clone()));
        assert!(reg.is_in_room(&room, &sid));
        assert_eq!(reg.member_count(&room), 1);

        assert!(reg.remove_member(&room, &sid));
        assert!(!reg.is_in_room(&room, &sid));
        assert_eq!(reg.member_count(&room), 0);
    }

    #[test]
    fn test_remove_member_not_present_returns_false() {
        let reg = RoomRegistry::new();
        let room = RoomId::from("1");
        reg.populate(vec![room.clone()]);
        assert!(!reg.remove_member(&room, &SessionId::generate()));
    }

    #[test]
    fn test_members_of_sorted_by_joined_at() {
        let reg = RoomRegistry::new();
        let room = RoomId::from("1");
        reg.populate(vec![room.clone()]);
        let index = ParticipantIndex::new();

        let sid_a = SessionId::generate();
        index.insert(
            sid_a.clone(),
            Some(User {
                id: UserId::from("a"),
                username: "a".into(),
            }),
        );
        reg.add_member(&room, sid_a.clone());

        std::thread::sleep(std::time::Duration::from_millis(5));

        let sid_b = SessionId::generate();
        index.insert(
            sid_b.clone(),
            Some(User {
                id: UserId::from("b"),
                username: "b".into(),
            }),
        );
        reg.add_member(&room, sid_b.clone());

        let members = reg.members_of(&room, &index);
        assert_eq!(members.len(), 2);
        assert_eq!(members[0].sid, sid_a);
        assert_eq!(members[1].sid, sid_b);
    }

    #[test]
    fn test_evict_inactive_only_when_empty_and_stale() {
        let reg = RoomRegistry::new();
        let room = RoomId::from("1");
        reg.populate(vec![room.clone()]);

        let future = Utc::now() + chrono::Duration::seconds(1);
        assert_eq!(reg.evict_inactive(future), 1);
        assert!(!reg.exists(&room));
    }

    #[test]
    fn test_evict_inactive_skips_occupied_room() {
        let reg = RoomRegistry::new();
        let room = RoomId::from("1");
        reg.populate(vec![room.clone()]);
        reg.add_member(&room, SessionId::generate());

        let future = Utc::now() + chrono::Duration::seconds(1);
        assert_eq!(reg.evict_inactive(future), 0);
        assert!(reg.exists(&room));
    }
}
