use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Wire-level `{name, data}` object carried on every WebSocket text frame,
/// in both directions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub name: String,
    #[serde(default)]
    pub data: Value,
}

impl Envelope {
    pub fn new<T: Serialize>(name: &str, data: &T) -> anyhow::Result<Self> {
        Ok(Envelope {
            name: name.to_string(),
            data: serde_json::to_value(data)?,
        })
    }

    /// Re-serializes `data` to bytes and parses it into a typed payload, the
    /// same round trip the dispatcher performs per handler so a malformed
    /// payload only fails the one event, not the whole connection.
    pub fn decode<T: for<'de> Deserialize<'de>>(&self) -> Result<T, serde_json::Error> {
        let bytes = serde_json::to_vec(&self.data)?;
        serde_json::from_slice(&bytes)
    }

    pub fn to_message(&self) -> anyhow::Result<warp::ws::Message> {
        Ok(warp::ws::Message::text(serde_json::to_string(self)?))
    }
}

/// Inbound event names recognized by the dispatcher (§4.4 table). Unknown
/// names are logged and dropped rather than rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    JoinRoom,
    NewMessage,
    EditMessage,
    DeleteMessage,
    ReactionToMessage,
    ClearChat,
    AssignRole,
    UpdateWelcomeMessage,
    SetStatus,
    KickParticipant,
    PeerIceCandidate,
    PeerOffer,
    PeerAnswer,
    PeerMute,
}

impl EventKind {
    pub fn from_name(name: &str) -> Option<Self> {
        use EventKind::*;
        Some(match name {
            "JOIN_ROOM" => JoinRoom,
            "NEW_MESSAGE" => NewMessage,
            "EDIT_MESSAGE" => EditMessage,
            "DELETE_MESSAGE" => DeleteMessage,
            "REACTION_TO_MESSAGE" => ReactionToMessage,
            "CLEAR_CHAT" => ClearChat,
            "ASSIGN_ROLE" => AssignRole,
            "UPDATE_WELCOME_MESSAGE" => UpdateWelcomeMessage,
            "SET_STATUS" => SetStatus,
            "KICK_PARTICIPANT" => KickParticipant,
            "PEER_ICE_CANDIDATE" => PeerIceCandidate,
            "PEER_OFFER" => PeerOffer,
            "PEER_ANSWER" => PeerAnswer,
            "PEER_MUTE" => PeerMute,
            _ => return None,
        })
    }

    /// Every kind except none of them is read-only; all mutate state and are
    /// therefore gated on authentication (§3 invariant 7).
    pub fn requires_auth(self) -> bool {
        true
    }
}

pub mod names {
    pub const JOINED_ROOM_BROADCAST: &str = "JOINED_ROOM_BROADCAST";
    pub const LEFT_ROOM_BROADCAST: &str = "LEFT_ROOM_BROADCAST";
    pub const PEER_STREAMS: &str = "PEER_STREAMS";
    pub const NEW_MESSAGE_BROADCAST: &str = "NEW_MESSAGE_BROADCAST";
    pub const EDIT_MESSAGE_BROADCAST: &str = "EDIT_MESSAGE_BROADCAST";
    pub const DELETE_MESSAGE_BROADCAST: &str = "DELETE_MESSAGE_BROADCAST";
    pub const REACTION_TO_MESSAGE_BROADCAST: &str = "REACTION_TO_MESSAGE_BROADCAST";
    pub const CLEAR_CHAT_BROADCAST: &str = "CLEAR_CHAT_BROADCAST";
    pub const ASSIGN_ROLE_BROADCAST: &str = "ASSIGN_ROLE_BROADCAST";
    pub const UPDATE_WELCOME_MESSAGE_BROADCAST: &str = "UPDATE_WELCOME_MESSAGE_BROADCAST";
    pub const SET_STATUS_BROADCAST: &str = "SET_STATUS_BROADCAST";
    pub const KICK_PARTICIPANT_BROADCAST: &str = "KICK_PARTICIPANT_BROADCAST";
    pub const PEER_MUTE_BROADCAST: &str = "PEER_MUTE_BROADCAST";
    pub const PEER_ICE_CANDIDATE: &str = "PEER_ICE_CANDIDATE";
    pub const PEER_OFFER: &str = "PEER_OFFER";
    pub const PEER_ANSWER: &str = "PEER_ANSWER";
    pub const ERROR_BROADCAST: &str = "ERROR_BROADCAST";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_name_known() {
        assert_eq!(EventKind::from_name("JOIN_ROOM"), Some(EventKind::JoinRoom));
        assert_eq!(
            EventKind::from_name("KICK_PARTICIPANT"),
            Some(EventKind::KickParticipant)
        );
    }

    #[test]
    fn test_from_name_unknown() {
        assert_eq!(EventKind::from_name("WAT"), None);
    }

    #[test]
    fn test_decode_round_trip() {
        #[derive(Serialize, Deserialize, PartialEq, Debug)]
        struct Payload {
            room_id: String,
        }
        let env = Envelope::new(
            "JOIN_ROOM",
            &Payload {
                room_id: "7".to_string(),
            },
        )
        .unwrap();
        let decoded: Payload = env.decode().unwrap();
        assert_eq!(decoded.room_id, "7");
    }
}
