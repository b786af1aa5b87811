use std::fmt;
use std::sync::Arc;

use uuid::Uuid;

macro_rules! strong_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub Arc<String>);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                $name(Arc::new(s))
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                $name(Arc::new(s.to_string()))
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                serializer.serialize_str(&self.0)
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let s = String::deserialize(deserializer)?;
                Ok($name(Arc::new(s)))
            }
        }
    };
}

strong_id!(RoomId, "Strongly typed identifier for a Room.");
strong_id!(UserId, "Strongly typed identifier for a durable User account.");
strong_id!(StreamId, "Strongly typed identifier for a media stream.");
strong_id!(TrackId, "Strongly typed identifier for a media track.");

/// Identifies one live `Participant` (a connection joined to a room). Distinct
/// from `UserId`: the same user may hold several sessions at once.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
pub struct SessionId(pub Arc<String>);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        SessionId(Arc::new(s))
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        SessionId(Arc::new(s.to_string()))
    }
}

impl AsRef<str> for SessionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl SessionId {
    /// Mints a new short random token for a freshly joined participant.
    pub fn generate() -> Self {
        SessionId(Arc::new(short_token()))
    }
}

/// Identifier for a chat message. `RoomMsg`/`PrivateRoomMsg` mint one
/// in-process; DM messages take whatever id the store assigns on persist.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct MessageId(pub Arc<String>);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for MessageId {
    fn from(s: String) -> Self {
        MessageId(Arc::new(s))
    }
}

impl From<&str> for MessageId {
    fn from(s: &str) -> Self {
        MessageId(Arc::new(s.to_string()))
    }
}

impl AsRef<str> for MessageId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl MessageId {
    pub fn generate() -> Self {
        MessageId(Arc::new(short_token()))
    }
}

/// Short id in the shape of the original server's `shortuuid.New()` tokens:
/// ten base36 characters sliced off a v4 UUID's simple (no-hyphen) form.
fn short_token() -> String {
    Uuid::new_v4().simple().to_string()[..10].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_id_conversion() {
        let id_str = "room-123";
        let id: RoomId = RoomId::from(id_str);
        assert_eq!(id.as_ref(), id_str);

        let id_string = String::from("room-456");
        let id2: RoomId = RoomId::from(id_string.clone());
        assert_eq!(id2.as_ref(), "room-456");
    }

    #[test]
    fn test_user_id_conversion() {
        let id = UserId::from("user-1");
        assert_eq!(id.to_string(), "user-1");
    }

    #[test]
    fn test_stream_id_conversion() {
        let id = StreamId::from("stream-1");
        assert_eq!(id.as_ref(), "stream-1");
    }

    #[test]
    fn test_track_id_conversion() {
        let id = TrackId::from("track-1");
        assert_eq!(id.as_ref(), "track-1");
    }

    #[test]
    fn test_display_trait() {
        let id = RoomId::from("room-string");
        assert_eq!(format!("{}", id), "room-string");
    }

    #[test]
    fn test_session_id_is_short_and_unique() {
        let a = SessionId::generate();
        let b = SessionId::generate();
        assert_eq!(a.as_ref().len(), 10);
        assert_ne!(a, b);
    }

    #[test]
    fn test_message_id_generate_unique() {
        let a = MessageId::generate();
        let b = MessageId::generate();
        assert_ne!(a, b);
    }
}
