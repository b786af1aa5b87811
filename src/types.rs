use crate::id_types::{RoomId, SessionId};
use crate::peer_session::PeerSession;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use warp::ws::Message;

/// Key identifying one SFU peer session within a room: `(RoomId, SessionId)`.
pub type SessionKey = (RoomId, SessionId);

/// Outbound half of a connection's write channel. Sends are serialized
/// through the `SharedOutbound` wrapper rather than by locking this type
/// directly, since an `UnboundedSender` clone is itself cheap and `Send`.
pub type OutboundSender = tokio::sync::mpsc::UnboundedSender<Message>;

/// Mutable, closeable handle to a connection's outbound channel. Set to
/// `None` once the connection's write task has torn down, so a late event
/// destined for a dead connection is dropped instead of panicking.
pub type SharedOutbound = Arc<Mutex<Option<OutboundSender>>>;

/// Concurrent map of active SFU peer sessions, keyed by `SessionKey`.
pub type PeerMap = Arc<DashMap<SessionKey, Arc<PeerSession>>>;

/// Capacity of the AI reply request queue. Fixed per the dispatch design: a
/// burst of AI-directed messages drops the overflow rather than blocking
/// the event dispatcher.
pub const AI_QUEUE_CAPACITY: usize = 1000;
