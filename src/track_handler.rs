use std::sync::Arc;

use tracing::{info, warn};
use webrtc::rtp_transceiver::rtp_receiver::RTCRtpReceiver;
use webrtc::track::track_remote::TrackRemote;

use crate::connection::SharedConnectionRegistry;
use crate::envelope::{names, Envelope};
use crate::id_types::{RoomId, SessionId, StreamId, TrackId};
use crate::participant::SharedParticipantIndex;
use crate::peer_session::PeerSession;
use crate::room::{RoomTrack, SharedRoomRegistry};
use crate::types::PeerMap;

/// Settle delay before a freshly ingested remote track is republished, so
/// the client has had time to populate its own track/stream ids (§4.6).
const TRACK_SETTLE_DELAY: std::time::Duration = std::time::Duration::from_secs(2);

/// Registers the on-track callback for a peer's remote audio leg. The
/// callback itself only spawns the ingest task; all forwarding happens in
/// `ingest_remote_track`.
pub fn register_track_handler(
    session: &Arc<PeerSession>,
    rooms: SharedRoomRegistry,
    connections: SharedConnectionRegistry,
    participants: SharedParticipantIndex,
    peers: PeerMap,
) {
    let room_id = session.room_id.clone();
    let origin = session.sid.clone();

    session.pc.on_track(Box::new(
        move |track: Arc<TrackRemote>, _receiver: Arc<RTCRtpReceiver>, _transceiver| {
            let room_id = room_id.clone();
            let origin = origin.clone();
            let rooms = rooms.clone();
            let connections = connections.clone();
            let participants = participants.clone();
            let peers = peers.clone();
            Box::pin(async move {
                tokio::spawn(ingest_remote_track(
                    track,
                    room_id,
                    origin,
                    rooms,
                    connections,
                    participants,
                    peers,
                ));
            })
        },
    ));
}

async fn ingest_remote_track(
    remote_track: Arc<TrackRemote>,
    room_id: RoomId,
    origin: SessionId,
    rooms: SharedRoomRegistry,
    connections: SharedConnectionRegistry,
    participants: SharedParticipantIndex,
    peers: PeerMap,
) {
    tokio::time::sleep(TRACK_SETTLE_DELAY).await;

    let track_id = TrackId::from(remote_track.id());
    let stream_id = StreamId::from(remote_track.stream_id());
    let broadcaster = Arc::new(crate::broadcaster::TrackBroadcaster::new(
        origin.clone(),
        track_id.clone(),
        stream_id.clone(),
        remote_track.codec().capability,
    ));

    rooms.add_track(
        &room_id,
        RoomTrack {
            origin: origin.clone(),
            track_id: track_id.clone(),
            stream_id: stream_id.clone(),
            local_track: broadcaster.local_track.clone(),
        },
    );

    broadcast_peer_streams(&room_id, &origin, &stream_id, &connections, &rooms, &participants).await;
    attach_to_other_peers(&room_id, &origin, &broadcaster, &peers, &connections).await;

    let mut buf = vec![0u8; 1500];
    loop {
        match remote_track.read(&mut buf).await {
            Ok((mut packet, _)) => {
                broadcaster.write_rtp(&mut packet).await;
            }
            Err(e) => {
                info!(room = %room_id, track = %track_id, error = %e, "remote track read loop ended");
                break;
            }
        }
    }

    rooms.remove_track(&room_id, &track_id);
}

async fn broadcast_peer_streams(
    room_id: &RoomId,
    origin: &SessionId,
    stream_id: &StreamId,
    connections: &SharedConnectionRegistry,
    rooms: &SharedRoomRegistry,
    participants: &SharedParticipantIndex,
) {
    let mut streams = std::collections::HashMap::new();
    streams.insert(origin.to_string(), stream_id.to_string());
    let envelope = match Envelope::new(
        names::PEER_STREAMS,
        &serde_json::json!({ "roomID": room_id, "streams": streams }),
    ) {
        Ok(e) => e,
        Err(e) => {
            warn!(error = %e, "failed to encode PEER_STREAMS");
            return;
        }
    };
    let message = match envelope.to_message() {
        Ok(m) => m,
        Err(_) => return,
    };
    for participant in rooms.members_of(room_id, participants) {
        if let Some(handle) = connections.get(&participant.sid) {
            handle.send(message.clone()).await;
        }
    }
}

async fn attach_to_other_peers(
    room_id: &RoomId,
    origin: &SessionId,
    broadcaster: &Arc<crate::broadcaster::TrackBroadcaster>,
    peers: &PeerMap,
    connections: &SharedConnectionRegistry,
) {
    for entry in peers.iter() {
        let (room_key, peer_sid) = entry.key().clone();
        if &room_key != room_id || &peer_sid == origin {
            continue;
        }
        let peer = entry.value().clone();
        if let Err(e) = peer.attach_track(broadcaster.local_track.clone()).await {
            warn!(session = %peer_sid, error = %e, "failed to attach new track to peer");
            continue;
        }
        if let Some(connection) = connections.get(&peer_sid) {
            if let Err(e) = peer.make_offer(&connection).await {
                warn!(session = %peer_sid, error = %e, "failed to renegotiate after track added");
            }
        }
    }
}
