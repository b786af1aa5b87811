use serde::Deserialize;
use serde_json::json;
use tracing::warn;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;

use crate::app::AppState;
use crate::envelope::{names, Envelope};
use crate::id_types::{RoomId, SessionId};
use crate::peer_session::PeerSession;

#[derive(Debug, Deserialize)]
pub struct PeerIceCandidatePayload {
    pub room_id: RoomId,
    pub candidate: String,
}

#[derive(Debug, Deserialize)]
pub struct PeerOfferPayload {
    pub room_id: RoomId,
    pub offer: RTCSessionDescription,
}

#[derive(Debug, Deserialize)]
pub struct PeerAnswerPayload {
    pub room_id: RoomId,
    pub answer: RTCSessionDescription,
}

#[derive(Debug, Deserialize)]
pub struct PeerMutePayload {
    pub room_id: RoomId,
    pub muted: bool,
}

impl AppState {
    fn peer(&self, room_id: &RoomId, sid: &SessionId) -> Option<std::sync::Arc<PeerSession>> {
        self.peers.get(&(room_id.clone(), sid.clone())).map(|e| e.value().clone())
    }

    /// Establishes this connection's SFU leg and starts the offer/answer
    /// exchange. Called from `on_join_room` once room membership is granted.
    pub async fn establish_peer_session(&self, sid: &SessionId, room_id: &RoomId) -> anyhow::Result<()> {
        let connection = match self.connections.get(sid) {
            Some(c) => c,
            None => return Ok(()),
        };
        let session = PeerSession::new(
            &self.webrtc_api,
            &self.config.stun_url,
            room_id.clone(),
            sid.clone(),
            connection.clone(),
            self.peers.clone(),
        )
        .await?;

        crate::track_handler::register_track_handler(
            &session,
            self.rooms.clone(),
            self.connections.clone(),
            self.participants.clone(),
            self.peers.clone(),
        );

        for track in self.rooms.tracks_of(room_id) {
            if let Err(e) = session.attach_track(track.local_track.clone()).await {
                warn!(session = %sid, track = %track.track_id, error = %e, "failed to attach existing track");
            }
        }

        self.peers.insert((room_id.clone(), sid.clone()), session.clone());
        session.make_offer(&connection).await?;
        Ok(())
    }

    pub async fn on_peer_ice_candidate(
        &self,
        sid: &SessionId,
        payload: PeerIceCandidatePayload,
    ) -> anyhow::Result<()> {
        if let Some(peer) = self.peer(&payload.room_id, sid) {
            if let Err(e) = peer.handle_ice_candidate(&payload.candidate).await {
                warn!(session = %sid, error = %e, "failed to add ICE candidate");
            }
        }
        Ok(())
    }

    pub async fn on_peer_offer(&self, sid: &SessionId, payload: PeerOfferPayload) -> anyhow::Result<()> {
        let connection = match self.connections.get(sid) {
            Some(c) => c,
            None => return Ok(()),
        };
        if let Some(peer) = self.peer(&payload.room_id, sid) {
            if let Err(e) = peer.handle_offer(payload.offer, &connection).await {
                warn!(session = %sid, error = %e, "failed to handle client offer");
            }
        }
        Ok(())
    }

    pub async fn on_peer_answer(&self, sid: &SessionId, payload: PeerAnswerPayload) -> anyhow::Result<()> {
        if let Some(peer) = self.peer(&payload.room_id, sid) {
            if let Err(e) = peer.handle_answer(payload.answer).await {
                warn!(session = %sid, error = %e, "failed to set remote answer");
            }
        }
        Ok(())
    }

    pub async fn on_peer_mute(&self, sid: &SessionId, payload: PeerMutePayload) -> anyhow::Result<()> {
        if !self.rooms.is_in_room(&payload.room_id, sid) {
            return Ok(());
        }
        if let Ok(envelope) = Envelope::new(
            names::PEER_MUTE_BROADCAST,
            &json!({ "roomID": payload.room_id, "sid": sid, "muted": payload.muted }),
        ) {
            if let Ok(message) = envelope.to_message() {
                for participant in self.rooms.members_of(&payload.room_id, &self.participants) {
                    if let Some(handle) = self.connections.get(&participant.sid) {
                        handle.send(message.clone()).await;
                    }
                }
            }
        }
        Ok(())
    }
}
