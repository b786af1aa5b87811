use std::sync::Arc;

use serde_json::json;
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use webrtc::api::API;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;

use crate::connection::ConnectionHandle;
use crate::envelope::{names, Envelope};
use crate::id_types::{RoomId, SessionId};
use crate::media_setup::MediaSetup;
use crate::types::PeerMap;

/// Negotiation state machine for one peer's SDP offer/answer exchange (§4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationState {
    Stable,
    HaveLocalOffer,
    HaveRemoteOffer,
}

/// One member's WebRTC leg within a room. The server always plays the
/// answering DTLS role; renegotiation is server-initiated whenever a new
/// track is attached to this peer.
pub struct PeerSession {
    pub room_id: RoomId,
    pub sid: SessionId,
    pub pc: Arc<RTCPeerConnection>,
    negotiation_state: Mutex<NegotiationState>,
    pub signaling_lock: Arc<Mutex<()>>,
}

impl PeerSession {
    pub async fn new(
        api: &API,
        stun_url: &str,
        room_id: RoomId,
        sid: SessionId,
        connection: Arc<ConnectionHandle>,
        peers: PeerMap,
    ) -> anyhow::Result<Arc<PeerSession>> {
        let config = MediaSetup::rtc_configuration(stun_url);
        let pc = Arc::new(api.new_peer_connection(config).await?);
        MediaSetup::add_recvonly_audio_transceiver(&pc).await?;

        let session = Arc::new(PeerSession {
            room_id,
            sid,
            pc: pc.clone(),
            negotiation_state: Mutex::new(NegotiationState::Stable),
            signaling_lock: Arc::new(Mutex::new(())),
        });

        session.register_ice_candidate_handler(connection.clone());
        session.register_connection_state_handler(peers);

        Ok(session)
    }

    fn register_ice_candidate_handler(self: &Arc<Self>, connection: Arc<ConnectionHandle>) {
        let room_id = self.room_id.clone();
        self.pc
            .on_ice_candidate(Box::new(move |candidate: Option<RTCIceCandidate>| {
                let connection = connection.clone();
                let room_id = room_id.clone();
                Box::pin(async move {
                    let candidate = match candidate {
                        Some(c) => c,
                        None => return,
                    };
                    let candidate_json = match candidate.to_json() {
                        Ok(c) => c,
                        Err(e) => {
                            warn!(error = %e, "failed to serialize ICE candidate");
                            return;
                        }
                    };
                    if let Ok(envelope) = Envelope::new(
                        names::PEER_ICE_CANDIDATE,
                        &json!({ "roomID": room_id, "candidate": candidate_json }),
                    ) {
                        if let Ok(message) = envelope.to_message() {
                            connection.send(message).await;
                        }
                    }
                })
            }));
    }

    fn register_connection_state_handler(self: &Arc<Self>, peers: PeerMap) {
        let session = self.clone();
        let key = (self.room_id.clone(), self.sid.clone());
        self.pc
            .on_peer_connection_state_change(Box::new(move |state: RTCPeerConnectionState| {
                let session = session.clone();
                let peers = peers.clone();
                let key = key.clone();
                Box::pin(async move {
                    match state {
                        RTCPeerConnectionState::Failed => {
                            warn!(session = %session.sid, "peer connection failed, closing");
                            session.close().await;
                            peers.remove(&key);
                        }
                        other => {
                            info!(session = %session.sid, state = ?other, "peer connection state changed");
                        }
                    }
                })
            }));
    }

    /// Server-initiated offer, sent on join and whenever a new track is
    /// attached to this peer (renegotiation).
    pub async fn make_offer(&self, connection: &ConnectionHandle) -> anyhow::Result<()> {
        let _guard = self.signaling_lock.lock().await;
        let offer = self.pc.create_offer(None).await?;
        self.pc.set_local_description(offer.clone()).await?;
        *self.negotiation_state.lock().await = NegotiationState::HaveLocalOffer;

        let envelope = Envelope::new(
            names::PEER_OFFER,
            &json!({ "roomID": self.room_id, "offer": offer }),
        )?;
        connection.send(envelope.to_message()?).await;
        Ok(())
    }

    /// Client answer to a server-initiated offer.
    pub async fn handle_answer(&self, answer: RTCSessionDescription) -> anyhow::Result<()> {
        self.pc.set_remote_description(answer).await?;
        *self.negotiation_state.lock().await = NegotiationState::Stable;
        Ok(())
    }

    /// Client-initiated offer: set remote, answer, set local, reply.
    pub async fn handle_offer(
        &self,
        offer: RTCSessionDescription,
        connection: &ConnectionHandle,
    ) -> anyhow::Result<()> {
        let _guard = self.signaling_lock.lock().await;
        *self.negotiation_state.lock().await = NegotiationState::HaveRemoteOffer;
        self.pc.set_remote_description(offer).await?;
        let answer = self.pc.create_answer(None).await?;
        self.pc.set_local_description(answer.clone()).await?;
        *self.negotiation_state.lock().await = NegotiationState::Stable;

        let envelope = Envelope::new(
            names::PEER_ANSWER,
            &json!({ "roomID": self.room_id, "answer": answer }),
        )?;
        connection.send(envelope.to_message()?).await;
        Ok(())
    }

    /// Adds a republished track to this peer so its audio is forwarded to
    /// the member; triggers renegotiation via the caller's `make_offer`.
    pub async fn attach_track(
        &self,
        local_track: Arc<webrtc::track::track_local::track_local_static_rtp::TrackLocalStaticRTP>,
    ) -> anyhow::Result<()> {
        self.pc
            .add_track(local_track as Arc<dyn webrtc::track::track_local::TrackLocal + Send + Sync>)
            .await?;
        Ok(())
    }

    pub async fn handle_ice_candidate(&self, candidate_json: &str) -> anyhow::Result<()> {
        let init: RTCIceCandidateInit = serde_json::from_str(candidate_json)?;
        self.pc.add_ice_candidate(init).await?;
        Ok(())
    }

    pub async fn close(&self) {
        if let Err(e) = self.pc.close().await {
            error!(session = %self.sid, error = %e, "failed to close peer connection");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::ConnectionRegistry;
    use crate::participant::ParticipantIndex;

    #[tokio::test]
    async fn test_peer_session_construction_adds_audio_transceiver() {
        let api = MediaSetup::create_webrtc_api().unwrap();
        let registry = ConnectionRegistry::new();
        let participants = ParticipantIndex::new();
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        let (sid, _) = registry.accept(tx, None, &participants);
        let connection = registry.get(&sid).unwrap();

        let peers: PeerMap = Arc::new(dashmap::DashMap::new());
        let session = PeerSession::new(
            &api,
            "stun:stun.l.google.com:19302",
            RoomId::from("1"),
            sid,
            connection,
            peers,
        )
        .await
        .unwrap();
        assert_eq!(session.room_id, RoomId::from("1"));
        let transceivers = session.pc.get_transceivers().await;
        assert_eq!(transceivers.len(), 1);
    }
}
