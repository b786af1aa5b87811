use std::sync::Arc;

use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::track::track_local::track_local_static_rtp::TrackLocalStaticRTP;
use webrtc::track::track_local::TrackLocalWriter;

use crate::id_types::{SessionId, StreamId, TrackId};

/// Fans one publisher's RTP stream out to every room member subscribed to
/// it. `TrackLocalStaticRTP` already multiplexes writes to every peer
/// connection it has been added to, so the broadcaster only needs to own
/// the one local track and forward packets into it; there is no per-writer
/// bookkeeping or keyframe/PLI concept in an audio-only SFU.
pub struct TrackBroadcaster {
    pub origin: SessionId,
    pub track_id: TrackId,
    pub stream_id: StreamId,
    pub capability: RTCRtpCodecCapability,
    pub local_track: Arc<TrackLocalStaticRTP>,
}

impl TrackBroadcaster {
    pub fn new(
        origin: SessionId,
        track_id: TrackId,
        stream_id: StreamId,
        capability: RTCRtpCodecCapability,
    ) -> Self {
        let local_track = Arc::new(TrackLocalStaticRTP::new(
            capability.clone(),
            track_id.to_string(),
            stream_id.to_string(),
        ));
        TrackBroadcaster {
            origin,
            track_id,
            stream_id,
            capability,
            local_track,
        }
    }

    /// Writes one forwarded RTP packet, stripping header extensions the
    /// receiving client did not negotiate.
    pub async fn write_rtp(&self, packet: &mut webrtc::rtp::packet::Packet) {
        packet.header.extension = false;
        packet.header.extensions.clear();
        if self.local_track.write_rtp(packet).await.is_ok() {
            crate::metrics::PACKETS_FORWARDED_TOTAL.inc();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use webrtc::track::track_local::TrackLocal;

    fn capability() -> RTCRtpCodecCapability {
        RTCRtpCodecCapability {
            mime_type: "audio/opus".to_owned(),
            clock_rate: 48000,
            channels: 2,
            ..Default::default()
        }
    }

    #[test]
    fn test_new_broadcaster_builds_local_track() {
        let broadcaster = TrackBroadcaster::new(
            SessionId::from("s1"),
            TrackId::from("t1"),
            StreamId::from("st1"),
            capability(),
        );
        assert_eq!(broadcaster.local_track.id(), "t1");
        assert_eq!(broadcaster.local_track.stream_id(), "st1");
    }
}
