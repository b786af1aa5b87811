use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::APIBuilder;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::policy::bundle_policy::RTCBundlePolicy;
use webrtc::rtp_transceiver::rtp_codec::{RTCRtpCodecCapability, RTCRtpCodecParameters, RTPCodecType};
use webrtc::rtp_transceiver::rtp_transceiver_direction::RTCRtpTransceiverDirection;
use webrtc::rtp_transceiver::RTCRtpTransceiverInit;

pub struct MediaSetup;

impl MediaSetup {
    /// Builds the WebRTC API, registering Opus as the only codec. There is
    /// no video path in this server (Design note 6).
    pub fn create_webrtc_api() -> anyhow::Result<webrtc::api::API> {
        let mut media_engine = MediaEngine::default();

        media_engine
            .register_codec(
                RTCRtpCodecParameters {
                    capability: RTCRtpCodecCapability {
                        mime_type: "audio/opus".to_owned(),
                        clock_rate: 48000,
                        channels: 2,
                        sdp_fmtp_line: "minptime=10;useinbandfec=1".to_owned(),
                        ..Default::default()
                    },
                    payload_type: 111,
                    ..Default::default()
                },
                RTPCodecType::Audio,
            )
            .map_err(|e| anyhow::anyhow!("failed to register Opus codec: {e}"))?;

        let mut registry = Registry::new();
        registry = register_default_interceptors(registry, &mut media_engine)
            .map_err(|e| anyhow::anyhow!("failed to register interceptors: {e}"))?;

        Ok(APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build())
    }

    pub fn rtc_configuration(stun_url: &str) -> RTCConfiguration {
        RTCConfiguration {
            ice_servers: vec![RTCIceServer {
                urls: vec![stun_url.to_string()],
                ..Default::default()
            }],
            bundle_policy: RTCBundlePolicy::MaxBundle,
            ..Default::default()
        }
    }

    /// Adds the single receive-only audio transceiver every `PeerSession`
    /// advertises at construction (§4.6).
    pub async fn add_recvonly_audio_transceiver(
        pc: &webrtc::peer_connection::RTCPeerConnection,
    ) -> anyhow::Result<()> {
        pc.add_transceiver_from_kind(
            RTPCodecType::Audio,
            Some(RTCRtpTransceiverInit {
                direction: RTCRtpTransceiverDirection::Recvonly,
                send_encodings: vec![],
            }),
        )
        .await
        .map_err(|e| anyhow::anyhow!("failed to add audio transceiver: {e}"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_webrtc_api_succeeds() {
        assert!(MediaSetup::create_webrtc_api().is_ok());
    }

    #[test]
    fn test_rtc_configuration_uses_given_stun_url() {
        let config = MediaSetup::rtc_configuration("stun:example.org:3478");
        assert_eq!(config.ice_servers[0].urls, vec!["stun:example.org:3478".to_string()]);
    }
}
