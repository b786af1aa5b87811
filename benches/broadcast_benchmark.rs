use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use cybertown::broadcaster::TrackBroadcaster;
use cybertown::id_types::{SessionId, StreamId, TrackId};
use webrtc::rtp::header::Header;
use webrtc::rtp::packet::Packet;
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;

fn opus_capability() -> RTCRtpCodecCapability {
    RTCRtpCodecCapability {
        mime_type: "audio/opus".to_owned(),
        clock_rate: 48000,
        channels: 2,
        ..Default::default()
    }
}

fn sample_packet(seq: u16) -> Packet {
    Packet {
        header: Header {
            sequence_number: seq,
            timestamp: seq as u32 * 960,
            payload_type: 111,
            ssrc: 1,
            ..Default::default()
        },
        payload: vec![0u8; 160].into(),
    }
}

fn bench_write_rtp(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let broadcaster = TrackBroadcaster::new(
        SessionId::from("origin"),
        TrackId::from("t1"),
        StreamId::from("st1"),
        opus_capability(),
    );

    let broadcaster = &broadcaster;
    c.bench_function("broadcaster_write_rtp", |b| {
        b.to_async(&rt).iter_batched(
            || sample_packet(1),
            |mut packet| async move {
                broadcaster.write_rtp(black_box(&mut packet)).await;
            },
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, bench_write_rtp);
criterion_main!(benches);
