use lazy_static::lazy_static;
use prometheus::{
    register_int_counter, register_int_counter_vec, register_int_gauge, IntCounter, IntCounterVec,
    IntGauge,
};

lazy_static! {
    pub static ref ACTIVE_ROOMS: IntGauge =
        register_int_gauge!("cybertown_active_rooms", "Number of currently active rooms").unwrap();
    pub static ref ACTIVE_PARTICIPANTS: IntGauge = register_int_gauge!(
        "cybertown_active_participants",
        "Number of currently connected participants"
    )
    .unwrap();
    pub static ref MESSAGES_RELAYED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "cybertown_messages_relayed_total",
        "Total number of chat messages relayed, by kind",
        &["kind"] // "room", "private_room", "dm"
    )
    .unwrap();
    pub static ref AI_REQUESTS_QUEUED_TOTAL: IntCounter = register_int_counter!(
        "cybertown_ai_requests_queued_total",
        "Total number of AI reply requests accepted onto the queue"
    )
    .unwrap();
    pub static ref AI_REQUESTS_DROPPED_TOTAL: IntCounter = register_int_counter!(
        "cybertown_ai_requests_dropped_total",
        "Total number of AI reply requests dropped because the queue was full"
    )
    .unwrap();
    pub static ref AI_REQUESTS_COMPLETED_TOTAL: IntCounter = register_int_counter!(
        "cybertown_ai_requests_completed_total",
        "Total number of AI reply requests that produced a reply"
    )
    .unwrap();
    pub static ref KICKS_ISSUED_TOTAL: IntCounter = register_int_counter!(
        "cybertown_kicks_issued_total",
        "Total number of participants kicked from a room"
    )
    .unwrap();
    pub static ref REAPER_EVICTIONS_TOTAL: IntCounter = register_int_counter!(
        "cybertown_reaper_evictions_total",
        "Total number of rooms evicted by the inactivity reaper"
    )
    .unwrap();
    pub static ref PACKETS_FORWARDED_TOTAL: IntCounter = register_int_counter!(
        "cybertown_audio_packets_forwarded_total",
        "Total number of RTP audio packets forwarded by the SFU"
    )
    .unwrap();
    pub static ref WEBRTC_CONNECTIONS_TOTAL: IntCounter = register_int_counter!(
        "cybertown_webrtc_connections_total",
        "Total number of WebRTC peer connections established"
    )
    .unwrap();
}

pub fn register_metrics() {
    // Force initialization of lazy_statics.
    let _ = ACTIVE_ROOMS.get();
    let _ = ACTIVE_PARTICIPANTS.get();
    let _ = MESSAGES_RELAYED_TOTAL.with_label_values(&["room"]).get();
    let _ = AI_REQUESTS_QUEUED_TOTAL.get();
    let _ = AI_REQUESTS_DROPPED_TOTAL.get();
    let _ = AI_REQUESTS_COMPLETED_TOTAL.get();
    let _ = KICKS_ISSUED_TOTAL.get();
    let _ = REAPER_EVICTIONS_TOTAL.get();
    let _ = PACKETS_FORWARDED_TOTAL.get();
    let _ = WEBRTC_CONNECTIONS_TOTAL.get();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_initialization() {
        register_metrics();
        ACTIVE_ROOMS.inc();
        assert_eq!(ACTIVE_ROOMS.get(), 1);
    }
}
