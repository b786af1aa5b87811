use chrono::Utc;
use tracing::info;

use crate::metrics;
use crate::room::SharedRoomRegistry;

/// Background loop evicting empty, stale rooms from the in-memory registry
/// (§4.8). The store's own CRUD data is assumed purged by an external job;
/// this loop only trims the server's live view.
pub fn spawn(rooms: SharedRoomRegistry, threshold: std::time::Duration, scan_interval: std::time::Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(scan_interval);
        loop {
            ticker.tick().await;
            let cutoff = Utc::now() - chrono::Duration::from_std(threshold).unwrap_or(chrono::Duration::zero());
            let evicted = rooms.evict_inactive(cutoff);
            if evicted > 0 {
                metrics::REAPER_EVICTIONS_TOTAL.inc_by(evicted as u64);
                info!(count = evicted, "reaper evicted idle rooms");
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id_types::RoomId;
    use crate::room::RoomRegistry;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_spawn_evicts_stale_room() {
        let rooms = Arc::new(RoomRegistry::new());
        rooms.populate(vec![RoomId::from("1")]);

        spawn(
            rooms.clone(),
            std::time::Duration::from_millis(1),
            std::time::Duration::from_millis(10),
        );

        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        assert!(!rooms.exists(&RoomId::from("1")));
    }
}
