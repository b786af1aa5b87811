use std::sync::Arc;

use crate::abuse::SharedAbuseList;
use crate::ai::SharedAiPipeline;
use crate::ai_provider::SharedAiProvider;
use crate::cache::SharedCache;
use crate::config::Config;
use crate::connection::SharedConnectionRegistry;
use crate::emoji::SharedEmojiCatalog;
use crate::id_types::RoomId;
use crate::participant::{SharedParticipantIndex, User};
use crate::room::SharedRoomRegistry;
use crate::store::SharedStore;
use crate::types::PeerMap;

/// Top-level process state, the direct analogue of the original server's
/// `socketServer` struct (`conns`, `participants`, `users`, `rooms`,
/// `aiMsgRequest`, `bot`, `emojis`, `webrtcAPI`).
pub struct AppState {
    pub config: Config,
    pub connections: SharedConnectionRegistry,
    pub participants: SharedParticipantIndex,
    pub rooms: SharedRoomRegistry,
    pub peers: PeerMap,
    pub store: SharedStore,
    pub cache: SharedCache,
    pub ai_provider: SharedAiProvider,
    pub abuse_list: SharedAbuseList,
    pub emojis: SharedEmojiCatalog,
    pub bot: User,
    pub ai: SharedAiPipeline,
    pub webrtc_api: Arc<webrtc::api::API>,
}

impl AppState {
    /// Loads rooms and the bot user from the store, matching `main.go`'s
    /// boot sequence: bot lookup failure is fatal, `populateRooms` seeds
    /// the in-memory registry from persisted room ids.
    pub async fn bootstrap(
        config: Config,
        store: SharedStore,
        cache: SharedCache,
        ai_provider: SharedAiProvider,
        abuse_list: SharedAbuseList,
        emojis: SharedEmojiCatalog,
    ) -> anyhow::Result<Arc<AppState>> {
        let bot = store
            .get_user_by_name("Cybertown Bot")
            .await
            .map_err(|e| anyhow::anyhow!("failed to load bot user: {e}"))?;

        let rooms = Arc::new(crate::room::RoomRegistry::new());
        let room_infos = store.get_rooms().await?;
        rooms.populate(room_infos.into_iter().map(|r| r.id));

        let connections = Arc::new(crate::connection::ConnectionRegistry::new());
        let participants = Arc::new(crate::participant::ParticipantIndex::new());

        let ai = Arc::new(crate::ai::AiPipeline::spawn(
            bot.clone(),
            ai_provider.clone(),
            cache.clone(),
            connections.clone(),
            participants.clone(),
            rooms.clone(),
        ));

        let webrtc_api = Arc::new(crate::media_setup::MediaSetup::create_webrtc_api()?);

        Ok(Arc::new(AppState {
            config,
            connections,
            participants,
            rooms,
            peers: Arc::new(dashmap::DashMap::new()),
            store,
            cache,
            ai_provider,
            abuse_list,
            emojis,
            bot,
            ai,
            webrtc_api,
        }))
    }

    pub fn room_exists(&self, room_id: &RoomId) -> bool {
        self.rooms.exists(room_id)
    }
}
