use std::sync::Arc;
use tokio::signal;
use tracing::info;

use cybertown::abuse::AbuseList;
use cybertown::ai_provider::EchoAiProvider;
use cybertown::app::AppState;
use cybertown::cache::InMemoryCache;
use cybertown::config;
use cybertown::emoji::EmojiCatalog;
use cybertown::logging;
use cybertown::metrics::register_metrics;
use cybertown::store::InMemoryStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cfg = config::validate_env().unwrap_or_else(|e| {
        eprintln!("Environment validation failed: {}", e);
        std::process::exit(1);
    });

    logging::init(&cfg.rust_log);
    register_metrics();

    // TODO: swap for the Postgres/Redis-backed collaborators once their
    // connection strings are wired through from `cfg`.
    let store: cybertown::store::SharedStore = Arc::new(InMemoryStore::new(cfg.max_rooms_hosted));
    let cache: cybertown::cache::SharedCache = Arc::new(InMemoryCache::new());
    let ai_provider: cybertown::ai_provider::SharedAiProvider = Arc::new(EchoAiProvider);
    let abuse_list = Arc::new(AbuseList::new());
    let emojis = Arc::new(EmojiCatalog::default_catalog());

    let app = AppState::bootstrap(cfg.clone(), store, cache, ai_provider, abuse_list, emojis)
        .await
        .unwrap_or_else(|e| {
            eprintln!("failed to bootstrap application state: {}", e);
            std::process::exit(1);
        });

    cybertown::reaper::spawn(
        app.rooms.clone(),
        cfg.room_inactivity_threshold,
        std::time::Duration::from_secs(60),
    );

    let routes = cybertown::server::routes(app.clone());

    let addr: std::net::SocketAddr = format!("0.0.0.0:{}", cfg.port).parse()?;
    info!(%addr, "cybertown server starting");

    let (_, server) = warp::serve(routes).bind_with_graceful_shutdown(addr, async {
        signal::ctrl_c()
            .await
            .expect("failed to install CTRL+C signal handler");
        info!("received shutdown signal");
    });

    server.await;
    info!("server shut down");
    Ok(())
}
