//! bot-state-cache server.
//!
//! Serves the namespaced cache and conversation dispatch over HTTP, backed
//! by the in-process store.

use std::sync::Arc;
use std::time::Instant;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;

use bot_state_cache::cache::field_store::ScopedCache;
use bot_state_cache::cache::ttl::CacheSettings;
use bot_state_cache::config::{Cli, Config};
use bot_state_cache::conversation::builtin::default_registry;
use bot_state_cache::conversation::{Container, ConversationRouter};
use bot_state_cache::server::api::{build_router, AppState};
use bot_state_cache::store::memory::MemoryStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments.
    let cli = Cli::parse();

    // Initialize tracing/logging.
    let filter = if cli.verbose {
        "bot_state_cache=debug,tower_http=debug"
    } else {
        "bot_state_cache=info,tower_http=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with_target(true)
        .init();

    info!("bot-state-cache v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration.
    let config = Config::load(&cli.config)?;

    info!(
        default_ttl_secs = ?config.cache.default_ttl_secs,
        sweep_interval_secs = config.cache.sweep_interval_secs,
        "Configuration loaded"
    );

    // Store and cache layers.
    let store = Arc::new(MemoryStore::new());
    let settings = Arc::new(CacheSettings::from_config(&config.cache));
    let cache = ScopedCache::new(store.clone(), settings);

    // Periodically drop expired entries.
    let sweep_interval = config.cache.sweep_interval();
    let sweeper = store.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(sweep_interval);
        loop {
            ticker.tick().await;
            sweeper.purge_expired().await;
        }
    });

    let registry = default_registry();
    info!(handlers = ?registry.names(), "Conversation handlers registered");

    let router = ConversationRouter::new(cache.clone(), registry);
    let container = Arc::new(Container::new().with(cache.clone()));

    // Build application state.
    let state = Arc::new(AppState {
        cache,
        router,
        container,
        start_time: Instant::now(),
    });

    // Build the HTTP router.
    let app = build_router(state);

    // Start the server.
    let listen_addr = cli.listen.unwrap_or(config.server.listen);
    info!(addr = %listen_addr, "Starting server");

    let listener = TcpListener::bind(&listen_addr).await?;
    info!("Listening on {listen_addr}");

    axum::serve(listener, app).await?;

    Ok(())
}
