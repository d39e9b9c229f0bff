mod api;
mod config;
mod external;
mod media;
mod scan;
mod state;
mod utils;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use api::api_router;
use config::{
    config_path_from_env, load_config, log_level_directive, resolve_path, resolve_song_roots,
};
use external::{CompanionClient, SpotifyClient};
use library::{Catalog, Indexer};
use parking_lot::RwLock;
use playlists::PlaylistCache;
use reqwest::Client;
use scan::start_index;
use state::{AppState, IndexStatus};
use tower_http::request_id::{MakeRequestUuid, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const HTTP_TIMEOUT: Duration = Duration::from_secs(15);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let level_warning = init_tracing();
    if let Some(message) = level_warning {
        warn!("{}", message);
    }

    let config_path = config_path_from_env();
    let (config, from_file) = load_config(&config_path)?;
    if from_file {
        info!("Loaded config from {:?}", config_path);
    } else {
        info!("No config file at {:?}; using environment", config_path);
    }

    let song_roots = resolve_song_roots(&config_path, &config);
    if song_roots.is_empty() {
        warn!("No song directories found for ULTRA_START_SONGS_DIR_PATH*");
    }
    let cache_dir = resolve_path(&config_path, &config.playlist_cache_dir);
    info!("Playlist cache: {}", cache_dir.display());

    let http = Client::builder()
        .user_agent("songbook/0.1")
        .timeout(HTTP_TIMEOUT)
        .build()?;
    let spotify = if config.has_spotify_credentials() {
        Some(SpotifyClient::new(
            http.clone(),
            config.spotify_client_id.clone(),
            config.spotify_client_secret.clone(),
        ))
    } else {
        warn!("Spotify client id or secret not set; playlist comparison is disabled");
        None
    };
    if config.companion_port.is_none() {
        warn!("ULTRA_STAR_COMPANION_PORT not set; forwarding songs is disabled");
    }

    let catalog = Catalog::new();
    let indexer = Indexer::new(catalog.clone(), config.index_mode, config.index_workers)?;
    info!(
        "Index policy {:?} with {} workers",
        config.index_mode,
        if config.index_workers == 0 {
            "default".to_string()
        } else {
            config.index_workers.to_string()
        }
    );

    let port = config.port;
    let state = AppState {
        catalog,
        indexer: Arc::new(indexer),
        index_status: Arc::new(RwLock::new(IndexStatus::Unconfigured)),
        companion: CompanionClient::new(http, config.companion_port),
        song_roots: Arc::new(song_roots),
        playlist_cache: PlaylistCache::new(cache_dir),
        spotify,
    };
    start_index(state.clone());

    let app = Router::new()
        .nest("/api", api_router(state))
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(TraceLayer::new_for_http());

    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("Listening on {}", bind_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

/// Installs the global subscriber. `RUST_LOG` wins over `LOG_LEVEL`; the
/// returned message is logged once the subscriber is live.
fn init_tracing() -> Option<String> {
    let (filter, warning) = match EnvFilter::try_from_default_env() {
        Ok(filter) => (filter, None),
        Err(_) => {
            let level = std::env::var("LOG_LEVEL").unwrap_or_default();
            match log_level_directive(&level) {
                Some(directive) => (EnvFilter::new(directive), None),
                None => (
                    EnvFilter::new("debug"),
                    Some("LOG_LEVEL is not set, using DEBUG as default".to_string()),
                ),
            }
        }
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
    warning
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut term = match signal(SignalKind::terminate()) {
            Ok(signal) => signal,
            Err(err) => {
                warn!("Failed to install terminate signal handler: {}", err);
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = term.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for ctrl-c: {}", err);
        }
    }

    info!("Shutdown signal received.");
}
