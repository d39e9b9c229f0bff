pub mod companion;
pub mod compare;
pub mod files;
pub mod songs;

use axum::{
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use crate::state::{AppState, HealthResponse};

pub fn api_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/songs", get(songs::list_songs))
        .route("/songs/:song_id", get(songs::get_song))
        .route("/status", get(songs::index_status))
        .route("/reindex", post(songs::reindex))
        .route("/song-audio", get(files::song_audio))
        .route("/song-cover", get(files::song_cover))
        .route("/compare-playlist-local", post(compare::compare_playlist_local))
        .route("/compare-playlists", post(compare::compare_playlists))
        .route("/send-song", post(companion::send_song))
        .route("/companion-playlist", post(companion::companion_playlist))
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(HealthResponse { status: "ok" })
}
