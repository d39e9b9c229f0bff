use axum::{extract::State, http::StatusCode, Json};
use common::LocalSong;
use tracing::{info, warn};

use crate::external::CompanionError;
use crate::state::{
    AppState, CompanionPlaylistRequest, ErrorResponse, JsonResult, OkResponse, SendSongRequest,
};
use crate::utils::json_error;

pub async fn send_song(
    State(state): State<AppState>,
    Json(body): Json<SendSongRequest>,
) -> JsonResult<OkResponse> {
    let song_id = body
        .song_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| json_error(StatusCode::BAD_REQUEST, "Missing songId"))?;
    let song = state
        .catalog
        .get_by_id(&song_id)
        .ok_or_else(|| json_error(StatusCode::NOT_FOUND, "Song not found"))?;
    state
        .companion
        .select_song(&song.local())
        .await
        .map_err(|err| companion_error("forward song", err))?;
    info!("Sent {:?} to the companion app", song_id);
    Ok(Json(OkResponse {
        ok: true,
        count: None,
    }))
}

pub async fn companion_playlist(
    State(state): State<AppState>,
    Json(body): Json<CompanionPlaylistRequest>,
) -> JsonResult<OkResponse> {
    if body.song_ids.is_empty() {
        return Err(json_error(StatusCode::BAD_REQUEST, "Missing songIds"));
    }
    let songs: Vec<LocalSong> = body
        .song_ids
        .iter()
        .filter_map(|id| state.catalog.get_by_id(id))
        .map(|song| song.local())
        .collect();
    state
        .companion
        .set_playlist(&songs)
        .await
        .map_err(|err| companion_error("set companion playlist", err))?;
    Ok(Json(OkResponse {
        ok: true,
        count: Some(songs.len()),
    }))
}

fn companion_error(action: &str, err: CompanionError) -> (StatusCode, Json<ErrorResponse>) {
    warn!("Failed to {}: {}", action, err);
    match err {
        CompanionError::NotConfigured => json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Ultra Star Companion port not set",
        ),
        other => json_error(
            StatusCode::BAD_GATEWAY,
            format!("Failed to {}: {}", action, other),
        ),
    }
}
