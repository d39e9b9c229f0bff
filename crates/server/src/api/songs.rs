use axum::{
    extract::{Path as AxumPath, State},
    http::StatusCode,
    Json,
};
use common::SongRecord;

use crate::scan::{start_index, status_label, status_message};
use crate::state::{
    AppState, ErrorResponse, IndexStatus, IndexStatusResponse, JsonResult, OkResponse,
};
use crate::utils::json_error;

pub async fn list_songs(State(state): State<AppState>) -> Json<Vec<SongRecord>> {
    Json(state.catalog.list_all())
}

pub async fn get_song(
    State(state): State<AppState>,
    AxumPath(song_id): AxumPath<String>,
) -> JsonResult<SongRecord> {
    state
        .catalog
        .get_by_id(&song_id)
        .map(Json)
        .ok_or_else(|| json_error(StatusCode::NOT_FOUND, "Song not found"))
}

pub async fn index_status(State(state): State<AppState>) -> Json<IndexStatusResponse> {
    let status = state.index_status.read().clone();
    let stats = match &status {
        IndexStatus::Ready(stats) => Some(stats.clone()),
        _ => None,
    };
    Json(IndexStatusResponse {
        status: status_label(&status),
        message: status_message(&status),
        songs: state.catalog.len(),
        roots: state
            .song_roots
            .iter()
            .map(|root| root.display().to_string())
            .collect(),
        index_mode: state.indexer.policy(),
        stats,
    })
}

pub async fn reindex(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<OkResponse>), (StatusCode, Json<ErrorResponse>)> {
    if state.song_roots.is_empty() {
        return Err(json_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "song directories must be set",
        ));
    }
    if !start_index(state) {
        return Err(json_error(StatusCode::CONFLICT, "indexing already in progress"));
    }
    Ok((StatusCode::ACCEPTED, Json(OkResponse { ok: true, count: None })))
}
