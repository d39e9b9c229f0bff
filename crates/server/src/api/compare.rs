use axum::{extract::State, http::StatusCode, Json};
use common::StrippedTrack;
use playlists::{
    intersect_playlists, match_playlist_to_local, playlist_id_from_url, PlaylistError,
    PlaylistProvider, ProviderError,
};
use tracing::warn;

use crate::external::SpotifyClient;
use crate::state::{
    AppState, ComparePlaylistLocalRequest, ComparePlaylistsRequest, ErrorResponse,
    IntersectionResponse, JsonResult, MatchesResponse,
};
use crate::utils::json_error;

type ApiError = (StatusCode, Json<ErrorResponse>);

pub async fn compare_playlist_local(
    State(state): State<AppState>,
    Json(body): Json<ComparePlaylistLocalRequest>,
) -> JsonResult<MatchesResponse> {
    let spotify = spotify_or_error(&state)?;
    compare_local_with(&state, spotify, body).await.map(Json)
}

pub async fn compare_playlists(
    State(state): State<AppState>,
    Json(body): Json<ComparePlaylistsRequest>,
) -> JsonResult<IntersectionResponse> {
    let spotify = spotify_or_error(&state)?;
    intersect_with(&state, spotify, body).await.map(Json)
}

fn spotify_or_error(state: &AppState) -> Result<&SpotifyClient, ApiError> {
    state.spotify.as_ref().ok_or_else(|| {
        json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Spotify API not initialized",
        )
    })
}

async fn compare_local_with<P: PlaylistProvider>(
    state: &AppState,
    provider: &P,
    body: ComparePlaylistLocalRequest,
) -> Result<MatchesResponse, ApiError> {
    let url = body
        .play_list_url
        .as_deref()
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .ok_or_else(|| json_error(StatusCode::BAD_REQUEST, "Missing playListUrl"))?;
    let id = playlist_id_from_url(url)
        .ok_or_else(|| json_error(StatusCode::BAD_REQUEST, "Invalid playListUrl"))?;
    let tracks = state
        .playlist_cache
        .load(&id, url, body.force_refresh, provider)
        .await
        .map_err(playlist_error)?;
    let songs = state.catalog.list_all();
    Ok(MatchesResponse {
        matches: match_playlist_to_local(&tracks, &songs),
    })
}

async fn intersect_with<P: PlaylistProvider>(
    state: &AppState,
    provider: &P,
    body: ComparePlaylistsRequest,
) -> Result<IntersectionResponse, ApiError> {
    let urls = (
        body.play_list_url1.as_deref().map(str::trim).filter(|u| !u.is_empty()),
        body.play_list_url2.as_deref().map(str::trim).filter(|u| !u.is_empty()),
    );
    let (url1, url2) = match urls {
        (Some(url1), Some(url2)) => (url1, url2),
        _ => {
            return Err(json_error(
                StatusCode::BAD_REQUEST,
                "Missing playListUrl1 or playListUrl2",
            ))
        }
    };
    let (id1, id2) = match (playlist_id_from_url(url1), playlist_id_from_url(url2)) {
        (Some(id1), Some(id2)) => (id1, id2),
        _ => {
            return Err(json_error(
                StatusCode::BAD_REQUEST,
                "Invalid playListUrl1 or playListUrl2",
            ))
        }
    };
    let (first, second) = tokio::join!(
        state.playlist_cache.load(&id1, url1, false, provider),
        state.playlist_cache.load(&id2, url2, false, provider),
    );
    let first: Vec<StrippedTrack> = first.map_err(playlist_error)?;
    let second: Vec<StrippedTrack> = second.map_err(playlist_error)?;
    Ok(IntersectionResponse {
        intersection_tracks: intersect_playlists(&first, &second),
    })
}

fn playlist_error(err: PlaylistError) -> ApiError {
    warn!("Playlist load failed: {}", err);
    let status = match &err {
        PlaylistError::InvalidId(_) => StatusCode::BAD_REQUEST,
        PlaylistError::Provider(ProviderError::NotConfigured) => StatusCode::INTERNAL_SERVER_ERROR,
        PlaylistError::Provider(ProviderError::InvalidUrl(_)) => StatusCode::BAD_REQUEST,
        PlaylistError::Provider(_) => StatusCode::BAD_GATEWAY,
        PlaylistError::Io(_) | PlaylistError::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    json_error(status, err.to_string())
}
