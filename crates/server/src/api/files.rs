use axum::{
    extract::{Query, State},
    http::HeaderMap,
    response::Response,
};
use tracing::debug;

use crate::media::{file_response, resolve_media_file, AUDIO_EXTENSIONS, COVER_EXTENSIONS};
use crate::state::{AppState, MediaQuery};

const AUDIO_CONTENT_TYPE: &str = "audio/mpeg";

pub async fn song_audio(
    State(state): State<AppState>,
    Query(query): Query<MediaQuery>,
    headers: HeaderMap,
) -> Response {
    let relpath = query.path.unwrap_or_default();
    let roots = state.media_roots(query.id.as_deref());
    let path = match resolve_media_file(&roots, &relpath, AUDIO_EXTENSIONS) {
        Ok(path) => path,
        Err(err) => {
            debug!("Rejected audio request {:?}: {:?}", relpath, err);
            return err.response("audio");
        }
    };
    file_response(&path, AUDIO_CONTENT_TYPE, &headers).await
}

pub async fn song_cover(
    State(state): State<AppState>,
    Query(query): Query<MediaQuery>,
    headers: HeaderMap,
) -> Response {
    let relpath = query.path.unwrap_or_default();
    let roots = state.media_roots(query.id.as_deref());
    let path = match resolve_media_file(&roots, &relpath, COVER_EXTENSIONS) {
        Ok(path) => path,
        Err(err) => {
            debug!("Rejected cover request {:?}: {:?}", relpath, err);
            return err.response("cover");
        }
    };
    let mime = mime_guess::from_path(&path).first_or_octet_stream();
    file_response(&path, mime.as_ref(), &headers).await
}
