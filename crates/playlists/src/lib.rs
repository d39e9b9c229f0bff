mod cache;
pub mod matcher;
mod provider;

pub use cache::PlaylistCache;
pub use matcher::{intersect_playlists, match_playlist_to_local, normalize_value};
pub use provider::{is_valid_playlist_id, playlist_id_from_url, PlaylistProvider, ProviderError};

#[derive(Debug)]
pub enum PlaylistError {
    InvalidId(String),
    Io(std::io::Error),
    Json(serde_json::Error),
    Provider(ProviderError),
}

impl std::fmt::Display for PlaylistError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaylistError::InvalidId(id) => write!(f, "invalid playlist id: {:?}", id),
            PlaylistError::Io(err) => write!(f, "io error: {}", err),
            PlaylistError::Json(err) => write!(f, "json error: {}", err),
            PlaylistError::Provider(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for PlaylistError {}

impl From<std::io::Error> for PlaylistError {
    fn from(err: std::io::Error) -> Self {
        PlaylistError::Io(err)
    }
}

impl From<serde_json::Error> for PlaylistError {
    fn from(err: serde_json::Error) -> Self {
        PlaylistError::Json(err)
    }
}

impl From<ProviderError> for PlaylistError {
    fn from(err: ProviderError) -> Self {
        PlaylistError::Provider(err)
    }
}
