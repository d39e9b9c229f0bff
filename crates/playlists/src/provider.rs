use std::future::Future;

use common::StrippedTrack;

/// Source of external playlist contents.
pub trait PlaylistProvider: Send + Sync {
    fn fetch_tracks(
        &self,
        url: &str,
    ) -> impl Future<Output = Result<Vec<StrippedTrack>, ProviderError>> + Send;
}

#[derive(Debug)]
pub enum ProviderError {
    NotConfigured,
    InvalidUrl(String),
    Request(String),
    Status { status: u16, body: String },
    Decode(String),
}

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderError::NotConfigured => write!(f, "playlist provider not configured"),
            ProviderError::InvalidUrl(url) => write!(f, "invalid playlist url: {}", url),
            ProviderError::Request(err) => write!(f, "provider request failed: {}", err),
            ProviderError::Status { status, body } => {
                write!(f, "provider returned {}: {}", status, body)
            }
            ProviderError::Decode(err) => write!(f, "provider response invalid: {}", err),
        }
    }
}

impl std::error::Error for ProviderError {}

const URL_MARKERS: &[&str] = &["/playlist/", "playlist:"];

/// Extracts the playlist identifier from a share URL, a `spotify:playlist:`
/// URI or a bare identifier.
pub fn playlist_id_from_url(url: &str) -> Option<String> {
    let url = url.trim();
    for marker in URL_MARKERS {
        if let Some(pos) = url.find(marker) {
            let rest = &url[pos + marker.len()..];
            let id: String = rest.chars().take_while(|ch| is_id_char(*ch)).collect();
            return if id.is_empty() { None } else { Some(id) };
        }
    }
    if is_valid_playlist_id(url) {
        Some(url.to_string())
    } else {
        None
    }
}

/// Identifiers double as cache file names, so only `[A-Za-z0-9_-]` is allowed.
pub fn is_valid_playlist_id(id: &str) -> bool {
    !id.is_empty() && id.chars().all(is_id_char)
}

fn is_id_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '-' || ch == '_'
}
