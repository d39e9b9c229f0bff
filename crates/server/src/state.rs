use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;

use axum::http::StatusCode;
use axum::Json;
use common::{MatchResult, StrippedTrack};
use library::{Catalog, IndexPolicy, IndexStats, Indexer};
use parking_lot::RwLock;
use playlists::PlaylistCache;
use serde::{Deserialize, Serialize};

use crate::external::{CompanionClient, SpotifyClient};

#[derive(Clone)]
pub struct AppState {
    pub catalog: Catalog,
    pub indexer: Arc<Indexer>,
    pub index_status: Arc<RwLock<IndexStatus>>,
    pub song_roots: Arc<Vec<PathBuf>>,
    pub playlist_cache: PlaylistCache,
    pub spotify: Option<SpotifyClient>,
    pub companion: CompanionClient,
}

impl AppState {
    /// Roots to try for a media path: the song's own root first when known,
    /// then every configured root.
    pub fn media_roots(&self, song_id: Option<&str>) -> Vec<PathBuf> {
        let mut roots = Vec::with_capacity(self.song_roots.len() + 1);
        if let Some(root) = song_id.and_then(|id| self.catalog.root_for(id)) {
            roots.push(root);
        }
        for root in self.song_roots.iter() {
            if !roots.contains(root) {
                roots.push(root.clone());
            }
        }
        roots
    }
}

#[derive(Clone, Debug)]
pub enum IndexStatus {
    Unconfigured,
    Indexing { started: SystemTime },
    Ready(IndexStats),
    Error(String),
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct IndexStatusResponse {
    pub status: &'static str,
    pub message: Option<String>,
    pub songs: usize,
    pub roots: Vec<String>,
    pub index_mode: IndexPolicy,
    pub stats: Option<IndexStats>,
}

#[derive(Debug, Serialize)]
pub struct OkResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct MediaQuery {
    pub path: Option<String>,
    pub id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ComparePlaylistLocalRequest {
    pub play_list_url: Option<String>,
    pub force_refresh: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ComparePlaylistsRequest {
    #[serde(rename = "playListUrl1")]
    pub play_list_url1: Option<String>,
    #[serde(rename = "playListUrl2")]
    pub play_list_url2: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MatchesResponse {
    pub matches: Vec<MatchResult>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntersectionResponse {
    pub intersection_tracks: Vec<StrippedTrack>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SendSongRequest {
    pub song_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompanionPlaylistRequest {
    pub song_ids: Vec<String>,
}

pub type JsonResult<T> = Result<Json<T>, (StatusCode, Json<ErrorResponse>)>;

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use reqwest::Client;

    pub fn state_with_roots(roots: Vec<PathBuf>, cache_dir: PathBuf) -> AppState {
        let catalog = Catalog::new();
        let indexer = Indexer::new(catalog.clone(), IndexPolicy::Additive, 1).unwrap();
        AppState {
            catalog,
            indexer: Arc::new(indexer),
            index_status: Arc::new(RwLock::new(IndexStatus::Unconfigured)),
            song_roots: Arc::new(roots),
            playlist_cache: PlaylistCache::new(cache_dir),
            spotify: None,
            companion: CompanionClient::new(Client::new(), None),
        }
    }
}
