use std::sync::Arc;
use std::time::{Duration, Instant};

use common::{LocalSong, StrippedTrack};
use parking_lot::Mutex;
use playlists::{playlist_id_from_url, PlaylistProvider, ProviderError};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
const API_BASE: &str = "https://api.spotify.com/v1";
const PAGE_LIMIT: u32 = 100;
const TOKEN_MARGIN: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct SpotifyClient {
    http: Client,
    client_id: String,
    client_secret: String,
    token: Arc<Mutex<Option<AccessToken>>>,
}

#[derive(Clone)]
struct AccessToken {
    value: String,
    expires_at: Instant,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: u64,
}

#[derive(Deserialize)]
struct TracksPage {
    #[serde(default)]
    items: Vec<PlaylistItem>,
    next: Option<String>,
}

#[derive(Deserialize)]
struct PlaylistItem {
    track: Option<SpotifyTrack>,
}

#[derive(Deserialize)]
struct SpotifyTrack {
    id: Option<String>,
    #[serde(default)]
    name: String,
    #[serde(default)]
    artists: Vec<SpotifyArtist>,
    album: Option<SpotifyAlbum>,
    duration_ms: Option<u64>,
    external_urls: Option<ExternalUrls>,
}

#[derive(Deserialize)]
struct SpotifyArtist {
    #[serde(default)]
    name: String,
}

#[derive(Deserialize)]
struct SpotifyAlbum {
    name: Option<String>,
}

#[derive(Deserialize)]
struct ExternalUrls {
    spotify: Option<String>,
}

impl SpotifyClient {
    pub fn new(http: Client, client_id: String, client_secret: String) -> Self {
        Self {
            http,
            client_id,
            client_secret,
            token: Arc::new(Mutex::new(None)),
        }
    }

    async fn access_token(&self) -> Result<String, ProviderError> {
        let cached = self.token.lock().clone();
        if let Some(token) = cached {
            if token.expires_at > Instant::now() {
                return Ok(token.value);
            }
        }
        let response = self
            .http
            .post(TOKEN_URL)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|err| ProviderError::Request(err.to_string()))?;
        let response = check_status(response).await?;
        let body: TokenResponse = response
            .json()
            .await
            .map_err(|err| ProviderError::Decode(err.to_string()))?;
        let lifetime = Duration::from_secs(body.expires_in).saturating_sub(TOKEN_MARGIN);
        *self.token.lock() = Some(AccessToken {
            value: body.access_token.clone(),
            expires_at: Instant::now() + lifetime,
        });
        debug!("Fetched Spotify access token valid for {:?}", lifetime);
        Ok(body.access_token)
    }

    async fn fetch_page(&self, url: &str, token: &str) -> Result<TracksPage, ProviderError> {
        let response = self
            .http
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|err| ProviderError::Request(err.to_string()))?;
        let response = check_status(response).await?;
        response
            .json()
            .await
            .map_err(|err| ProviderError::Decode(err.to_string()))
    }
}

impl PlaylistProvider for SpotifyClient {
    async fn fetch_tracks(&self, url: &str) -> Result<Vec<StrippedTrack>, ProviderError> {
        let id = playlist_id_from_url(url)
            .ok_or_else(|| ProviderError::InvalidUrl(url.to_string()))?;
        let token = self.access_token().await?;
        let mut next = Some(format!(
            "{}/playlists/{}/tracks?limit={}",
            API_BASE, id, PAGE_LIMIT
        ));
        let mut tracks = Vec::new();
        while let Some(page_url) = next {
            let page = self.fetch_page(&page_url, &token).await?;
            tracks.extend(
                page.items
                    .into_iter()
                    .filter_map(|item| item.track)
                    .filter_map(strip_track),
            );
            next = page.next;
        }
        debug!("Fetched {} tracks for playlist {}", tracks.len(), id);
        Ok(tracks)
    }
}

fn strip_track(track: SpotifyTrack) -> Option<StrippedTrack> {
    if track.name.trim().is_empty() {
        return None;
    }
    let artist = track
        .artists
        .iter()
        .map(|artist| artist.name.as_str())
        .filter(|name| !name.is_empty())
        .collect::<Vec<_>>()
        .join(", ");
    let mut extra = Map::new();
    if let Some(id) = track.id {
        extra.insert("id".to_string(), Value::from(id));
    }
    if let Some(album) = track.album.and_then(|album| album.name) {
        extra.insert("album".to_string(), Value::from(album));
    }
    if let Some(duration) = track.duration_ms {
        extra.insert("durationMs".to_string(), Value::from(duration));
    }
    if let Some(url) = track.external_urls.and_then(|urls| urls.spotify) {
        extra.insert("url".to_string(), Value::from(url));
    }
    Some(StrippedTrack {
        name: track.name,
        artist,
        extra,
    })
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    warn!("Spotify request failed with {}", status);
    Err(ProviderError::Status {
        status: status.as_u16(),
        body,
    })
}

/// Forwards song selections to the karaoke app listening on localhost.
#[derive(Clone)]
pub struct CompanionClient {
    http: Client,
    port: Option<u16>,
}

#[derive(Debug)]
pub enum CompanionError {
    NotConfigured,
    Request(String),
    Status(u16),
}

impl std::fmt::Display for CompanionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompanionError::NotConfigured => write!(f, "companion port not set"),
            CompanionError::Request(err) => write!(f, "companion request failed: {}", err),
            CompanionError::Status(status) => write!(f, "companion returned {}", status),
        }
    }
}

impl std::error::Error for CompanionError {}

#[derive(Serialize)]
struct CompanionPlaylist<'a> {
    songs: &'a [LocalSong],
}

impl CompanionClient {
    pub fn new(http: Client, port: Option<u16>) -> Self {
        Self { http, port }
    }

    pub async fn select_song(&self, song: &LocalSong) -> Result<(), CompanionError> {
        self.post("selectSong", song).await
    }

    pub async fn set_playlist(&self, songs: &[LocalSong]) -> Result<(), CompanionError> {
        self.post("setCompanionPlaylist", &CompanionPlaylist { songs })
            .await
    }

    async fn post<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<(), CompanionError> {
        let port = self.port.ok_or(CompanionError::NotConfigured)?;
        let url = format!("http://localhost:{}/{}", port, path);
        let response = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|err| CompanionError::Request(err.to_string()))?;
        if !response.status().is_success() {
            return Err(CompanionError::Status(response.status().as_u16()));
        }
        Ok(())
    }
}
