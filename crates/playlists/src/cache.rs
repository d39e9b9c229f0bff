use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use common::StrippedTrack;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::provider::{is_valid_playlist_id, PlaylistProvider};
use crate::PlaylistError;

const CACHE_EXT: &str = "json";

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Fetched playlists kept on disk as one JSON array per identifier.
#[derive(Clone, Debug)]
pub struct PlaylistCache {
    dir: PathBuf,
}

impl PlaylistCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, id: &str) -> Result<PathBuf, PlaylistError> {
        if !is_valid_playlist_id(id) {
            return Err(PlaylistError::InvalidId(id.to_string()));
        }
        Ok(self.dir.join(format!("{}.{}", id, CACHE_EXT)))
    }

    /// Returns the cached tracks for `id`, fetching and persisting them on a
    /// miss or when `force_refresh` is set.
    pub async fn load<P: PlaylistProvider>(
        &self,
        id: &str,
        url: &str,
        force_refresh: bool,
        provider: &P,
    ) -> Result<Vec<StrippedTrack>, PlaylistError> {
        if !force_refresh {
            if let Some(tracks) = self.read(id).await? {
                info!("Loaded cached playlist {} ({} tracks)", id, tracks.len());
                return Ok(tracks);
            }
        }
        let tracks = provider.fetch_tracks(url).await?;
        self.write(id, &tracks).await?;
        info!("Wrote fresh playlist {} ({} tracks)", id, tracks.len());
        Ok(tracks)
    }

    /// Reads a cached playlist. A missing or unparsable file is a miss.
    pub async fn read(&self, id: &str) -> Result<Option<Vec<StrippedTrack>>, PlaylistError> {
        let path = self.path_for(id)?;
        let raw = match fs::read(&path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!("No cached playlist at {:?}", path);
                return Ok(None);
            }
            Err(err) => {
                warn!("Failed to read cached playlist {:?}: {}", path, err);
                return Ok(None);
            }
        };
        match serde_json::from_slice::<Vec<StrippedTrack>>(&raw) {
            Ok(tracks) => Ok(Some(tracks)),
            Err(err) => {
                warn!("Ignoring corrupt cached playlist {:?}: {}", path, err);
                Ok(None)
            }
        }
    }

    /// Persists `tracks` for `id`. The file is written beside its final name
    /// and renamed into place.
    pub async fn write(&self, id: &str, tracks: &[StrippedTrack]) -> Result<(), PlaylistError> {
        let path = self.path_for(id)?;
        fs::create_dir_all(&self.dir).await?;
        let body = serde_json::to_vec_pretty(tracks)?;
        let tmp = self.dir.join(format!(
            ".{}.{}.{}.tmp",
            id,
            std::process::id(),
            TMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        if let Err(err) = fs::write(&tmp, &body).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(err.into());
        }
        if let Err(err) = fs::rename(&tmp, &path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(err.into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProviderError;
    use std::sync::atomic::AtomicUsize;
    use tempfile::TempDir;

    #[derive(Default)]
    struct CountingProvider {
        calls: AtomicUsize,
        tracks: Vec<StrippedTrack>,
    }

    impl PlaylistProvider for CountingProvider {
        async fn fetch_tracks(&self, _url: &str) -> Result<Vec<StrippedTrack>, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.tracks.clone())
        }
    }

    struct FailingProvider;

    impl PlaylistProvider for FailingProvider {
        async fn fetch_tracks(&self, _url: &str) -> Result<Vec<StrippedTrack>, ProviderError> {
            Err(ProviderError::NotConfigured)
        }
    }

    fn provider() -> CountingProvider {
        let mut hello = StrippedTrack::new("Hello", "Adele");
        hello
            .extra
            .insert("album".to_string(), serde_json::Value::from("25"));
        CountingProvider {
            calls: AtomicUsize::new(0),
            tracks: vec![hello, StrippedTrack::new("Halo", "Beyoncé")],
        }
    }

    #[tokio::test]
    async fn miss_fetches_then_hit_reads_disk() {
        let tmp = TempDir::new().unwrap();
        let cache = PlaylistCache::new(tmp.path().join("cache"));
        let provider = provider();

        let first = cache.load("abc", "url", false, &provider).await.unwrap();
        let second = cache.load("abc", "url", false, &provider).await.unwrap();

        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        assert_eq!(first, second);
        assert_eq!(second[0].extra.get("album"), Some(&serde_json::Value::from("25")));
        assert!(tmp.path().join("cache").join("abc.json").is_file());
    }

    #[tokio::test]
    async fn force_refresh_always_fetches() {
        let tmp = TempDir::new().unwrap();
        let cache = PlaylistCache::new(tmp.path());
        let provider = provider();
        cache.load("abc", "url", false, &provider).await.unwrap();
        cache.load("abc", "url", true, &provider).await.unwrap();
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn corrupt_file_is_a_miss() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("abc.json"), b"{not json").unwrap();
        std::fs::write(tmp.path().join("obj.json"), br#"{"name":"x"}"#).unwrap();
        let cache = PlaylistCache::new(tmp.path());
        assert!(cache.read("abc").await.unwrap().is_none());
        assert!(cache.read("obj").await.unwrap().is_none());

        let provider = provider();
        let tracks = cache.load("abc", "url", false, &provider).await.unwrap();
        assert_eq!(tracks.len(), 2);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        assert!(cache.read("abc").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn invalid_id_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let cache = PlaylistCache::new(tmp.path());
        let err = cache.load("../x", "url", false, &provider()).await.unwrap_err();
        assert!(matches!(err, PlaylistError::InvalidId(_)));
    }

    #[tokio::test]
    async fn provider_failure_leaves_no_file() {
        let tmp = TempDir::new().unwrap();
        let cache = PlaylistCache::new(tmp.path());
        let err = cache.load("abc", "url", false, &FailingProvider).await.unwrap_err();
        assert!(matches!(err, PlaylistError::Provider(ProviderError::NotConfigured)));
        assert!(!tmp.path().join("abc.json").exists());
    }
}
