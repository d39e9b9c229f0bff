mod catalog;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Instant, UNIX_EPOCH};

use common::{stable_id, SongRecord};
use parking_lot::Mutex;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use songfile::{load_song_dir, SongFileError};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

pub use catalog::Catalog;

/// How a repeated indexing run treats a root that was indexed before.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexPolicy {
    /// Every run parses and merges; ids already cataloged are kept.
    #[default]
    Additive,
    /// Skip a root whose fingerprint is unchanged, otherwise drop its previous
    /// songs before merging it again.
    ReplaceOnChange,
}

impl IndexPolicy {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "additive" => Some(IndexPolicy::Additive),
            "replace_on_change" | "replace-on-change" | "replace" => {
                Some(IndexPolicy::ReplaceOnChange)
            }
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DuplicateSong {
    pub id: String,
    pub directory: String,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct RootStats {
    pub root: String,
    pub song_dirs: u64,
    pub inserted: u64,
    pub duplicates: Vec<DuplicateSong>,
    pub without_definition: u64,
    pub failed: u64,
    pub unchanged: bool,
    pub missing: bool,
    pub error: Option<String>,
    pub elapsed_ms: u64,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct IndexStats {
    pub roots: Vec<RootStats>,
    pub total_songs: u64,
}

impl IndexStats {
    pub fn inserted(&self) -> u64 {
        self.roots.iter().map(|root| root.inserted).sum()
    }

    pub fn duplicates(&self) -> usize {
        self.roots.iter().map(|root| root.duplicates.len()).sum()
    }
}

struct RootFingerprint {
    hash: String,
    ids: Vec<String>,
}

/// Walks song roots and merges their songs into a shared [`Catalog`].
pub struct Indexer {
    catalog: Catalog,
    policy: IndexPolicy,
    pool: rayon::ThreadPool,
    fingerprints: Mutex<HashMap<PathBuf, RootFingerprint>>,
}

impl Indexer {
    /// Builds an indexer with its own parse pool. `workers == 0` uses one
    /// thread per CPU.
    pub fn new(
        catalog: Catalog,
        policy: IndexPolicy,
        workers: usize,
    ) -> Result<Self, LibraryError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("indexer-{}", i))
            .build()?;
        Ok(Self {
            catalog,
            policy,
            pool,
            fingerprints: Mutex::new(HashMap::new()),
        })
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn policy(&self) -> IndexPolicy {
        self.policy
    }

    /// Indexes each root in order. A root that fails is reported in its
    /// stats entry and the remaining roots still run.
    pub fn index_roots(&self, roots: &[PathBuf]) -> IndexStats {
        let mut stats = IndexStats::default();
        for root in roots {
            let root_stats = match self.index_root(root) {
                Ok(root_stats) => root_stats,
                Err(err) => {
                    warn!("Indexing {:?} failed: {}", root, err);
                    RootStats {
                        root: root.display().to_string(),
                        error: Some(err.to_string()),
                        ..RootStats::default()
                    }
                }
            };
            stats.roots.push(root_stats);
        }
        stats.total_songs = self.catalog.len() as u64;
        info!(
            "Indexed {} roots: {} inserted, {} duplicates, {} songs total",
            stats.roots.len(),
            stats.inserted(),
            stats.duplicates(),
            stats.total_songs
        );
        stats
    }

    pub fn index_root(&self, root: &Path) -> Result<RootStats, LibraryError> {
        let started = Instant::now();
        let mut stats = RootStats {
            root: root.display().to_string(),
            ..RootStats::default()
        };

        if !root.is_dir() {
            warn!("Song root {:?} does not exist; nothing to index", root);
            stats.missing = true;
            return Ok(stats);
        }

        let song_dirs = list_song_dirs(root)?;
        stats.song_dirs = song_dirs.len() as u64;

        if self.policy == IndexPolicy::ReplaceOnChange {
            let hash = fingerprint(&song_dirs);
            let mut fingerprints = self.fingerprints.lock();
            if let Some(previous) = fingerprints.get(root) {
                if previous.hash == hash {
                    debug!("Song root {:?} unchanged; skipping", root);
                    stats.unchanged = true;
                    stats.elapsed_ms = started.elapsed().as_millis() as u64;
                    return Ok(stats);
                }
                let removed = self.catalog.remove_ids(&previous.ids);
                info!("Song root {:?} changed; dropped {} songs", root, removed);
            }
            let ids = self.merge(root, &song_dirs, &mut stats);
            fingerprints.insert(root.to_path_buf(), RootFingerprint { hash, ids });
        } else {
            self.merge(root, &song_dirs, &mut stats);
        }

        stats.elapsed_ms = started.elapsed().as_millis() as u64;
        info!(
            "Root {:?}: {} dirs, {} inserted, {} duplicates, {} undefined, {} failed in {}ms",
            root,
            stats.song_dirs,
            stats.inserted,
            stats.duplicates.len(),
            stats.without_definition,
            stats.failed,
            stats.elapsed_ms
        );
        Ok(stats)
    }

    /// Parses `song_dirs` on the pool, then inserts in directory order.
    /// Returns the ids this root added to the catalog.
    fn merge(&self, root: &Path, song_dirs: &[SongDir], stats: &mut RootStats) -> Vec<String> {
        let parsed: Vec<Result<Option<SongRecord>, SongFileError>> = self.pool.install(|| {
            song_dirs
                .par_iter()
                .map(|dir| load_song_dir(&dir.path, root))
                .collect()
        });

        let mut ids = Vec::new();
        for (dir, result) in song_dirs.iter().zip(parsed) {
            match result {
                Ok(Some(song)) => {
                    let id = song.id.clone();
                    if self.catalog.insert(song, root) {
                        stats.inserted += 1;
                        ids.push(id);
                    } else {
                        warn!("Duplicate song {:?} in {:?}; keeping the first", id, dir.path);
                        stats.duplicates.push(DuplicateSong {
                            id,
                            directory: dir.name.clone(),
                        });
                    }
                }
                Ok(None) => stats.without_definition += 1,
                Err(err) => {
                    warn!("Failed to parse {:?}: {}", dir.path, err);
                    stats.failed += 1;
                }
            }
        }
        ids
    }
}

struct SongDir {
    path: PathBuf,
    name: String,
    modified_ms: u128,
}

fn list_song_dirs(root: &Path) -> Result<Vec<SongDir>, LibraryError> {
    let mut dirs = Vec::new();
    for entry in WalkDir::new(root)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .sort_by_file_name()
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!("Skipping unreadable entry under {:?}: {}", root, err);
                continue;
            }
        };
        if !entry.file_type().is_dir() {
            continue;
        }
        let modified_ms = entry
            .metadata()?
            .modified()
            .ok()
            .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
            .map(|elapsed| elapsed.as_millis())
            .unwrap_or(0);
        dirs.push(SongDir {
            name: entry.file_name().to_string_lossy().to_string(),
            path: entry.into_path(),
            modified_ms,
        });
    }
    Ok(dirs)
}

fn fingerprint(song_dirs: &[SongDir]) -> String {
    let mut input = String::new();
    for dir in song_dirs {
        input.push_str(&dir.name);
        input.push('\x1f');
        input.push_str(&dir.modified_ms.to_string());
        input.push('\n');
    }
    stable_id(&input)
}

pub const SONG_ROOT_VAR: &str = "ULTRA_START_SONGS_DIR_PATH";

/// Collects song roots from `ULTRA_START_SONGS_DIR_PATH<N>` in numeric order,
/// followed by the unnumbered variable when it is not already listed.
pub fn song_roots_from_vars<I>(vars: I) -> Vec<String>
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut numbered: Vec<(u32, String)> = Vec::new();
    let mut plain: Option<String> = None;
    for (key, value) in vars {
        let Some(suffix) = key.strip_prefix(SONG_ROOT_VAR) else {
            continue;
        };
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        if suffix.is_empty() {
            plain = Some(value.to_string());
        } else if let Ok(n) = suffix.parse::<u32>() {
            numbered.push((n, value.to_string()));
        }
    }
    numbered.sort_by_key(|(n, _)| *n);
    let mut roots: Vec<String> = numbered.into_iter().map(|(_, root)| root).collect();
    if let Some(root) = plain {
        if !roots.contains(&root) {
            roots.push(root);
        }
    }
    roots
}

#[derive(Debug)]
pub enum LibraryError {
    Io(std::io::Error),
    Walk(walkdir::Error),
    Pool(rayon::ThreadPoolBuildError),
}

impl std::fmt::Display for LibraryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LibraryError::Io(err) => write!(f, "io error: {}", err),
            LibraryError::Walk(err) => write!(f, "walk error: {}", err),
            LibraryError::Pool(err) => write!(f, "worker pool error: {}", err),
        }
    }
}

impl std::error::Error for LibraryError {}

impl From<std::io::Error> for LibraryError {
    fn from(err: std::io::Error) -> Self {
        LibraryError::Io(err)
    }
}

impl From<walkdir::Error> for LibraryError {
    fn from(err: walkdir::Error) -> Self {
        LibraryError::Walk(err)
    }
}

impl From<rayon::ThreadPoolBuildError> for LibraryError {
    fn from(err: rayon::ThreadPoolBuildError) -> Self {
        LibraryError::Pool(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_song(root: &Path, dir: &str, title: &str, artist: &str) {
        let song_dir = root.join(dir);
        fs::create_dir_all(&song_dir).unwrap();
        let text = format!(
            "#TITLE:{}\n#ARTIST:{}\n#MP3:song.mp3\n: 0 1 0 la\nE\n",
            title, artist
        );
        fs::write(song_dir.join("song.txt"), text).unwrap();
    }

    fn indexer(policy: IndexPolicy, workers: usize) -> Indexer {
        Indexer::new(Catalog::new(), policy, workers).unwrap()
    }

    #[test]
    fn distinct_songs_all_indexed() {
        let tmp = TempDir::new().unwrap();
        for n in 0..5 {
            write_song(tmp.path(), &format!("Band - Song {}", n), &format!("Song {}", n), "Band");
        }
        let indexer = indexer(IndexPolicy::Additive, 2);
        let stats = indexer.index_root(tmp.path()).unwrap();
        assert_eq!(stats.song_dirs, 5);
        assert_eq!(stats.inserted, 5);
        assert_eq!(indexer.catalog().len(), 5);
        let song = indexer.catalog().get_by_id("Song 3 - Band").unwrap();
        assert_eq!(song.audio_file.as_deref(), Some("Band - Song 3/song.mp3"));
        assert_eq!(
            indexer.catalog().root_for("Song 3 - Band"),
            Some(tmp.path().to_path_buf())
        );
    }

    #[test]
    fn duplicate_is_reported_and_first_directory_wins() {
        let tmp = TempDir::new().unwrap();
        write_song(tmp.path(), "A first", "Hello", "Adele");
        write_song(tmp.path(), "B second", "Hello", "Adele");
        let indexer = indexer(IndexPolicy::Additive, 4);
        let stats = indexer.index_root(tmp.path()).unwrap();
        assert_eq!(stats.inserted, 1);
        assert_eq!(
            stats.duplicates,
            vec![DuplicateSong {
                id: "Hello - Adele".to_string(),
                directory: "B second".to_string(),
            }]
        );
        let song = indexer.catalog().get_by_id("Hello - Adele").unwrap();
        assert_eq!(song.audio_file.as_deref(), Some("A first/song.mp3"));
    }

    #[test]
    fn directory_without_definition_is_counted() {
        let tmp = TempDir::new().unwrap();
        write_song(tmp.path(), "Good", "T", "A");
        let empty = tmp.path().join("Empty");
        fs::create_dir_all(&empty).unwrap();
        fs::write(empty.join("audio.mp3"), b"ID3").unwrap();
        fs::write(tmp.path().join("loose.txt"), "#TITLE:Loose").unwrap();
        let indexer = indexer(IndexPolicy::Additive, 1);
        let stats = indexer.index_root(tmp.path()).unwrap();
        assert_eq!(stats.song_dirs, 2);
        assert_eq!(stats.inserted, 1);
        assert_eq!(stats.without_definition, 1);
        assert_eq!(stats.failed, 0);
    }

    #[test]
    fn missing_root_is_nothing_to_index() {
        let tmp = TempDir::new().unwrap();
        let indexer = indexer(IndexPolicy::Additive, 1);
        let stats = indexer.index_roots(&[tmp.path().join("missing")]);
        assert!(stats.roots[0].missing);
        assert!(stats.roots[0].error.is_none());
        assert_eq!(stats.total_songs, 0);
    }

    #[test]
    fn additive_runs_keep_existing_songs() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        write_song(first.path(), "One", "One", "X");
        write_song(second.path(), "Two", "Two", "X");
        write_song(second.path(), "One again", "One", "X");

        let indexer = indexer(IndexPolicy::Additive, 2);
        indexer.index_roots(&[first.path().to_path_buf()]);
        fs::remove_dir_all(first.path().join("One")).unwrap();
        let stats = indexer.index_roots(&[first.path().to_path_buf(), second.path().to_path_buf()]);

        assert_eq!(stats.total_songs, 2);
        assert_eq!(stats.roots[1].duplicates.len(), 1);
        assert_eq!(
            indexer.catalog().root_for("One - X"),
            Some(first.path().to_path_buf())
        );
    }

    #[test]
    fn replace_on_change_skips_unchanged_root() {
        let tmp = TempDir::new().unwrap();
        write_song(tmp.path(), "One", "One", "X");
        let indexer = indexer(IndexPolicy::ReplaceOnChange, 1);
        let first = indexer.index_root(tmp.path()).unwrap();
        assert!(!first.unchanged);
        let second = indexer.index_root(tmp.path()).unwrap();
        assert!(second.unchanged);
        assert_eq!(second.inserted, 0);
        assert_eq!(indexer.catalog().len(), 1);
    }

    #[test]
    fn replace_on_change_drops_removed_directories() {
        let tmp = TempDir::new().unwrap();
        write_song(tmp.path(), "One", "One", "X");
        write_song(tmp.path(), "Two", "Two", "X");
        let indexer = indexer(IndexPolicy::ReplaceOnChange, 2);
        indexer.index_root(tmp.path()).unwrap();
        assert_eq!(indexer.catalog().len(), 2);

        fs::remove_dir_all(tmp.path().join("One")).unwrap();
        write_song(tmp.path(), "Three", "Three", "X");
        let stats = indexer.index_root(tmp.path()).unwrap();
        assert!(!stats.unchanged);
        assert_eq!(stats.inserted, 2);
        assert!(indexer.catalog().get_by_id("One - X").is_none());
        assert!(indexer.catalog().contains("Two - X"));
        assert!(indexer.catalog().contains("Three - X"));
    }

    #[test]
    fn worker_count_does_not_change_order() {
        let tmp = TempDir::new().unwrap();
        for name in ["d", "b", "e", "a", "c"] {
            write_song(tmp.path(), name, name, "X");
        }
        let single = indexer(IndexPolicy::Additive, 1);
        let many = indexer(IndexPolicy::Additive, 4);
        single.index_root(tmp.path()).unwrap();
        many.index_root(tmp.path()).unwrap();
        let ids = |indexer: &Indexer| -> Vec<String> {
            indexer.catalog().list_all().into_iter().map(|s| s.id).collect()
        };
        assert_eq!(ids(&single), vec!["a - X", "b - X", "c - X", "d - X", "e - X"]);
        assert_eq!(ids(&single), ids(&many));
    }

    #[test]
    fn policy_names_parse() {
        assert_eq!(IndexPolicy::from_name("additive"), Some(IndexPolicy::Additive));
        assert_eq!(
            IndexPolicy::from_name("Replace_On_Change"),
            Some(IndexPolicy::ReplaceOnChange)
        );
        assert_eq!(IndexPolicy::from_name("sometimes"), None);
        assert_eq!(IndexPolicy::default(), IndexPolicy::Additive);
    }

    #[test]
    fn song_roots_follow_numbered_order() {
        let vars = vec![
            ("ULTRA_START_SONGS_DIR_PATH".to_string(), "/extra".to_string()),
            ("ULTRA_START_SONGS_DIR_PATH10".to_string(), "/ten".to_string()),
            ("ULTRA_START_SONGS_DIR_PATH2".to_string(), " /two ".to_string()),
            ("ULTRA_START_SONGS_DIR_PATHX".to_string(), "/ignored".to_string()),
            ("HOME".to_string(), "/root".to_string()),
        ];
        assert_eq!(song_roots_from_vars(vars), vec!["/two", "/ten", "/extra"]);
        assert!(song_roots_from_vars(Vec::new()).is_empty());
    }
}
