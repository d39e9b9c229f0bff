use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Component, Path, PathBuf};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SongRecord {
    pub id: String,
    pub title: String,
    pub artist: String,
    pub year: Option<i32>,
    pub creator: Option<String>,
    pub genre: Option<String>,
    pub language: Option<String>,
    pub audio_file: Option<String>,
    pub video_file: Option<String>,
    pub cover_file: Option<String>,
    #[serde(default)]
    pub lyric_words: Vec<String>,
    #[serde(default)]
    pub lyric_text: String,
}

impl SongRecord {
    pub fn local(&self) -> LocalSong {
        LocalSong {
            title: self.title.clone(),
            artist: self.artist.clone(),
        }
    }
}

/// Catalog identity of a song: `"<title> - <artist>"` over the trimmed fields.
pub fn song_id(title: &str, artist: &str) -> String {
    format!("{} - {}", title.trim(), artist.trim())
}

/// Minimal external playlist track. Provider-specific fields ride along in
/// `extra` and are written back to the cache untouched.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StrippedTrack {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub artist: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl StrippedTrack {
    pub fn new(name: impl Into<String>, artist: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            artist: artist.into(),
            extra: Map::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalSong {
    pub title: String,
    pub artist: String,
}

/// Serialized as `{spotify, local}`, the shape the web client reads.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    #[serde(rename = "spotify", alias = "track")]
    pub track: StrippedTrack,
    pub local: LocalSong,
}

pub fn stable_id(input: &str) -> String {
    blake3::hash(input.as_bytes()).to_hex().to_string()
}

pub fn relpath_from(root: &Path, path: &Path) -> Option<String> {
    let root = normalize_lexical(root);
    let path = normalize_lexical(path);
    let rel = path.strip_prefix(&root).ok()?;
    Some(path_to_slash_string(rel))
}

/// Joins a slash-separated relative path onto `root`. Returns `None` when the
/// path is absolute, carries a drive prefix or climbs above `root`.
pub fn join_relpath(root: &Path, relpath: &str) -> Option<PathBuf> {
    if relpath.starts_with('/') || relpath.starts_with('\\') {
        return None;
    }
    let mut out = PathBuf::from(root);
    let mut depth = 0usize;
    for part in relpath.split(['/', '\\']) {
        match part {
            "" | "." => continue,
            ".." => {
                if depth == 0 {
                    return None;
                }
                depth -= 1;
                out.pop();
            }
            _ if !is_plain_segment(part) => return None,
            _ => {
                depth += 1;
                out.push(part);
            }
        }
    }
    Some(out)
}

fn is_plain_segment(part: &str) -> bool {
    let mut components = Path::new(part).components();
    matches!(components.next(), Some(Component::Normal(_))) && components.next().is_none()
}

/// Resolves `.` and `..` without touching the filesystem.
pub fn normalize_lexical(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

pub fn path_to_slash_string(path: &Path) -> String {
    let parts: Vec<String> = path
        .components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect();
    parts.join("/")
}
