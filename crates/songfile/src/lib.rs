pub mod encoding;
mod parse;

use std::fs;
use std::path::{Path, PathBuf};

use common::SongRecord;
use tracing::{debug, warn};

pub use encoding::{decode, decode_detected, decode_mode_for_label, detect_label, DecodeMode};
pub use parse::{parse_song, resolve_media_path};

/// A definition file with more lines than this is taken to be the complete
/// version of a song rather than a stub or alternate take.
pub const COMPLETE_FILE_MIN_LINES: usize = 100;
const DEFINITION_EXT: &str = "txt";

#[derive(Debug)]
pub enum SongFileError {
    Io(std::io::Error),
}

impl std::fmt::Display for SongFileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SongFileError::Io(err) => write!(f, "io error: {}", err),
        }
    }
}

impl std::error::Error for SongFileError {}

impl From<std::io::Error> for SongFileError {
    fn from(err: std::io::Error) -> Self {
        SongFileError::Io(err)
    }
}

/// Lists the definition files directly inside `song_dir`, sorted by name.
pub fn definition_files(song_dir: &Path) -> Result<Vec<PathBuf>, SongFileError> {
    let mut files = Vec::new();
    for entry in fs::read_dir(song_dir)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let is_definition = path
            .extension()
            .map(|ext| ext.to_string_lossy().eq_ignore_ascii_case(DEFINITION_EXT))
            .unwrap_or(false);
        if is_definition {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Parses the song stored in `song_dir`.
///
/// Returns `Ok(None)` only when the directory holds no definition file. When
/// several exist, the first one longer than [`COMPLETE_FILE_MIN_LINES`] wins,
/// falling back to the first candidate.
pub fn load_song_dir(song_dir: &Path, root: &Path) -> Result<Option<SongRecord>, SongFileError> {
    let files = definition_files(song_dir)?;
    if files.is_empty() {
        debug!("No definition file in {}", song_dir.display());
        return Ok(None);
    }
    let text = select_definition_text(&files)?;
    Ok(Some(parse_song(&text, song_dir, root)))
}

fn select_definition_text(files: &[PathBuf]) -> Result<String, SongFileError> {
    let mut fallback: Option<String> = None;
    let mut last_err: Option<std::io::Error> = None;

    for path in files {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!("Failed to read {:?}: {}", path, err);
                last_err = Some(err);
                continue;
            }
        };
        let text = decode_detected(&bytes);
        if text.split('\n').count() > COMPLETE_FILE_MIN_LINES {
            return Ok(text);
        }
        if fallback.is_none() {
            fallback = Some(text);
        }
    }

    match (fallback, last_err) {
        (Some(text), _) => Ok(text),
        (None, Some(err)) => Err(err.into()),
        (None, None) => Ok(String::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn long_song(title: &str) -> String {
        let mut text = format!("#TITLE:{}\n#ARTIST:Band\n", title);
        for beat in 0..COMPLETE_FILE_MIN_LINES {
            text.push_str(&format!(": {} 1 0 la\n", beat));
        }
        text.push_str("E\n");
        text
    }

    #[test]
    fn empty_directory_yields_no_record() {
        let tmp = TempDir::new().unwrap();
        let song_dir = tmp.path().join("Empty");
        fs::create_dir_all(&song_dir).unwrap();
        fs::write(song_dir.join("song.mp3"), b"ID3").unwrap();
        assert!(load_song_dir(&song_dir, tmp.path()).unwrap().is_none());
    }

    #[test]
    fn stub_only_directory_uses_first_candidate() {
        let tmp = TempDir::new().unwrap();
        let song_dir = tmp.path().join("Band - Song");
        fs::create_dir_all(&song_dir).unwrap();
        fs::write(song_dir.join("a.txt"), "#TITLE:First\n#ARTIST:Band\n").unwrap();
        fs::write(song_dir.join("b.txt"), "#TITLE:Second\n#ARTIST:Band\n").unwrap();
        let song = load_song_dir(&song_dir, tmp.path()).unwrap().unwrap();
        assert_eq!(song.title, "First");
    }

    #[test]
    fn complete_file_beats_earlier_stub() {
        let tmp = TempDir::new().unwrap();
        let song_dir = tmp.path().join("Band - Song");
        fs::create_dir_all(&song_dir).unwrap();
        fs::write(song_dir.join("a [duet stub].txt"), "#TITLE:Stub\n#ARTIST:Band\n").unwrap();
        fs::write(song_dir.join("b.TXT"), long_song("Full")).unwrap();
        let song = load_song_dir(&song_dir, tmp.path()).unwrap().unwrap();
        assert_eq!(song.title, "Full");
        assert_eq!(song.lyric_words.len(), COMPLETE_FILE_MIN_LINES);
    }

    #[test]
    fn utf16_definition_is_decoded() {
        let tmp = TempDir::new().unwrap();
        let song_dir = tmp.path().join("Band - Lied");
        fs::create_dir_all(&song_dir).unwrap();
        let mut bytes = vec![0xFF, 0xFE];
        for unit in "#TITLE:Lied\n#ARTIST:Bänd\n#MP3:lied.mp3\n".encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        fs::write(song_dir.join("lied.txt"), bytes).unwrap();
        let song = load_song_dir(&song_dir, tmp.path()).unwrap().unwrap();
        assert_eq!(song.id, "Lied - Bänd");
        assert_eq!(song.audio_file.as_deref(), Some("Band - Lied/lied.mp3"));
    }

    #[test]
    fn missing_directory_is_an_error() {
        let tmp = TempDir::new().unwrap();
        assert!(load_song_dir(&tmp.path().join("gone"), tmp.path()).is_err());
    }
}
