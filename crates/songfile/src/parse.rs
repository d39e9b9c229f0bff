use std::fs;
use std::path::Path;

use common::{join_relpath, relpath_from, song_id, SongRecord};
use tracing::warn;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Tag {
    Artist,
    Title,
    Year,
    Creator,
    Genre,
    Language,
    Mp3,
    Video,
    Cover,
}

impl Tag {
    fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "artist" => Some(Tag::Artist),
            "title" => Some(Tag::Title),
            "year" => Some(Tag::Year),
            "creator" => Some(Tag::Creator),
            "genre" => Some(Tag::Genre),
            "language" => Some(Tag::Language),
            "mp3" => Some(Tag::Mp3),
            "video" => Some(Tag::Video),
            "cover" => Some(Tag::Cover),
            _ => None,
        }
    }
}

/// Note lines whose first field marks a section end or a duet player switch.
const SECTION_MARKERS: &[&str] = &["E", "P1", "P2"];
const MIN_LYRIC_FIELDS: usize = 4;
const SUSTAIN_MARKER: char = '~';

/// Parses decoded definition text for the song living in `song_dir` under `root`.
pub fn parse_song(text: &str, song_dir: &Path, root: &Path) -> SongRecord {
    let mut song = SongRecord::default();

    for line in text.split('\n') {
        let trimmed = line.trim();
        if let Some(header) = trimmed.strip_prefix('#') {
            if let Some((tag, value)) = split_tag(header) {
                apply_tag(&mut song, tag, value, song_dir, root);
            }
            continue;
        }

        if let Some(text) = lyric_text(line) {
            song.lyric_text
                .extend(text.chars().filter(|ch| *ch != SUSTAIN_MARKER));
            song.lyric_words.push(text.to_string());
        }
    }

    song.id = song_id(&song.title, &song.artist);
    if song.title.is_empty() || song.artist.is_empty() {
        warn!(
            "Song in {} is missing title or artist (id {:?})",
            song_dir.display(),
            song.id
        );
    }
    song
}

fn split_tag(header: &str) -> Option<(Tag, &str)> {
    let (name, value) = header.split_once(':')?;
    let tag = Tag::from_name(name)?;
    Some((tag, value.trim()))
}

fn apply_tag(song: &mut SongRecord, tag: Tag, value: &str, song_dir: &Path, root: &Path) {
    match tag {
        Tag::Artist => song.artist = value.to_string(),
        Tag::Title => song.title = value.to_string(),
        Tag::Year => song.year = parse_year(value),
        Tag::Creator => song.creator = non_empty(value),
        Tag::Genre => song.genre = non_empty(value),
        Tag::Language => song.language = non_empty(value),
        Tag::Video => song.video_file = non_empty(value),
        Tag::Mp3 => {
            song.audio_file = resolve_media_path(root, song_dir, value);
            if song.audio_file.is_none() && !value.is_empty() {
                warn!(
                    "Audio path {:?} in {} is outside the song root",
                    value,
                    song_dir.display()
                );
            }
        }
        Tag::Cover => song.cover_file = resolve_cover(root, song_dir, value),
    }
}

fn resolve_cover(root: &Path, song_dir: &Path, value: &str) -> Option<String> {
    if value.is_empty() {
        return None;
    }
    let relpath = match resolve_media_path(root, song_dir, value) {
        Some(relpath) => relpath,
        None => {
            warn!(
                "Cover path {:?} in {} is outside the song root",
                value,
                song_dir.display()
            );
            return None;
        }
    };
    let probe = join_relpath(root, &relpath).map(|path| fs::metadata(path).map(|m| m.is_file()));
    match probe {
        Some(Ok(true)) => Some(relpath),
        _ => {
            warn!("Cover file {} not found for {}", relpath, song_dir.display());
            None
        }
    }
}

/// Resolves a media reference from a definition file to a slash-separated
/// path relative to `root`. Relative values are taken from `song_dir`.
pub fn resolve_media_path(root: &Path, song_dir: &Path, value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    let normalized = value.replace('\\', "/");
    let candidate = Path::new(&normalized);
    let full = if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        song_dir.join(candidate)
    };
    relpath_from(root, &full).filter(|relpath| !relpath.is_empty())
}

/// Returns the lyric part of a note line, or `None` for lines that carry none.
fn lyric_text(line: &str) -> Option<&str> {
    let fields: Vec<&str> = line.splitn(MIN_LYRIC_FIELDS + 1, ' ').collect();
    if fields.len() < MIN_LYRIC_FIELDS {
        return None;
    }
    if SECTION_MARKERS.contains(&fields[0]) {
        return None;
    }
    Some(fields.get(MIN_LYRIC_FIELDS).map(|text| text.trim()).unwrap_or(""))
}

fn parse_year(text: &str) -> Option<i32> {
    let digits: String = text
        .trim()
        .chars()
        .take_while(|ch| ch.is_ascii_digit())
        .collect();
    if digits.is_empty() {
        None
    } else {
        digits.parse().ok()
    }
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}
