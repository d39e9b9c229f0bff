use std::collections::{HashMap, HashSet};

use common::{MatchResult, SongRecord, StrippedTrack};

const STRIPPED_CHARS: &[char] = &[
    '.', ',', '(', ')', '{', '}', '+', '&', '-', '_', '|', '*', '@', '!', '\'',
];

/// Lowercases, drops punctuation and collapses whitespace.
pub fn normalize_value(value: &str) -> String {
    let lowered = value.to_lowercase();
    let stripped: String = lowered
        .chars()
        .filter(|ch| !STRIPPED_CHARS.contains(ch))
        .collect();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// True when both sides are non-empty and one contains the other.
pub fn is_containment_match(left: &str, right: &str) -> bool {
    if left.is_empty() || right.is_empty() {
        return false;
    }
    left.contains(right) || right.contains(left)
}

struct NormalizedSong<'a> {
    title: String,
    artist: String,
    song: &'a SongRecord,
}

/// Pairs each playlist track with the first local song whose title and
/// artist both match. Tracks without a match are left out.
pub fn match_playlist_to_local(tracks: &[StrippedTrack], songs: &[SongRecord]) -> Vec<MatchResult> {
    let local: Vec<NormalizedSong<'_>> = songs
        .iter()
        .filter(|song| !song.title.is_empty() && !song.artist.is_empty())
        .map(|song| NormalizedSong {
            title: normalize_value(&song.title),
            artist: normalize_value(&song.artist),
            song,
        })
        .collect();

    let mut results = Vec::new();
    for track in tracks {
        if track.name.is_empty() || track.artist.is_empty() {
            continue;
        }
        let title = normalize_value(&track.name);
        let artist = normalize_value(&track.artist);
        if title.is_empty() || artist.is_empty() {
            continue;
        }
        let found = local.iter().find(|candidate| {
            is_containment_match(&title, &candidate.title)
                && is_containment_match(&artist, &candidate.artist)
        });
        if let Some(candidate) = found {
            results.push(MatchResult {
                track: track.clone(),
                local: candidate.song.local(),
            });
        }
    }
    results
}

fn intersection_key(track: &StrippedTrack) -> String {
    format!(
        "{}|{}",
        track.name.to_lowercase().trim(),
        track.artist.to_lowercase().trim()
    )
}

fn keyed_tracks(tracks: &[StrippedTrack]) -> Vec<(String, &StrippedTrack)> {
    let mut seen = HashSet::new();
    tracks
        .iter()
        .filter(|track| !track.name.is_empty() && !track.artist.is_empty())
        .filter_map(|track| {
            let key = intersection_key(track);
            if seen.insert(key.clone()) {
                Some((key, track))
            } else {
                None
            }
        })
        .collect()
}

/// Tracks present in both playlists by exact name and artist. Each key
/// appears once, taken from its first occurrence in `first`.
pub fn intersect_playlists(
    first: &[StrippedTrack],
    second: &[StrippedTrack],
) -> Vec<StrippedTrack> {
    let other: HashMap<String, &StrippedTrack> = keyed_tracks(second).into_iter().collect();
    keyed_tracks(first)
        .into_iter()
        .filter(|(key, _)| other.contains_key(key))
        .map(|(_, track)| track.clone())
        .collect()
}
