//! Text decoding for song definition files.
//!
//! Files in the wild come as UTF-8, UTF-16 in either byte order or one of the
//! Western-European single-byte code pages. A detector label is mapped onto a
//! closed set of [`DecodeMode`]s; anything unknown decodes as UTF-8.

use chardetng::EncodingDetector;
use encoding_rs::{Encoding, UTF_16LE, WINDOWS_1252};
use tracing::debug;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecodeMode {
    Utf8,
    Utf16Le,
    Utf16Be,
    Latin1,
    Ascii,
}

/// Labels detectors report for Turkish single-byte text. Song files carrying
/// them are Western-European in practice.
const TURKISH_LABELS: &[&str] = &["iso-8859-9", "windows-1254"];

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

pub fn decode_mode_for_label(label: Option<&str>) -> DecodeMode {
    let label = match label.map(str::trim).filter(|value| !value.is_empty()) {
        Some(label) => label,
        None => return DecodeMode::Utf8,
    };
    let normalized = label.to_ascii_lowercase();
    if TURKISH_LABELS.contains(&normalized.as_str()) {
        debug!("Detected encoding {} treated as latin1", label);
        return DecodeMode::Latin1;
    }
    match normalized.as_str() {
        "utf-8" | "utf8" => DecodeMode::Utf8,
        "utf-16le" | "utf16le" => DecodeMode::Utf16Le,
        "utf-16be" | "utf16be" => DecodeMode::Utf16Be,
        "iso-8859-1" | "windows-1252" | "latin1" => DecodeMode::Latin1,
        "ascii" | "us-ascii" => DecodeMode::Ascii,
        _ => DecodeMode::Utf8,
    }
}

/// Guesses an encoding label for `bytes`. A byte order mark wins, otherwise
/// the guess comes from content statistics.
pub fn detect_label(bytes: &[u8]) -> Option<&'static str> {
    if let Some((encoding, _)) = Encoding::for_bom(bytes) {
        return Some(encoding.name());
    }
    if bytes.is_empty() {
        return None;
    }
    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    Some(detector.guess(None, true).name())
}

pub fn decode(bytes: &[u8], label: Option<&str>) -> String {
    match decode_mode_for_label(label) {
        DecodeMode::Utf8 => {
            let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
            String::from_utf8_lossy(bytes).into_owned()
        }
        DecodeMode::Utf16Le => decode_utf16le(bytes),
        DecodeMode::Utf16Be => decode_utf16le(&swap_byte_pairs(bytes)),
        DecodeMode::Latin1 => WINDOWS_1252
            .decode_without_bom_handling(bytes)
            .0
            .into_owned(),
        DecodeMode::Ascii => bytes.iter().map(|b| char::from(b & 0x7f)).collect(),
    }
}

pub fn decode_detected(bytes: &[u8]) -> String {
    let label = detect_label(bytes);
    debug!("Detected encoding {:?}", label);
    decode(bytes, label)
}

fn decode_utf16le(bytes: &[u8]) -> String {
    let (text, _) = UTF_16LE.decode_with_bom_removal(bytes);
    text.into_owned()
}

fn swap_byte_pairs(bytes: &[u8]) -> Vec<u8> {
    let mut swapped = Vec::with_capacity(bytes.len());
    for pair in bytes.chunks(2) {
        match pair {
            [hi, lo] => {
                swapped.push(*lo);
                swapped.push(*hi);
            }
            [single] => swapped.push(*single),
            _ => {}
        }
    }
    swapped
}
