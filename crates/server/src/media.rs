use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::Response;
use common::join_relpath;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;

use crate::utils::json_error_response;

pub const AUDIO_EXTENSIONS: &[&str] = &["mp3"];
pub const COVER_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "gif"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeError {
    Invalid,
    Unsatisfiable,
}

/// Parses a single `bytes=` range against a body of `size` bytes. The end
/// is clamped to the last byte.
pub fn parse_range_header(value: &str, size: u64) -> Result<ByteRange, RangeError> {
    let ranges = value
        .trim()
        .strip_prefix("bytes=")
        .ok_or(RangeError::Invalid)?;
    if ranges.contains(',') {
        return Err(RangeError::Invalid);
    }
    if size == 0 {
        return Err(RangeError::Unsatisfiable);
    }
    let (start, end) = ranges.split_once('-').ok_or(RangeError::Invalid)?;
    let (start, end) = (start.trim(), end.trim());
    let last = size - 1;

    if start.is_empty() {
        let suffix: u64 = end.parse().map_err(|_| RangeError::Invalid)?;
        if suffix == 0 {
            return Err(RangeError::Unsatisfiable);
        }
        return Ok(ByteRange {
            start: size.saturating_sub(suffix),
            end: last,
        });
    }

    let start: u64 = start.parse().map_err(|_| RangeError::Invalid)?;
    let end: u64 = if end.is_empty() {
        last
    } else {
        end.parse().map_err(|_| RangeError::Invalid)?
    };
    if start > last {
        return Err(RangeError::Unsatisfiable);
    }
    if end < start {
        return Err(RangeError::Invalid);
    }
    Ok(ByteRange {
        start,
        end: end.min(last),
    })
}

#[derive(Debug, PartialEq, Eq)]
pub enum MediaError {
    Missing,
    BadExtension,
    Forbidden,
    NotFound,
}

impl MediaError {
    pub fn response(self, kind: &str) -> Response {
        let (status, message) = match self {
            MediaError::Missing => (StatusCode::BAD_REQUEST, format!("Missing {} path", kind)),
            MediaError::BadExtension => (StatusCode::BAD_REQUEST, format!("Invalid {} file", kind)),
            MediaError::Forbidden => (StatusCode::FORBIDDEN, format!("Invalid {} path", kind)),
            MediaError::NotFound => (StatusCode::NOT_FOUND, format!("{} file not found", kind)),
        };
        json_error_response(status, message)
    }
}

pub fn has_allowed_extension(relpath: &str, allowed: &[&str]) -> bool {
    Path::new(relpath)
        .extension()
        .map(|ext| {
            let ext = ext.to_string_lossy();
            allowed.iter().any(|allowed| ext.eq_ignore_ascii_case(allowed))
        })
        .unwrap_or(false)
}

/// Resolves a root-relative media path to an existing file under one of
/// `roots`, tried in order.
pub fn resolve_media_file(
    roots: &[PathBuf],
    relpath: &str,
    allowed: &[&str],
) -> Result<PathBuf, MediaError> {
    let relpath = relpath.trim();
    if relpath.is_empty() {
        return Err(MediaError::Missing);
    }
    if !has_allowed_extension(relpath, allowed) {
        return Err(MediaError::BadExtension);
    }
    let mut confined = false;
    for root in roots {
        let Some(path) = join_relpath(root, relpath) else {
            continue;
        };
        confined = true;
        if path.is_file() {
            return Ok(path);
        }
    }
    if confined {
        Err(MediaError::NotFound)
    } else {
        Err(MediaError::Forbidden)
    }
}

/// Streams `path`, honouring a `Range` request header.
pub async fn file_response(path: &Path, content_type: &str, headers: &HeaderMap) -> Response {
    let mut file = match tokio::fs::File::open(path).await {
        Ok(file) => file,
        Err(_) => return json_error_response(StatusCode::NOT_FOUND, "file not found"),
    };
    let size = match file.metadata().await {
        Ok(meta) => meta.len(),
        Err(err) => {
            return json_error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("failed to stat file: {}", err),
            )
        }
    };
    let content_type = HeaderValue::from_str(content_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));

    let range = headers
        .get(header::RANGE)
        .and_then(|value| value.to_str().ok())
        .map(|value| parse_range_header(value, size));

    let range = match range {
        None => None,
        Some(Ok(range)) => Some(range),
        Some(Err(_)) => {
            let mut response = Response::new(Body::empty());
            *response.status_mut() = StatusCode::RANGE_NOT_SATISFIABLE;
            if let Ok(value) = HeaderValue::from_str(&format!("bytes */{}", size)) {
                response.headers_mut().insert(header::CONTENT_RANGE, value);
            }
            return response;
        }
    };

    let (status, length, body) = match range {
        Some(range) => {
            if let Err(err) = file.seek(SeekFrom::Start(range.start)).await {
                return json_error_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("failed to seek: {}", err),
                );
            }
            let stream = ReaderStream::new(file.take(range.len()));
            (StatusCode::PARTIAL_CONTENT, range.len(), Body::from_stream(stream))
        }
        None => (StatusCode::OK, size, Body::from_stream(ReaderStream::new(file))),
    };

    let mut response = Response::new(body);
    *response.status_mut() = status;
    let out = response.headers_mut();
    out.insert(header::CONTENT_TYPE, content_type);
    out.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
    out.insert(header::CONTENT_LENGTH, HeaderValue::from(length));
    if let Some(range) = range {
        if let Ok(value) =
            HeaderValue::from_str(&format!("bytes {}-{}/{}", range.start, range.end, size))
        {
            out.insert(header::CONTENT_RANGE, value);
        }
    }
    response
}
