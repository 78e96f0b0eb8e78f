use percent_encoding::percent_decode_str;
use thiserror::Error;

use crate::model::coordinate::StorageCoordinate;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("malformed object path: {0:?}")]
    MalformedPath(String),

    #[error("path is not valid utf-8 once decoded: {0:?}")]
    InvalidEncoding(String),
}

/// Percent-decodes a request path so names with spaces, reserved or
/// non-ASCII characters reach the store as they are stored.
pub fn decode(path: &str) -> Result<String, ParseError> {
    percent_decode_str(path)
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
        .map_err(|_| ParseError::InvalidEncoding(path.to_string()))
}

/// Splits a URL path into a storage coordinate.
///
/// `/` lists containers, `/{container}` lists items, and anything deeper is an
/// item whose name keeps its inner slashes. No character validation happens
/// here; the store decides what exists.
pub fn resolve(path: &str) -> Result<StorageCoordinate, ParseError> {
    if path.is_empty() {
        return Err(ParseError::MalformedPath(path.to_string()));
    }

    if path == "/" {
        return Ok(StorageCoordinate::default());
    }

    let rest = path.strip_prefix('/').unwrap_or(path);

    Ok(match rest.split_once('/') {
        None => StorageCoordinate::new(rest, ""),
        Some((container, item)) => StorageCoordinate::new(container, item),
    })
}
