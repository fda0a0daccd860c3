//! Local media access — the narrow capability builders need to read what
//! the user picked or captured.

use std::path::{Path, PathBuf};

use image::DynamicImage;

use crate::store::MediaReader;

#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("unsupported media uri: {0}")]
    UnsupportedUri(String),
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Reads media referenced by a source URI.
#[async_trait::async_trait]
pub trait MediaSource: Send + Sync {
    /// Whole contents, for images.
    async fn read_bytes(&self, uri: &str) -> Result<Vec<u8>, MediaError>;

    /// Streaming reader, for video.
    async fn open_stream(&self, uri: &str) -> Result<MediaReader, MediaError>;

    /// Poster frame for a video, when the source can produce one.
    async fn thumbnail(&self, _uri: &str) -> Option<DynamicImage> {
        None
    }
}

/// Filesystem-backed source for `file://` URIs and plain paths.
#[derive(Debug, Clone, Default)]
pub struct FsMediaSource;

#[async_trait::async_trait]
impl MediaSource for FsMediaSource {
    async fn read_bytes(&self, uri: &str) -> Result<Vec<u8>, MediaError> {
        let path = uri_to_path(uri)?;
        tokio::fs::read(&path)
            .await
            .map_err(|source| MediaError::Io { path, source })
    }

    async fn open_stream(&self, uri: &str) -> Result<MediaReader, MediaError> {
        let path = uri_to_path(uri)?;
        let file = tokio::fs::File::open(&path)
            .await
            .map_err(|source| MediaError::Io { path, source })?;
        Ok(Box::new(file))
    }
}

/// Resolve `file://...` or a bare path. Other schemes are rejected.
///
/// # Errors
///
/// Returns `UnsupportedUri` for empty input or a non-file scheme.
pub fn uri_to_path(uri: &str) -> Result<PathBuf, MediaError> {
    if let Some(rest) = uri.strip_prefix("file://") {
        if rest.is_empty() {
            return Err(MediaError::UnsupportedUri(uri.to_string()));
        }
        return Ok(PathBuf::from(rest));
    }
    if uri.is_empty() || uri.contains("://") {
        return Err(MediaError::UnsupportedUri(uri.to_string()));
    }
    Ok(PathBuf::from(uri))
}

/// MIME type sent with an upload, guessed from the file extension.
#[must_use]
pub fn content_type(uri: &str) -> &'static str {
    let ext = Path::new(uri)
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "mp4" | "m4v" => "video/mp4",
        "mov" => "video/quicktime",
        "webm" => "video/webm",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
#[path = "source_test.rs"]
mod tests;
