//! Remote persistence — box records and media bytes.
//!
//! ARCHITECTURE
//! ============
//! The session only talks to the two traits below. `firebase` implements
//! them over the Realtime Database and Storage REST APIs; `memory` keeps
//! everything in process for tests and offline use.

pub mod firebase;
pub mod memory;

use tokio::io::AsyncRead;

use crate::model::CanvasBox;

/// Byte stream handed to [`MediaStore::upload_stream`].
pub type MediaReader = Box<dyn AsyncRead + Send + Sync + Unpin>;

/// Errors produced by the remote stores.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The request never produced a response (connect, TLS, timeout).
    #[error("request failed: {0}")]
    Request(String),

    /// The service answered with a non-success status.
    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body could not be decoded.
    #[error("response parse failed: {0}")]
    Parse(String),

    /// A base or record URL could not be built.
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    /// A media URL did not point into this store.
    #[error("not a media url of this store: {0}")]
    ForeignUrl(String),

    /// The HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

/// Keyed document store: canvas id -> box id -> box record.
#[async_trait::async_trait]
pub trait BoxStore: Send + Sync {
    /// Read every box of a canvas. An absent canvas reads as empty.
    async fn read_all(&self, canvas_id: &str) -> Result<Vec<CanvasBox>, StoreError>;

    /// Create or overwrite one box record.
    async fn write(&self, canvas_id: &str, canvas_box: &CanvasBox) -> Result<(), StoreError>;

    /// Delete one box record. Deleting an absent record succeeds.
    async fn delete(&self, canvas_id: &str, box_id: &str) -> Result<(), StoreError>;
}

/// Object store for uploaded media. Every upload yields a retrieval URL.
#[async_trait::async_trait]
pub trait MediaStore: Send + Sync {
    async fn upload_bytes(&self, name: &str, content_type: &str, bytes: Vec<u8>) -> Result<String, StoreError>;

    async fn upload_stream(&self, name: &str, content_type: &str, reader: MediaReader) -> Result<String, StoreError>;

    async fn delete_by_url(&self, url: &str) -> Result<(), StoreError>;
}

/// Object name for an image box's bytes.
#[must_use]
pub fn image_object_name(box_id: &str) -> String {
    format!("media/images/{box_id}")
}

/// Object name for a video box's stream.
#[must_use]
pub fn video_object_name(box_id: &str) -> String {
    format!("media/videos/{box_id}.mp4")
}
