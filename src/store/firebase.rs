//! Firebase REST adapters for the box and media stores.
//!
//! DESIGN
//! ======
//! Thin HTTP wrappers: the Realtime Database holds box records under
//! `canvas/{canvas_id}/boxes/{box_id}`, Storage holds media objects. URL
//! building and response parsing are pure functions for testability.
//!
//! Neither client retries; the caller decides what a failure means.

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::Url;
use tokio_util::io::ReaderStream;
use tracing::debug;

use super::{BoxStore, MediaReader, MediaStore, StoreError};
use crate::config::FirebaseConfig;
use crate::model::CanvasBox;

const REQUEST_TIMEOUT_SECS: u64 = 60;
const CONNECT_TIMEOUT_SECS: u64 = 10;

fn build_http(request_timeout: Option<Duration>) -> Result<reqwest::Client, StoreError> {
    let mut builder = reqwest::Client::builder().connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS));
    if let Some(timeout) = request_timeout {
        builder = builder.timeout(timeout);
    }
    builder
        .build()
        .map_err(|e| StoreError::HttpClientBuild(e.to_string()))
}

async fn read_body(response: reqwest::Response) -> Result<String, StoreError> {
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| StoreError::Request(e.to_string()))?;
    if !status.is_success() {
        return Err(StoreError::Status { status: status.as_u16(), body: text });
    }
    Ok(text)
}

// =============================================================================
// REALTIME DATABASE
// =============================================================================

/// Box store over the Realtime Database REST API.
pub struct FirebaseBoxStore {
    http: reqwest::Client,
    database_url: String,
    auth_token: Option<String>,
}

impl FirebaseBoxStore {
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn new(config: &FirebaseConfig) -> Result<Self, StoreError> {
        Ok(Self {
            http: build_http(Some(Duration::from_secs(REQUEST_TIMEOUT_SECS)))?,
            database_url: config.database_url.clone(),
            auth_token: config.auth_token.clone(),
        })
    }

    fn boxes_url(&self, canvas_id: &str) -> Result<Url, StoreError> {
        record_url(&self.database_url, self.auth_token.as_deref(), &["canvas", canvas_id, "boxes"])
    }

    fn box_url(&self, canvas_id: &str, box_id: &str) -> Result<Url, StoreError> {
        record_url(&self.database_url, self.auth_token.as_deref(), &["canvas", canvas_id, "boxes", box_id])
    }
}

#[async_trait::async_trait]
impl BoxStore for FirebaseBoxStore {
    async fn read_all(&self, canvas_id: &str) -> Result<Vec<CanvasBox>, StoreError> {
        let url = self.boxes_url(canvas_id)?;
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| StoreError::Request(e.to_string()))?;
        let text = read_body(response).await?;
        let boxes = parse_boxes(&text)?;
        debug!(canvas_id, count = boxes.len(), "read canvas boxes");
        Ok(boxes)
    }

    async fn write(&self, canvas_id: &str, canvas_box: &CanvasBox) -> Result<(), StoreError> {
        let url = self.box_url(canvas_id, &canvas_box.id)?;
        let response = self
            .http
            .put(url)
            .json(canvas_box)
            .send()
            .await
            .map_err(|e| StoreError::Request(e.to_string()))?;
        read_body(response).await?;
        Ok(())
    }

    async fn delete(&self, canvas_id: &str, box_id: &str) -> Result<(), StoreError> {
        let url = self.box_url(canvas_id, box_id)?;
        let response = self
            .http
            .delete(url)
            .send()
            .await
            .map_err(|e| StoreError::Request(e.to_string()))?;
        read_body(response).await?;
        Ok(())
    }
}

/// Build `{base}/{segments...}.json`, with `auth` when a token is set.
pub(crate) fn record_url(base: &str, auth_token: Option<&str>, segments: &[&str]) -> Result<Url, StoreError> {
    let mut url = Url::parse(base).map_err(|e| StoreError::InvalidUrl(format!("{base}: {e}")))?;
    {
        let mut path = url
            .path_segments_mut()
            .map_err(|()| StoreError::InvalidUrl(base.to_string()))?;
        path.pop_if_empty();
        if let Some((last, parents)) = segments.split_last() {
            path.extend(parents);
            path.push(&format!("{last}.json"));
        }
    }
    if let Some(token) = auth_token {
        url.query_pairs_mut().append_pair("auth", token);
    }
    Ok(url)
}

/// Parse a `boxes` node: `null` or an object keyed by box id. Records come
/// back ordered by key.
pub(crate) fn parse_boxes(json: &str) -> Result<Vec<CanvasBox>, StoreError> {
    let node: Option<BTreeMap<String, CanvasBox>> =
        serde_json::from_str(json).map_err(|e| StoreError::Parse(e.to_string()))?;
    Ok(node
        .unwrap_or_default()
        .into_iter()
        .map(|(id, mut canvas_box)| {
            canvas_box.id = id;
            canvas_box
        })
        .collect())
}

// =============================================================================
// STORAGE
// =============================================================================

/// Media store over the Firebase Storage REST API.
///
/// Uploads carry no request timeout; a slow video upload runs until the
/// connection drops or the session cancels it.
pub struct FirebaseMediaStore {
    http: reqwest::Client,
    storage_url: String,
    bucket: String,
    auth_token: Option<String>,
}

#[derive(serde::Deserialize)]
struct UploadResponse {
    name: String,
    #[serde(default, rename = "downloadTokens")]
    download_tokens: Option<String>,
}

impl FirebaseMediaStore {
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn new(config: &FirebaseConfig) -> Result<Self, StoreError> {
        Ok(Self {
            http: build_http(None)?,
            storage_url: config.storage_url.clone(),
            bucket: config.bucket.clone(),
            auth_token: config.auth_token.clone(),
        })
    }

    fn objects_url(&self) -> Result<Url, StoreError> {
        objects_url(&self.storage_url, &self.bucket)
    }

    async fn upload(&self, name: &str, content_type: &str, body: reqwest::Body) -> Result<String, StoreError> {
        let mut url = self.objects_url()?;
        url.query_pairs_mut()
            .append_pair("uploadType", "media")
            .append_pair("name", name);

        let mut request = self
            .http
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(body);
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }
        let response = request
            .send()
            .await
            .map_err(|e| StoreError::Request(e.to_string()))?;
        let text = read_body(response).await?;
        let url = download_url(&self.storage_url, &self.bucket, &text)?;
        debug!(name, "media uploaded");
        Ok(url)
    }
}

#[async_trait::async_trait]
impl MediaStore for FirebaseMediaStore {
    async fn upload_bytes(&self, name: &str, content_type: &str, bytes: Vec<u8>) -> Result<String, StoreError> {
        self.upload(name, content_type, reqwest::Body::from(bytes))
            .await
    }

    async fn upload_stream(&self, name: &str, content_type: &str, reader: MediaReader) -> Result<String, StoreError> {
        let body = reqwest::Body::wrap_stream(ReaderStream::new(reader));
        self.upload(name, content_type, body).await
    }

    async fn delete_by_url(&self, url: &str) -> Result<(), StoreError> {
        let target = object_url_from_download(&self.storage_url, &self.bucket, url)?;
        let mut request = self.http.delete(target);
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }
        let response = request
            .send()
            .await
            .map_err(|e| StoreError::Request(e.to_string()))?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            debug!(url, "media object already gone");
            return Ok(());
        }
        read_body(response).await?;
        Ok(())
    }
}

/// `{storage}/v0/b/{bucket}/o`
pub(crate) fn objects_url(storage_url: &str, bucket: &str) -> Result<Url, StoreError> {
    let mut url = Url::parse(storage_url).map_err(|e| StoreError::InvalidUrl(format!("{storage_url}: {e}")))?;
    url.path_segments_mut()
        .map_err(|()| StoreError::InvalidUrl(storage_url.to_string()))?
        .pop_if_empty()
        .extend(["v0", "b", bucket, "o"]);
    Ok(url)
}

/// Turn an upload response into the object's download URL. The object name
/// is one path segment, so its slashes are percent-encoded.
pub(crate) fn download_url(storage_url: &str, bucket: &str, upload_json: &str) -> Result<String, StoreError> {
    let upload: UploadResponse = serde_json::from_str(upload_json).map_err(|e| StoreError::Parse(e.to_string()))?;
    let mut url = objects_url(storage_url, bucket)?;
    url.path_segments_mut()
        .map_err(|()| StoreError::InvalidUrl(storage_url.to_string()))?
        .push(&upload.name);
    {
        let mut query = url.query_pairs_mut();
        query.append_pair("alt", "media");
        let token = upload
            .download_tokens
            .as_deref()
            .and_then(|tokens| tokens.split(',').next())
            .filter(|t| !t.is_empty());
        if let Some(token) = token {
            query.append_pair("token", token);
        }
    }
    Ok(url.to_string())
}

/// Strip a download URL back to its object URL, rejecting URLs that point
/// anywhere but this bucket.
pub(crate) fn object_url_from_download(storage_url: &str, bucket: &str, download: &str) -> Result<Url, StoreError> {
    let prefix = objects_url(storage_url, bucket)?;
    let mut url = Url::parse(download).map_err(|e| StoreError::InvalidUrl(format!("{download}: {e}")))?;
    let prefix_path = format!("{}/", prefix.path());
    let same_origin = url.origin() == prefix.origin();
    let has_object = url
        .path()
        .strip_prefix(&prefix_path)
        .is_some_and(|rest| !rest.is_empty() && !rest.contains('/'));
    if !same_origin || !has_object {
        return Err(StoreError::ForeignUrl(download.to_string()));
    }
    url.set_query(None);
    Ok(url)
}

#[cfg(test)]
#[path = "firebase_test.rs"]
mod tests;
