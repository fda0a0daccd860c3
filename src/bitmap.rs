//! Bitmap cache — media URL to decoded raster, filled lazily, never evicted.
//!
//! DESIGN
//! ======
//! `load_image` is the only path that touches the network. It skips empty
//! keys, the upload sentinel, cached URLs and URLs already being fetched,
//! so repeated triggers cost nothing once an image is in. Failures are
//! logged and leave no trace: the next trigger retries from scratch.
//!
//! Every insert bumps a revision counter that the drawing surface can watch
//! to know when to redraw.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;

use image::DynamicImage;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::config::FetchTimeouts;
use crate::model::{CanvasBox, UPLOADING};

#[derive(Debug, thiserror::Error)]
pub enum BitmapError {
    #[error("fetch failed: {0}")]
    Fetch(String),
    #[error("unexpected status {0}")]
    Status(u16),
    #[error("decode failed: {0}")]
    Decode(String),
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

// =============================================================================
// FETCHER
// =============================================================================

/// Downloads the raw bytes behind a media URL.
#[async_trait::async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, BitmapError>;
}

/// HTTP fetcher with separate connect and read bounds.
pub struct HttpImageFetcher {
    http: reqwest::Client,
}

impl HttpImageFetcher {
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn new(timeouts: FetchTimeouts) -> Result<Self, BitmapError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(timeouts.connect_secs))
            .read_timeout(Duration::from_secs(timeouts.read_secs))
            .build()
            .map_err(|e| BitmapError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http })
    }
}

#[async_trait::async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, BitmapError> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| BitmapError::Fetch(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(BitmapError::Status(status.as_u16()));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| BitmapError::Fetch(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

/// Decode encoded image bytes on the blocking pool.
///
/// # Errors
///
/// Returns `Decode` if the format is unknown or the data is corrupt.
pub async fn decode(bytes: Vec<u8>) -> Result<DynamicImage, BitmapError> {
    tokio::task::spawn_blocking(move || image::load_from_memory(&bytes))
        .await
        .map_err(|e| BitmapError::Decode(e.to_string()))?
        .map_err(|e| BitmapError::Decode(e.to_string()))
}

// =============================================================================
// CACHE
// =============================================================================

/// Decoded bitmaps keyed by media URL. A video poster captured before its
/// upload finishes is keyed by the box id instead and moved to the URL with
/// [`rekey`](Self::rekey); [`for_box`](Self::for_box) resolves either key.
pub struct BitmapCache {
    fetcher: Arc<dyn ImageFetcher>,
    entries: RwLock<HashMap<String, Arc<DynamicImage>>>,
    in_flight: Mutex<HashSet<String>>,
    revision: watch::Sender<u64>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Clears an in-flight mark when the load finishes or is dropped.
struct InFlight<'a> {
    cache: &'a BitmapCache,
    url: String,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        lock(&self.cache.in_flight).remove(&self.url);
    }
}

impl BitmapCache {
    #[must_use]
    pub fn new(fetcher: Arc<dyn ImageFetcher>) -> Self {
        let (revision, _) = watch::channel(0);
        Self { fetcher, entries: RwLock::new(HashMap::new()), in_flight: Mutex::new(HashSet::new()), revision }
    }

    /// Fetch, decode and cache `url` unless there is nothing to do.
    /// Returns `true` only when this call added the bitmap.
    pub async fn load_image(&self, url: &str) -> bool {
        if url.is_empty() || url == UPLOADING || self.contains(url) {
            return false;
        }
        if !lock(&self.in_flight).insert(url.to_string()) {
            debug!(url, "bitmap load already in flight");
            return false;
        }
        let _in_flight = InFlight { cache: self, url: url.to_string() };

        match self.fetch_and_decode(url).await {
            Ok(image) => {
                debug!(url, width = image.width(), height = image.height(), "bitmap cached");
                self.insert(url, image);
                true
            }
            Err(e) => {
                warn!(url, error = %e, "bitmap load failed");
                false
            }
        }
    }

    async fn fetch_and_decode(&self, url: &str) -> Result<DynamicImage, BitmapError> {
        let bytes = self.fetcher.fetch(url).await?;
        decode(bytes).await
    }

    /// Store an already-decoded bitmap, replacing any previous entry.
    pub fn insert(&self, key: &str, image: impl Into<Arc<DynamicImage>>) {
        self.write_entries()
            .insert(key.to_string(), image.into());
        self.bump();
    }

    /// Move an entry to a new key. No-op if `from` is absent.
    pub fn rekey(&self, from: &str, to: &str) {
        let moved = {
            let mut entries = self.write_entries();
            match entries.remove(from) {
                Some(image) => {
                    entries.insert(to.to_string(), image);
                    true
                }
                None => false,
            }
        };
        if moved {
            self.bump();
        }
    }

    pub fn remove(&self, key: &str) -> Option<Arc<DynamicImage>> {
        let removed = self.write_entries().remove(key);
        if removed.is_some() {
            self.bump();
        }
        removed
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<Arc<DynamicImage>> {
        self.read_entries().get(key).cloned()
    }

    /// Bitmap to draw for `canvas_box`: its URL entry, or the box-id entry
    /// while the box is still a placeholder.
    #[must_use]
    pub fn for_box(&self, canvas_box: &CanvasBox) -> Option<Arc<DynamicImage>> {
        let key = if canvas_box.is_placeholder() { &canvas_box.id } else { &canvas_box.data };
        self.get(key)
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.read_entries().contains_key(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.read_entries().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read_entries().is_empty()
    }

    /// Watch the cache revision; it changes whenever an entry does.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    fn bump(&self) {
        self.revision.send_modify(|rev| *rev = rev.wrapping_add(1));
    }

    fn read_entries(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Arc<DynamicImage>>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_entries(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Arc<DynamicImage>>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
#[path = "bitmap_test.rs"]
mod tests;
