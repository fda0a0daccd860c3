//! In-process stores. Back the CLI's `--offline` mode and every session test.
//!
//! Both stores can be told to fail their next operations, and the media
//! store can hold uploads open until released, so rollback and cancellation
//! paths are reachable without a network.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::io::AsyncReadExt;
use tokio::sync::watch;

use super::{BoxStore, MediaReader, MediaStore, StoreError};
use crate::model::CanvasBox;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn injected(op: &str) -> StoreError {
    StoreError::Status { status: 503, body: format!("injected {op} failure") }
}

// =============================================================================
// BOX STORE
// =============================================================================

#[derive(Default)]
pub struct InMemoryBoxStore {
    canvases: Mutex<HashMap<String, BTreeMap<String, CanvasBox>>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    fail_deletes: AtomicBool,
    writes: AtomicUsize,
}

impl InMemoryBoxStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Put a record directly, bypassing the write counter.
    pub fn seed(&self, canvas_id: &str, canvas_box: CanvasBox) {
        lock(&self.canvases)
            .entry(canvas_id.to_string())
            .or_default()
            .insert(canvas_box.id.clone(), canvas_box);
    }

    #[must_use]
    pub fn get(&self, canvas_id: &str, box_id: &str) -> Option<CanvasBox> {
        lock(&self.canvases)
            .get(canvas_id)
            .and_then(|boxes| boxes.get(box_id).cloned())
    }

    /// Number of records stored for a canvas.
    #[must_use]
    pub fn count(&self, canvas_id: &str) -> usize {
        lock(&self.canvases)
            .get(canvas_id)
            .map_or(0, BTreeMap::len)
    }

    /// Number of successful writes so far.
    #[must_use]
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl BoxStore for InMemoryBoxStore {
    async fn read_all(&self, canvas_id: &str) -> Result<Vec<CanvasBox>, StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(injected("read"));
        }
        Ok(lock(&self.canvases)
            .get(canvas_id)
            .map(|boxes| boxes.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn write(&self, canvas_id: &str, canvas_box: &CanvasBox) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(injected("write"));
        }
        self.seed(canvas_id, canvas_box.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn delete(&self, canvas_id: &str, box_id: &str) -> Result<(), StoreError> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(injected("delete"));
        }
        if let Some(boxes) = lock(&self.canvases).get_mut(canvas_id) {
            boxes.remove(box_id);
        }
        Ok(())
    }
}

// =============================================================================
// MEDIA STORE
// =============================================================================

/// Media store keeping uploaded bytes by URL.
///
/// URLs are `{base_url}{object name}` unless scripted with [`queue_url`].
///
/// [`queue_url`]: InMemoryMediaStore::queue_url
pub struct InMemoryMediaStore {
    base_url: String,
    objects: Mutex<HashMap<String, Vec<u8>>>,
    scripted_urls: Mutex<VecDeque<String>>,
    fail_uploads: AtomicBool,
    fail_deletes: AtomicBool,
    deletes: AtomicUsize,
    gate: watch::Sender<bool>,
}

impl Default for InMemoryMediaStore {
    fn default() -> Self {
        Self::new("https://media.local/")
    }
}

impl InMemoryMediaStore {
    #[must_use]
    pub fn new(base_url: &str) -> Self {
        let (gate, _) = watch::channel(true);
        Self {
            base_url: base_url.to_string(),
            objects: Mutex::new(HashMap::new()),
            scripted_urls: Mutex::new(VecDeque::new()),
            fail_uploads: AtomicBool::new(false),
            fail_deletes: AtomicBool::new(false),
            deletes: AtomicUsize::new(0),
            gate,
        }
    }

    /// Make the next upload return `url` instead of a generated one.
    pub fn queue_url(&self, url: &str) {
        lock(&self.scripted_urls).push_back(url.to_string());
    }

    pub fn fail_uploads(&self, fail: bool) {
        self.fail_uploads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    /// Block uploads at their start until [`release_uploads`] is called.
    ///
    /// [`release_uploads`]: InMemoryMediaStore::release_uploads
    pub fn hold_uploads(&self) {
        self.gate.send_replace(false);
    }

    pub fn release_uploads(&self) {
        self.gate.send_replace(true);
    }

    #[must_use]
    pub fn contains(&self, url: &str) -> bool {
        lock(&self.objects).contains_key(url)
    }

    #[must_use]
    pub fn bytes(&self, url: &str) -> Option<Vec<u8>> {
        lock(&self.objects).get(url).cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.objects).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        lock(&self.objects).is_empty()
    }

    /// Number of delete calls that reached the store.
    #[must_use]
    pub fn deletes(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    async fn store(&self, name: &str, bytes: Vec<u8>) -> Result<String, StoreError> {
        let mut gate = self.gate.subscribe();
        let opened = gate.wait_for(|open| *open).await.is_ok();
        if !opened {
            return Err(StoreError::Request("media store dropped".into()));
        }
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(injected("upload"));
        }
        let url = lock(&self.scripted_urls)
            .pop_front()
            .unwrap_or_else(|| format!("{}{name}", self.base_url));
        lock(&self.objects).insert(url.clone(), bytes);
        Ok(url)
    }
}

#[async_trait::async_trait]
impl MediaStore for InMemoryMediaStore {
    async fn upload_bytes(&self, name: &str, _content_type: &str, bytes: Vec<u8>) -> Result<String, StoreError> {
        self.store(name, bytes).await
    }

    async fn upload_stream(
        &self,
        name: &str,
        _content_type: &str,
        mut reader: MediaReader,
    ) -> Result<String, StoreError> {
        let mut bytes = Vec::new();
        reader
            .read_to_end(&mut bytes)
            .await
            .map_err(|e| StoreError::Request(e.to_string()))?;
        self.store(name, bytes).await
    }

    async fn delete_by_url(&self, url: &str) -> Result<(), StoreError> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(injected("media delete"));
        }
        lock(&self.objects).remove(url);
        Ok(())
    }
}
