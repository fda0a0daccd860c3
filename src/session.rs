//! Canvas session — one open canvas and all work started on its behalf.
//!
//! DESIGN
//! ======
//! `CanvasSession` owns the box collection, placement mode, selection and
//! editing flag of one canvas behind a single async lock. Locks are never
//! held across remote calls: a mutation takes the lock, changes local state,
//! releases it, talks to the stores, and re-enters the lock to apply the
//! outcome.
//!
//! Every box builder follows the same optimistic protocol:
//!
//! 1. build the record and add it to the collection (media payloads start
//!    as the upload sentinel),
//! 2. upload media bytes, then persist the record,
//! 3. on success replace the entry by identifier; on failure remove it by
//!    identifier.
//!
//! CANCELLATION
//! ============
//! `close` cancels the session token. Remote work races the token, and no
//! outcome is applied to local state once the session is closed: a builder
//! caught mid-flight removes its placeholder, and media it already uploaded
//! is deleted again. Background
//! bitmap loads are tracked so tests and shutdown can wait for them.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use image::DynamicImage;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::bitmap::{self, BitmapCache, BitmapError};
use crate::classify::ReceiptClassifier;
use crate::config::{ExportConfig, PlacementConfig};
use crate::export;
use crate::layout::{self, TextMeasure};
use crate::model::{BoxCollection, BoxType, CanvasBox, UPLOADING, new_box_id};
use crate::placement::{Pending, Placement};
use crate::source::{self, MediaError, MediaSource};
use crate::store::{self, BoxStore, MediaStore, StoreError};

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("media error: {0}")]
    Media(#[from] MediaError),
    #[error("bitmap error: {0}")]
    Bitmap(#[from] BitmapError),
    #[error("box not found: {0}")]
    NotFound(String),
    #[error("box still uploading: {0}")]
    Pending(String),
    #[error("canvas is read-only")]
    ReadOnly,
    #[error("session closed")]
    Cancelled,
}

/// Collaborators a session needs. Each is the narrowest capability that
/// does the job.
#[derive(Clone)]
pub struct SessionDeps {
    pub boxes: Arc<dyn BoxStore>,
    pub media: Arc<dyn MediaStore>,
    pub source: Arc<dyn MediaSource>,
    pub classifier: Arc<dyn ReceiptClassifier>,
    pub bitmaps: Arc<BitmapCache>,
    pub text: Arc<dyn TextMeasure>,
    pub placement: PlacementConfig,
}

struct SessionState {
    boxes: BoxCollection,
    placement: Placement,
    selected: Option<String>,
    editable: bool,
    loading: bool,
}

struct Inner {
    canvas_id: String,
    deps: SessionDeps,
    state: RwLock<SessionState>,
    uploads: AtomicUsize,
    cancel: CancellationToken,
    tasks: TaskTracker,
}

/// Handle to an open canvas. Clones share the same session.
#[derive(Clone)]
pub struct CanvasSession {
    inner: Arc<Inner>,
}

/// Keeps the uploading indicator raised while a media builder runs.
struct UploadGuard<'a>(&'a AtomicUsize);

impl<'a> UploadGuard<'a> {
    fn raise(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for UploadGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

// =============================================================================
// LIFECYCLE
// =============================================================================

impl CanvasSession {
    /// Open `canvas_id` and load its boxes. A failed load is logged and
    /// leaves the session open with an empty canvas.
    pub async fn open(deps: SessionDeps, canvas_id: &str) -> Self {
        info!(canvas_id, "opening canvas");
        let session = Self {
            inner: Arc::new(Inner {
                canvas_id: canvas_id.to_string(),
                deps,
                state: RwLock::new(SessionState {
                    boxes: BoxCollection::new(),
                    placement: Placement::Idle,
                    selected: None,
                    editable: true,
                    loading: false,
                }),
                uploads: AtomicUsize::new(0),
                cancel: CancellationToken::new(),
                tasks: TaskTracker::new(),
            }),
        };
        if let Err(e) = session.view_all_boxes().await {
            warn!(canvas_id, error = %e, "initial canvas load failed");
        }
        session
    }

    #[must_use]
    pub fn canvas_id(&self) -> &str {
        &self.inner.canvas_id
    }

    #[must_use]
    pub fn bitmaps(&self) -> &Arc<BitmapCache> {
        &self.inner.deps.bitmaps
    }

    /// Cancel in-flight work and release the classifier. Idempotent.
    pub fn close(&self) {
        if self.inner.cancel.is_cancelled() {
            return;
        }
        self.inner.cancel.cancel();
        self.inner.tasks.close();
        self.inner.deps.classifier.close();
        info!(canvas_id = %self.inner.canvas_id, "canvas closed");
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }

    /// Wait until every background task started so far has finished.
    pub async fn settle(&self) {
        self.inner.tasks.close();
        self.inner.tasks.wait().await;
        if !self.is_closed() {
            self.inner.tasks.reopen();
        }
    }

    fn ensure_open(&self) -> Result<(), SessionError> {
        if self.is_closed() {
            return Err(SessionError::Cancelled);
        }
        Ok(())
    }

    /// Run `fut` unless the session closes first.
    async fn guarded<T, F>(&self, fut: F) -> Result<T, SessionError>
    where
        F: Future<Output = Result<T, SessionError>>,
    {
        tokio::select! {
            biased;
            () = self.inner.cancel.cancelled() => Err(SessionError::Cancelled),
            result = fut => result,
        }
    }
}

// =============================================================================
// SYNC
// =============================================================================

impl CanvasSession {
    /// Replace the local collection with the full remote set and schedule
    /// bitmap loads for every resolved image. Returns the number of boxes.
    ///
    /// # Errors
    ///
    /// Returns the store error if the read fails; the collection is left
    /// empty.
    pub async fn view_all_boxes(&self) -> Result<usize, SessionError> {
        self.ensure_open()?;
        {
            let mut state = self.inner.state.write().await;
            state.loading = true;
            state.boxes.clear();
        }

        let canvas_id = &self.inner.canvas_id;
        let result = self
            .guarded(async { Ok(self.inner.deps.boxes.read_all(canvas_id).await?) })
            .await;

        let mut state = self.inner.state.write().await;
        state.loading = false;
        let boxes = result?;
        if self.is_closed() {
            return Err(SessionError::Cancelled);
        }

        let urls: Vec<String> = boxes
            .iter()
            .filter(|b| b.kind.is_bitmap() && b.has_resolved_media())
            .map(|b| b.data.clone())
            .collect();
        let count = boxes.len();
        state.boxes.load_snapshot(boxes);
        if state.selected.as_deref().is_some_and(|id| !state.boxes.contains(id)) {
            state.selected = None;
        }
        drop(state);

        for url in urls {
            self.schedule_bitmap(url);
        }
        info!(canvas_id = %canvas_id, count, "canvas loaded");
        Ok(count)
    }

    /// Schedule bitmap loads for every resolved image already in the
    /// collection.
    pub async fn reload_all_images(&self) {
        let urls: Vec<String> = {
            let state = self.inner.state.read().await;
            state
                .boxes
                .iter()
                .filter(|b| b.kind.is_bitmap() && b.has_resolved_media())
                .map(|b| b.data.clone())
                .collect()
        };
        for url in urls {
            self.schedule_bitmap(url);
        }
    }

    fn schedule_bitmap(&self, url: String) {
        if self.is_closed() {
            return;
        }
        let cache = Arc::clone(&self.inner.deps.bitmaps);
        let cancel = self.inner.cancel.clone();
        self.inner.tasks.spawn(async move {
            tokio::select! {
                () = cancel.cancelled() => debug!(url, "bitmap load cancelled"),
                _ = cache.load_image(&url) => {}
            }
        });
    }
}

// =============================================================================
// PLACEMENT
// =============================================================================

impl CanvasSession {
    pub async fn start_text_placement(&self, text: &str) {
        self.inner.state.write().await.placement.start_text(text);
    }

    pub async fn start_image_placement(&self, source_uri: &str) {
        self.inner
            .state
            .write()
            .await
            .placement
            .start_image(source_uri);
    }

    pub async fn start_video_placement(&self, source_uri: &str) {
        self.inner
            .state
            .write()
            .await
            .placement
            .start_video(source_uri);
    }

    pub async fn end_placement_mode(&self) {
        self.inner.state.write().await.placement.end();
    }

    pub async fn placement(&self) -> Placement {
        self.inner.state.read().await.placement.clone()
    }

    /// Handle a canvas tap. Consumes the pending placement and builds the
    /// box it describes. Returns `None` when idle or read-only.
    ///
    /// # Errors
    ///
    /// Returns the error that aborted the build. The placeholder has been
    /// removed from the collection by then.
    pub async fn create_box(&self, x: f32, y: f32) -> Result<Option<CanvasBox>, SessionError> {
        self.ensure_open()?;
        let pending = {
            let mut state = self.inner.state.write().await;
            if !state.editable {
                return Ok(None);
            }
            match state.placement.take() {
                Some(pending) => pending,
                None => return Ok(None),
            }
        };

        let placed = match pending {
            Pending::Text(text) => self.create_text_box(text, x, y).await?,
            Pending::Image(source) => self.create_image_box(source, x, y).await?,
            Pending::Video(source) => self.create_video_box(source, x, y).await?,
        };
        Ok(Some(placed))
    }

    async fn create_text_box(&self, text: String, x: f32, y: f32) -> Result<CanvasBox, SessionError> {
        let (width, height) = self.inner.deps.text.measure(&text);
        let (bx, by) = layout::centered_on(x, y, width, height);
        let placed = self
            .add_box(CanvasBox::new(new_box_id(), BoxType::Text, bx, by, width, height, text))
            .await;

        let result = self
            .guarded(async {
                self.inner
                    .deps
                    .boxes
                    .write(&self.inner.canvas_id, &placed)
                    .await?;
                Ok(placed.clone())
            })
            .await;
        self.conclude(&placed.id, result).await
    }

    async fn create_image_box(&self, source_uri: String, x: f32, y: f32) -> Result<CanvasBox, SessionError> {
        let _uploading = UploadGuard::raise(&self.inner.uploads);
        let deps = &self.inner.deps;

        let bytes = self
            .guarded(async { Ok(deps.source.read_bytes(&source_uri).await?) })
            .await?;
        let image = Arc::new(bitmap::decode(bytes.clone()).await?);
        let is_receipt = self.classify(Arc::clone(&image)).await;
        let kind = if is_receipt { BoxType::Receipt } else { BoxType::Image };
        debug!(source = %source_uri, ?kind, "image classified");

        let (width, height) = layout::cap_dimensions(image.width(), image.height(), deps.placement.image_max_edge);
        let (bx, by) = layout::centered_on(x, y, width, height);
        let placeholder = self
            .add_box(CanvasBox::new(new_box_id(), kind, bx, by, width, height, UPLOADING.into()))
            .await;

        let upload = async {
            Ok(deps
                .media
                .upload_bytes(
                    &store::image_object_name(&placeholder.id),
                    source::content_type(&source_uri),
                    bytes,
                )
                .await?)
        };
        let result = self.upload_and_persist(&placeholder, upload).await;

        let finished = self.conclude(&placeholder.id, result).await?;
        deps.bitmaps.insert(&finished.data, image);
        Ok(finished)
    }

    async fn create_video_box(&self, source_uri: String, x: f32, y: f32) -> Result<CanvasBox, SessionError> {
        let _uploading = UploadGuard::raise(&self.inner.uploads);
        let deps = &self.inner.deps;

        let (width, height) = deps.placement.video_size;
        let (bx, by) = layout::centered_on(x, y, width, height);
        let placeholder = self
            .add_box(CanvasBox::new(new_box_id(), BoxType::Video, bx, by, width, height, UPLOADING.into()))
            .await;

        // Placeholders have no URL yet; see `BitmapCache::for_box`.
        if let Some(thumbnail) = deps.source.thumbnail(&source_uri).await {
            deps.bitmaps.insert(&placeholder.id, thumbnail);
        }

        let upload = async {
            let reader = deps.source.open_stream(&source_uri).await?;
            Ok(deps
                .media
                .upload_stream(
                    &store::video_object_name(&placeholder.id),
                    source::content_type(&source_uri),
                    reader,
                )
                .await?)
        };
        let result = self.upload_and_persist(&placeholder, upload).await;

        match self.conclude(&placeholder.id, result).await {
            Ok(finished) => {
                deps.bitmaps.rekey(&placeholder.id, &finished.data);
                Ok(finished)
            }
            Err(e) => {
                deps.bitmaps.remove(&placeholder.id);
                Err(e)
            }
        }
    }

    /// Upload media, then persist `placeholder` pointing at the returned
    /// URL. Once the URL exists, any failure to persist, closing the session
    /// included, deletes the uploaded object again.
    async fn upload_and_persist<U>(&self, placeholder: &CanvasBox, upload: U) -> Result<CanvasBox, SessionError>
    where
        U: Future<Output = Result<String, SessionError>>,
    {
        let url = self.guarded(upload).await?;
        let finished = CanvasBox { data: url, ..placeholder.clone() };
        let written = self
            .guarded(async {
                self.inner
                    .deps
                    .boxes
                    .write(&self.inner.canvas_id, &finished)
                    .await?;
                Ok(())
            })
            .await;
        if let Err(e) = written {
            if let Err(cleanup) = self.inner.deps.media.delete_by_url(&finished.data).await {
                warn!(url = %finished.data, error = %cleanup, "orphaned media cleanup failed");
            }
            return Err(e);
        }
        Ok(finished)
    }

    async fn classify(&self, image: Arc<DynamicImage>) -> bool {
        let classifier = Arc::clone(&self.inner.deps.classifier);
        match tokio::task::spawn_blocking(move || classifier.classify(&image)).await {
            Ok(Ok(is_receipt)) => is_receipt,
            Ok(Err(e)) => {
                warn!(error = %e, "receipt classification failed; treating as photo");
                false
            }
            Err(e) => {
                warn!(error = %e, "receipt classification task failed; treating as photo");
                false
            }
        }
    }

    /// Add a freshly built box on top of everything else.
    async fn add_box(&self, mut canvas_box: CanvasBox) -> CanvasBox {
        let mut state = self.inner.state.write().await;
        canvas_box.z = state.boxes.next_z();
        state.boxes.insert(canvas_box.clone());
        canvas_box
    }

    /// Apply the outcome of a builder's remote phase to the entry `id`.
    async fn conclude(
        &self,
        id: &str,
        result: Result<CanvasBox, SessionError>,
    ) -> Result<CanvasBox, SessionError> {
        let canvas_id = &self.inner.canvas_id;
        match result {
            Ok(finished) if !self.is_closed() => {
                let mut state = self.inner.state.write().await;
                state.boxes.insert(finished.clone());
                info!(canvas_id = %canvas_id, box_id = id, kind = ?finished.kind, "box placed");
                Ok(finished)
            }
            Ok(_) | Err(SessionError::Cancelled) => {
                self.roll_back(id).await;
                debug!(canvas_id = %canvas_id, box_id = id, "placement abandoned; session closed");
                Err(SessionError::Cancelled)
            }
            Err(e) => {
                self.roll_back(id).await;
                warn!(canvas_id = %canvas_id, box_id = id, error = %e, "placement failed; rolled back");
                Err(e)
            }
        }
    }

    async fn roll_back(&self, id: &str) {
        let mut state = self.inner.state.write().await;
        state.boxes.remove(id);
        if state.selected.as_deref() == Some(id) {
            state.selected = None;
        }
    }
}

// =============================================================================
// SELECTION + EDITING
// =============================================================================

impl CanvasSession {
    /// Select a box for moving or deleting.
    ///
    /// # Errors
    ///
    /// `ReadOnly` while editing is off, `NotFound` for unknown ids and
    /// `Pending` for boxes still uploading.
    pub async fn select(&self, box_id: &str) -> Result<(), SessionError> {
        let mut state = self.inner.state.write().await;
        if !state.editable {
            return Err(SessionError::ReadOnly);
        }
        let canvas_box = state
            .boxes
            .get(box_id)
            .ok_or_else(|| SessionError::NotFound(box_id.to_string()))?;
        if canvas_box.is_placeholder() {
            return Err(SessionError::Pending(box_id.to_string()));
        }
        state.selected = Some(box_id.to_string());
        Ok(())
    }

    pub async fn clear_selection(&self) {
        self.inner.state.write().await.selected = None;
    }

    pub async fn selected(&self) -> Option<CanvasBox> {
        let state = self.inner.state.read().await;
        state
            .selected
            .as_deref()
            .and_then(|id| state.boxes.get(id))
            .cloned()
    }

    /// Flip the editing flag and return the new value. Going read-only
    /// clears the selection.
    pub async fn toggle_editable(&self) -> bool {
        let mut state = self.inner.state.write().await;
        state.editable = !state.editable;
        if !state.editable {
            state.selected = None;
        }
        state.editable
    }

    pub async fn is_editable(&self) -> bool {
        self.inner.state.read().await.editable
    }

    /// Delete the selected box. Returns the removed box, or `None` when
    /// nothing is selected.
    ///
    /// # Errors
    ///
    /// Returns the store error if the record delete fails; local state is
    /// untouched in that case.
    pub async fn delete(&self) -> Result<Option<CanvasBox>, SessionError> {
        self.ensure_open()?;
        let target = {
            let state = self.inner.state.read().await;
            let Some(id) = state.selected.clone() else {
                return Ok(None);
            };
            state
                .boxes
                .get(&id)
                .cloned()
                .ok_or(SessionError::NotFound(id))?
        };

        let deps = &self.inner.deps;
        let canvas_id = &self.inner.canvas_id;
        self.guarded(async {
            if target.kind.is_media() && target.data.starts_with("https") {
                if let Err(e) = deps.media.delete_by_url(&target.data).await {
                    warn!(url = %target.data, error = %e, "media delete failed; deleting record anyway");
                }
            }
            deps.boxes.delete(canvas_id, &target.id).await?;
            Ok(())
        })
        .await
        .inspect_err(|e| warn!(canvas_id = %canvas_id, box_id = %target.id, error = %e, "box delete failed"))?;

        let mut state = self.inner.state.write().await;
        state.boxes.remove(&target.id);
        if state.selected.as_deref() == Some(target.id.as_str()) {
            state.selected = None;
        }
        info!(canvas_id = %canvas_id, box_id = %target.id, "box deleted");
        Ok(Some(target))
    }

    /// Move the selected box and persist it. The previous position is
    /// restored if the write fails, unless another move landed meanwhile.
    ///
    /// # Errors
    ///
    /// `ReadOnly` while editing is off, or the store error from the write.
    pub async fn update_box_position(&self, x: i32, y: i32) -> Result<Option<CanvasBox>, SessionError> {
        self.ensure_open()?;
        let (moved, previous) = {
            let mut state = self.inner.state.write().await;
            if !state.editable {
                return Err(SessionError::ReadOnly);
            }
            let Some(id) = state.selected.clone() else {
                return Ok(None);
            };
            let canvas_box = state
                .boxes
                .get_mut(&id)
                .ok_or(SessionError::NotFound(id))?;
            let previous = (canvas_box.x, canvas_box.y);
            canvas_box.x = x;
            canvas_box.y = y;
            (canvas_box.clone(), previous)
        };

        let result = self
            .guarded(async {
                self.inner
                    .deps
                    .boxes
                    .write(&self.inner.canvas_id, &moved)
                    .await?;
                Ok(())
            })
            .await;

        match result {
            Ok(()) => Ok(Some(moved)),
            Err(SessionError::Cancelled) => Err(SessionError::Cancelled),
            Err(e) => {
                let mut state = self.inner.state.write().await;
                // A later move owns the position now; leave it alone.
                if let Some(canvas_box) = state.boxes.get_mut(&moved.id) {
                    if (canvas_box.x, canvas_box.y) == (moved.x, moved.y) {
                        (canvas_box.x, canvas_box.y) = previous;
                    }
                }
                warn!(box_id = %moved.id, error = %e, "move failed; position restored");
                Err(e)
            }
        }
    }

    /// Write every settled box back to the store. Returns how many writes
    /// succeeded; failures are logged and skipped.
    pub async fn save_all(&self) -> usize {
        let boxes: Vec<CanvasBox> = {
            let mut state = self.inner.state.write().await;
            state.loading = true;
            state
                .boxes
                .iter()
                .filter(|b| !b.is_placeholder())
                .cloned()
                .collect()
        };

        let mut saved = 0;
        for canvas_box in &boxes {
            let result = self
                .guarded(async {
                    self.inner
                        .deps
                        .boxes
                        .write(&self.inner.canvas_id, canvas_box)
                        .await?;
                    Ok(())
                })
                .await;
            match result {
                Ok(()) => saved += 1,
                Err(SessionError::Cancelled) => break,
                Err(e) => warn!(box_id = %canvas_box.id, error = %e, "save failed"),
            }
        }

        self.inner.state.write().await.loading = false;
        info!(canvas_id = %self.inner.canvas_id, saved, total = boxes.len(), "canvas saved");
        saved
    }
}

// =============================================================================
// RENDERING + EXPORT
// =============================================================================

impl CanvasSession {
    /// Boxes in paint order.
    pub async fn render_state(&self) -> Vec<CanvasBox> {
        let state = self.inner.state.read().await;
        state.boxes.sorted().into_iter().cloned().collect()
    }

    pub async fn get(&self, box_id: &str) -> Option<CanvasBox> {
        self.inner.state.read().await.boxes.get(box_id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.inner.state.read().await.boxes.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.state.read().await.boxes.is_empty()
    }

    pub async fn is_loading(&self) -> bool {
        self.inner.state.read().await.loading
    }

    #[must_use]
    pub fn is_uploading(&self) -> bool {
        self.inner.uploads.load(Ordering::SeqCst) > 0
    }

    /// Write the canvas as a one-page document into `dir`. Returns the file
    /// path, or `None` if nothing could be written.
    pub async fn export_pdf(&self, dir: &Path, config: &ExportConfig) -> Option<PathBuf> {
        let boxes = self.render_state().await;
        let path = dir.join(format!("{}.pdf", export::file_stem(&self.inner.canvas_id)));
        match export::write_pdf(&boxes, &self.inner.deps.bitmaps, config, &path) {
            Ok(()) => {
                info!(path = %path.display(), "canvas exported");
                Some(path)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "canvas export failed");
                None
            }
        }
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
