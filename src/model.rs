//! Canvas data model: boxes, their wire format, and the local box collection.
//!
//! DESIGN
//! ======
//! A `CanvasBox` mirrors one record under `canvas/{canvas_id}/boxes/{box_id}`
//! in the remote document store. The identifier is the record key, so it is
//! carried beside the record rather than serialized inside it.
//!
//! `BoxCollection` is the in-memory source of truth for rendering. Stores and
//! builders mutate it box by box; the renderer reads it through `sorted` to
//! get paint order.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Payload of a media box whose bytes are still being uploaded.
pub const UPLOADING: &str = "uploading";

/// Canvas extent in canvas-space pixels.
pub const CANVAS_WIDTH: f32 = 10_000.0;
pub const CANVAS_HEIGHT: f32 = 8_000.0;

// =============================================================================
// BOX TYPE
// =============================================================================

/// What a box holds and how its `data` payload is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum BoxType {
    /// Literal text; `data` is the text itself.
    #[default]
    Text,
    /// Photo; `data` is a media URL.
    Image,
    /// Video clip; `data` is a media URL.
    Video,
    /// Photo the classifier recognised as a receipt; `data` is a media URL.
    Receipt,
}

impl BoxType {
    /// Returns `true` for types whose payload points into the media store.
    #[must_use]
    pub fn is_media(self) -> bool {
        !matches!(self, Self::Text)
    }

    /// Returns `true` for types rendered from a still bitmap.
    #[must_use]
    pub fn is_bitmap(self) -> bool {
        matches!(self, Self::Image | Self::Receipt)
    }
}

// =============================================================================
// CANVAS BOX
// =============================================================================

/// A placed content unit. Field names follow the stored record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CanvasBox {
    /// Record key inside the canvas. Never part of the stored body.
    #[serde(skip)]
    pub id: String,
    #[serde(rename = "box_x")]
    pub x: i32,
    #[serde(rename = "box_y")]
    pub y: i32,
    /// Paint order; lower values are drawn first.
    #[serde(rename = "box_z")]
    pub z: i32,
    pub data: String,
    /// Clockwise rotation in whole degrees.
    pub degree: i32,
    pub height: i32,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub time: Option<i64>,
    pub width: i32,
    #[serde(rename = "type")]
    pub kind: BoxType,
}

impl Default for CanvasBox {
    fn default() -> Self {
        Self {
            id: String::new(),
            x: 0,
            y: 0,
            z: 0,
            data: String::new(),
            degree: 0,
            height: 0,
            latitude: None,
            longitude: None,
            time: None,
            width: 0,
            kind: BoxType::Text,
        }
    }
}

impl CanvasBox {
    /// Build a box of `kind` with the given geometry and payload.
    #[must_use]
    pub fn new(id: String, kind: BoxType, x: i32, y: i32, width: i32, height: i32, data: String) -> Self {
        Self { id, kind, x, y, width, height, data, ..Self::default() }
    }

    /// Returns `true` while a media box still waits for its upload.
    #[must_use]
    pub fn is_placeholder(&self) -> bool {
        self.kind.is_media() && self.data == UPLOADING
    }

    /// Returns `true` if `data` is a fetchable media URL.
    #[must_use]
    pub fn has_resolved_media(&self) -> bool {
        self.kind.is_media() && is_resolved_url(&self.data)
    }
}

/// A payload is resolved when it is non-empty, not the upload sentinel, and
/// looks like an HTTP(S) URL.
#[must_use]
pub fn is_resolved_url(data: &str) -> bool {
    !data.is_empty() && data != UPLOADING && data.starts_with("http")
}

/// Generate a fresh box identifier.
#[must_use]
pub fn new_box_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

// =============================================================================
// BOX COLLECTION
// =============================================================================

/// Local mirror of the boxes of one canvas.
#[derive(Debug, Default)]
pub struct BoxCollection {
    boxes: HashMap<String, CanvasBox>,
}

impl BoxCollection {
    #[must_use]
    pub fn new() -> Self {
        Self { boxes: HashMap::new() }
    }

    /// Insert or replace a box by identifier.
    pub fn insert(&mut self, canvas_box: CanvasBox) {
        self.boxes.insert(canvas_box.id.clone(), canvas_box);
    }

    /// Remove a box by identifier, returning it if it was present.
    pub fn remove(&mut self, id: &str) -> Option<CanvasBox> {
        self.boxes.remove(id)
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&CanvasBox> {
        self.boxes.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut CanvasBox> {
        self.boxes.get_mut(id)
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.boxes.contains_key(id)
    }

    /// Replace every box with a full snapshot from the store.
    pub fn load_snapshot(&mut self, boxes: Vec<CanvasBox>) {
        self.boxes.clear();
        for canvas_box in boxes {
            self.insert(canvas_box);
        }
    }

    pub fn clear(&mut self) {
        self.boxes.clear();
    }

    /// Z value that paints above every box currently in the collection.
    #[must_use]
    pub fn next_z(&self) -> i32 {
        self.boxes
            .values()
            .map(|b| b.z)
            .max()
            .map_or(0, |z| z.saturating_add(1))
    }

    /// All boxes sorted by `(z, id)` for paint order.
    #[must_use]
    pub fn sorted(&self) -> Vec<&CanvasBox> {
        let mut boxes: Vec<&CanvasBox> = self.boxes.values().collect();
        boxes.sort_by(|a, b| a.z.cmp(&b.z).then_with(|| a.id.cmp(&b.id)));
        boxes
    }

    /// Iterate boxes in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &CanvasBox> {
        self.boxes.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }
}

#[cfg(test)]
#[path = "model_test.rs"]
mod tests;
