//! Box geometry: text sizing, media dimension capping, and tap centering.

/// Default text size for placed text, in canvas pixels.
pub const DEFAULT_TEXT_SIZE: f32 = 70.0;

/// Longest edge of a placed image, in canvas pixels.
pub const DEFAULT_IMAGE_MAX_EDGE: u32 = 500;

/// Fixed size of a placed video box.
pub const DEFAULT_VIDEO_SIZE: (i32, i32) = (600, 400);

// Advance widths as a fraction of the text size.
const NARROW_ADVANCE: f32 = 0.55;
const WIDE_ADVANCE: f32 = 1.0;
// Ascent plus descent of the default sans face.
const LINE_HEIGHT_RATIO: f32 = 1.172;

// =============================================================================
// TEXT
// =============================================================================

/// Measures rendered text. Implemented by font-aware hosts; `TextStyle`
/// provides a metric approximation that needs no font files.
pub trait TextMeasure: Send + Sync {
    /// Width and height of `text` rendered on one line.
    fn measure(&self, text: &str) -> (i32, i32);
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextStyle {
    pub size: f32,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self { size: DEFAULT_TEXT_SIZE }
    }
}

impl TextMeasure for TextStyle {
    #[allow(clippy::cast_possible_truncation)]
    fn measure(&self, text: &str) -> (i32, i32) {
        let advance: f32 = text
            .chars()
            .map(|c| if is_wide(c) { WIDE_ADVANCE } else { NARROW_ADVANCE })
            .sum();
        let width = (advance * self.size) as i32;
        let height = (LINE_HEIGHT_RATIO * self.size) as i32;
        (width, height)
    }
}

/// Hangul, CJK and fullwidth forms take a full em.
fn is_wide(c: char) -> bool {
    matches!(
        c,
        '\u{1100}'..='\u{115F}'
            | '\u{2E80}'..='\u{A4CF}'
            | '\u{AC00}'..='\u{D7A3}'
            | '\u{F900}'..='\u{FAFF}'
            | '\u{FF00}'..='\u{FF60}'
            | '\u{FFE0}'..='\u{FFE6}'
    )
}

// =============================================================================
// MEDIA
// =============================================================================

/// Scale `(width, height)` so the longer edge equals `max_edge`, keeping the
/// aspect ratio. Degenerate sizes fall back to a `max_edge` square.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap, clippy::cast_precision_loss)]
pub fn cap_dimensions(width: u32, height: u32, max_edge: u32) -> (i32, i32) {
    let max = max_edge as i32;
    if width == 0 || height == 0 {
        return (max, max);
    }
    let ratio = width as f32 / height as f32;
    if width > height {
        (max, (max_edge as f32 / ratio) as i32)
    } else {
        ((max_edge as f32 * ratio) as i32, max)
    }
}

/// Top-left corner that centers a `width` x `height` box on the tap point.
/// Truncates toward zero.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
pub fn centered_on(tap_x: f32, tap_y: f32, width: i32, height: i32) -> (i32, i32) {
    let x = tap_x - width as f32 / 2.0;
    let y = tap_y - height as f32 / 2.0;
    (x as i32, y as i32)
}

#[cfg(test)]
#[path = "layout_test.rs"]
mod tests;
