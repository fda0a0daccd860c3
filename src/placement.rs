//! Placement mode — what the next canvas tap will create.
//!
//! DESIGN
//! ======
//! One tagged value holds both the active mode and its pending payload, so
//! two modes can never be armed at once. Starting any placement overwrites
//! whatever was pending; a tap consumes the pending payload and returns the
//! machine to `Idle` before the box is built.

/// The pending-action state of a canvas.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Placement {
    #[default]
    Idle,
    /// Next tap places this text.
    Text(String),
    /// Next tap places the image behind this source URI.
    Image(String),
    /// Next tap places the video behind this source URI.
    Video(String),
}

impl Placement {
    pub fn start_text(&mut self, text: impl Into<String>) {
        *self = Self::Text(text.into());
    }

    pub fn start_image(&mut self, source: impl Into<String>) {
        *self = Self::Image(source.into());
    }

    pub fn start_video(&mut self, source: impl Into<String>) {
        *self = Self::Video(source.into());
    }

    /// Drop any pending payload.
    pub fn end(&mut self) {
        *self = Self::Idle;
    }

    /// Consume the pending placement for a tap. Returns `None` when idle.
    pub fn take(&mut self) -> Option<Pending> {
        match std::mem::take(self) {
            Self::Idle => None,
            Self::Text(text) => Some(Pending::Text(text)),
            Self::Image(source) => Some(Pending::Image(source)),
            Self::Video(source) => Some(Pending::Video(source)),
        }
    }

    #[must_use]
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }
}

/// A placement taken out of the machine by a tap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pending {
    Text(String),
    Image(String),
    Video(String),
}

#[cfg(test)]
#[path = "placement_test.rs"]
mod tests;
