//! Receipt classification seam.
//!
//! The on-device model lives with the host; the crate only needs a yes/no
//! answer per decoded image and a way to release the model when the canvas
//! closes.

use image::DynamicImage;

#[derive(Debug, thiserror::Error)]
pub enum ClassifyError {
    #[error("classifier unavailable")]
    Unavailable,
    #[error("inference failed: {0}")]
    Inference(String),
}

/// Binary receipt / not-receipt classifier. Called from the blocking pool.
pub trait ReceiptClassifier: Send + Sync {
    /// # Errors
    ///
    /// Returns an error when the model cannot run; callers treat that as
    /// "not a receipt".
    fn classify(&self, image: &DynamicImage) -> Result<bool, ClassifyError>;

    /// Release model resources. Later `classify` calls may fail.
    fn close(&self) {}
}

/// Classifier for hosts without a model: nothing is a receipt.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoReceipts;

impl ReceiptClassifier for NoReceipts {
    fn classify(&self, _image: &DynamicImage) -> Result<bool, ClassifyError> {
        Ok(false)
    }
}
