//! One-page document export of a canvas.
//!
//! DESIGN
//! ======
//! Text boxes and image boxes with a cached bitmap are drawn; everything else
//! is skipped. The union of the drawn boxes is scaled uniformly to fit the
//! page and centered on it. Canvas space grows downward, page space upward,
//! so every y is flipped against the page height.

use std::path::Path;

use image::DynamicImage;
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, dictionary};

use crate::bitmap::BitmapCache;
use crate::config::ExportConfig;
use crate::model::{BoxType, CanvasBox};

/// Baseline position inside a text box, as a fraction of its height.
const BASELINE_RATIO: f32 = 0.8;

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("pdf encoding failed: {0}")]
    Pdf(#[from] lopdf::Error),
    #[error("write failed: {0}")]
    Io(#[from] std::io::Error),
}

/// A box that will be drawn, with its bitmap when it has one.
enum Drawable<'a> {
    Text(&'a CanvasBox),
    Image(&'a CanvasBox, std::sync::Arc<DynamicImage>),
}

impl Drawable<'_> {
    fn bounds(&self) -> &CanvasBox {
        match self {
            Self::Text(b) | Self::Image(b, _) => b,
        }
    }
}

/// Maps canvas coordinates onto the page.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Fit {
    scale: f32,
    offset_x: f32,
    offset_y: f32,
    min_x: f32,
    min_y: f32,
    page_height: f32,
}

impl Fit {
    #[allow(clippy::cast_precision_loss)]
    fn new(boxes: &[&CanvasBox], page_width: f32, page_height: f32) -> Self {
        let min_x = boxes.iter().map(|b| b.x).min().unwrap_or(0) as f32;
        let min_y = boxes.iter().map(|b| b.y).min().unwrap_or(0) as f32;
        let max_x = boxes.iter().map(|b| b.x.saturating_add(b.width)).max().unwrap_or(0) as f32;
        let max_y = boxes.iter().map(|b| b.y.saturating_add(b.height)).max().unwrap_or(0) as f32;
        let width = (max_x - min_x).max(1.0);
        let height = (max_y - min_y).max(1.0);
        let scale = (page_width / width).min(page_height / height);
        Self {
            scale,
            offset_x: (page_width - width * scale) / 2.0,
            offset_y: (page_height - height * scale) / 2.0,
            min_x,
            min_y,
            page_height,
        }
    }

    /// Page-space lower-left corner and size of a canvas rectangle.
    #[allow(clippy::cast_precision_loss)]
    fn rect(&self, b: &CanvasBox) -> (f32, f32, f32, f32) {
        let w = b.width as f32 * self.scale;
        let h = b.height as f32 * self.scale;
        let x = self.offset_x + (b.x as f32 - self.min_x) * self.scale;
        let top = self.offset_y + (b.y as f32 - self.min_y) * self.scale;
        (x, self.page_height - top - h, w, h)
    }
}

/// File name stem for a canvas export. Anything outside `[A-Za-z0-9_-]`
/// becomes `_`.
#[must_use]
pub fn file_stem(canvas_id: &str) -> String {
    let stem: String = canvas_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if stem.is_empty() { "canvas".to_string() } else { stem }
}

/// Render `boxes` onto a single page and save it at `path`.
///
/// # Errors
///
/// Returns an error if the document cannot be encoded or written.
pub fn write_pdf(
    boxes: &[CanvasBox],
    bitmaps: &BitmapCache,
    config: &ExportConfig,
    path: &Path,
) -> Result<(), ExportError> {
    let mut doc = build_document(boxes, bitmaps, config)?;
    doc.compress();
    doc.save(path)?;
    Ok(())
}

#[allow(clippy::cast_precision_loss)]
fn build_document(boxes: &[CanvasBox], bitmaps: &BitmapCache, config: &ExportConfig) -> Result<Document, ExportError> {
    let drawables: Vec<Drawable<'_>> = boxes
        .iter()
        .filter_map(|b| match b.kind {
            BoxType::Text => Some(Drawable::Text(b)),
            BoxType::Image => bitmaps.get(&b.data).map(|img| Drawable::Image(b, img)),
            BoxType::Video | BoxType::Receipt => None,
        })
        .collect();

    let page_width = config.page_width as f32;
    let page_height = config.page_height as f32;
    let bounds: Vec<&CanvasBox> = drawables.iter().map(Drawable::bounds).collect();
    let fit = Fit::new(&bounds, page_width, page_height);

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });

    let mut xobjects = lopdf::Dictionary::new();
    let mut operations = Vec::new();
    for (index, drawable) in drawables.iter().enumerate() {
        match drawable {
            Drawable::Text(b) => {
                let (x, y, _, h) = fit.rect(b);
                operations.extend(text_operations(&b.data, x, y + h * (1.0 - BASELINE_RATIO), config.text_size * fit.scale));
            }
            Drawable::Image(b, image) => {
                let name = format!("Im{index}");
                xobjects.set(name.as_bytes(), doc.add_object(image_stream(image)));
                let (x, y, w, h) = fit.rect(b);
                operations.extend([
                    Operation::new("q", vec![]),
                    Operation::new("cm", vec![w.into(), 0.into(), 0.into(), h.into(), x.into(), y.into()]),
                    Operation::new("Do", vec![Object::Name(name.into_bytes())]),
                    Operation::new("Q", vec![]),
                ]);
            }
        }
    }

    let content = Content { operations };
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "Resources" => dictionary! {
            "Font" => dictionary! { "F1" => font_id },
            "XObject" => xobjects,
        },
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
            "MediaBox" => vec![0.into(), 0.into(), page_width.into(), page_height.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    Ok(doc)
}

fn text_operations(text: &str, x: f32, baseline: f32, size: f32) -> [Operation; 5] {
    [
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec!["F1".into(), size.into()]),
        Operation::new("Td", vec![x.into(), baseline.into()]),
        Operation::new("Tj", vec![Object::string_literal(latin1(text))]),
        Operation::new("ET", vec![]),
    ]
}

/// Helvetica covers Latin-1 only; other characters print as `?`.
fn latin1(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
        .collect()
}

fn image_stream(image: &DynamicImage) -> Stream {
    let rgb = image.to_rgb8();
    let (width, height) = rgb.dimensions();
    Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => i64::from(width),
            "Height" => i64::from(height),
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
        },
        rgb.into_raw(),
    )
}

#[cfg(test)]
#[path = "export_test.rs"]
mod tests;
