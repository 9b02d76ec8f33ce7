use std::path::Path;

use ab_glyph::{FontArc, PxScale};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use clap::ValueEnum;
use image::codecs::jpeg::JpegEncoder;
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use tracing::warn;

use crate::errors::{FreshscanError, Result};

const BOX_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);
const LABEL_FONT_SIZE: f32 = 20.0;
const LABEL_TEXT_HEIGHT: i32 = 24;
// Rough per-character width estimate for sizing the label background.
const LABEL_CHAR_WIDTH: f32 = 11.0;

/// Whether the response image carries detection graphics. Some deployments
/// intentionally hide the box, so both modes run through the same pipeline.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderMode {
    Annotated,
    Clean,
}

/// What to draw for the selected detection.
#[derive(Debug, Clone)]
pub struct Annotation<'a> {
    pub label: &'a str,
    /// Raw detector confidence in [0, 1].
    pub confidence: f32,
    /// Source-image xyxy coordinates.
    pub bbox: [f32; 4],
}

/// Renders the response image: optional detection overlay, JPEG encoding at
/// a fixed quality, then a transport-safe base64 data URL.
pub struct Renderer {
    mode: RenderMode,
    jpeg_quality: u8,
    font: Option<FontArc>,
}

impl Renderer {
    pub const fn new(mode: RenderMode, jpeg_quality: u8) -> Self {
        Self {
            mode,
            jpeg_quality,
            font: None,
        }
    }

    /// Attach a TTF font for annotation label text. Without a font the
    /// annotation is the bounding rectangle alone.
    pub fn with_font(mut self, path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| FreshscanError::FileSystem {
            path: path.to_path_buf(),
            operation: "read annotation font".to_string(),
            source: e,
        })?;
        let font = FontArc::try_from_vec(bytes).map_err(|e| FreshscanError::Encode {
            operation: format!("load annotation font: {}", path.display()),
            source: Box::new(e),
        })?;
        self.font = Some(font);
        Ok(self)
    }

    /// Produce the encoded response image.
    ///
    /// Operates on a copy of the pixel buffer; the caller's original stays
    /// untouched because it may still be needed after rendering.
    pub fn render(&self, image: &RgbImage, annotation: Option<&Annotation<'_>>) -> Result<String> {
        let mut canvas = image.clone();

        if self.mode == RenderMode::Annotated {
            if let Some(annotation) = annotation {
                self.draw_annotation(&mut canvas, annotation);
            }
        }

        let mut jpeg = Vec::new();
        JpegEncoder::new_with_quality(&mut jpeg, self.jpeg_quality)
            .encode_image(&canvas)
            .map_err(|e| FreshscanError::Encode {
                operation: "jpeg encoding".to_string(),
                source: Box::new(e),
            })?;

        Ok(format!(
            "data:image/jpeg;base64,{}",
            STANDARD.encode(&jpeg)
        ))
    }

    fn draw_annotation(&self, canvas: &mut RgbImage, annotation: &Annotation<'_>) {
        let (width, height) = canvas.dimensions();
        let [bx1, by1, bx2, by2] = annotation.bbox;

        let x1 = (bx1.floor() as i32).clamp(0, width as i32 - 1);
        let y1 = (by1.floor() as i32).clamp(0, height as i32 - 1);
        let x2 = (bx2.ceil() as i32).clamp(0, width as i32 - 1);
        let y2 = (by2.ceil() as i32).clamp(0, height as i32 - 1);

        if x1 >= x2 || y1 >= y2 {
            warn!(bbox = ?annotation.bbox, "degenerate bounding box, skipping overlay");
            return;
        }

        // 2-px rectangle: an outer and an inset hollow rect.
        for inset in 0..2 {
            let w = (x2 - x1 - 2 * inset).max(1) as u32;
            let h = (y2 - y1 - 2 * inset).max(1) as u32;
            let rect = Rect::at(x1 + inset, y1 + inset).of_size(w, h);
            draw_hollow_rect_mut(canvas, rect, BOX_COLOR);
        }

        if let Some(font) = &self.font {
            let text = format!("{} {:.2}", annotation.label, annotation.confidence);
            let text_width = ((text.len() as f32 * LABEL_CHAR_WIDTH) as i32)
                .min(width as i32 - x1)
                .max(0);

            // Label tag above the box, kept inside the image.
            let tag_y = (y1 - LABEL_TEXT_HEIGHT).max(0);
            if text_width > 0 {
                let tag = Rect::at(x1, tag_y).of_size(text_width as u32, LABEL_TEXT_HEIGHT as u32);
                draw_filled_rect_mut(canvas, tag, BOX_COLOR);
                draw_text_mut(
                    canvas,
                    TEXT_COLOR,
                    x1,
                    tag_y + 2,
                    PxScale::from(LABEL_FONT_SIZE),
                    font,
                    &text,
                );
            }
        }
    }
}
