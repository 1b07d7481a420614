//! Live preview rendering.
//!
//! The preview runs the exact same [`DrawPlan`] / [`render`] path as the
//! final export, only on a small canvas, so what the user sees is what gets
//! uploaded. Cosmetic additions are applied afterwards through a
//! [`Decorator`], which keeps the core transform free of them.

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::geometry::SourceRect;
use crate::transform::{render, DrawPlan, TransformParams};
use ab_glyph::{FontVec, PxScale};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use image::{ImageFormat, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use log::{debug, warn};
use std::io::Cursor;
use std::path::Path;

/// Width of the preview canvas.
pub const PREVIEW_WIDTH: u32 = 240;
/// Height of the preview canvas, keeping the header's 2.2 ratio.
pub const PREVIEW_HEIGHT: u32 = 109;

/// Opacity of the black shade the site lays over header images.
pub const OVERLAY_ALPHA: f32 = 0.3;

const TITLE_SIZE: f32 = 0.15;
const SUBTITLE_SIZE: f32 = 0.09;
const LINE_GAP: f32 = 0.6;

const WHITE: Rgb<u8> = Rgb([255, 255, 255]);

/// Bold sans fonts tried when no font is configured.
const FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/TTF/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Bold.ttf",
    "/Library/Fonts/Arial Bold.ttf",
    "/System/Library/Fonts/Supplemental/Arial Bold.ttf",
    "C:\\Windows\\Fonts\\arialbd.ttf",
];

/// A drawing step applied on top of a rendered canvas.
pub trait Decorator {
    fn decorate(&self, canvas: &mut RgbImage);
}

/// Simulates the site's header styling: a dark shade plus a centered
/// title and subtitle in white.
pub struct HeaderOverlay {
    title: String,
    subtitle: String,
    font: Option<FontVec>,
}

impl HeaderOverlay {
    pub fn new(title: impl Into<String>, subtitle: impl Into<String>, font: Option<FontVec>) -> Self {
        Self {
            title: title.into(),
            subtitle: subtitle.into(),
            font,
        }
    }

    /// Builds the overlay from the configured texts and font.
    ///
    /// An unreadable configured font is logged and replaced by the first
    /// system font found; with no font at all the text is drawn as bars.
    pub fn from_config(config: &Config) -> Self {
        let configured = config.font_path.as_deref().and_then(|path| match load_font(path) {
            Ok(font) => Some(font),
            Err(e) => {
                warn!("Ignoring preview font: {}", e);
                None
            }
        });
        let font = configured.or_else(find_system_font);
        if font.is_none() {
            debug!("No preview font available, drawing text placeholders");
        }
        Self::new(&config.preview_title, &config.preview_subtitle, font)
    }

    /// Replaces the overlay texts, keeping the loaded font.
    pub fn set_texts(&mut self, title: impl Into<String>, subtitle: impl Into<String>) {
        self.title = title.into();
        self.subtitle = subtitle.into();
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    fn shade(canvas: &mut RgbImage) {
        let keep = 1.0 - OVERLAY_ALPHA;
        for pixel in canvas.pixels_mut() {
            for channel in pixel.0.iter_mut() {
                *channel = (*channel as f32 * keep).round() as u8;
            }
        }
    }

    /// Draws one centered line whose top edge is at `top`.
    fn draw_line(&self, canvas: &mut RgbImage, text: &str, size: f32, top: i32, bold: bool) {
        if text.trim().is_empty() {
            return;
        }
        let canvas_width = canvas.width() as i32;

        match &self.font {
            Some(font) => {
                let scale = PxScale::from(size);
                let (width, _) = text_size(scale, font, text);
                let x = (canvas_width - width as i32) / 2;
                draw_text_mut(canvas, WHITE, x, top, scale, font, text);
                if bold {
                    // overstrike one pixel to the right
                    draw_text_mut(canvas, WHITE, x + 1, top, scale, font, text);
                }
            }
            None => {
                let max_width = canvas_width as f32 * 0.8;
                let width = (text.chars().count() as f32 * size * 0.55).min(max_width).max(1.0);
                let height = (size * if bold { 0.7 } else { 0.5 }).max(1.0);
                let x = (canvas_width - width as i32) / 2;
                let y = top + ((size - height) / 2.0) as i32;
                draw_filled_rect_mut(
                    canvas,
                    Rect::at(x, y).of_size(width as u32, height as u32),
                    WHITE,
                );
            }
        }
    }
}

impl Decorator for HeaderOverlay {
    fn decorate(&self, canvas: &mut RgbImage) {
        Self::shade(canvas);

        let height = canvas.height() as f32;
        let title_size = height * TITLE_SIZE;
        let subtitle_size = height * SUBTITLE_SIZE;
        let gap = subtitle_size * LINE_GAP;

        let block = title_size + gap + subtitle_size;
        let top = (height - block) / 2.0;

        self.draw_line(canvas, &self.title, title_size, top as i32, true);
        self.draw_line(
            canvas,
            &self.subtitle,
            subtitle_size,
            (top + title_size + gap) as i32,
            false,
        );
    }
}

/// Loads a TTF/OTF font from disk.
pub fn load_font(path: &Path) -> Result<FontVec> {
    let bytes = std::fs::read(path)
        .map_err(|e| AppError::config(format!("Cannot read font {}: {}", path.display(), e)))?;
    FontVec::try_from_vec(bytes)
        .map_err(|e| AppError::config(format!("Invalid font {}: {}", path.display(), e)))
}

fn find_system_font() -> Option<FontVec> {
    FONT_CANDIDATES
        .iter()
        .map(Path::new)
        .filter(|p| p.exists())
        .find_map(|p| load_font(p).ok())
}

/// Renders the preview of a crop: the header transform at preview size,
/// followed by the decorator if one is given.
pub fn render_preview(
    image: &image::DynamicImage,
    source: SourceRect,
    params: &TransformParams,
    decorator: Option<&dyn Decorator>,
) -> Result<RgbImage> {
    let plan = DrawPlan::new(source, PREVIEW_WIDTH, PREVIEW_HEIGHT, params)?;
    let mut canvas = render(image, &plan)?;
    if let Some(decorator) = decorator {
        decorator.decorate(&mut canvas);
    }
    Ok(canvas)
}

/// Encodes a preview as a PNG `data:` URL for embedding in HTML.
pub fn preview_data_url(preview: &RgbImage) -> Result<String> {
    let mut buffer: Vec<u8> = Vec::new();
    preview
        .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
        .map_err(|e| AppError::image(format!("Failed to encode preview: {}", e)))?;
    Ok(format!("data:image/png;base64,{}", BASE64.encode(buffer)))
}
