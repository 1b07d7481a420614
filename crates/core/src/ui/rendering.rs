//! UI rendering helpers for the crop dialog.
//!
//! This module contains reusable rendering functions: the dimmed surround
//! with a clear crop cutout, the crop border, and conversions between the
//! core's bitmaps and percent rectangles and egui's types.

use crate::geometry::CropRect;
use eframe::egui;
use image::RgbImage;

/// Draws the dark overlay with a transparent "cutout" for the crop area.
///
/// # Arguments
/// * `painter` - The egui painter to draw with
/// * `image_rect` - Where the image is drawn
/// * `crop_rect` - The crop box to keep clear
/// * `alpha` - Darkness level (0-255, higher = darker)
pub fn draw_crop_overlay(
    painter: &egui::Painter,
    image_rect: egui::Rect,
    crop_rect: egui::Rect,
    alpha: u8,
) {
    let color = egui::Color32::from_black_alpha(alpha);

    // Top region (above crop)
    painter.rect_filled(
        egui::Rect::from_min_max(image_rect.min, egui::pos2(image_rect.max.x, crop_rect.min.y)),
        0.0,
        color,
    );

    // Bottom region (below crop)
    painter.rect_filled(
        egui::Rect::from_min_max(egui::pos2(image_rect.min.x, crop_rect.max.y), image_rect.max),
        0.0,
        color,
    );

    // Left region (between top and bottom)
    painter.rect_filled(
        egui::Rect::from_min_max(
            egui::pos2(image_rect.min.x, crop_rect.min.y),
            egui::pos2(crop_rect.min.x, crop_rect.max.y),
        ),
        0.0,
        color,
    );

    // Right region (between top and bottom)
    painter.rect_filled(
        egui::Rect::from_min_max(
            egui::pos2(crop_rect.max.x, crop_rect.min.y),
            egui::pos2(image_rect.max.x, crop_rect.max.y),
        ),
        0.0,
        color,
    );
}

/// Draws a border around the crop box plus rule-of-thirds guides.
pub fn draw_crop_border(painter: &egui::Painter, crop_rect: egui::Rect, color: egui::Color32) {
    painter.rect_stroke(
        crop_rect,
        0.0,
        egui::Stroke::new(2.0, color),
        egui::StrokeKind::Middle,
    );

    let guide = egui::Stroke::new(1.0, color.gamma_multiply(0.4));
    for i in 1..3 {
        let t = i as f32 / 3.0;
        let x = crop_rect.min.x + crop_rect.width() * t;
        let y = crop_rect.min.y + crop_rect.height() * t;
        painter.line_segment([egui::pos2(x, crop_rect.min.y), egui::pos2(x, crop_rect.max.y)], guide);
        painter.line_segment([egui::pos2(crop_rect.min.x, y), egui::pos2(crop_rect.max.x, y)], guide);
    }
}

/// Places a percent crop box on the screen rectangle of the image.
pub fn crop_to_screen(crop: &CropRect, image_rect: egui::Rect) -> egui::Rect {
    egui::Rect::from_min_size(
        egui::pos2(
            image_rect.min.x + crop.x / 100.0 * image_rect.width(),
            image_rect.min.y + crop.y / 100.0 * image_rect.height(),
        ),
        egui::vec2(
            crop.width / 100.0 * image_rect.width(),
            crop.height / 100.0 * image_rect.height(),
        ),
    )
}

/// Converts a rendered bitmap for texture upload.
pub fn to_color_image(bitmap: &RgbImage) -> egui::ColorImage {
    let size = [bitmap.width() as usize, bitmap.height() as usize];
    egui::ColorImage::from_rgb(size, bitmap.as_raw())
}
