//! Header transform renderer.
//!
//! Turns a source image, a crop region in source pixels, a zoom factor and a
//! rotation into a fixed-size bitmap. The work is split in two:
//!
//! - [`DrawPlan`] is the pure geometry: how large the crop is drawn, where it
//!   lands and how the canvas is rotated. It can be inspected and tested
//!   without pixels.
//! - [`render`] executes a plan into an [`RgbImage`].
//!
//! # Fit
//!
//! The crop is scaled to *cover* the canvas: the larger of the two per-axis
//! scale factors wins, so no background shows along either axis at zoom 1.
//! The user's zoom multiplies on top of that and can therefore only enlarge.
//! Overflow is centered and clipped by the canvas.
//!
//! # Rotation
//!
//! Rotation pivots around the canvas center, not the image center, and is
//! clockwise for positive angles (y axis pointing down). Canvas pixels whose
//! pre-image falls outside the crop region stay black.

use crate::error::{AppError, Result};
use crate::geometry::SourceRect;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, Rgb, RgbImage};
use imageproc::geometric_transformations::{warp_into_with, Interpolation};
use log::debug;
use serde::{Deserialize, Serialize};

/// Output width of a site header.
pub const HEADER_WIDTH: u32 = 1920;
/// Output height of a site header (1920 / 2.2, rounded down).
pub const HEADER_HEIGHT: u32 = 873;
/// JPEG quality of the exported header.
pub const JPEG_QUALITY: u8 = 95;

pub const MIN_SCALE: f32 = 0.5;
pub const MAX_SCALE: f32 = 2.0;
pub const MAX_ROTATION: f32 = 180.0;

const BACKGROUND: Rgb<u8> = Rgb([0, 0, 0]);

/// User-adjustable zoom and rotation, independent of the crop box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransformParams {
    pub scale: f32,
    pub rotate_degrees: f32,
}

impl TransformParams {
    /// Builds parameters with both values clamped into their slider ranges.
    pub fn new(scale: f32, rotate_degrees: f32) -> Self {
        Self::default().with_scale(scale).with_rotation(rotate_degrees)
    }

    pub fn with_scale(self, scale: f32) -> Self {
        let scale = if scale.is_finite() { scale.clamp(MIN_SCALE, MAX_SCALE) } else { 1.0 };
        Self { scale, ..self }
    }

    pub fn with_rotation(self, rotate_degrees: f32) -> Self {
        let rotate_degrees = if rotate_degrees.is_finite() {
            rotate_degrees.clamp(-MAX_ROTATION, MAX_ROTATION)
        } else {
            0.0
        };
        Self { rotate_degrees, ..self }
    }
}

impl Default for TransformParams {
    fn default() -> Self {
        Self { scale: 1.0, rotate_degrees: 0.0 }
    }
}

/// Geometry of one draw of a crop region onto a canvas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawPlan {
    pub canvas_width: u32,
    pub canvas_height: u32,
    pub source: SourceRect,
    /// Cover scale times the user's zoom.
    pub scale: f32,
    pub scaled_width: f32,
    pub scaled_height: f32,
    /// Negative when the scaled crop overflows the canvas.
    pub offset_x: f32,
    pub offset_y: f32,
    /// Canvas rotation in radians; `None` when the angle is zero.
    pub rotation: Option<f32>,
}

impl DrawPlan {
    pub fn new(
        source: SourceRect,
        canvas_width: u32,
        canvas_height: u32,
        params: &TransformParams,
    ) -> Result<Self> {
        if source.is_empty() || !source.width.is_finite() || !source.height.is_finite() {
            return Err(AppError::image(format!("Crop region {:?} has no area", source)));
        }
        if canvas_width == 0 || canvas_height == 0 {
            return Err(AppError::image("Canvas has no area"));
        }

        let fit_width = canvas_width as f32 / source.width;
        let fit_height = canvas_height as f32 / source.height;
        let scale = fit_width.max(fit_height) * params.scale;

        let scaled_width = source.width * scale;
        let scaled_height = source.height * scale;

        let rotation = if params.rotate_degrees != 0.0 {
            Some(params.rotate_degrees.to_radians())
        } else {
            None
        };

        let plan = Self {
            canvas_width,
            canvas_height,
            source,
            scale,
            scaled_width,
            scaled_height,
            offset_x: (canvas_width as f32 - scaled_width) / 2.0,
            offset_y: (canvas_height as f32 - scaled_height) / 2.0,
            rotation,
        };
        debug!("Draw plan: {:?}", plan);
        Ok(plan)
    }

    /// Plan for the fixed 1920x873 header canvas.
    pub fn header(source: SourceRect, params: &TransformParams) -> Result<Self> {
        Self::new(source, HEADER_WIDTH, HEADER_HEIGHT, params)
    }

    fn center(&self) -> (f32, f32) {
        (self.canvas_width as f32 / 2.0, self.canvas_height as f32 / 2.0)
    }

    /// Where a point of the source image ends up on the canvas.
    pub fn source_to_canvas(&self, x: f32, y: f32) -> (f32, f32) {
        let qx = self.offset_x + (x - self.source.x) * self.scale;
        let qy = self.offset_y + (y - self.source.y) * self.scale;

        match self.rotation {
            None => (qx, qy),
            Some(theta) => {
                let (cx, cy) = self.center();
                let (sin, cos) = theta.sin_cos();
                let (dx, dy) = (qx - cx, qy - cy);
                (cx + cos * dx - sin * dy, cy + sin * dx + cos * dy)
            }
        }
    }

    /// The source point drawn at a canvas position; inverse of
    /// [`source_to_canvas`](Self::source_to_canvas).
    pub fn canvas_to_source(&self, x: f32, y: f32) -> (f32, f32) {
        let (qx, qy) = match self.rotation {
            None => (x, y),
            Some(theta) => {
                let (cx, cy) = self.center();
                let (sin, cos) = theta.sin_cos();
                let (dx, dy) = (x - cx, y - cy);
                (cx + cos * dx + sin * dy, cy - sin * dx + cos * dy)
            }
        };
        (
            self.source.x + (qx - self.offset_x) / self.scale,
            self.source.y + (qy - self.offset_y) / self.scale,
        )
    }

    /// Whether a source point lies inside the crop region.
    fn covers(&self, x: f32, y: f32) -> bool {
        const EPS: f32 = 1e-3;
        x >= self.source.x - EPS
            && x <= self.source.x + self.source.width + EPS
            && y >= self.source.y - EPS
            && y <= self.source.y + self.source.height + EPS
    }
}

/// Draws the plan's crop region of `image` onto a fresh black canvas.
pub fn render(image: &DynamicImage, plan: &DrawPlan) -> Result<RgbImage> {
    let (x0, y0, width, height) = plan.source.pixel_bounds(image.width(), image.height());
    if width == 0 || height == 0 {
        return Err(AppError::image(format!(
            "Crop region {:?} lies outside the {}x{} image",
            plan.source,
            image.width(),
            image.height()
        )));
    }

    let region = image.crop_imm(x0, y0, width, height).to_rgb8();
    let mut canvas = RgbImage::from_pixel(plan.canvas_width, plan.canvas_height, BACKGROUND);

    // Bilinear sampling needs a right/bottom neighbour inside the region
    let interpolation = if width > 1 && height > 1 {
        Interpolation::Bilinear
    } else {
        Interpolation::Nearest
    };
    let max_x = (width as f32 - 1.001).max(0.0);
    let max_y = (height as f32 - 1.001).max(0.0);
    let (origin_x, origin_y) = (x0 as f32, y0 as f32);

    warp_into_with(
        &region,
        |x, y| {
            // sample at the pixel center, like a canvas does
            let (sx, sy) = plan.canvas_to_source(x + 0.5, y + 0.5);
            if !plan.covers(sx, sy) {
                return (-1.0, -1.0);
            }
            (
                (sx - origin_x - 0.5).clamp(0.0, max_x),
                (sy - origin_y - 0.5).clamp(0.0, max_y),
            )
        },
        interpolation,
        BACKGROUND,
        &mut canvas,
    );

    Ok(canvas)
}

/// Renders the final 1920x873 header bitmap.
pub fn render_header(
    image: &DynamicImage,
    source: SourceRect,
    params: &TransformParams,
) -> Result<RgbImage> {
    let plan = DrawPlan::header(source, params)?;
    render(image, &plan)
}

/// Encodes a rendered bitmap as JPEG at [`JPEG_QUALITY`].
///
/// # Errors
///
/// Returns [`AppError::Export`] for an empty bitmap or when encoding fails.
pub fn export_jpeg(bitmap: &RgbImage) -> Result<Vec<u8>> {
    if bitmap.width() == 0 || bitmap.height() == 0 {
        return Err(AppError::export("Canvas is empty"));
    }

    let mut buffer: Vec<u8> = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut buffer, JPEG_QUALITY);
    encoder
        .encode_image(bitmap)
        .map_err(|e| AppError::export(format!("Failed to encode JPEG: {}", e)))?;

    if buffer.is_empty() {
        return Err(AppError::export("Encoder produced no data"));
    }
    Ok(buffer)
}
