//! Crop geometry and coordinate mapping.
//!
//! Three coordinate spaces meet in the cropper:
//!
//! - **Percent space**: the crop box the user edits, 0..=100 on both axes,
//!   relative to the image as it is *displayed*.
//! - **Displayed pixels**: the same box realized in on-screen pixels once a
//!   drag is released ([`PixelCrop`]).
//! - **Source pixels**: the box in the image's *natural* resolution, which is
//!   what the renderer samples from ([`SourceRect`]).
//!
//! Everything here is plain arithmetic on `f32` so it can be tested without
//! any image or window.

use log::debug;
use serde::{Deserialize, Serialize};

/// Natural and displayed size of a loaded image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImageDimensions {
    pub natural_width: u32,
    pub natural_height: u32,
    pub displayed_width: f32,
    pub displayed_height: f32,
}

impl ImageDimensions {
    pub fn new(natural: (u32, u32), displayed: (f32, f32)) -> Self {
        Self {
            natural_width: natural.0,
            natural_height: natural.1,
            displayed_width: displayed.0,
            displayed_height: displayed.1,
        }
    }

    /// Dimensions of an image shown at its natural size.
    pub fn unscaled(width: u32, height: u32) -> Self {
        Self::new((width, height), (width as f32, height as f32))
    }

    /// False until an image with a real size has been loaded.
    pub fn is_loaded(&self) -> bool {
        self.natural_width > 0
            && self.natural_height > 0
            && self.displayed_width > 0.0
            && self.displayed_height > 0.0
    }

    /// Width over height of the displayed image.
    pub fn displayed_aspect(&self) -> f32 {
        self.displayed_width / self.displayed_height
    }
}

/// Crop box in percent of the displayed image.
///
/// Serialized with a `unit: "percent"` tag, matching the crop component
/// the admin panel uses.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "unit", rename = "percent")]
pub struct CropRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl CropRect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    /// Returns the box forced inside the frame: every value in 0..=100,
    /// `x + width <= 100` and `y + height <= 100`.
    pub fn clamped(self) -> Self {
        let width = finite_or_zero(self.width).clamp(0.0, 100.0);
        let height = finite_or_zero(self.height).clamp(0.0, 100.0);
        Self {
            x: finite_or_zero(self.x).clamp(0.0, 100.0 - width),
            y: finite_or_zero(self.y).clamp(0.0, 100.0 - height),
            width,
            height,
        }
    }

    /// Whether a point (in percent) lies inside the box.
    pub fn contains(&self, px: f32, py: f32) -> bool {
        px >= self.x && px <= self.x + self.width && py >= self.y && py <= self.y + self.height
    }

    /// Moves the box by a percent delta, keeping it inside the frame.
    pub fn translated(self, dx: f32, dy: f32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            ..self
        }
        .clamped()
    }

    /// Builds a box from a drag between two points in percent space.
    ///
    /// With `locked_ratio` set (the width/height ratio *in percent units*),
    /// the height follows the dragged width and the box grows away from the
    /// start point in the drag direction. A box that would leave the frame is
    /// shrunk, ratio preserved, until it fits.
    pub fn from_drag(start: (f32, f32), end: (f32, f32), locked_ratio: Option<f32>) -> Self {
        let (sx, sy) = (start.0.clamp(0.0, 100.0), start.1.clamp(0.0, 100.0));
        let (ex, ey) = (end.0.clamp(0.0, 100.0), end.1.clamp(0.0, 100.0));

        let ratio = match locked_ratio {
            Some(r) if r > 0.0 && r.is_finite() => r,
            _ => {
                return Self::new(sx.min(ex), sy.min(ey), (ex - sx).abs(), (ey - sy).abs())
                    .clamped();
            }
        };

        let rightwards = ex >= sx;
        let downwards = ey >= sy;

        let room_x = if rightwards { 100.0 - sx } else { sx };
        let room_y = if downwards { 100.0 - sy } else { sy };

        let mut width = (ex - sx).abs().min(room_x);
        let mut height = width / ratio;
        if height > room_y {
            height = room_y;
            width = height * ratio;
        }

        let x = if rightwards { sx } else { sx - width };
        let y = if downwards { sy } else { sy - height };
        Self::new(x, y, width, height).clamped()
    }

    /// Realizes the box in displayed pixels.
    pub fn to_pixels(&self, displayed_width: f32, displayed_height: f32) -> PixelCrop {
        PixelCrop {
            x: self.x / 100.0 * displayed_width,
            y: self.y / 100.0 * displayed_height,
            width: self.width / 100.0 * displayed_width,
            height: self.height / 100.0 * displayed_height,
        }
    }

    /// Width over height of the box measured in displayed pixels.
    pub fn displayed_ratio(&self, displayed_width: f32, displayed_height: f32) -> f32 {
        (self.width / self.height) * (displayed_width / displayed_height)
    }
}

impl Default for CropRect {
    /// Placeholder box shown before an image has reported its size.
    fn default() -> Self {
        Self::new(5.0, 29.5, 90.0, 41.0)
    }
}

fn finite_or_zero(v: f32) -> f32 {
    if v.is_finite() { v } else { 0.0 }
}

/// A finished crop in displayed-pixel units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PixelCrop {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl PixelCrop {
    pub fn to_percent(&self, displayed_width: f32, displayed_height: f32) -> CropRect {
        CropRect::new(
            self.x / displayed_width * 100.0,
            self.y / displayed_height * 100.0,
            self.width / displayed_width * 100.0,
            self.height / displayed_height * 100.0,
        )
        .clamped()
    }

    pub fn is_empty(&self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
    }
}

/// Crop region in natural-resolution pixels of the source image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl SourceRect {
    /// Maps a completed crop from displayed pixels to source pixels.
    ///
    /// Must only be called once the image is loaded; with a zero displayed
    /// size the scale factors are not finite.
    pub fn from_completed(crop: &PixelCrop, dims: &ImageDimensions) -> Self {
        let scale_x = dims.natural_width as f32 / dims.displayed_width;
        let scale_y = dims.natural_height as f32 / dims.displayed_height;

        let rect = Self {
            x: crop.x * scale_x,
            y: crop.y * scale_y,
            width: crop.width * scale_x,
            height: crop.height * scale_y,
        };
        debug!(
            "Mapped crop {:?} with scale ({:.3}, {:.3}) to source {:?}",
            crop, scale_x, scale_y, rect
        );
        rect
    }

    /// The whole image as a source region.
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: width as f32,
            height: height as f32,
        }
    }

    pub fn is_empty(&self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
    }

    /// Integer pixel bounds `(x, y, width, height)` covering the region,
    /// limited to an image of the given size.
    pub fn pixel_bounds(&self, image_width: u32, image_height: u32) -> (u32, u32, u32, u32) {
        let x0 = self.x.max(0.0).floor().min(image_width as f32) as u32;
        let y0 = self.y.max(0.0).floor().min(image_height as f32) as u32;
        let x1 = (self.x + self.width).ceil().clamp(0.0, image_width as f32) as u32;
        let y1 = (self.y + self.height).ceil().clamp(0.0, image_height as f32) as u32;
        (x0, y0, x1.saturating_sub(x0), y1.saturating_sub(y0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-3
    }

    #[test]
    fn maps_displayed_crop_to_natural_pixels() {
        let dims = ImageDimensions::new((3000, 2000), (600.0, 400.0));
        let crop = PixelCrop { x: 30.0, y: 77.0, width: 540.0, height: 245.0 };

        let source = SourceRect::from_completed(&crop, &dims);

        assert!(approx(source.x, 150.0));
        assert!(approx(source.y, 385.0));
        assert!(approx(source.width, 2700.0));
        assert!(approx(source.height, 1225.0));
    }

    #[test]
    fn anisotropic_display_scales_axes_independently() {
        let dims = ImageDimensions::new((1000, 1000), (500.0, 250.0));
        let crop = PixelCrop { x: 10.0, y: 10.0, width: 100.0, height: 100.0 };

        let source = SourceRect::from_completed(&crop, &dims);

        assert!(approx(source.x, 20.0));
        assert!(approx(source.y, 40.0));
        assert!(approx(source.width, 200.0));
        assert!(approx(source.height, 400.0));
    }

    #[test]
    fn clamped_keeps_box_inside_frame() {
        let rect = CropRect::new(80.0, -5.0, 40.0, 120.0).clamped();
        assert_eq!(rect, CropRect::new(60.0, 0.0, 40.0, 100.0));

        let rect = CropRect::new(f32::NAN, 10.0, 20.0, 20.0).clamped();
        assert_eq!(rect.x, 0.0);
    }

    #[test]
    fn translated_stops_at_edges() {
        let rect = CropRect::new(10.0, 10.0, 50.0, 50.0).translated(70.0, -30.0);
        assert_eq!(rect, CropRect::new(50.0, 0.0, 50.0, 50.0));
    }

    #[test]
    fn free_drag_normalizes_direction() {
        let rect = CropRect::from_drag((60.0, 70.0), (20.0, 30.0), None);
        assert_eq!(rect, CropRect::new(20.0, 30.0, 40.0, 40.0));
    }

    #[test]
    fn locked_drag_follows_ratio_and_shrinks_to_fit() {
        // ratio 2 in percent units: height is half the width
        let rect = CropRect::from_drag((10.0, 10.0), (50.0, 90.0), Some(2.0));
        assert_eq!(rect, CropRect::new(10.0, 10.0, 40.0, 20.0));

        // not enough room below the start point
        let rect = CropRect::from_drag((0.0, 80.0), (100.0, 100.0), Some(2.0));
        assert!(approx(rect.height, 20.0));
        assert!(approx(rect.width, 40.0));
        assert!(rect.x + rect.width <= 100.0 && rect.y + rect.height <= 100.0);
    }

    #[test]
    fn locked_drag_upwards_and_left_anchors_at_start() {
        let rect = CropRect::from_drag((60.0, 60.0), (20.0, 0.0), Some(1.0));
        assert_eq!(rect, CropRect::new(20.0, 20.0, 40.0, 40.0));
    }

    #[test]
    fn percent_and_pixel_crop_convert_both_ways() {
        let rect = CropRect::new(5.0, 19.32, 90.0, 61.36);
        let pixels = rect.to_pixels(600.0, 400.0);
        assert!(approx(pixels.x, 30.0));
        assert!(approx(pixels.width, 540.0));

        let back = pixels.to_percent(600.0, 400.0);
        assert!(approx(back.y, rect.y));
        assert!(approx(back.height, rect.height));
    }

    #[test]
    fn pixel_bounds_cover_fractional_region() {
        let rect = SourceRect { x: 10.4, y: 0.5, width: 20.2, height: 999.0 };
        assert_eq!(rect.pixel_bounds(100, 100), (10, 0, 21, 100));
    }

    #[test]
    fn crop_rect_serializes_with_percent_unit() {
        let json = serde_json::to_value(CropRect::new(25.0, 25.0, 50.0, 50.0)).unwrap();
        assert_eq!(json["unit"], "percent");
        assert_eq!(json["width"], 50.0);
    }
}
