//! Aspect-ratio presets and crop recomputation.

use crate::geometry::CropRect;
use log::debug;
use serde::Serialize;

/// Horizontal inset of a ratio-locked crop box, per side, in percent.
const INSET_X: f32 = 5.0;
/// Width of a ratio-locked crop box, in percent.
const LOCKED_WIDTH: f32 = 100.0 - 2.0 * INSET_X;
/// Tallest a ratio-locked crop box may get, in percent.
const MAX_LOCKED_HEIGHT: f32 = 95.0;

/// A named target ratio. `value` is width / height; `0.0` means freeform.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AspectRatioPreset {
    pub name: &'static str,
    /// Short key for command lines and settings files.
    pub key: &'static str,
    pub value: f32,
}

impl AspectRatioPreset {
    pub fn is_freeform(&self) -> bool {
        self.value == 0.0
    }
}

/// The presets offered by the cropper. The first one is the site header.
pub const PRESETS: &[AspectRatioPreset] = &[
    AspectRatioPreset { name: "Header (2.2:1)", key: "header", value: 2.2 },
    AspectRatioPreset { name: "Breed (16:9)", key: "wide", value: 16.0 / 9.0 },
    AspectRatioPreset { name: "Standaard (4:3)", key: "standard", value: 4.0 / 3.0 },
    AspectRatioPreset { name: "Vierkant (1:1)", key: "square", value: 1.0 },
    AspectRatioPreset { name: "Vrij", key: "free", value: 0.0 },
];

/// Index of the preset selected when a dialog opens.
pub const DEFAULT_PRESET: usize = 0;

/// Looks a preset up by key or name, ignoring case.
pub fn find_preset(query: &str) -> Option<usize> {
    let query = query.trim();
    PRESETS
        .iter()
        .position(|p| p.key.eq_ignore_ascii_case(query) || p.name.eq_ignore_ascii_case(query))
}

/// Recomputes the crop box for ratio `ratio` on an image displayed at
/// `display_width` x `display_height`.
///
/// A positive ratio yields a box 90% wide, 5% from the left edge, as tall as
/// the ratio demands (at most 95%) and vertically centered. A ratio of zero
/// resets to a centered 50% x 50% box.
pub fn apply_aspect_ratio(ratio: f32, display_width: f32, display_height: f32) -> CropRect {
    if ratio <= 0.0 || !ratio.is_finite() {
        return CropRect::new(25.0, 25.0, 50.0, 50.0);
    }

    let height = ((LOCKED_WIDTH / ratio) * (display_width / display_height)).min(MAX_LOCKED_HEIGHT);
    let y = ((100.0 - height) / 2.0).max(0.0);

    let rect = CropRect::new(INSET_X, y, LOCKED_WIDTH, height);
    debug!(
        "Aspect {:.3} on {}x{} display -> {:?}",
        ratio, display_width, display_height, rect
    );
    rect
}

/// Ratio of the crop box in percent units for a preset on a given display,
/// the lock used while dragging. `None` for freeform.
pub fn percent_ratio(ratio: f32, display_width: f32, display_height: f32) -> Option<f32> {
    if ratio > 0.0 && display_width > 0.0 && display_height > 0.0 {
        Some(ratio * display_height / display_width)
    } else {
        None
    }
}
