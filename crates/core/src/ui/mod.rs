//! Desktop window for the crop dialog.
//!
//! This module shows the image with a draggable crop box, the preset,
//! zoom and rotation controls and a live header preview, and uploads the
//! result when the user confirms.
//!
//! # Architecture
//!
//! The UI is split into focused submodules:
//! - [`state`]: Result and event types shared with the background upload
//! - [`settings`]: User preferences and persistence
//! - [`rendering`]: Drawing utilities for the crop box and textures
//! - [`selection`]: Pointer interaction with the crop box
//! - [`crop_dialog`]: Main application logic
//!
//! All dialog rules live in [`crate::dialog`]; the window only turns input
//! into actions and draws the resulting state.
//!
//! # Usage
//!
//! ```ignore
//! use header_crop_core::{ui, Config, SourceLoader};
//!
//! let config = Config::load()?;
//! let source = SourceLoader::new(&config)?.load("/uploads/bali.jpg").await?;
//!
//! if let Some(path) = ui::run_crop_dialog(source, config)? {
//!     println!("Stored at {}", path);
//! }
//! ```

mod crop_dialog;
mod rendering;
mod selection;
mod settings;
mod state;

// Public API exports
pub use crop_dialog::CropDialogApp;
pub use settings::Settings;
pub use state::DialogResult;

use crate::config::Config;
use crate::error::Result;
use crate::source::SourceImage;

/// Opens the crop dialog and blocks until the window is closed.
///
/// # Returns
/// - `Ok(Some(path))` - The crop was stored under `path`
/// - `Ok(None)` - The user cancelled
/// - `Err(e)` - The window could not be created or run
pub fn run_crop_dialog(source: SourceImage, config: Config) -> Result<Option<String>> {
    crop_dialog::run(source, config)
}
