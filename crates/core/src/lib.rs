//! Header Crop Core Library
//!
//! This library provides the crop engine behind the header image dialog of
//! the travel CMS admin panel: picking a crop box on a displayed image,
//! zooming and rotating it, rendering the site's 1920x873 header bitmap, and
//! storing the result on the CMS.
//!
//! # Overview
//!
//! - **Geometry**: Percent, displayed and source pixel spaces via [`geometry`]
//! - **Presets**: Aspect-ratio presets and initial crop boxes via [`aspect`]
//! - **Rendering**: Cover-fit, zoom and rotation via [`transform`]
//! - **Preview**: Small header preview with the site overlay via [`preview`]
//! - **Upload**: Multipart upload to the CMS via [`upload`]
//! - **Dialog**: State, actions and the confirm flow via [`dialog`]
//! - **User Interface**: The interactive window via [`ui`]
//!
//! # Quick Start
//!
//! The simplest way to use the library is through the [`HeaderCropper`] facade:
//!
//! ```ignore
//! use header_crop_core::HeaderCropper;
//!
//! // Initialize with environment configuration
//! let cropper = HeaderCropper::new()?;
//!
//! // Load the image the form refers to
//! let source = cropper.load("/uploads/destinations/bali.jpg").await?;
//!
//! // Launch the dialog
//! if let Some(path) = cropper.run_interactive(source)? {
//!     println!("{}", path);
//! }
//! ```
//!
//! # Module Structure
//!
//! - [`aspect`]: Aspect-ratio presets
//! - [`config`]: Configuration loading and management
//! - [`dialog`]: Dialog state machine and confirm flow
//! - [`error`]: Error types and result aliases
//! - [`geometry`]: Coordinate spaces and mappings
//! - [`preview`]: Live preview renderer
//! - [`source`]: Source image loading
//! - [`transform`]: Header renderer and JPEG export
//! - [`ui`]: User interface components
//! - [`upload`]: CMS upload bridge

pub mod aspect;
pub mod config;
pub mod dialog;
pub mod error;
pub mod geometry;
pub mod preview;
pub mod source;
pub mod transform;
pub mod ui;
pub mod upload;

// Re-export primary types for convenience
pub use config::Config;
pub use dialog::{CropDialog, DialogState, LogNotifier, Notice, Notifier};
pub use error::{AppError, Result};
pub use source::{SourceImage, SourceLoader};
pub use transform::TransformParams;
pub use upload::{HttpImageStore, ImageStore};

/// Main entry point for the header cropper.
///
/// This struct holds the configuration together with the loader and the
/// upload store built from it.
///
/// # Example
///
/// ```ignore
/// use header_crop_core::HeaderCropper;
///
/// let cropper = HeaderCropper::new()?;
/// let source = cropper.load("bali.jpg").await?;
/// cropper.run_interactive(source)?;
/// ```
pub struct HeaderCropper {
    config: Config,
    loader: SourceLoader,
    store: HttpImageStore,
}

impl HeaderCropper {
    /// Creates a cropper from the environment (including `.env` files).
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `CMS_BASE_URL` is missing or any configured URL is invalid
    /// - The HTTP client cannot be created
    pub fn new() -> Result<Self> {
        Self::with_config(Config::load()?)
    }

    /// Creates a cropper with custom configuration.
    pub fn with_config(config: Config) -> Result<Self> {
        let loader = SourceLoader::new(&config)?;
        let store = HttpImageStore::new(&config)?;
        Ok(Self {
            config,
            loader,
            store,
        })
    }

    /// Loads a source image from a local path, a URL or a CMS path.
    pub async fn load(&self, reference: &str) -> Result<SourceImage> {
        self.loader.load(reference).await
    }

    /// The upload store for the configured endpoint.
    pub fn store(&self) -> &HttpImageStore {
        &self.store
    }

    /// Opens the interactive dialog on a loaded image.
    ///
    /// Returns the stored path, or `None` if the user cancelled.
    pub fn run_interactive(&self, source: SourceImage) -> Result<Option<String>> {
        ui::run_crop_dialog(source, self.config.clone())
    }

    /// Returns a reference to the current configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns a mutable reference to the configuration.
    ///
    /// Changes to the upload URL only apply to stores created afterwards.
    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }
}

/// Initializes the library by loading environment variables.
///
/// Call this once at application startup before using any other functions.
/// This loads `.env` files if present.
pub fn init() {
    let _ = dotenvy::dotenv();
}
