//! Source image loading.
//!
//! The cropper opens images by reference, the same way the admin forms store
//! them: a local file, an absolute URL, or a path on the CMS such as
//! `/uploads/destinations/bali.jpg`, which is resolved against the configured
//! base URL.
//!
//! # Example
//!
//! ```ignore
//! use header_crop_core::source::SourceLoader;
//!
//! let loader = SourceLoader::new(&config)?;
//! let source = loader.load("/uploads/destinations/bali.jpg").await?;
//! println!("{} is {}x{}", source.name, source.image.width(), source.image.height());
//! ```

use crate::config::Config;
use crate::error::{AppError, Result};
use image::DynamicImage;
use log::{debug, info};
use std::path::{Path, PathBuf};
use url::Url;

/// Where a reference points to.
#[derive(Debug, Clone, PartialEq)]
pub enum Location {
    Local(PathBuf),
    Remote(Url),
}

impl Location {
    /// Classifies a reference. An existing local file wins; `http(s)` URLs
    /// are fetched as-is; anything else is taken as a CMS path.
    pub fn classify(reference: &str, config: &Config, exists_locally: bool) -> Result<Self> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(AppError::load("Empty image reference"));
        }
        if exists_locally {
            return Ok(Self::Local(PathBuf::from(reference)));
        }
        if reference.starts_with("http://") || reference.starts_with("https://") {
            let url = Url::parse(reference)
                .map_err(|e| AppError::load(format!("Invalid URL '{}': {}", reference, e)))?;
            return Ok(Self::Remote(url));
        }
        Ok(Self::Remote(config.resolve(reference)?))
    }
}

/// A decoded source image and the file name it came from.
#[derive(Debug, Clone)]
pub struct SourceImage {
    pub image: DynamicImage,
    /// Last segment of the reference; seeds the upload file name.
    pub name: String,
}

/// Fetches and decodes source images.
pub struct SourceLoader {
    client: reqwest::Client,
    config: Config,
}

impl SourceLoader {
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("header-crop/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AppError::config(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    /// Loads an image by reference.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::ImageLoad`] when the file or URL cannot be read,
    /// the server answers with a non-success status, or decoding fails.
    pub async fn load(&self, reference: &str) -> Result<SourceImage> {
        let exists = Path::new(reference.trim()).is_file();
        let location = Location::classify(reference, &self.config, exists)?;
        debug!("Loading {:?}", location);

        let (image, name) = match location {
            Location::Local(path) => {
                let image = image::open(&path)
                    .map_err(|e| AppError::load(format!("{}: {}", path.display(), e)))?;
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                (image, name)
            }
            Location::Remote(url) => {
                let image = self.fetch(&url).await?;
                let name = url
                    .path_segments()
                    .and_then(|mut segments| segments.next_back())
                    .unwrap_or_default()
                    .to_string();
                (image, name)
            }
        };

        info!("Loaded '{}' ({}x{})", name, image.width(), image.height());
        Ok(SourceImage { image, name })
    }

    async fn fetch(&self, url: &Url) -> Result<DynamicImage> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| AppError::load(format!("{}: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::load(format!("{} answered HTTP {}", url, status)));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| AppError::load(format!("{}: {}", url, e)))?;

        image::load_from_memory(&bytes).map_err(|e| AppError::load(format!("{}: {}", url, e)))
    }
}

/// Size an image is shown at when fitted inside `max_width` x `max_height`,
/// the way a CSS `max-width`/`max-height` image behaves. Never upscales.
pub fn display_size(natural: (u32, u32), max_width: f32, max_height: f32) -> (f32, f32) {
    let (width, height) = (natural.0 as f32, natural.1 as f32);
    if width <= 0.0 || height <= 0.0 {
        return (0.0, 0.0);
    }
    let factor = (max_width / width).min(max_height / height).min(1.0);
    (width * factor, height * factor)
}
