use std::env;
use std::path::PathBuf;
use crate::error::{AppError, Result};
use dotenvy::dotenv;
use url::Url;

/// Folder the CMS stores header images in unless told otherwise.
pub const DEFAULT_DESTINATION: &str = "headers";
/// Title line drawn on the live preview.
pub const DEFAULT_PREVIEW_TITLE: &str = "Ontdek de wereld";
/// Subtitle line drawn on the live preview.
pub const DEFAULT_PREVIEW_SUBTITLE: &str = "Jouw volgende avontuur begint hier";

#[derive(Clone, Debug)]
pub struct Config {
    /// Base URL of the CMS; relative image paths resolve against it.
    pub base_url: Url,
    pub upload_url: Url,
    pub destination: String,
    /// Font used for the preview overlay text.
    pub font_path: Option<PathBuf>,
    pub preview_title: String,
    pub preview_subtitle: String,
    /// Which of the values above were given explicitly.
    pub pinned: Pinned,
}

/// Values set through the environment or the command line. Remembered UI
/// settings never replace a pinned value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Pinned {
    pub destination: bool,
    pub preview_title: bool,
    pub preview_subtitle: bool,
}

impl Config {
    pub fn load() -> Result<Self> {
        // Load .env file if it exists, ignore if it doesn't
        let _ = dotenv();

        let base = env::var("CMS_BASE_URL")
            .map_err(|_| AppError::MissingEnvVar("CMS_BASE_URL".to_string()))?;

        let mut builder = Self::builder().with_base_url(&base);

        if let Ok(upload) = env::var("CMS_UPLOAD_URL") {
            builder = builder.with_upload_url(&upload);
        }
        if let Ok(destination) = env::var("CMS_UPLOAD_DESTINATION") {
            builder = builder.with_destination(&destination);
        }
        if let Ok(font) = env::var("HEADER_FONT_PATH") {
            builder = builder.with_font_path(font);
        }
        if let Ok(title) = env::var("HEADER_PREVIEW_TITLE") {
            builder = builder.with_preview_title(&title);
        }
        if let Ok(subtitle) = env::var("HEADER_PREVIEW_SUBTITLE") {
            builder = builder.with_preview_subtitle(&subtitle);
        }

        builder.build()
    }

    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Sets the upload folder explicitly, e.g. from a command line flag.
    /// Blank values are ignored.
    pub fn pin_destination(&mut self, destination: &str) {
        let destination = destination.trim();
        if !destination.is_empty() {
            self.destination = destination.to_string();
            self.pinned.destination = true;
        }
    }

    /// Resolves a CMS-relative path such as `/uploads/x.jpg` against the base URL.
    pub fn resolve(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| AppError::config(format!("Cannot resolve '{}': {}", path, e)))
    }
}

/// Step-by-step construction of a [`Config`], used by `load` and by callers
/// that override single values (settings panel, CLI flags, tests).
#[derive(Default, Debug, Clone)]
pub struct ConfigBuilder {
    base_url: Option<String>,
    upload_url: Option<String>,
    destination: Option<String>,
    font_path: Option<PathBuf>,
    preview_title: Option<String>,
    preview_subtitle: Option<String>,
}

impl ConfigBuilder {
    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = Some(url.to_string());
        self
    }

    pub fn with_upload_url(mut self, url: &str) -> Self {
        self.upload_url = Some(url.to_string());
        self
    }

    pub fn with_destination(mut self, destination: &str) -> Self {
        self.destination = Some(destination.to_string());
        self
    }

    pub fn with_font_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.font_path = Some(path.into());
        self
    }

    pub fn with_preview_title(mut self, title: &str) -> Self {
        self.preview_title = Some(title.to_string());
        self
    }

    pub fn with_preview_subtitle(mut self, subtitle: &str) -> Self {
        self.preview_subtitle = Some(subtitle.to_string());
        self
    }

    pub fn build(self) -> Result<Config> {
        let base = self
            .base_url
            .ok_or_else(|| AppError::config("CMS base URL is required"))?;

        // A base without trailing slash would drop its last segment on join
        let base = if base.ends_with('/') { base } else { format!("{}/", base) };
        let base_url = Url::parse(&base)
            .map_err(|e| AppError::config(format!("Invalid base URL '{}': {}", base, e)))?;

        let upload_url = match self.upload_url {
            Some(url) => Url::parse(&url)
                .map_err(|e| AppError::config(format!("Invalid upload URL '{}': {}", url, e)))?,
            None => base_url
                .join("api/upload")
                .map_err(|e| AppError::config(format!("Invalid upload URL: {}", e)))?,
        };

        let pinned = Pinned {
            destination: self.destination.as_ref().is_some_and(|d| !d.trim().is_empty()),
            preview_title: self.preview_title.is_some(),
            preview_subtitle: self.preview_subtitle.is_some(),
        };

        let destination = self
            .destination
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_DESTINATION.to_string());

        Ok(Config {
            base_url,
            upload_url,
            destination,
            font_path: self.font_path,
            preview_title: self
                .preview_title
                .unwrap_or_else(|| DEFAULT_PREVIEW_TITLE.to_string()),
            preview_subtitle: self
                .preview_subtitle
                .unwrap_or_else(|| DEFAULT_PREVIEW_SUBTITLE.to_string()),
            pinned,
        })
    }
}
