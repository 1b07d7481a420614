//! Upload bridge to the CMS.
//!
//! The CMS stores the exported header and answers with the public path of
//! the stored file. This module only knows the wire format of that
//! exchange: a `multipart/form-data` POST with three fields and a JSON reply.
//!
//! # Wire format
//!
//! | field         | content                                         |
//! |---------------|-------------------------------------------------|
//! | `image`       | the JPEG bytes, sent as `<fileName>.jpg`        |
//! | `destination` | folder name on the CMS side                     |
//! | `fileName`    | stem without extension, the server adds `.jpg`  |
//!
//! The reply is `{ "path": "/uploads/<destination>/<fileName>.jpg" }`.

use crate::config::Config;
use crate::error::{AppError, Result};
use chrono::{DateTime, Utc};
use log::{debug, info};
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::future::Future;
use url::Url;

/// Stem used when the original file name has nothing usable in it.
const FALLBACK_STEM: &str = "header";

/// One exported header on its way to the CMS.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadRequest {
    pub image: Vec<u8>,
    pub destination: String,
    /// File name without extension.
    pub file_name: String,
}

/// Persists exported images and reports where they ended up.
pub trait ImageStore {
    /// Stores the image and returns its public path.
    fn upload(&self, request: UploadRequest) -> impl Future<Output = Result<String>> + Send;
}

#[derive(Deserialize)]
struct UploadResponse {
    path: Option<String>,
}

/// [`ImageStore`] backed by the CMS upload endpoint.
#[derive(Clone, Debug)]
pub struct HttpImageStore {
    client: reqwest::Client,
    endpoint: Url,
}

impl HttpImageStore {
    pub fn new(config: &Config) -> Result<Self> {
        Self::with_endpoint(config.upload_url.clone())
    }

    pub fn with_endpoint(endpoint: Url) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("header-crop/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AppError::config(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client, endpoint })
    }

    /// Where uploads are posted to.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn form(request: UploadRequest) -> Result<Form> {
        let image = Part::bytes(request.image)
            .file_name(format!("{}.jpg", request.file_name))
            .mime_str("image/jpeg")
            .map_err(|e| AppError::export(format!("Invalid image part: {}", e)))?;

        Ok(Form::new()
            .part("image", image)
            .text("destination", request.destination)
            .text("fileName", request.file_name))
    }
}

impl ImageStore for HttpImageStore {
    async fn upload(&self, request: UploadRequest) -> Result<String> {
        debug!(
            "Uploading {} bytes as {}/{} to {}",
            request.image.len(),
            request.destination,
            request.file_name,
            self.endpoint
        );

        let response = self
            .client
            .post(self.endpoint.clone())
            .multipart(Self::form(request)?)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(AppError::UploadFailed {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: UploadResponse = serde_json::from_str(&body)
            .map_err(|e| AppError::InvalidResponse(format!("{}: {}", e, body)))?;

        match parsed.path {
            Some(path) if !path.trim().is_empty() => {
                info!("Stored header at {}", path);
                Ok(path)
            }
            _ => Err(AppError::InvalidResponse(format!("no path in {}", body))),
        }
    }
}

/// Derives the upload file name from the original image name: a sanitized
/// stem plus a millisecond timestamp, so repeated crops never collide.
///
/// ```ignore
/// file_name_stem("/uploads/Bali Beach.JPG", now) // "bali-beach-1718000000000"
/// ```
pub fn file_name_stem(original: &str, now: DateTime<Utc>) -> String {
    let last = original
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(original);
    // query strings from URLs are not part of the name
    let last = last.split(['?', '#']).next().unwrap_or(last);
    let stem = match last.rfind('.') {
        Some(dot) if dot > 0 => &last[..dot],
        _ => last,
    };

    let mut cleaned = String::with_capacity(stem.len());
    for ch in stem.chars() {
        if ch.is_ascii_alphanumeric() {
            cleaned.push(ch.to_ascii_lowercase());
        } else if !cleaned.ends_with('-') {
            cleaned.push('-');
        }
    }
    let cleaned = cleaned.trim_matches('-');
    let stem = if cleaned.is_empty() { FALLBACK_STEM } else { cleaned };

    format!("{}-{}", stem, now.timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at() -> DateTime<Utc> {
        Utc.timestamp_millis_opt(1_718_000_000_123).unwrap()
    }

    #[test]
    fn stem_is_sanitized_and_timestamped() {
        assert_eq!(
            file_name_stem("/uploads/destinations/Bali Beach.JPG", at()),
            "bali-beach-1718000000123"
        );
        assert_eq!(
            file_name_stem("C:\\foto's\\Kaapstad_2024 (1).jpeg", at()),
            "kaapstad-2024-1-1718000000123"
        );
    }

    #[test]
    fn stem_ignores_url_query() {
        assert_eq!(
            file_name_stem("https://cdn.example.com/img/rome.webp?w=800", at()),
            "rome-1718000000123"
        );
    }

    #[test]
    fn unusable_names_fall_back() {
        assert_eq!(file_name_stem("", at()), "header-1718000000123");
        assert_eq!(file_name_stem("/uploads/ñññ.png", at()), "header-1718000000123");
        assert_eq!(file_name_stem(".hidden", at()), "hidden-1718000000123");
    }

    #[test]
    fn store_posts_to_configured_upload_url() {
        let config = Config::builder()
            .with_base_url("https://cms.example.com")
            .build()
            .unwrap();
        let store = HttpImageStore::new(&config).unwrap();
        assert_eq!(store.endpoint().as_str(), "https://cms.example.com/api/upload");

        let custom = Config::builder()
            .with_base_url("https://cms.example.com")
            .with_upload_url("https://files.example.com/upload")
            .build()
            .unwrap();
        assert_eq!(HttpImageStore::new(&custom).unwrap().endpoint(), &custom.upload_url);
    }
}
