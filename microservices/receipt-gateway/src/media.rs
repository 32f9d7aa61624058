//! WhatsApp media retrieval
//!
//! Two-step Graph API download: resolve the media id to a short-lived CDN
//! URL, then fetch the bytes. The image lands in a temp file owned by a
//! guard that deletes it on drop, so every dialogue outcome cleans up.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::GatewayConfig;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Graph API error: {0}")]
    Api(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, MediaError>;

/// A downloaded receipt image. The backing file is removed when the guard
/// drops, covering success, rejection, and error paths alike.
#[derive(Debug)]
pub struct TempImage {
    path: PathBuf,
    mime_type: String,
}

impl TempImage {
    pub fn new(path: PathBuf, mime_type: String) -> Self {
        Self { path, mime_type }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub async fn read_bytes(&self) -> Result<Vec<u8>> {
        Ok(tokio::fs::read(&self.path).await?)
    }
}

impl Drop for TempImage {
    fn drop(&mut self) {
        if let Err(err) = std::fs::remove_file(&self.path) {
            if err.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %self.path.display(), error = %err, "Failed to remove temp image");
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct MediaMetadata {
    url: String,
    #[serde(default)]
    mime_type: Option<String>,
}

/// Media download boundary, injectable for dialogue tests.
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    async fn fetch_image(&self, media_id: &str) -> Result<TempImage>;
}

pub struct WhatsAppMediaClient {
    client: reqwest::Client,
    graph_api_base: String,
    access_token: String,
    tmp_dir: PathBuf,
}

impl WhatsAppMediaClient {
    pub fn new(config: &GatewayConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.request_timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            graph_api_base: config.graph_api_base.clone(),
            access_token: config.access_token.clone(),
            tmp_dir: PathBuf::from(&config.media_tmp_dir),
        }
    }
}

fn extension_for(mime_type: &str) -> &'static str {
    match mime_type {
        "image/png" => "png",
        "image/webp" => "webp",
        "image/heic" => "heic",
        _ => "jpg",
    }
}

#[async_trait]
impl MediaFetcher for WhatsAppMediaClient {
    async fn fetch_image(&self, media_id: &str) -> Result<TempImage> {
        let url = format!("{}/{}", self.graph_api_base, media_id);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.access_token)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(MediaError::Api(error_text));
        }

        let metadata: MediaMetadata = response.json().await?;
        let mime_type = metadata
            .mime_type
            .unwrap_or_else(|| "image/jpeg".to_string());

        // The CDN URL is short-lived and still requires the bearer token.
        let download = self
            .client
            .get(&metadata.url)
            .bearer_auth(&self.access_token)
            .send()
            .await?;

        if !download.status().is_success() {
            let error_text = download.text().await.unwrap_or_default();
            return Err(MediaError::Api(error_text));
        }

        let bytes = download.bytes().await?;

        tokio::fs::create_dir_all(&self.tmp_dir).await?;
        let filename = format!(
            "receipt_{}.{}",
            chrono::Utc::now().timestamp_millis(),
            extension_for(&mime_type)
        );
        // Guard first: a failed write must still remove the partial file.
        let image = TempImage::new(self.tmp_dir.join(filename), mime_type);
        tokio::fs::write(image.path(), &bytes).await?;

        debug!(
            media_id = %media_id,
            path = %image.path().display(),
            size = bytes.len(),
            "Stored receipt image"
        );

        Ok(image)
    }
}
