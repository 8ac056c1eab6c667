//! Media upload adapter
//!
//! Images arrive as multipart uploads, are buffered to a local temp file
//! (`buffer`), then forwarded to the external image host (`MediaHost`).
//! `MediaUploader` removes the local file whatever the outcome.

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

pub mod buffer;
pub mod cloudinary;
pub mod memory;

pub use buffer::BufferedForm;
pub use cloudinary::CloudinaryHost;
pub use memory::InMemoryMediaHost;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("could not read local file: {0}")]
    Io(#[from] std::io::Error),

    #[error("image host unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("image host rejected the request ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("unexpected image host response: {0}")]
    Malformed(String),
}

/// Where an uploaded image now lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedMedia {
    pub url: String,
    /// Host-side id, used to destroy the image later
    pub public_id: String,
}

#[async_trait]
pub trait MediaHost: Send + Sync {
    async fn upload(&self, local_path: &Path) -> Result<UploadedMedia, MediaError>;

    async fn destroy(&self, public_id: &str) -> Result<(), MediaError>;
}

/// Entry point used by services
#[derive(Clone)]
pub struct MediaUploader {
    host: Arc<dyn MediaHost>,
}

impl MediaUploader {
    pub fn new(host: Arc<dyn MediaHost>) -> Self {
        Self { host }
    }

    /// Forward a buffered file. `None` on any failure. The local file is
    /// removed on both paths; a failed removal is only logged.
    pub async fn upload(&self, local_path: &Path) -> Option<UploadedMedia> {
        let result = self.host.upload(local_path).await;

        if let Err(e) = tokio::fs::remove_file(local_path).await {
            warn!(path = %local_path.display(), error = %e, "Could not remove temp upload");
        }

        match result {
            Ok(media) => {
                info!(url = %media.url, "File uploaded to image host");
                Some(media)
            }
            Err(e) => {
                warn!(path = %local_path.display(), error = %e, "Upload to image host failed");
                None
            }
        }
    }

    /// Best effort; returns whether the host confirmed the removal
    pub async fn destroy(&self, public_id: &str) -> bool {
        match self.host.destroy(public_id).await {
            Ok(()) => true,
            Err(e) => {
                warn!(public_id, error = %e, "Could not destroy image on host");
                false
            }
        }
    }
}
