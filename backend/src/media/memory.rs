//! Image host that keeps everything in process

use super::{MediaError, MediaHost, UploadedMedia};
use async_trait::async_trait;
use std::path::Path;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

#[derive(Clone, Default)]
pub struct InMemoryMediaHost {
    fail: bool,
    uploaded: Arc<Mutex<Vec<UploadedMedia>>>,
    destroyed: Arc<Mutex<Vec<String>>>,
}

impl InMemoryMediaHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// A host that rejects every request
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn uploaded(&self) -> Vec<UploadedMedia> {
        self.uploaded.lock().map(|v| v.clone()).unwrap_or_default()
    }

    pub fn destroyed(&self) -> Vec<String> {
        self.destroyed.lock().map(|v| v.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl MediaHost for InMemoryMediaHost {
    async fn upload(&self, local_path: &Path) -> Result<UploadedMedia, MediaError> {
        // Fail like a real host would on an unreadable file
        tokio::fs::metadata(local_path).await?;
        if self.fail {
            return Err(MediaError::Rejected {
                status: 503,
                body: "upload disabled".to_string(),
            });
        }
        let public_id = Uuid::new_v4().simple().to_string();
        let media = UploadedMedia {
            url: format!("https://media.invalid/{}", public_id),
            public_id,
        };
        if let Ok(mut uploaded) = self.uploaded.lock() {
            uploaded.push(media.clone());
        }
        Ok(media)
    }

    async fn destroy(&self, public_id: &str) -> Result<(), MediaError> {
        if self.fail {
            return Err(MediaError::Rejected {
                status: 503,
                body: "destroy disabled".to_string(),
            });
        }
        if let Ok(mut destroyed) = self.destroyed.lock() {
            destroyed.push(public_id.to_string());
        }
        Ok(())
    }
}
