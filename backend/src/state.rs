//! Application state shared by every handler
//!
//! Built once at startup. Every field is cheap to clone (`Arc` or already
//! reference counted) and read-only while serving requests.

use crate::auth::JwtService;
use crate::config::AppConfig;
use crate::media::{MediaHost, MediaUploader};
use crate::repositories::Repository;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    /// Storage seam (Postgres in production, in-memory in tests)
    pub repo: Arc<dyn Repository>,
    pub media: MediaUploader,
    pub config: Arc<AppConfig>,
    /// Keys derived once from the configured secrets
    pub jwt: JwtService,
}

impl AppState {
    pub fn new(repo: Arc<dyn Repository>, media_host: Arc<dyn MediaHost>, config: AppConfig) -> Self {
        let jwt = JwtService::from_config(&config.jwt);

        Self {
            repo,
            media: MediaUploader::new(media_host),
            config: Arc::new(config),
            jwt,
        }
    }

    #[inline]
    pub fn repo(&self) -> &dyn Repository {
        self.repo.as_ref()
    }

    #[inline]
    pub fn media(&self) -> &MediaUploader {
        &self.media
    }

    #[inline]
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    #[inline]
    pub fn jwt(&self) -> &JwtService {
        &self.jwt
    }
}
