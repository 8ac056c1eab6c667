//! Cloudinary-compatible image host over its REST upload API
//!
//! Requests are signed: SHA-1 over the alphabetically sorted `key=value`
//! parameters joined with `&`, followed by the API secret.

use super::{MediaError, MediaHost, UploadedMedia};
use crate::config::MediaConfig;
use async_trait::async_trait;
use chrono::Utc;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use sha1::{Digest, Sha1};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

#[derive(Deserialize)]
struct UploadResponse {
    #[serde(default)]
    secure_url: Option<String>,
    #[serde(default)]
    url: Option<String>,
    public_id: String,
}

#[derive(Deserialize)]
struct DestroyResponse {
    result: String,
}

#[derive(Clone)]
pub struct CloudinaryHost {
    client: reqwest::Client,
    base_url: String,
    cloud_name: String,
    api_key: String,
    api_secret: String,
}

impl CloudinaryHost {
    pub fn new(config: &MediaConfig) -> Result<Self, MediaError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            cloud_name: config.cloud_name.clone(),
            api_key: config.api_key.clone(),
            api_secret: config.api_secret.clone(),
        })
    }

    fn endpoint(&self, resource: &str, action: &str) -> String {
        format!("{}/{}/{}/{}", self.base_url, self.cloud_name, resource, action)
    }

    async fn send(&self, url: String, form: Form) -> Result<reqwest::Response, MediaError> {
        let response = self.client.post(&url).multipart(form).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MediaError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

/// Signature over the signed parameters. `file`, `api_key` and
/// `resource_type` are never part of it.
pub fn sign(params: &[(&str, String)], api_secret: &str) -> String {
    let mut sorted: Vec<&(&str, String)> = params.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));
    let joined = sorted
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");
    hex::encode(Sha1::digest(format!("{}{}", joined, api_secret).as_bytes()))
}

#[async_trait]
impl MediaHost for CloudinaryHost {
    async fn upload(&self, local_path: &Path) -> Result<UploadedMedia, MediaError> {
        let bytes = tokio::fs::read(local_path).await?;
        let file_name = local_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());

        let timestamp = Utc::now().timestamp().to_string();
        let signature = sign(&[("timestamp", timestamp.clone())], &self.api_secret);

        let form = Form::new()
            .part("file", Part::bytes(bytes).file_name(file_name))
            .text("api_key", self.api_key.clone())
            .text("timestamp", timestamp)
            .text("signature", signature);

        let response = self.send(self.endpoint("auto", "upload"), form).await?;
        let body: UploadResponse = response
            .json()
            .await
            .map_err(|e| MediaError::Malformed(e.to_string()))?;

        let url = body
            .secure_url
            .or(body.url)
            .ok_or_else(|| MediaError::Malformed("response carried no url".to_string()))?;
        debug!(public_id = %body.public_id, "Image host accepted upload");

        Ok(UploadedMedia {
            url,
            public_id: body.public_id,
        })
    }

    async fn destroy(&self, public_id: &str) -> Result<(), MediaError> {
        let timestamp = Utc::now().timestamp().to_string();
        let signature = sign(
            &[
                ("public_id", public_id.to_string()),
                ("timestamp", timestamp.clone()),
            ],
            &self.api_secret,
        );

        let form = Form::new()
            .text("public_id", public_id.to_string())
            .text("api_key", self.api_key.clone())
            .text("timestamp", timestamp)
            .text("signature", signature);

        let response = self.send(self.endpoint("image", "destroy"), form).await?;
        let body: DestroyResponse = response
            .json()
            .await
            .map_err(|e| MediaError::Malformed(e.to_string()))?;

        if body.result != "ok" {
            return Err(MediaError::Rejected {
                status: 200,
                body: body.result,
            });
        }
        Ok(())
    }
}
