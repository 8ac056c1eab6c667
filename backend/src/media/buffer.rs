//! Multipart form buffering
//!
//! Text parts are kept in memory. File parts are written to the configured
//! temp directory under a random name and handed on by path.

use crate::error::ApiError;
use axum::extract::Multipart;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Default)]
pub struct BufferedForm {
    fields: HashMap<String, String>,
    files: HashMap<String, PathBuf>,
}

impl BufferedForm {
    /// Drain a multipart body. Empty file parts (no file chosen) are skipped.
    pub async fn from_multipart(
        mut multipart: Multipart,
        temp_dir: &Path,
        max_file_bytes: usize,
    ) -> Result<Self, ApiError> {
        let mut form = BufferedForm::default();

        let result = form.drain(&mut multipart, temp_dir, max_file_bytes).await;
        if let Err(e) = result {
            form.cleanup().await;
            return Err(e);
        }
        Ok(form)
    }

    async fn drain(
        &mut self,
        multipart: &mut Multipart,
        temp_dir: &Path,
        max_file_bytes: usize,
    ) -> Result<(), ApiError> {
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::Validation(format!("Malformed multipart body: {}", e)))?
        {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };

            let file_name = field.file_name().map(str::to_string);
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::Validation(format!("Could not read field {}: {}", name, e)))?;

            match file_name {
                Some(original) => {
                    if original.is_empty() && bytes.is_empty() {
                        continue;
                    }
                    if bytes.len() > max_file_bytes {
                        return Err(ApiError::Validation(format!(
                            "{} exceeds the {} byte limit",
                            name, max_file_bytes
                        )));
                    }
                    let path = temp_dir.join(temp_name(&original));
                    tokio::fs::create_dir_all(temp_dir)
                        .await
                        .map_err(|e| ApiError::Internal(e.into()))?;
                    tokio::fs::write(&path, &bytes)
                        .await
                        .map_err(|e| ApiError::Internal(e.into()))?;
                    debug!(field = %name, path = %path.display(), size = bytes.len(), "Buffered upload");
                    if let Some(previous) = self.files.insert(name, path) {
                        remove_quietly(&previous).await;
                    }
                }
                None => {
                    let text = String::from_utf8(bytes.to_vec()).map_err(|_| {
                        ApiError::Validation(format!("Field {} is not valid UTF-8", name))
                    })?;
                    self.fields.insert(name, text);
                }
            }
        }
        Ok(())
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn file(&self, name: &str) -> Option<&Path> {
        self.files.get(name).map(PathBuf::as_path)
    }

    /// Remove any buffered file still on disk
    pub async fn cleanup(&self) {
        for path in self.files.values() {
            remove_quietly(path).await;
        }
    }
}

/// Random name that keeps the original extension
fn temp_name(original: &str) -> String {
    let ext = Path::new(original)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| e.len() <= 8 && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|e| format!(".{}", e.to_ascii_lowercase()))
        .unwrap_or_default();
    format!("{}{}", Uuid::new_v4().simple(), ext)
}

async fn remove_quietly(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Could not remove temp upload"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temp_name_keeps_safe_extension() {
        assert!(temp_name("cat.JPG").ends_with(".jpg"));
        assert!(!temp_name("../../etc/passwd").contains('/'));
        assert!(!temp_name("evil.p/hp").contains('/'));
        assert!(!temp_name("noext").contains('.'));
    }

    #[tokio::test]
    async fn test_cleanup_ignores_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join("a.png");
        tokio::fs::write(&present, b"x").await.unwrap();

        let mut form = BufferedForm::default();
        form.files.insert("avatar".to_string(), present.clone());
        form.files.insert("gone".to_string(), dir.path().join("missing.png"));

        form.cleanup().await;
        assert!(!present.exists());
    }
}
