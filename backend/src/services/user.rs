//! User service: registration, login, token lifecycle and profiles
//!
//! Password hashing and verification run on the blocking pool through
//! `PasswordService::*_async`.

use crate::auth::{fingerprint, JwtService, PasswordService, RefreshTokenState};
use crate::error::ApiError;
use crate::media::MediaUploader;
use crate::repositories::{DuplicateUser, NewUser, Repository, UserRepository};
use photogram_shared::validation::{
    is_blank, normalize_username, require_all, validate_password, validate_username,
};
use photogram_shared::{LoginResponse, PublicUser, TokenPair};
use std::path::PathBuf;
use tracing::{info, warn};
use uuid::Uuid;
use validator::ValidateEmail;

/// Registration fields as they arrive from the multipart form
#[derive(Debug, Default, Clone)]
pub struct Registration {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub full_name: Option<String>,
    /// Buffered avatar file, if one was sent
    pub avatar: Option<PathBuf>,
}

pub struct UserService;

impl UserService {
    pub async fn register(
        repo: &dyn Repository,
        media: &MediaUploader,
        form: Registration,
    ) -> Result<PublicUser, ApiError> {
        require_all(&[
            form.full_name.as_deref(),
            form.email.as_deref(),
            form.username.as_deref(),
            form.password.as_deref(),
        ])
        .map_err(ApiError::Validation)?;

        let username = normalize_username(form.username.as_deref().unwrap_or_default());
        let email = form.email.as_deref().unwrap_or_default().trim().to_string();
        let full_name = form.full_name.as_deref().unwrap_or_default().trim().to_string();
        let password = form.password.unwrap_or_default();

        validate_username(&username).map_err(ApiError::Validation)?;
        if !email.validate_email() {
            return Err(ApiError::Validation("Invalid email format".to_string()));
        }
        validate_password(&password).map_err(ApiError::Validation)?;

        if repo
            .username_or_email_taken(&username, &email)
            .await
            .map_err(ApiError::Internal)?
        {
            return Err(ApiError::Conflict(
                "User with email or username already exists".to_string(),
            ));
        }

        let avatar_path = form
            .avatar
            .ok_or_else(|| ApiError::Validation("Avatar file is required".to_string()))?;
        let avatar = media
            .upload(&avatar_path)
            .await
            .ok_or_else(|| ApiError::Upload("Could not upload avatar".to_string()))?;

        let created = match PasswordService::hash_async(password).await {
            Ok(password_hash) => {
                repo.create_user(NewUser {
                    username,
                    email,
                    password_hash,
                    full_name,
                    avatar: avatar.url,
                })
                .await
            }
            Err(e) => Err(e),
        };

        let user = match created {
            Ok(user) => user,
            Err(e) => {
                media.destroy(&avatar.public_id).await;
                if e.is::<DuplicateUser>() {
                    warn!("Registration lost a race on username or email");
                    return Err(ApiError::Conflict(
                        "User with email or username already exists".to_string(),
                    ));
                }
                return Err(ApiError::Internal(e));
            }
        };

        info!(user_id = %user.id, username = %user.username, "User registered");
        Ok(user.to_public())
    }

    pub async fn login(
        repo: &dyn Repository,
        jwt: &JwtService,
        username: Option<&str>,
        email: Option<&str>,
        password: &str,
    ) -> Result<LoginResponse, ApiError> {
        let username = username.filter(|u| !is_blank(Some(*u))).map(normalize_username);
        let email = email.map(str::trim).filter(|e| !e.is_empty());
        if username.is_none() && email.is_none() {
            return Err(ApiError::Validation(
                "username or email is required".to_string(),
            ));
        }

        let user = repo
            .find_user_by_login(username.as_deref(), email)
            .await
            .map_err(ApiError::Internal)?
            .ok_or_else(|| ApiError::NotFound("User does not exist".to_string()))?;

        let valid = PasswordService::verify_async(password.to_string(), user.password_hash.clone())
            .await
            .map_err(ApiError::Internal)?;
        if !valid {
            warn!(user_id = %user.id, "Login with incorrect password");
            return Err(ApiError::Unauthorized("Incorrect password".to_string()));
        }

        let tokens = jwt.issue_pair(user.id).map_err(ApiError::Internal)?;
        let stored = fingerprint(&tokens.refresh_token);
        repo.set_refresh_token_hash(user.id, Some(stored.as_str()))
            .await
            .map_err(ApiError::Internal)?;

        info!(user_id = %user.id, "User logged in");
        Ok(LoginResponse {
            user: user.to_public(),
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
        })
    }

    /// Revoke the stored refresh token
    pub async fn logout(repo: &dyn Repository, user_id: Uuid) -> Result<(), ApiError> {
        repo.set_refresh_token_hash(user_id, None)
            .await
            .map_err(ApiError::Internal)?;
        info!(user_id = %user_id, "User logged out");
        Ok(())
    }

    /// Rotate a refresh token. Only the currently stored token may rotate,
    /// and the swap is conditional on it still being stored.
    pub async fn refresh(
        repo: &dyn Repository,
        jwt: &JwtService,
        presented: Option<&str>,
    ) -> Result<TokenPair, ApiError> {
        let presented = presented
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ApiError::Unauthorized("Unauthorized request".to_string()))?;

        let claims = jwt.verify_refresh_token(presented)?;
        let user_id = claims.user_id()?;

        let user = repo
            .find_user_by_id(user_id)
            .await
            .map_err(ApiError::Internal)?
            .ok_or(ApiError::InvalidToken)?;

        let state = RefreshTokenState::classify(user.refresh_token_hash.as_deref(), presented);
        if !state.can_rotate() {
            warn!(user_id = %user_id, ?state, "Refresh token rejected");
            return Err(ApiError::InvalidToken);
        }

        let tokens = jwt.issue_pair(user_id).map_err(ApiError::Internal)?;
        let swapped = repo
            .swap_refresh_token_hash(
                user_id,
                &fingerprint(presented),
                &fingerprint(&tokens.refresh_token),
            )
            .await
            .map_err(ApiError::Internal)?;
        if !swapped {
            warn!(user_id = %user_id, "Refresh token rotated concurrently");
            return Err(ApiError::InvalidToken);
        }

        Ok(tokens)
    }

    pub async fn change_password(
        repo: &dyn Repository,
        user_id: Uuid,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), ApiError> {
        let user = repo
            .find_user_by_id(user_id)
            .await
            .map_err(ApiError::Internal)?
            .ok_or(ApiError::UserNotFound)?;

        let valid = PasswordService::verify_async(old_password.to_string(), user.password_hash)
            .await
            .map_err(ApiError::Internal)?;
        if !valid {
            return Err(ApiError::Unauthorized("Incorrect old password".to_string()));
        }

        validate_password(new_password).map_err(ApiError::Validation)?;
        let hash = PasswordService::hash_async(new_password.to_string())
            .await
            .map_err(ApiError::Internal)?;
        repo.update_password_hash(user_id, &hash)
            .await
            .map_err(ApiError::Internal)?;

        info!(user_id = %user_id, "Password changed");
        Ok(())
    }

    pub async fn current_user(repo: &dyn Repository, user_id: Uuid) -> Result<PublicUser, ApiError> {
        repo.find_user_by_id(user_id)
            .await
            .map_err(ApiError::Internal)?
            .map(|u| u.to_public())
            .ok_or(ApiError::UserNotFound)
    }

    pub async fn get_profile(repo: &dyn Repository, username: &str) -> Result<PublicUser, ApiError> {
        repo.find_user_by_username(&normalize_username(username))
            .await
            .map_err(ApiError::Internal)?
            .map(|u| u.to_public())
            .ok_or_else(|| ApiError::NotFound("User not found".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::InMemoryMediaHost;
    use crate::repositories::MemoryRepository;
    use fake::faker::internet::en::Username;
    use fake::Fake;
    use std::sync::Arc;

    struct Harness {
        repo: MemoryRepository,
        media: MediaUploader,
        jwt: JwtService,
        dir: tempfile::TempDir,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                repo: MemoryRepository::new(),
                media: MediaUploader::new(Arc::new(InMemoryMediaHost::new())),
                jwt: JwtService::new("access-secret", "refresh-secret", 3600, 86400),
                dir: tempfile::tempdir().unwrap(),
            }
        }

        fn avatar(&self) -> PathBuf {
            let path = self.dir.path().join(format!("{}.png", Uuid::new_v4()));
            std::fs::write(&path, b"\x89PNG").unwrap();
            path
        }

        fn form(&self, username: &str, email: &str) -> Registration {
            Registration {
                username: Some(username.to_string()),
                email: Some(email.to_string()),
                password: Some("hunter2hunter2".to_string()),
                full_name: Some("Ann Example".to_string()),
                avatar: Some(self.avatar()),
            }
        }

        async fn register(&self, username: &str) -> PublicUser {
            let email = format!("{}@example.com", username.to_lowercase());
            UserService::register(&self.repo, &self.media, self.form(username, &email))
                .await
                .unwrap()
        }
    }

    #[tokio::test]
    async fn test_register_hides_secrets_and_hashes_password() {
        let h = Harness::new();
        let generated: String = Username().fake();
        let username: String = std::iter::once('u')
            .chain(generated.chars().filter(char::is_ascii_alphanumeric))
            .take(24)
            .collect();
        let email = format!("{}@example.com", username);
        let user = UserService::register(&h.repo, &h.media, h.form(&username, &email))
            .await
            .unwrap();

        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password").is_none());
        assert!(json.get("passwordHash").is_none());
        assert!(json.get("refreshToken").is_none());

        let stored = h.repo.find_user_by_id(user.id).await.unwrap().unwrap();
        assert_ne!(stored.password_hash, "hunter2hunter2");
        assert!(stored.password_hash.starts_with("$argon2"));
    }

    #[tokio::test]
    async fn test_register_lowercases_username_and_removes_avatar_file() {
        let h = Harness::new();
        let form = h.form("MixedCase", "mixed@example.com");
        let avatar = form.avatar.clone().unwrap();

        let user = UserService::register(&h.repo, &h.media, form).await.unwrap();
        assert_eq!(user.username, "mixedcase");
        assert!(user.avatar.starts_with("https://"));
        assert!(!avatar.exists());
    }

    #[tokio::test]
    async fn test_register_rejects_blank_fields() {
        let h = Harness::new();
        let mut form = h.form("ann", "ann@example.com");
        form.full_name = Some("   ".to_string());

        let err = UserService::register(&h.repo, &h.media, form).await.unwrap_err();
        assert!(matches!(err, ApiError::Validation(ref m) if m == "All fields are required"));
    }

    #[tokio::test]
    async fn test_register_requires_avatar() {
        let h = Harness::new();
        let mut form = h.form("ann", "ann@example.com");
        form.avatar = None;

        let err = UserService::register(&h.repo, &h.media, form).await.unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[tokio::test]
    async fn test_register_duplicate_is_conflict() {
        let h = Harness::new();
        h.register("ann").await;

        let form = h.form("ANN", "other@example.com");
        let err = UserService::register(&h.repo, &h.media, form).await.unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_register_email_conflict_ignores_case() {
        let h = Harness::new();
        let first = h.form("ann", "Same@Example.com");
        UserService::register(&h.repo, &h.media, first).await.unwrap();

        let second = h.form("bob", "same@example.com");
        let err = UserService::register(&h.repo, &h.media, second).await.unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_register_upload_failure() {
        let h = Harness::new();
        let media = MediaUploader::new(Arc::new(InMemoryMediaHost::failing()));
        let form = h.form("ann", "ann@example.com");
        let avatar = form.avatar.clone().unwrap();

        let err = UserService::register(&h.repo, &media, form).await.unwrap_err();
        assert!(matches!(err, ApiError::Upload(_)));
        assert!(!avatar.exists());
        assert!(h.repo.find_user_by_username("ann").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_login_paths() {
        let h = Harness::new();
        h.register("ann").await;

        let err = UserService::login(&h.repo, &h.jwt, None, None, "x").await.unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));

        let err = UserService::login(&h.repo, &h.jwt, Some("nobody"), None, "x")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));

        let err = UserService::login(&h.repo, &h.jwt, Some("ann"), None, "wrong")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(_)));

        let ok = UserService::login(&h.repo, &h.jwt, Some("ANN"), None, "hunter2hunter2")
            .await
            .unwrap();
        assert_eq!(ok.user.username, "ann");

        let by_email =
            UserService::login(&h.repo, &h.jwt, None, Some("ann@example.com"), "hunter2hunter2")
                .await
                .unwrap();
        assert_eq!(by_email.user.id, ok.user.id);
    }

    #[tokio::test]
    async fn test_refresh_token_cannot_be_replayed() {
        let h = Harness::new();
        h.register("ann").await;
        let login = UserService::login(&h.repo, &h.jwt, Some("ann"), None, "hunter2hunter2")
            .await
            .unwrap();

        let rotated = UserService::refresh(&h.repo, &h.jwt, Some(login.refresh_token.as_str()))
            .await
            .unwrap();
        assert_ne!(rotated.refresh_token, login.refresh_token);

        let replay = UserService::refresh(&h.repo, &h.jwt, Some(login.refresh_token.as_str())).await;
        assert!(matches!(replay, Err(ApiError::InvalidToken)));

        // The rotated token is now the active one
        assert!(UserService::refresh(&h.repo, &h.jwt, Some(rotated.refresh_token.as_str()))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_refresh_after_logout_is_rejected() {
        let h = Harness::new();
        let user = h.register("ann").await;
        let login = UserService::login(&h.repo, &h.jwt, Some("ann"), None, "hunter2hunter2")
            .await
            .unwrap();

        UserService::logout(&h.repo, user.id).await.unwrap();
        let err = UserService::refresh(&h.repo, &h.jwt, Some(login.refresh_token.as_str()))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidToken));
    }

    #[tokio::test]
    async fn test_refresh_rejects_missing_and_access_tokens() {
        let h = Harness::new();
        let user = h.register("ann").await;

        let err = UserService::refresh(&h.repo, &h.jwt, None).await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(_)));

        let access = h.jwt.issue_access_token(user.id).unwrap();
        let err = UserService::refresh(&h.repo, &h.jwt, Some(access.as_str())).await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidToken));
    }

    #[tokio::test]
    async fn test_change_password() {
        let h = Harness::new();
        let user = h.register("ann").await;

        let err = UserService::change_password(&h.repo, user.id, "wrong", "new-password")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(_)));

        UserService::change_password(&h.repo, user.id, "hunter2hunter2", "new-password")
            .await
            .unwrap();
        assert!(UserService::login(&h.repo, &h.jwt, Some("ann"), None, "new-password")
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_profiles() {
        let h = Harness::new();
        let user = h.register("ann").await;

        assert_eq!(UserService::current_user(&h.repo, user.id).await.unwrap().id, user.id);
        assert_eq!(UserService::get_profile(&h.repo, "Ann").await.unwrap().id, user.id);
        assert!(matches!(
            UserService::get_profile(&h.repo, "ghost").await,
            Err(ApiError::NotFound(_))
        ));
        assert!(matches!(
            UserService::current_user(&h.repo, Uuid::new_v4()).await,
            Err(ApiError::UserNotFound)
        ));
    }
}
