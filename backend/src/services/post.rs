//! Post service: creation, lookup, feeds, likes and deletion

use crate::error::ApiError;
use crate::media::MediaUploader;
use crate::repositories::{NewPost, PostRepository, Repository, UserRepository};
use photogram_shared::validation::{normalize_username, validate_caption};
use photogram_shared::{PageRequest, PostView};
use std::path::PathBuf;
use tracing::{info, warn};
use uuid::Uuid;

pub struct PostService;

impl PostService {
    /// Upload the image, then store the post. The author's post list and
    /// `lastPostedAt` are updated in the same write.
    pub async fn create_post(
        repo: &dyn Repository,
        media: &MediaUploader,
        user_id: Uuid,
        caption: Option<String>,
        image: Option<PathBuf>,
    ) -> Result<PostView, ApiError> {
        let caption = caption
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());
        validate_caption(caption.as_deref()).map_err(ApiError::Validation)?;

        let image = image
            .ok_or_else(|| ApiError::Validation("An image is required to post".to_string()))?;
        let uploaded = media
            .upload(&image)
            .await
            .ok_or_else(|| ApiError::Upload("Could not upload image".to_string()))?;

        let post = repo
            .create_post(NewPost {
                user_id,
                caption,
                url: uploaded.url,
                image_public_id: Some(uploaded.public_id),
            })
            .await
            .map_err(ApiError::Internal)?;

        info!(post_id = %post.id, user_id = %user_id, "Post created");
        Ok(post.into_view())
    }

    pub async fn get_post(repo: &dyn Repository, post_id: Uuid) -> Result<PostView, ApiError> {
        repo.find_post_by_id(post_id)
            .await
            .map_err(ApiError::Internal)?
            .map(|p| p.into_view())
            .ok_or_else(|| ApiError::NotFound("Post not found".to_string()))
    }

    /// Posts by everyone the caller follows, newest first
    pub async fn home_feed(
        repo: &dyn Repository,
        user_id: Uuid,
        page: u32,
    ) -> Result<Vec<PostView>, ApiError> {
        let user = repo
            .find_user_by_id(user_id)
            .await
            .map_err(ApiError::Internal)?
            .ok_or(ApiError::UserNotFound)?;

        if user.following.is_empty() {
            return Ok(Vec::new());
        }

        let posts = repo
            .posts_by_authors(&user.following, PageRequest::feed(page))
            .await
            .map_err(ApiError::Internal)?;
        Ok(posts.into_iter().map(|p| p.into_view()).collect())
    }

    /// A single user's posts, newest first
    pub async fn user_posts(
        repo: &dyn Repository,
        username: &str,
        page: u32,
    ) -> Result<Vec<PostView>, ApiError> {
        let user = repo
            .find_user_by_username(&normalize_username(username))
            .await
            .map_err(ApiError::Internal)?
            .ok_or_else(|| ApiError::NotFound("User does not exist".to_string()))?;

        let posts = repo
            .posts_by_authors(&[user.id], PageRequest::user_posts(page))
            .await
            .map_err(ApiError::Internal)?;
        Ok(posts.into_iter().map(|p| p.into_view()).collect())
    }

    pub async fn like(
        repo: &dyn Repository,
        user_id: Uuid,
        post_id: Uuid,
    ) -> Result<PostView, ApiError> {
        Self::get_post(repo, post_id).await?;
        let added = repo
            .add_like(post_id, user_id)
            .await
            .map_err(ApiError::Internal)?;
        if !added {
            return Err(ApiError::Conflict("You already like this post".to_string()));
        }
        Self::get_post(repo, post_id).await
    }

    pub async fn unlike(
        repo: &dyn Repository,
        user_id: Uuid,
        post_id: Uuid,
    ) -> Result<PostView, ApiError> {
        Self::get_post(repo, post_id).await?;
        let removed = repo
            .remove_like(post_id, user_id)
            .await
            .map_err(ApiError::Internal)?;
        if !removed {
            return Err(ApiError::Conflict("You do not like this post".to_string()));
        }
        Self::get_post(repo, post_id).await
    }

    /// Owner-only. Comments and likes go with the post; the hosted image
    /// is destroyed afterwards on a best-effort basis.
    pub async fn delete_post(
        repo: &dyn Repository,
        media: &MediaUploader,
        user_id: Uuid,
        post_id: Uuid,
    ) -> Result<PostView, ApiError> {
        let post = repo
            .find_post_by_id(post_id)
            .await
            .map_err(ApiError::Internal)?
            .ok_or_else(|| ApiError::NotFound("Post not found".to_string()))?;

        if post.user_id != user_id {
            return Err(ApiError::Forbidden(
                "User is not authorized to delete this post".to_string(),
            ));
        }

        let deleted = repo
            .delete_post(post_id)
            .await
            .map_err(ApiError::Internal)?
            .ok_or_else(|| ApiError::NotFound("Post not found".to_string()))?;

        if let Some(public_id) = deleted.image_public_id.as_deref() {
            if !media.destroy(public_id).await {
                warn!(post_id = %post_id, public_id, "Post deleted but its image was kept");
            }
        }

        info!(post_id = %post_id, user_id = %user_id, "Post deleted");
        Ok(deleted.into_view())
    }
}
