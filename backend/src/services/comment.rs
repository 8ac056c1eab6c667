//! Comment service
//!
//! A comment row carries both its post and its commenter, so the user's and
//! the post's comment lists change together with the row.

use crate::error::ApiError;
use crate::repositories::{
    CommentRepository, NewComment, PostRepository, Repository, UserRepository,
};
use photogram_shared::validation::is_blank;
use photogram_shared::{CommentView, CommentWithCommenter, PageRequest};
use tracing::info;
use uuid::Uuid;

pub struct CommentService;

impl CommentService {
    pub async fn create(
        repo: &dyn Repository,
        commenter_id: Uuid,
        post_id: Uuid,
        text: Option<&str>,
    ) -> Result<CommentView, ApiError> {
        if is_blank(text) {
            return Err(ApiError::Validation("Comment text is required".to_string()));
        }
        let content = text.unwrap_or_default().trim().to_string();

        repo.find_post_by_id(post_id)
            .await
            .map_err(ApiError::Internal)?
            .ok_or_else(|| ApiError::NotFound("The post does not exist".to_string()))?;

        let comment = repo
            .create_comment(NewComment {
                post_id,
                commenter_id,
                content,
            })
            .await
            .map_err(ApiError::Internal)?;

        info!(comment_id = %comment.id, post_id = %post_id, "Comment created");
        Ok(comment.into_view())
    }

    /// Only the author may delete a comment
    pub async fn delete(
        repo: &dyn Repository,
        caller_id: Uuid,
        comment_id: Uuid,
    ) -> Result<CommentView, ApiError> {
        let comment = repo
            .find_comment_by_id(comment_id)
            .await
            .map_err(ApiError::Internal)?
            .ok_or_else(|| ApiError::NotFound("Comment not found".to_string()))?;

        if comment.commenter_id != caller_id {
            return Err(ApiError::Forbidden(
                "User is not authorized to delete this comment".to_string(),
            ));
        }

        let deleted = repo
            .delete_comment(comment_id)
            .await
            .map_err(ApiError::Internal)?
            .ok_or_else(|| ApiError::NotFound("Comment not found".to_string()))?;

        info!(comment_id = %comment_id, user_id = %caller_id, "Comment deleted");
        Ok(deleted.into_view())
    }

    pub async fn get_one(
        repo: &dyn Repository,
        comment_id: Uuid,
    ) -> Result<CommentWithCommenter, ApiError> {
        let comment = repo
            .find_comment_by_id(comment_id)
            .await
            .map_err(ApiError::Internal)?
            .ok_or_else(|| ApiError::NotFound("Comment not found".to_string()))?;

        let commenter = repo
            .find_user_by_id(comment.commenter_id)
            .await
            .map_err(ApiError::Internal)?
            .ok_or_else(|| ApiError::NotFound("Commenter not found".to_string()))?;

        Ok(CommentWithCommenter {
            comment: comment.into_view(),
            commenter: commenter.to_public(),
        })
    }

    /// Comments under a post, newest first. An unknown post yields an empty page.
    pub async fn page(
        repo: &dyn Repository,
        post_id: Uuid,
        page: u32,
    ) -> Result<Vec<CommentView>, ApiError> {
        let comments = repo
            .comments_for_post(post_id, PageRequest::comments(page))
            .await
            .map_err(ApiError::Internal)?;
        Ok(comments.into_iter().map(|c| c.into_view()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::{MemoryRepository, NewPost, NewUser};
    use photogram_shared::COMMENTS_PAGE_SIZE;

    async fn user(repo: &MemoryRepository, name: &str) -> Uuid {
        repo.create_user(NewUser {
            username: name.to_string(),
            email: format!("{}@example.com", name),
            password_hash: "hash".to_string(),
            full_name: name.to_string(),
            avatar: "https://media.invalid/a".to_string(),
        })
        .await
        .unwrap()
        .id
    }

    async fn post(repo: &MemoryRepository, user_id: Uuid) -> Uuid {
        repo.create_post(NewPost {
            user_id,
            caption: None,
            url: "https://media.invalid/p".to_string(),
            image_public_id: None,
        })
        .await
        .unwrap()
        .id
    }

    #[tokio::test]
    async fn test_create_links_post_and_commenter() {
        let repo = MemoryRepository::new();
        let ann = user(&repo, "ann").await;
        let post_id = post(&repo, ann).await;

        let comment = CommentService::create(&repo, ann, post_id, Some(" nice "))
            .await
            .unwrap();
        assert_eq!(comment.content, "nice");

        let post = repo.find_post_by_id(post_id).await.unwrap().unwrap();
        let author = repo.find_user_by_id(ann).await.unwrap().unwrap();
        assert_eq!(post.comments, vec![comment.id]);
        assert_eq!(author.comments, vec![comment.id]);
    }

    #[tokio::test]
    async fn test_create_validation() {
        let repo = MemoryRepository::new();
        let ann = user(&repo, "ann").await;
        let post_id = post(&repo, ann).await;

        assert!(matches!(
            CommentService::create(&repo, ann, post_id, Some("  ")).await,
            Err(ApiError::Validation(_))
        ));
        assert!(matches!(
            CommentService::create(&repo, ann, post_id, None).await,
            Err(ApiError::Validation(_))
        ));
        assert!(matches!(
            CommentService::create(&repo, ann, Uuid::new_v4(), Some("hi")).await,
            Err(ApiError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_by_other_user_is_forbidden_and_keeps_comment() {
        let repo = MemoryRepository::new();
        let ann = user(&repo, "ann").await;
        let bob = user(&repo, "bob").await;
        let post_id = post(&repo, ann).await;
        let comment = CommentService::create(&repo, ann, post_id, Some("mine"))
            .await
            .unwrap();

        let err = CommentService::delete(&repo, bob, comment.id).await.unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));

        let kept = CommentService::get_one(&repo, comment.id).await.unwrap();
        assert_eq!(kept.comment.content, "mine");
        assert_eq!(kept.commenter.id, ann);
        let post = repo.find_post_by_id(post_id).await.unwrap().unwrap();
        assert_eq!(post.comments, vec![comment.id]);
    }

    #[tokio::test]
    async fn test_delete_clears_both_lists() {
        let repo = MemoryRepository::new();
        let ann = user(&repo, "ann").await;
        let post_id = post(&repo, ann).await;
        let comment = CommentService::create(&repo, ann, post_id, Some("bye"))
            .await
            .unwrap();

        CommentService::delete(&repo, ann, comment.id).await.unwrap();

        assert!(repo.find_post_by_id(post_id).await.unwrap().unwrap().comments.is_empty());
        assert!(repo.find_user_by_id(ann).await.unwrap().unwrap().comments.is_empty());
        assert!(matches!(
            CommentService::delete(&repo, ann, comment.id).await,
            Err(ApiError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_pages_are_newest_first_with_empty_tail() {
        let repo = MemoryRepository::new();
        let ann = user(&repo, "ann").await;
        let post_id = post(&repo, ann).await;
        let mut ids = Vec::new();
        for i in 0..5 {
            let text = format!("c{}", i);
            let c = CommentService::create(&repo, ann, post_id, Some(text.as_str()))
                .await
                .unwrap();
            ids.push(c.id);
        }
        ids.reverse();

        let first = CommentService::page(&repo, post_id, 0).await.unwrap();
        let second = CommentService::page(&repo, post_id, 1).await.unwrap();
        let third = CommentService::page(&repo, post_id, 2).await.unwrap();

        assert_eq!(first.len(), COMMENTS_PAGE_SIZE as usize);
        let seen: Vec<Uuid> = first.iter().chain(second.iter()).map(|c| c.id).collect();
        assert_eq!(seen, ids);
        assert!(third.is_empty());
    }
}
