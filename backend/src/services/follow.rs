//! Follow graph
//!
//! One `follows` row backs both the follower's `following` and the
//! followee's `followers`, so the two sides are written together.

use crate::error::ApiError;
use crate::repositories::{FollowRepository, Repository, UserRecord, UserRepository};
use photogram_shared::validation::{is_blank, normalize_username};
use photogram_shared::PublicUser;
use tracing::info;
use uuid::Uuid;

pub struct FollowService;

impl FollowService {
    async fn target(repo: &dyn Repository, username: Option<&str>) -> Result<UserRecord, ApiError> {
        if is_blank(username) {
            return Err(ApiError::Validation("username is required".to_string()));
        }
        let username = normalize_username(username.unwrap_or_default());
        repo.find_user_by_username(&username)
            .await
            .map_err(ApiError::Internal)?
            .ok_or_else(|| ApiError::NotFound("User not found".to_string()))
    }

    /// Returns the followed user as it is after the change
    pub async fn follow(
        repo: &dyn Repository,
        caller_id: Uuid,
        username: Option<&str>,
    ) -> Result<PublicUser, ApiError> {
        let target = Self::target(repo, username).await?;
        if target.id == caller_id {
            return Err(ApiError::Validation("You cannot follow yourself".to_string()));
        }

        let added = repo
            .add_follow(caller_id, target.id)
            .await
            .map_err(ApiError::Internal)?;
        if !added {
            return Err(ApiError::Conflict("You already follow this user".to_string()));
        }

        info!(follower = %caller_id, followee = %target.id, "User followed");
        Self::refreshed(repo, target.id).await
    }

    pub async fn unfollow(
        repo: &dyn Repository,
        caller_id: Uuid,
        username: Option<&str>,
    ) -> Result<PublicUser, ApiError> {
        let target = Self::target(repo, username).await?;

        let removed = repo
            .remove_follow(caller_id, target.id)
            .await
            .map_err(ApiError::Internal)?;
        if !removed {
            return Err(ApiError::Conflict("You do not follow this user".to_string()));
        }

        info!(follower = %caller_id, followee = %target.id, "User unfollowed");
        Self::refreshed(repo, target.id).await
    }

    async fn refreshed(repo: &dyn Repository, id: Uuid) -> Result<PublicUser, ApiError> {
        repo.find_user_by_id(id)
            .await
            .map_err(ApiError::Internal)?
            .map(|u| u.to_public())
            .ok_or_else(|| ApiError::NotFound("User not found".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::{MemoryRepository, NewUser};

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

    async fn sets(repo: &MemoryRepository, id: Uuid) -> (Vec<Uuid>, Vec<Uuid>) {
        let u = repo.find_user_by_id(id).await.unwrap().unwrap();
        (u.followers, u.following)
    }

    #[tokio::test]
    async fn test_follow_then_unfollow_restores_both_sides() {
        let repo = MemoryRepository::new();
        let ann = user(&repo, "ann").await;
        let bob = user(&repo, "bob").await;
        let before = (sets(&repo, ann).await, sets(&repo, bob).await);

        let followed = FollowService::follow(&repo, ann, Some("Bob")).await.unwrap();
        assert_eq!(followed.followers, vec![ann]);
        assert_eq!(sets(&repo, ann).await.1, vec![bob]);

        let unfollowed = FollowService::unfollow(&repo, ann, Some("bob")).await.unwrap();
        assert!(unfollowed.followers.is_empty());

        let after = (sets(&repo, ann).await, sets(&repo, bob).await);
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_follow_errors() {
        let repo = MemoryRepository::new();
        let ann = user(&repo, "ann").await;
        user(&repo, "bob").await;

        assert!(matches!(
            FollowService::follow(&repo, ann, Some("ghost")).await,
            Err(ApiError::NotFound(_))
        ));
        assert!(matches!(
            FollowService::follow(&repo, ann, None).await,
            Err(ApiError::Validation(_))
        ));
        assert!(matches!(
            FollowService::follow(&repo, ann, Some("ann")).await,
            Err(ApiError::Validation(_))
        ));

        FollowService::follow(&repo, ann, Some("bob")).await.unwrap();
        assert!(matches!(
            FollowService::follow(&repo, ann, Some("bob")).await,
            Err(ApiError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_unfollow_errors() {
        let repo = MemoryRepository::new();
        let ann = user(&repo, "ann").await;
        user(&repo, "bob").await;

        assert!(matches!(
            FollowService::unfollow(&repo, ann, Some("bob")).await,
            Err(ApiError::Conflict(_))
        ));
        assert!(matches!(
            FollowService::unfollow(&repo, ann, Some("ghost")).await,
            Err(ApiError::NotFound(_))
        ));
    }
}
