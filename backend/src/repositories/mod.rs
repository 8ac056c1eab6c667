//! Storage seam
//!
//! Services talk to storage only through these traits. `PgRepository` is the
//! production implementation; `MemoryRepository` keeps the same tables in
//! process for tests and local demos.
//!
//! The mirrored collections on records (`followers`/`following`,
//! `user.posts`, `user.comments`, `post.comments`, `post.likes`) are derived
//! from one underlying row each, so a mirrored pair cannot diverge.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use photogram_shared::{CommentView, PageRequest, PostView, PublicUser};
use uuid::Uuid;

pub mod memory;
pub mod postgres;

pub use memory::MemoryRepository;
pub use postgres::PgRepository;

/// Stored user, secrets included. Convert with `to_public` before it
/// leaves the service layer.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRecord {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub full_name: String,
    pub avatar: String,
    pub refresh_token_hash: Option<String>,
    pub followers: Vec<Uuid>,
    pub following: Vec<Uuid>,
    pub posts: Vec<Uuid>,
    pub comments: Vec<Uuid>,
    pub last_posted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserRecord {
    pub fn to_public(&self) -> PublicUser {
        PublicUser {
            id: self.id,
            username: self.username.clone(),
            email: self.email.clone(),
            full_name: self.full_name.clone(),
            avatar: self.avatar.clone(),
            followers: self.followers.clone(),
            following: self.following.clone(),
            posts: self.posts.clone(),
            comments: self.comments.clone(),
            last_posted_at: self.last_posted_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub full_name: String,
    pub avatar: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PostRecord {
    pub id: Uuid,
    pub caption: Option<String>,
    pub url: String,
    /// Image host id, needed to destroy the image with the post
    pub image_public_id: Option<String>,
    pub user_id: Uuid,
    pub comments: Vec<Uuid>,
    pub likes: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PostRecord {
    pub fn into_view(self) -> PostView {
        PostView {
            id: self.id,
            caption: self.caption,
            url: self.url,
            user: self.user_id,
            comments: self.comments,
            likes: self.likes,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewPost {
    pub user_id: Uuid,
    pub caption: Option<String>,
    pub url: String,
    pub image_public_id: Option<String>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CommentRecord {
    pub id: Uuid,
    pub content: String,
    pub post_id: Uuid,
    pub commenter_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CommentRecord {
    pub fn into_view(self) -> CommentView {
        CommentView {
            id: self.id,
            content: self.content,
            post: self.post_id,
            commenter: self.commenter_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewComment {
    pub post_id: Uuid,
    pub commenter_id: Uuid,
    pub content: String,
}

/// `create_user` lost a race on the unique username or email
#[derive(Debug, thiserror::Error)]
#[error("username or email already taken")]
pub struct DuplicateUser;

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Fails with [`DuplicateUser`] when the username or email (compared
    /// case-insensitively) is already stored
    async fn create_user(&self, user: NewUser) -> Result<UserRecord>;

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<UserRecord>>;

    /// Exact match on the stored (lowercased) username
    async fn find_user_by_username(&self, username: &str) -> Result<Option<UserRecord>>;

    /// Match on username OR email; either may be absent
    async fn find_user_by_login(
        &self,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<UserRecord>>;

    /// Emails compare case-insensitively
    async fn username_or_email_taken(&self, username: &str, email: &str) -> Result<bool>;

    /// Overwrite (or clear) the stored refresh token fingerprint
    async fn set_refresh_token_hash(&self, id: Uuid, hash: Option<&str>) -> Result<()>;

    /// Compare-and-swap: replace the fingerprint only if it still equals
    /// `expected`. Returns false when another rotation or a logout won.
    async fn swap_refresh_token_hash(&self, id: Uuid, expected: &str, next: &str) -> Result<bool>;

    async fn update_password_hash(&self, id: Uuid, hash: &str) -> Result<()>;
}

#[async_trait]
pub trait FollowRepository: Send + Sync {
    /// Returns false if the edge already existed
    async fn add_follow(&self, follower: Uuid, followee: Uuid) -> Result<bool>;

    /// Returns false if there was no such edge
    async fn remove_follow(&self, follower: Uuid, followee: Uuid) -> Result<bool>;
}

#[async_trait]
pub trait PostRepository: Send + Sync {
    /// Insert the post and stamp the author's `last_posted_at` together
    async fn create_post(&self, post: NewPost) -> Result<PostRecord>;

    async fn find_post_by_id(&self, id: Uuid) -> Result<Option<PostRecord>>;

    /// Posts by any of `authors`, newest first
    async fn posts_by_authors(&self, authors: &[Uuid], page: PageRequest)
        -> Result<Vec<PostRecord>>;

    /// Remove the post with its comments and likes
    async fn delete_post(&self, id: Uuid) -> Result<Option<PostRecord>>;

    /// Returns false if the user already liked the post
    async fn add_like(&self, post_id: Uuid, user_id: Uuid) -> Result<bool>;

    /// Returns false if the user had not liked the post
    async fn remove_like(&self, post_id: Uuid, user_id: Uuid) -> Result<bool>;
}

#[async_trait]
pub trait CommentRepository: Send + Sync {
    async fn create_comment(&self, comment: NewComment) -> Result<CommentRecord>;

    async fn find_comment_by_id(&self, id: Uuid) -> Result<Option<CommentRecord>>;

    /// Delete and return the comment. Both back-references go with it.
    async fn delete_comment(&self, id: Uuid) -> Result<Option<CommentRecord>>;

    /// Comments under a post, newest first
    async fn comments_for_post(&self, post_id: Uuid, page: PageRequest)
        -> Result<Vec<CommentRecord>>;
}

/// Everything a request handler may need from storage
#[async_trait]
pub trait Repository:
    UserRepository + FollowRepository + PostRepository + CommentRepository
{
    async fn health_check(&self) -> Result<()>;
}
