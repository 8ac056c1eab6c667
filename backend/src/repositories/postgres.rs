//! PostgreSQL repository
//!
//! Mirrored collections are computed with `ARRAY(...)` subqueries, so every
//! read reflects the current follow/like/comment rows. Multi-row writes run
//! in a transaction.

use super::{
    CommentRecord, CommentRepository, DuplicateUser, FollowRepository, NewComment, NewPost,
    NewUser, PostRecord, PostRepository, Repository, UserRecord, UserRepository,
};
use crate::db;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use photogram_shared::PageRequest;
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

const USER_SELECT: &str = r#"
    SELECT u.id, u.username, u.email, u.password_hash, u.full_name, u.avatar,
           u.refresh_token_hash, u.last_posted_at, u.created_at, u.updated_at,
           ARRAY(SELECT f.follower_id FROM follows f
                 WHERE f.followee_id = u.id ORDER BY f.created_at) AS followers,
           ARRAY(SELECT f.followee_id FROM follows f
                 WHERE f.follower_id = u.id ORDER BY f.created_at) AS following,
           ARRAY(SELECT p.id FROM posts p
                 WHERE p.user_id = u.id ORDER BY p.created_at) AS posts,
           ARRAY(SELECT c.id FROM comments c
                 WHERE c.commenter_id = u.id ORDER BY c.created_at) AS comments
    FROM users u
"#;

const POST_SELECT: &str = r#"
    SELECT p.id, p.caption, p.url, p.image_public_id, p.user_id, p.created_at, p.updated_at,
           ARRAY(SELECT c.id FROM comments c
                 WHERE c.post_id = p.id ORDER BY c.created_at) AS comments,
           ARRAY(SELECT l.user_id FROM post_likes l
                 WHERE l.post_id = p.id ORDER BY l.created_at) AS likes
    FROM posts p
"#;

const COMMENT_COLUMNS: &str = "id, content, post_id, commenter_id, created_at, updated_at";

/// PostgreSQL-backed repository
#[derive(Clone)]
pub struct PgRepository {
    pool: PgPool,
}

impl PgRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl UserRepository for PgRepository {
    async fn create_user(&self, user: NewUser) -> Result<UserRecord> {
        let id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO users (id, username, email, password_hash, full_name, avatar)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.full_name)
        .bind(&user.avatar)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            let duplicate = matches!(&e, sqlx::Error::Database(db) if db.is_unique_violation());
            if duplicate {
                anyhow::Error::new(DuplicateUser)
            } else {
                anyhow::Error::new(e)
            }
        })?;

        self.find_user_by_id(id)
            .await?
            .ok_or_else(|| anyhow!("User {} vanished after insert", id))
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<UserRecord>> {
        let sql = format!("{USER_SELECT} WHERE u.id = $1");
        let user = sqlx::query_as::<_, UserRecord>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<UserRecord>> {
        let sql = format!("{USER_SELECT} WHERE u.username = $1");
        let user = sqlx::query_as::<_, UserRecord>(&sql)
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_user_by_login(
        &self,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<UserRecord>> {
        let sql = format!(
            "{USER_SELECT} WHERE u.username = $1 OR lower(u.email) = lower($2) LIMIT 1"
        );
        let user = sqlx::query_as::<_, UserRecord>(&sql)
            .bind(username)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn username_or_email_taken(&self, username: &str, email: &str) -> Result<bool> {
        let taken = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM users WHERE username = $1 OR lower(email) = lower($2))",
        )
        .bind(username)
        .bind(email)
        .fetch_one(&self.pool)
        .await?;
        Ok(taken)
    }

    async fn set_refresh_token_hash(&self, id: Uuid, hash: Option<&str>) -> Result<()> {
        sqlx::query("UPDATE users SET refresh_token_hash = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(hash)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn swap_refresh_token_hash(&self, id: Uuid, expected: &str, next: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE users SET refresh_token_hash = $3, updated_at = NOW()
            WHERE id = $1 AND refresh_token_hash = $2
            "#,
        )
        .bind(id)
        .bind(expected)
        .bind(next)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn update_password_hash(&self, id: Uuid, hash: &str) -> Result<()> {
        sqlx::query("UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(hash)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl FollowRepository for PgRepository {
    async fn add_follow(&self, follower: Uuid, followee: Uuid) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO follows (follower_id, followee_id)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(follower)
        .bind(followee)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn remove_follow(&self, follower: Uuid, followee: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM follows WHERE follower_id = $1 AND followee_id = $2")
            .bind(follower)
            .bind(followee)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }
}

#[async_trait]
impl PostRepository for PgRepository {
    async fn create_post(&self, post: NewPost) -> Result<PostRecord> {
        let id = Uuid::new_v4();
        let mut tx = self.pool.begin().await?;

        let created_at = sqlx::query_scalar::<_, chrono::DateTime<chrono::Utc>>(
            r#"
            INSERT INTO posts (id, caption, url, image_public_id, user_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING created_at
            "#,
        )
        .bind(id)
        .bind(&post.caption)
        .bind(&post.url)
        .bind(&post.image_public_id)
        .bind(post.user_id)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("UPDATE users SET last_posted_at = $2, updated_at = NOW() WHERE id = $1")
            .bind(post.user_id)
            .bind(created_at)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(PostRecord {
            id,
            caption: post.caption,
            url: post.url,
            image_public_id: post.image_public_id,
            user_id: post.user_id,
            comments: Vec::new(),
            likes: Vec::new(),
            created_at,
            updated_at: created_at,
        })
    }

    async fn find_post_by_id(&self, id: Uuid) -> Result<Option<PostRecord>> {
        let sql = format!("{POST_SELECT} WHERE p.id = $1");
        let post = sqlx::query_as::<_, PostRecord>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(post)
    }

    async fn posts_by_authors(
        &self,
        authors: &[Uuid],
        page: PageRequest,
    ) -> Result<Vec<PostRecord>> {
        if authors.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "{POST_SELECT} WHERE p.user_id = ANY($1) \
             ORDER BY p.created_at DESC, p.id DESC OFFSET $2 LIMIT $3"
        );
        let posts = sqlx::query_as::<_, PostRecord>(&sql)
            .bind(authors)
            .bind(page.offset())
            .bind(page.limit())
            .fetch_all(&self.pool)
            .await?;
        debug!(authors = authors.len(), page = page.page, found = posts.len(), "Fetched posts page");
        Ok(posts)
    }

    async fn delete_post(&self, id: Uuid) -> Result<Option<PostRecord>> {
        let Some(post) = self.find_post_by_id(id).await? else {
            return Ok(None);
        };

        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM comments WHERE post_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM post_likes WHERE post_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let deleted = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        tx.commit().await?;

        Ok((deleted == 1).then_some(post))
    }

    async fn add_like(&self, post_id: Uuid, user_id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            "INSERT INTO post_likes (post_id, user_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(post_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn remove_like(&self, post_id: Uuid, user_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM post_likes WHERE post_id = $1 AND user_id = $2")
            .bind(post_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }
}

#[async_trait]
impl CommentRepository for PgRepository {
    async fn create_comment(&self, comment: NewComment) -> Result<CommentRecord> {
        let sql = format!(
            "INSERT INTO comments (id, content, post_id, commenter_id) \
             VALUES ($1, $2, $3, $4) RETURNING {COMMENT_COLUMNS}"
        );
        let record = sqlx::query_as::<_, CommentRecord>(&sql)
            .bind(Uuid::new_v4())
            .bind(&comment.content)
            .bind(comment.post_id)
            .bind(comment.commenter_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(record)
    }

    async fn find_comment_by_id(&self, id: Uuid) -> Result<Option<CommentRecord>> {
        let sql = format!("SELECT {COMMENT_COLUMNS} FROM comments WHERE id = $1");
        let record = sqlx::query_as::<_, CommentRecord>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(record)
    }

    async fn delete_comment(&self, id: Uuid) -> Result<Option<CommentRecord>> {
        let sql = format!("DELETE FROM comments WHERE id = $1 RETURNING {COMMENT_COLUMNS}");
        let record = sqlx::query_as::<_, CommentRecord>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(record)
    }

    async fn comments_for_post(
        &self,
        post_id: Uuid,
        page: PageRequest,
    ) -> Result<Vec<CommentRecord>> {
        let sql = format!(
            "SELECT {COMMENT_COLUMNS} FROM comments WHERE post_id = $1 \
             ORDER BY created_at DESC, id DESC OFFSET $2 LIMIT $3"
        );
        let records = sqlx::query_as::<_, CommentRecord>(&sql)
            .bind(post_id)
            .bind(page.offset())
            .bind(page.limit())
            .fetch_all(&self.pool)
            .await?;
        Ok(records)
    }
}

#[async_trait]
impl Repository for PgRepository {
    async fn health_check(&self) -> Result<()> {
        db::health_check(&self.pool).await
    }
}
