//! In-process repository
//!
//! Holds the same normalized tables as the PostgreSQL schema behind one
//! `RwLock`. Each trait method takes the lock once, so every mutation is
//! atomic with respect to other requests.

use super::{
    CommentRecord, CommentRepository, DuplicateUser, FollowRepository, NewComment, NewPost,
    NewUser, PostRecord, PostRepository, Repository, UserRecord, UserRepository,
};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use photogram_shared::PageRequest;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

fn same_email(stored: &str, candidate: &str) -> bool {
    stored.to_lowercase() == candidate.to_lowercase()
}

#[derive(Debug, Clone)]
struct UserRow {
    id: Uuid,
    username: String,
    email: String,
    password_hash: String,
    full_name: String,
    avatar: String,
    refresh_token_hash: Option<String>,
    last_posted_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct PostRow {
    id: Uuid,
    caption: Option<String>,
    url: String,
    image_public_id: Option<String>,
    user_id: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy)]
struct Edge {
    from: Uuid,
    to: Uuid,
}

/// Rows are kept in insertion order, which doubles as the tie-breaker when
/// two timestamps are equal.
#[derive(Debug, Default)]
struct Tables {
    users: Vec<UserRow>,
    follows: Vec<Edge>,
    posts: Vec<PostRow>,
    /// post -> user
    likes: Vec<Edge>,
    comments: Vec<CommentRecord>,
}

impl Tables {
    fn user_index(&self, id: Uuid) -> Option<usize> {
        self.users.iter().position(|u| u.id == id)
    }

    fn user_record(&self, row: &UserRow) -> UserRecord {
        UserRecord {
            id: row.id,
            username: row.username.clone(),
            email: row.email.clone(),
            password_hash: row.password_hash.clone(),
            full_name: row.full_name.clone(),
            avatar: row.avatar.clone(),
            refresh_token_hash: row.refresh_token_hash.clone(),
            followers: self.follows.iter().filter(|e| e.to == row.id).map(|e| e.from).collect(),
            following: self.follows.iter().filter(|e| e.from == row.id).map(|e| e.to).collect(),
            posts: self.posts.iter().filter(|p| p.user_id == row.id).map(|p| p.id).collect(),
            comments: self
                .comments
                .iter()
                .filter(|c| c.commenter_id == row.id)
                .map(|c| c.id)
                .collect(),
            last_posted_at: row.last_posted_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }

    fn post_record(&self, row: &PostRow) -> PostRecord {
        PostRecord {
            id: row.id,
            caption: row.caption.clone(),
            url: row.url.clone(),
            image_public_id: row.image_public_id.clone(),
            user_id: row.user_id,
            comments: self.comments.iter().filter(|c| c.post_id == row.id).map(|c| c.id).collect(),
            likes: self.likes.iter().filter(|e| e.from == row.id).map(|e| e.to).collect(),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }

    fn find_user(&self, pred: impl Fn(&UserRow) -> bool) -> Option<UserRecord> {
        self.users.iter().find(|u| pred(*u)).map(|u| self.user_record(u))
    }
}

/// Newest first; later insertion wins a timestamp tie
fn newest_first<'a, T: 'a>(
    rows: impl Iterator<Item = &'a T>,
    created_at: impl Fn(&T) -> DateTime<Utc>,
) -> Vec<&'a T> {
    let mut indexed: Vec<(usize, &T)> = rows.enumerate().collect();
    indexed.sort_by(|(ia, a), (ib, b)| created_at(*b).cmp(&created_at(*a)).then(ib.cmp(ia)));
    indexed.into_iter().map(|(_, row)| row).collect()
}

/// In-memory repository, cheap to clone
#[derive(Clone, Default)]
pub struct MemoryRepository {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for MemoryRepository {
    async fn create_user(&self, user: NewUser) -> Result<UserRecord> {
        let mut tables = self.tables.write().await;
        if tables
            .users
            .iter()
            .any(|u| u.username == user.username || same_email(&u.email, &user.email))
        {
            return Err(DuplicateUser.into());
        }
        let now = Utc::now();
        let row = UserRow {
            id: Uuid::new_v4(),
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
            full_name: user.full_name,
            avatar: user.avatar,
            refresh_token_hash: None,
            last_posted_at: None,
            created_at: now,
            updated_at: now,
        };
        let record = tables.user_record(&row);
        tables.users.push(row);
        Ok(record)
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<UserRecord>> {
        Ok(self.tables.read().await.find_user(|u| u.id == id))
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<UserRecord>> {
        Ok(self.tables.read().await.find_user(|u| u.username == username))
    }

    async fn find_user_by_login(
        &self,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<UserRecord>> {
        Ok(self.tables.read().await.find_user(|u| {
            username.is_some_and(|name| u.username == name)
                || email.is_some_and(|mail| same_email(&u.email, mail))
        }))
    }

    async fn username_or_email_taken(&self, username: &str, email: &str) -> Result<bool> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .iter()
            .any(|u| u.username == username || same_email(&u.email, email)))
    }

    async fn set_refresh_token_hash(&self, id: Uuid, hash: Option<&str>) -> Result<()> {
        let mut tables = self.tables.write().await;
        if let Some(index) = tables.user_index(id) {
            let row = &mut tables.users[index];
            row.refresh_token_hash = hash.map(str::to_string);
            row.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn swap_refresh_token_hash(&self, id: Uuid, expected: &str, next: &str) -> Result<bool> {
        let mut tables = self.tables.write().await;
        let Some(index) = tables.user_index(id) else {
            return Ok(false);
        };
        let row = &mut tables.users[index];
        if row.refresh_token_hash.as_deref() != Some(expected) {
            return Ok(false);
        }
        row.refresh_token_hash = Some(next.to_string());
        row.updated_at = Utc::now();
        Ok(true)
    }

    async fn update_password_hash(&self, id: Uuid, hash: &str) -> Result<()> {
        let mut tables = self.tables.write().await;
        if let Some(index) = tables.user_index(id) {
            let row = &mut tables.users[index];
            row.password_hash = hash.to_string();
            row.updated_at = Utc::now();
        }
        Ok(())
    }
}

#[async_trait]
impl FollowRepository for MemoryRepository {
    async fn add_follow(&self, follower: Uuid, followee: Uuid) -> Result<bool> {
        let mut tables = self.tables.write().await;
        if follower == followee {
            return Err(anyhow!("self-follow rejected by storage"));
        }
        if tables.follows.iter().any(|e| e.from == follower && e.to == followee) {
            return Ok(false);
        }
        tables.follows.push(Edge { from: follower, to: followee });
        Ok(true)
    }

    async fn remove_follow(&self, follower: Uuid, followee: Uuid) -> Result<bool> {
        let mut tables = self.tables.write().await;
        let before = tables.follows.len();
        tables.follows.retain(|e| !(e.from == follower && e.to == followee));
        Ok(tables.follows.len() != before)
    }
}

#[async_trait]
impl PostRepository for MemoryRepository {
    async fn create_post(&self, post: NewPost) -> Result<PostRecord> {
        let mut tables = self.tables.write().await;
        let author = tables
            .user_index(post.user_id)
            .ok_or_else(|| anyhow!("foreign key violated: user {}", post.user_id))?;
        let now = Utc::now();
        let row = PostRow {
            id: Uuid::new_v4(),
            caption: post.caption,
            url: post.url,
            image_public_id: post.image_public_id,
            user_id: post.user_id,
            created_at: now,
            updated_at: now,
        };
        tables.users[author].last_posted_at = Some(now);
        tables.users[author].updated_at = now;
        let record = tables.post_record(&row);
        tables.posts.push(row);
        Ok(record)
    }

    async fn find_post_by_id(&self, id: Uuid) -> Result<Option<PostRecord>> {
        let tables = self.tables.read().await;
        Ok(tables
            .posts
            .iter()
            .find(|p| p.id == id)
            .map(|p| tables.post_record(p)))
    }

    async fn posts_by_authors(
        &self,
        authors: &[Uuid],
        page: PageRequest,
    ) -> Result<Vec<PostRecord>> {
        let tables = self.tables.read().await;
        let ordered = newest_first(
            tables.posts.iter().filter(|p| authors.contains(&p.user_id)),
            |p| p.created_at,
        );
        Ok(page
            .slice(&ordered)
            .iter()
            .map(|p| tables.post_record(p))
            .collect())
    }

    async fn delete_post(&self, id: Uuid) -> Result<Option<PostRecord>> {
        let mut tables = self.tables.write().await;
        let Some(index) = tables.posts.iter().position(|p| p.id == id) else {
            return Ok(None);
        };
        let record = tables.post_record(&tables.posts[index]);
        tables.comments.retain(|c| c.post_id != id);
        tables.likes.retain(|e| e.from != id);
        tables.posts.remove(index);
        Ok(Some(record))
    }

    async fn add_like(&self, post_id: Uuid, user_id: Uuid) -> Result<bool> {
        let mut tables = self.tables.write().await;
        if !tables.posts.iter().any(|p| p.id == post_id) {
            return Err(anyhow!("foreign key violated: post {}", post_id));
        }
        if tables.likes.iter().any(|e| e.from == post_id && e.to == user_id) {
            return Ok(false);
        }
        tables.likes.push(Edge { from: post_id, to: user_id });
        Ok(true)
    }

    async fn remove_like(&self, post_id: Uuid, user_id: Uuid) -> Result<bool> {
        let mut tables = self.tables.write().await;
        let before = tables.likes.len();
        tables.likes.retain(|e| !(e.from == post_id && e.to == user_id));
        Ok(tables.likes.len() != before)
    }
}

#[async_trait]
impl CommentRepository for MemoryRepository {
    async fn create_comment(&self, comment: NewComment) -> Result<CommentRecord> {
        let mut tables = self.tables.write().await;
        if !tables.posts.iter().any(|p| p.id == comment.post_id) {
            return Err(anyhow!("foreign key violated: post {}", comment.post_id));
        }
        let now = Utc::now();
        let record = CommentRecord {
            id: Uuid::new_v4(),
            content: comment.content,
            post_id: comment.post_id,
            commenter_id: comment.commenter_id,
            created_at: now,
            updated_at: now,
        };
        tables.comments.push(record.clone());
        Ok(record)
    }

    async fn find_comment_by_id(&self, id: Uuid) -> Result<Option<CommentRecord>> {
        let tables = self.tables.read().await;
        Ok(tables.comments.iter().find(|c| c.id == id).cloned())
    }

    async fn delete_comment(&self, id: Uuid) -> Result<Option<CommentRecord>> {
        let mut tables = self.tables.write().await;
        let index = tables.comments.iter().position(|c| c.id == id);
        Ok(index.map(|i| tables.comments.remove(i)))
    }

    async fn comments_for_post(
        &self,
        post_id: Uuid,
        page: PageRequest,
    ) -> Result<Vec<CommentRecord>> {
        let tables = self.tables.read().await;
        let ordered = newest_first(
            tables.comments.iter().filter(|c| c.post_id == post_id),
            |c| c.created_at,
        );
        Ok(page.slice(&ordered).iter().map(|c| (*c).clone()).collect())
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}
