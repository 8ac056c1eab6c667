//! PostgreSQL repository behaviour: derived collections and cascades

mod common;

use common::TestApp;
use photogram_backend::repositories::{
    CommentRepository, FollowRepository, NewComment, NewPost, NewUser, PostRepository,
    UserRepository,
};
use photogram_shared::PageRequest;
use uuid::Uuid;

async fn user(app: &TestApp, prefix: &str) -> Uuid {
    let username = TestApp::unique_username(prefix);
    app.repo
        .create_user(NewUser {
            email: format!("{}@example.com", username),
            username,
            password_hash: "hash".to_string(),
            full_name: "Repo User".to_string(),
            avatar: "https://media.invalid/a".to_string(),
        })
        .await
        .unwrap()
        .id
}

async fn post(app: &TestApp, user_id: Uuid) -> Uuid {
    app.repo
        .create_post(NewPost {
            user_id,
            caption: Some("caption".to_string()),
            url: "https://media.invalid/p".to_string(),
            image_public_id: Some("p".to_string()),
        })
        .await
        .unwrap()
        .id
}

#[tokio::test]
#[ignore = "requires database"]
async fn test_follow_edge_is_visible_from_both_sides() {
    let app = TestApp::new().await;
    let a = user(&app, "fa").await;
    let b = user(&app, "fb").await;

    assert!(app.repo.add_follow(a, b).await.unwrap());
    assert!(!app.repo.add_follow(a, b).await.unwrap());

    let a_row = app.repo.find_user_by_id(a).await.unwrap().unwrap();
    let b_row = app.repo.find_user_by_id(b).await.unwrap().unwrap();
    assert_eq!(a_row.following, vec![b]);
    assert_eq!(b_row.followers, vec![a]);

    assert!(app.repo.remove_follow(a, b).await.unwrap());
    let b_row = app.repo.find_user_by_id(b).await.unwrap().unwrap();
    assert!(b_row.followers.is_empty());
}

#[tokio::test]
#[ignore = "requires database"]
async fn test_refresh_hash_compare_and_swap() {
    let app = TestApp::new().await;
    let a = user(&app, "cas").await;

    app.repo.set_refresh_token_hash(a, Some("one")).await.unwrap();
    assert!(app.repo.swap_refresh_token_hash(a, "one", "two").await.unwrap());
    assert!(!app.repo.swap_refresh_token_hash(a, "one", "three").await.unwrap());

    let row = app.repo.find_user_by_id(a).await.unwrap().unwrap();
    assert_eq!(row.refresh_token_hash.as_deref(), Some("two"));
}

#[tokio::test]
#[ignore = "requires database"]
async fn test_delete_post_removes_comments_and_likes() {
    let app = TestApp::new().await;
    let author = user(&app, "da").await;
    let fan = user(&app, "df").await;
    let post_id = post(&app, author).await;

    app.repo.add_like(post_id, fan).await.unwrap();
    let comment = app
        .repo
        .create_comment(NewComment {
            post_id,
            commenter_id: fan,
            content: "nice".to_string(),
        })
        .await
        .unwrap();

    let deleted = app.repo.delete_post(post_id).await.unwrap().unwrap();
    assert_eq!(deleted.likes, vec![fan]);
    assert!(app.repo.find_comment_by_id(comment.id).await.unwrap().is_none());

    let fan_row = app.repo.find_user_by_id(fan).await.unwrap().unwrap();
    assert!(fan_row.comments.is_empty());
}

#[tokio::test]
#[ignore = "requires database"]
async fn test_comment_pages_newest_first() {
    let app = TestApp::new().await;
    let author = user(&app, "pa").await;
    let post_id = post(&app, author).await;

    for i in 0..4 {
        app.repo
            .create_comment(NewComment {
                post_id,
                commenter_id: author,
                content: format!("c{}", i),
            })
            .await
            .unwrap();
    }

    let first = app
        .repo
        .comments_for_post(post_id, PageRequest::comments(0))
        .await
        .unwrap();
    let second = app
        .repo
        .comments_for_post(post_id, PageRequest::comments(1))
        .await
        .unwrap();
    let third = app
        .repo
        .comments_for_post(post_id, PageRequest::comments(2))
        .await
        .unwrap();

    assert_eq!(first.len(), 3);
    assert_eq!(second.len(), 1);
    assert!(third.is_empty());
    assert!(first[0].created_at >= first[2].created_at);
}
