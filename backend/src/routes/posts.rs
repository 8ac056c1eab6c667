//! Post routes, the home feed and per-post comment pages

use super::{parse_id, parse_page};
use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::media::BufferedForm;
use crate::services::{CommentService, PostService};
use crate::state::AppState;
use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::WithRejection;
use photogram_shared::{ApiResponse, CommentView, PostView};

/// Create post routes
pub fn post_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_post))
        .route("/:id", get(get_post).delete(delete_post))
        .route("/:id/like", post(like_post).delete(unlike_post))
        .route("/:id/comments/:page", get(post_comments))
}

/// Create feed routes
pub fn feed_routes() -> Router<AppState> {
    Router::new().route("/:page", get(home_feed))
}

/// POST /api/v1/posts (multipart: postImage + caption)
async fn create_post(
    State(state): State<AppState>,
    auth: AuthUser,
    WithRejection(multipart, _): WithRejection<Multipart, ApiError>,
) -> ApiResult<(StatusCode, Json<ApiResponse<PostView>>)> {
    let media_config = &state.config().media;
    let form =
        BufferedForm::from_multipart(multipart, &media_config.temp_dir, media_config.max_upload_bytes)
            .await?;

    let result = PostService::create_post(
        state.repo(),
        state.media(),
        auth.id,
        form.text("caption").map(str::to_string),
        form.file("postImage").map(|p| p.to_path_buf()),
    )
    .await;
    form.cleanup().await;
    let post = result?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(201, post, "Posted successfully")),
    ))
}

/// GET /api/v1/posts/:id
async fn get_post(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiResponse<PostView>>> {
    let post = PostService::get_post(state.repo(), parse_id(&id, "Post")?).await?;
    Ok(Json(ApiResponse::ok(post, "Post found")))
}

/// DELETE /api/v1/posts/:id
async fn delete_post(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiResponse<PostView>>> {
    let post_id = parse_id(&id, "Post")?;
    let post = PostService::delete_post(state.repo(), state.media(), auth.id, post_id).await?;
    Ok(Json(ApiResponse::ok(post, "Post deleted successfully")))
}

/// POST /api/v1/posts/:id/like
async fn like_post(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiResponse<PostView>>> {
    let post = PostService::like(state.repo(), auth.id, parse_id(&id, "Post")?).await?;
    Ok(Json(ApiResponse::ok(post, "Post liked")))
}

/// DELETE /api/v1/posts/:id/like
async fn unlike_post(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiResponse<PostView>>> {
    let post = PostService::unlike(state.repo(), auth.id, parse_id(&id, "Post")?).await?;
    Ok(Json(ApiResponse::ok(post, "Post unliked")))
}

/// GET /api/v1/posts/:id/comments/:page
async fn post_comments(
    State(state): State<AppState>,
    Path((id, page)): Path<(String, String)>,
) -> ApiResult<Json<ApiResponse<Vec<CommentView>>>> {
    let comments =
        CommentService::page(state.repo(), parse_id(&id, "Post")?, parse_page(&page)?).await?;
    Ok(Json(ApiResponse::ok(comments, "Comments found")))
}

/// GET /api/v1/feed/:page
async fn home_feed(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(page): Path<String>,
) -> ApiResult<Json<ApiResponse<Vec<PostView>>>> {
    let posts = PostService::home_feed(state.repo(), auth.id, parse_page(&page)?).await?;
    Ok(Json(ApiResponse::ok(posts, "Posts found")))
}
