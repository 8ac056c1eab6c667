//! Comment routes

use super::parse_id;
use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::services::CommentService;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::WithRejection;
use photogram_shared::{ApiResponse, CommentView, CommentWithCommenter, NewCommentRequest};

/// Create comment routes
pub fn comment_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_comment))
        .route("/:id", get(get_comment).delete(delete_comment))
}

/// POST /api/v1/comments
async fn create_comment(
    State(state): State<AppState>,
    auth: AuthUser,
    WithRejection(Json(req), _): WithRejection<Json<NewCommentRequest>, ApiError>,
) -> ApiResult<(StatusCode, Json<ApiResponse<CommentView>>)> {
    let comment =
        CommentService::create(state.repo(), auth.id, req.post_id, req.comment_text.as_deref())
            .await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(201, comment, "Comment posted successfully")),
    ))
}

/// GET /api/v1/comments/:id
async fn get_comment(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiResponse<CommentWithCommenter>>> {
    let found = CommentService::get_one(state.repo(), parse_id(&id, "Comment")?).await?;
    Ok(Json(ApiResponse::ok(found, "Comment retrieved")))
}

/// DELETE /api/v1/comments/:id
async fn delete_comment(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiResponse<CommentView>>> {
    let deleted = CommentService::delete(state.repo(), auth.id, parse_id(&id, "Comment")?).await?;
    Ok(Json(ApiResponse::ok(deleted, "Comment deleted successfully")))
}
