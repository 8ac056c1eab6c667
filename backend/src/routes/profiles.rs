//! Public profile routes

use super::parse_page;
use crate::error::ApiResult;
use crate::services::{PostService, UserService};
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use photogram_shared::{ApiResponse, PostView, PublicUser};

pub fn profile_routes() -> Router<AppState> {
    Router::new()
        .route("/:username", get(get_profile))
        .route("/:username/posts/:page", get(user_posts))
}

/// GET /api/v1/profiles/:username
async fn get_profile(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> ApiResult<Json<ApiResponse<PublicUser>>> {
    let user = UserService::get_profile(state.repo(), &username).await?;
    Ok(Json(ApiResponse::ok(user, "User profile fetched")))
}

/// GET /api/v1/profiles/:username/posts/:page
async fn user_posts(
    State(state): State<AppState>,
    Path((username, page)): Path<(String, String)>,
) -> ApiResult<Json<ApiResponse<Vec<PostView>>>> {
    let posts = PostService::user_posts(state.repo(), &username, parse_page(&page)?).await?;
    Ok(Json(ApiResponse::ok(posts, "Posts found")))
}
