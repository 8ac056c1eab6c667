//! Route definitions for the Photogram API
//!
//! Every v1 response uses the `{statusCode, data, message}` envelope; errors
//! use `{error}` through `ApiError`.

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    http::{header, Method},
    routing::get,
    Router,
};
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, CorsLayer},
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use uuid::Uuid;

mod comments;
mod health;
mod posts;
mod profiles;
mod users;


/// Room for the non-file multipart fields and boundaries
const FORM_OVERHEAD_BYTES: usize = 64 * 1024;

/// Create the main application router with all middleware
pub fn create_router(state: AppState) -> Router {
    let body_limit = state.config().media.max_upload_bytes + FORM_OVERHEAD_BYTES;

    Router::new()
        .route("/health", get(health::health_check))
        .route("/health/ready", get(health::readiness_check))
        .route("/health/live", get(health::liveness_check))
        .nest("/api/v1", api_routes(&state))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(
            // Token cookies need credentialed CORS, which rules out `*`
            CorsLayer::new()
                .allow_origin(AllowOrigin::mirror_request())
                .allow_credentials(true)
                .allow_methods([Method::GET, Method::POST, Method::DELETE])
                .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]),
        )
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// API v1 routes
fn api_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(|| async { "Photogram API v1" }))
        .nest("/users", users::user_routes(state))
        .nest("/posts", posts::post_routes())
        .nest("/feed", posts::feed_routes())
        .nest("/comments", comments::comment_routes())
        .nest("/profiles", profiles::profile_routes())
}

/// Parse an id path segment, answering 404 for ids that cannot exist
pub(crate) fn parse_id(raw: &str, what: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| ApiError::NotFound(format!("{} not found", what)))
}

/// Parse a zero-indexed page number
pub(crate) fn parse_page(raw: &str) -> ApiResult<u32> {
    raw.parse::<u32>()
        .map_err(|_| ApiError::Validation("Page must be a non-negative integer".to_string()))
}
