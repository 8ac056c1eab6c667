//! User routes: registration, sessions, password and follow graph
//!
//! Tokens travel as `HttpOnly` cookies. Login and refresh also return them
//! in the body for clients that cannot use cookies.

use crate::auth::{require_auth, AuthUser, ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE};
use crate::error::{ApiError, ApiResult};
use crate::media::BufferedForm;
use crate::services::{FollowService, Registration, UserService};
use crate::state::AppState;
use axum::{
    extract::{Multipart, Query, State},
    http::StatusCode,
    middleware,
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::{
    cookie::{Cookie, CookieJar},
    WithRejection,
};
use photogram_shared::{
    ApiResponse, ChangePasswordRequest, LoginRequest, LoginResponse, PublicUser,
    RefreshTokenRequest, TokenPair, UsernameQuery,
};
use serde_json::{json, Value};

/// Create user routes
pub fn user_routes(state: &AppState) -> Router<AppState> {
    let protected = Router::new()
        .route("/logout", post(logout))
        .route("/changePassword", post(change_password))
        .route("/me", get(current_user))
        .route("/follow", post(follow))
        .route("/unfollow", post(unfollow))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/refreshToken", post(refresh_token))
        .merge(protected)
}

fn token_cookie(name: &'static str, value: String, secure: bool) -> Cookie<'static> {
    Cookie::build((name, value))
        .http_only(true)
        .secure(secure)
        .path("/")
        .build()
}

fn with_tokens(jar: CookieJar, state: &AppState, access: &str, refresh: &str) -> CookieJar {
    let secure = state.config().cookies.secure;
    jar.add(token_cookie(ACCESS_TOKEN_COOKIE, access.to_string(), secure))
        .add(token_cookie(REFRESH_TOKEN_COOKIE, refresh.to_string(), secure))
}

/// POST /api/v1/users/register (multipart: avatar + fields)
async fn register(
    State(state): State<AppState>,
    WithRejection(multipart, _): WithRejection<Multipart, ApiError>,
) -> ApiResult<(StatusCode, Json<ApiResponse<PublicUser>>)> {
    let media_config = &state.config().media;
    let form =
        BufferedForm::from_multipart(multipart, &media_config.temp_dir, media_config.max_upload_bytes)
            .await?;

    let registration = Registration {
        username: form.text("username").map(str::to_string),
        email: form.text("email").map(str::to_string),
        password: form.text("password").map(str::to_string),
        full_name: form.text("fullName").map(str::to_string),
        avatar: form.file("avatar").map(|p| p.to_path_buf()),
    };

    let result = UserService::register(state.repo(), state.media(), registration).await;
    form.cleanup().await;
    let user = result?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(201, user, "User registered successfully")),
    ))
}

/// POST /api/v1/users/login
async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    WithRejection(Json(req), _): WithRejection<Json<LoginRequest>, ApiError>,
) -> ApiResult<(CookieJar, Json<ApiResponse<LoginResponse>>)> {
    let session = UserService::login(
        state.repo(),
        state.jwt(),
        req.username.as_deref(),
        req.email.as_deref(),
        &req.password,
    )
    .await?;

    let jar = with_tokens(jar, &state, &session.access_token, &session.refresh_token);
    Ok((jar, Json(ApiResponse::ok(session, "User logged in successfully"))))
}

/// POST /api/v1/users/logout
async fn logout(
    State(state): State<AppState>,
    auth: AuthUser,
    jar: CookieJar,
) -> ApiResult<(CookieJar, Json<ApiResponse<Value>>)> {
    UserService::logout(state.repo(), auth.id).await?;

    let jar = jar
        .remove(Cookie::build(ACCESS_TOKEN_COOKIE).path("/"))
        .remove(Cookie::build(REFRESH_TOKEN_COOKIE).path("/"));
    Ok((jar, Json(ApiResponse::ok(json!({}), "User logged out successfully"))))
}

/// POST /api/v1/users/refreshToken
///
/// The refresh token comes from the `refreshToken` cookie, or from the
/// JSON body when no cookie is present.
async fn refresh_token(
    State(state): State<AppState>,
    jar: CookieJar,
    body: Option<Json<RefreshTokenRequest>>,
) -> ApiResult<(CookieJar, Json<ApiResponse<TokenPair>>)> {
    let presented = jar
        .get(REFRESH_TOKEN_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
        .or_else(|| body.and_then(|Json(b)| b.refresh_token));

    let tokens = UserService::refresh(state.repo(), state.jwt(), presented.as_deref()).await?;

    let jar = with_tokens(jar, &state, &tokens.access_token, &tokens.refresh_token);
    Ok((jar, Json(ApiResponse::ok(tokens, "Access token refreshed"))))
}

/// POST /api/v1/users/changePassword
async fn change_password(
    State(state): State<AppState>,
    auth: AuthUser,
    WithRejection(Json(req), _): WithRejection<Json<ChangePasswordRequest>, ApiError>,
) -> ApiResult<Json<ApiResponse<Value>>> {
    UserService::change_password(state.repo(), auth.id, &req.old_password, &req.new_password)
        .await?;
    Ok(Json(ApiResponse::ok(
        json!({}),
        "Password has been changed successfully",
    )))
}

/// GET /api/v1/users/me
async fn current_user(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<ApiResponse<PublicUser>>> {
    let user = UserService::current_user(state.repo(), auth.id).await?;
    Ok(Json(ApiResponse::ok(user, "Current user fetched successfully")))
}

/// POST /api/v1/users/follow?username=
async fn follow(
    State(state): State<AppState>,
    auth: AuthUser,
    WithRejection(Query(query), _): WithRejection<Query<UsernameQuery>, ApiError>,
) -> ApiResult<Json<ApiResponse<PublicUser>>> {
    let followed = FollowService::follow(state.repo(), auth.id, query.username.as_deref()).await?;
    Ok(Json(ApiResponse::ok(followed, "User followed successfully")))
}

/// POST /api/v1/users/unfollow?username=
async fn unfollow(
    State(state): State<AppState>,
    auth: AuthUser,
    WithRejection(Query(query), _): WithRejection<Query<UsernameQuery>, ApiError>,
) -> ApiResult<Json<ApiResponse<PublicUser>>> {
    let unfollowed =
        FollowService::unfollow(state.repo(), auth.id, query.username.as_deref()).await?;
    Ok(Json(ApiResponse::ok(unfollowed, "User unfollowed successfully")))
}
