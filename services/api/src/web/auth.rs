//! services/api/src/web/auth.rs
//!
//! Authentication endpoints for user signup, login, and logout.

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use reading_rewards_core::settings::DEFAULT_AVATARS;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::adapters::identity::SESSION_DAYS;
use crate::web::rest::{ApiFailure, ApiResult, ErrorBody};
use crate::web::state::AppState;

const COOKIE_NAME: &str = "session";

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    pub username: String,
    /// One of the default avatar ids, e.g. `avatar_3`.
    pub avatar_id: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub user_id: Uuid,
    pub email: String,
}

//=========================================================================================
// Cookie Helpers
//=========================================================================================

fn session_cookie(token: &str, max_age_seconds: i64) -> String {
    format!(
        "{}={}; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age={}",
        COOKIE_NAME, token, max_age_seconds
    )
}

/// Extracts the auth session token from the `Cookie` header.
pub fn session_token(headers: &HeaderMap) -> Option<&str> {
    let prefix = format!("{}=", COOKIE_NAME);
    headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())?
        .split(';')
        .find_map(|c| c.trim().strip_prefix(prefix.as_str()))
        .filter(|token| !token.is_empty())
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /auth/signup - Create a new account and its starting progress
#[utoipa::path(
    post,
    path = "/auth/signup",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "User created successfully", body = AuthResponse),
        (status = 400, description = "Invalid request", body = ErrorBody),
        (status = 409, description = "Email already registered", body = ErrorBody),
        (status = 503, description = "Progress could not be saved", body = ErrorBody)
    )
)]
pub async fn signup_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SignupRequest>,
) -> ApiResult<impl IntoResponse> {
    let username = req.username.trim();
    if username.is_empty() {
        return Err(ApiFailure::bad_request("A username is required"));
    }
    let avatar_url = match req.avatar_id.as_deref() {
        Some(id) => Some(
            DEFAULT_AVATARS
                .iter()
                .find(|a| a.id == id)
                .ok_or_else(|| ApiFailure::bad_request(format!("Unknown avatar {}", id)))?
                .image_url,
        ),
        None => None,
    };

    let auth = state.identity.sign_up(&req.email, &req.password).await?;
    let is_admin = state.config.is_admin_email(&auth.identity.email);
    state
        .registry
        .create_account(auth.identity.clone(), username, avatar_url, is_admin)
        .await?;
    info!(user_id = %auth.identity.user_id, is_admin, "Account created.");

    let cookie = session_cookie(&auth.token, chrono::Duration::days(SESSION_DAYS).num_seconds());
    let response = AuthResponse {
        user_id: auth.identity.user_id,
        email: auth.identity.email,
    };
    Ok((StatusCode::CREATED, [(header::SET_COOKIE, cookie)], Json(response)))
}

/// POST /auth/login - Login with existing account
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials", body = ErrorBody)
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    let auth = state
        .identity
        .sign_in(&req.email, &req.password)
        .await
        .map_err(|e| match e {
            reading_rewards_core::PortError::Unauthorized => {
                ApiFailure::new(StatusCode::UNAUTHORIZED, "Invalid email or password")
            }
            other => ApiFailure::from(other),
        })?;

    let cookie = session_cookie(&auth.token, chrono::Duration::days(SESSION_DAYS).num_seconds());
    let response = AuthResponse {
        user_id: auth.identity.user_id,
        email: auth.identity.email,
    };
    Ok((StatusCode::OK, [(header::SET_COOKIE, cookie)], Json(response)))
}

/// POST /auth/logout - Logout and invalidate session
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 200, description = "Logout successful"),
        (status = 401, description = "No active session", body = ErrorBody)
    )
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<impl IntoResponse> {
    let token = session_token(&headers).ok_or_else(ApiFailure::unauthorized)?;
    state.identity.sign_out(token).await?;
    Ok((StatusCode::OK, [(header::SET_COOKIE, session_cookie("", 0))]))
}
