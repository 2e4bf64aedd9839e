//! services/api/src/web/admin.rs
//!
//! Administrator handlers for managing shop skins and correcting user
//! progress. Every action is refused with 403 unless the signed-in reader is
//! an administrator.

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use reading_rewards_core::controller::AdminSkinDraft;
use reading_rewards_core::domain::{AdminSkin, Identity, Rarity};
use reading_rewards_core::{Controller, ProgressUpdate, UserSummary, View};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::web::rest::{ApiFailure, ApiResult, ErrorBody};
use crate::web::state::AppState;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SaveSkinRequest {
    /// Present when updating an existing skin.
    pub id: Option<String>,
    pub name: String,
    pub description: Option<String>,
    #[schema(value_type = String, example = "Rare")]
    pub rarity: Rarity,
    pub cost: u64,
    pub image_url: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl From<SaveSkinRequest> for AdminSkinDraft {
    fn from(req: SaveSkinRequest) -> Self {
        AdminSkinDraft {
            id: req.id,
            name: req.name,
            description: req.description,
            rarity: req.rarity,
            cost: req.cost,
            image_url: req.image_url,
            is_active: req.is_active,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct UploadResponse {
    pub url: String,
}

/// Fields to overwrite on a user's record. Omitted fields are unchanged.
#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserUpdateRequest {
    pub points: Option<u64>,
    pub total_validated_seconds: Option<u64>,
    pub generations_used_today: Option<u32>,
    pub goal_minutes: Option<u32>,
}

impl From<UserUpdateRequest> for ProgressUpdate {
    fn from(req: UserUpdateRequest) -> Self {
        ProgressUpdate {
            points: req.points,
            total_validated_seconds: req.total_validated_seconds,
            generations_used_today: req.generations_used_today,
            goal_minutes: req.goal_minutes,
        }
    }
}

//=========================================================================================
// Handlers
//=========================================================================================

#[utoipa::path(
    get,
    path = "/admin/skins",
    responses(
        (status = 200, description = "All admin skins, newest first", body = Vec<Object>),
        (status = 403, description = "Administrator access required", body = ErrorBody)
    )
)]
pub async fn list_skins_handler(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<Json<Vec<AdminSkin>>> {
    let shared = state.session(&identity).await?;
    let mut session = shared.lock().await;
    let controller = state.controller();
    controller.navigate(&mut session, View::Admin)?;
    Ok(Json(controller.list_admin_skins(&session).await?))
}

/// Creates a skin, or updates the one named by `id`.
#[utoipa::path(
    post,
    path = "/admin/skins",
    request_body = SaveSkinRequest,
    responses(
        (status = 200, description = "Saved skin", body = Object),
        (status = 400, description = "Name missing", body = ErrorBody),
        (status = 403, description = "Administrator access required", body = ErrorBody)
    )
)]
pub async fn save_skin_handler(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<SaveSkinRequest>,
) -> ApiResult<Json<AdminSkin>> {
    let shared = state.session(&identity).await?;
    let session = shared.lock().await;
    let skin = state
        .controller()
        .save_admin_skin(&session, req.into())
        .await?;
    Ok(Json(skin))
}

#[utoipa::path(
    delete,
    path = "/admin/skins/{id}",
    params(("id" = String, Path, description = "Admin skin id")),
    responses(
        (status = 204, description = "Skin deleted"),
        (status = 403, description = "Administrator access required", body = ErrorBody),
        (status = 404, description = "Unknown skin", body = ErrorBody)
    )
)]
pub async fn delete_skin_handler(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path(skin_id): Path<String>,
) -> ApiResult<StatusCode> {
    let shared = state.session(&identity).await?;
    let session = shared.lock().await;
    state.controller().delete_admin_skin(&session, &skin_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Flips whether the skin is offered in the shop.
#[utoipa::path(
    post,
    path = "/admin/skins/{id}/toggle",
    params(("id" = String, Path, description = "Admin skin id")),
    responses(
        (status = 200, description = "Updated skin", body = Object),
        (status = 403, description = "Administrator access required", body = ErrorBody),
        (status = 404, description = "Unknown skin", body = ErrorBody)
    )
)]
pub async fn toggle_skin_handler(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path(skin_id): Path<String>,
) -> ApiResult<Json<AdminSkin>> {
    let shared = state.session(&identity).await?;
    let session = shared.lock().await;
    let skin = state.controller().toggle_admin_skin(&session, &skin_id).await?;
    Ok(Json(skin))
}

/// Uploads an image for an admin skin.
///
/// Accepts a multipart/form-data request with a single image part.
#[utoipa::path(
    post,
    path = "/admin/uploads",
    request_body(content_type = "multipart/form-data", description = "The image to upload."),
    responses(
        (status = 201, description = "Image stored", body = UploadResponse),
        (status = 400, description = "Missing file, or not a PNG, JPEG, WebP or GIF image", body = ErrorBody),
        (status = 403, description = "Administrator access required", body = ErrorBody)
    )
)]
pub async fn upload_handler(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    mut multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    let field = multipart
        .next_field()
        .await
        .map_err(|e| ApiFailure::bad_request(format!("Failed to read multipart data: {}", e)))?
        .ok_or_else(|| ApiFailure::bad_request("Multipart form must include a file"))?;

    let file_name = field.file_name().unwrap_or("upload").to_string();
    let content_type = field
        .content_type()
        .unwrap_or("application/octet-stream")
        .to_string();
    let data = field
        .bytes()
        .await
        .map_err(|e| ApiFailure::bad_request(format!("Failed to read file bytes: {}", e)))?;

    let shared = state.session(&identity).await?;
    let session = shared.lock().await;
    let url = state
        .controller()
        .upload_admin_image(&session, &file_name, &content_type, data)
        .await?;
    Ok((StatusCode::CREATED, Json(UploadResponse { url })))
}

//=========================================================================================
// User Management
//=========================================================================================

/// Every account with its current totals.
#[utoipa::path(
    get,
    path = "/admin/users",
    responses(
        (status = 200, description = "All users, ordered by username", body = Vec<Object>),
        (status = 403, description = "Administrator access required", body = ErrorBody)
    )
)]
pub async fn list_users_handler(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<Json<Vec<UserSummary>>> {
    let shared = state.session(&identity).await?;
    let mut session = shared.lock().await;
    let controller = state.controller();
    controller.navigate(&mut session, View::Admin)?;
    Ok(Json(controller.list_users(&session).await?))
}

/// Overwrites points, reading time, today's generation count or the daily
/// goal of a user.
#[utoipa::path(
    put,
    path = "/admin/users/{id}",
    params(("id" = Uuid, Path, description = "User id")),
    request_body = UserUpdateRequest,
    responses(
        (status = 200, description = "Updated user", body = Object),
        (status = 400, description = "Goal must be at least one minute", body = ErrorBody),
        (status = 403, description = "Administrator access required", body = ErrorBody),
        (status = 404, description = "Unknown user", body = ErrorBody),
        (status = 503, description = "Update applied but not saved", body = ErrorBody)
    )
)]
pub async fn update_user_handler(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path(user_id): Path<Uuid>,
    Json(req): Json<UserUpdateRequest>,
) -> ApiResult<Json<UserSummary>> {
    {
        // Released before the update, which may lock this same session.
        let shared = state.session(&identity).await?;
        let session = shared.lock().await;
        Controller::require_admin(&session)?;
    }
    let summary = state
        .registry
        .update_user_progress(user_id, &req.into())
        .await?;
    Ok(Json(summary))
}
