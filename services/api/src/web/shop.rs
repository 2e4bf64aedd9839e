//! services/api/src/web/shop.rs
//!
//! Handlers for the shop, the locker and the skin creator.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    Extension,
};
use reading_rewards_core::controller::PreviewOutcome;
use reading_rewards_core::domain::{Identity, Skin, SkinPreview};
use reading_rewards_core::eligibility::Eligibility;
use reading_rewards_core::View;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::web::rest::{ApiResult, ErrorBody};
use crate::web::state::AppState;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BuyResponse {
    #[schema(value_type = Object)]
    pub skin: Skin,
    pub points: u64,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LockerResponse {
    #[schema(value_type = Vec<Object>)]
    pub skins: Vec<Skin>,
    pub equipped_item_id: String,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreatorResponse {
    #[schema(value_type = Object)]
    pub eligibility: Eligibility,
    #[schema(value_type = Option<Object>)]
    pub preview: Option<SkinPreview>,
    pub points: u64,
    pub generation_cost: u64,
    pub required_seconds_per_generation: u64,
}

#[derive(Deserialize, ToSchema)]
pub struct PreviewRequest {
    pub name: String,
    pub description: String,
}

//=========================================================================================
// Shop and Locker
//=========================================================================================

/// Skins on offer to the signed-in reader.
#[utoipa::path(
    get,
    path = "/shop",
    responses((status = 200, description = "Shop catalogue", body = Vec<Object>))
)]
pub async fn shop_handler(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<Json<Vec<Skin>>> {
    let shared = state.session(&identity).await?;
    let mut session = shared.lock().await;
    let controller = state.controller();
    controller.navigate(&mut session, View::Shop)?;
    Ok(Json(controller.shop(&session).await?))
}

#[utoipa::path(
    post,
    path = "/shop/{id}/buy",
    params(("id" = String, Path, description = "Skin id")),
    responses(
        (status = 200, description = "Skin bought", body = BuyResponse),
        (status = 404, description = "Unknown skin", body = ErrorBody),
        (status = 409, description = "Already owned", body = ErrorBody),
        (status = 422, description = "Not enough points", body = ErrorBody),
        (status = 503, description = "Purchase applied but not saved", body = ErrorBody)
    )
)]
pub async fn buy_handler(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path(skin_id): Path<String>,
) -> ApiResult<Json<BuyResponse>> {
    let shared = state.session(&identity).await?;
    let mut session = shared.lock().await;
    let skin = state.controller().buy_skin(&mut session, &skin_id).await?;
    Ok(Json(BuyResponse {
        skin,
        points: session.progress.points,
    }))
}

#[utoipa::path(
    get,
    path = "/locker",
    responses((status = 200, description = "Owned skins", body = LockerResponse))
)]
pub async fn locker_handler(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<Json<LockerResponse>> {
    let shared = state.session(&identity).await?;
    let mut session = shared.lock().await;
    let controller = state.controller();
    controller.navigate(&mut session, View::Locker)?;
    let skins = controller.locker(&session).await?;
    Ok(Json(LockerResponse {
        skins,
        equipped_item_id: session.progress.equipped_item_id.clone(),
    }))
}

#[utoipa::path(
    post,
    path = "/locker/{id}/equip",
    params(("id" = String, Path, description = "Skin id")),
    responses(
        (status = 204, description = "Skin equipped"),
        (status = 403, description = "Skin not owned", body = ErrorBody)
    )
)]
pub async fn equip_handler(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path(skin_id): Path<String>,
) -> ApiResult<StatusCode> {
    let shared = state.session(&identity).await?;
    let mut session = shared.lock().await;
    state.controller().equip_skin(&mut session, &skin_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

//=========================================================================================
// Skin Creator
//=========================================================================================

/// Generation eligibility and any preview waiting to be claimed.
#[utoipa::path(
    get,
    path = "/creator",
    responses((status = 200, description = "Creator state", body = CreatorResponse))
)]
pub async fn creator_handler(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<Json<CreatorResponse>> {
    let shared = state.session(&identity).await?;
    let mut session = shared.lock().await;
    let controller = state.controller();
    controller.navigate(&mut session, View::Creator)?;

    Ok(Json(CreatorResponse {
        eligibility: controller.check_generation(&session),
        preview: session.preview().cloned(),
        points: session.progress.points,
        generation_cost: controller.rules().skin_generation_cost,
        required_seconds_per_generation: controller.rules().required_seconds_per_generation,
    }))
}

/// Generates a preview image. A denial is a normal response with
/// `status = "denied"`.
#[utoipa::path(
    post,
    path = "/creator/preview",
    request_body = PreviewRequest,
    responses(
        (status = 200, description = "Preview ready or generation denied", body = Object),
        (status = 400, description = "Name or description missing", body = ErrorBody),
        (status = 422, description = "Not enough points", body = ErrorBody),
        (status = 503, description = "Preview generated but not saved", body = ErrorBody)
    )
)]
pub async fn preview_handler(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<PreviewRequest>,
) -> ApiResult<Json<PreviewOutcome>> {
    let shared = state.session(&identity).await?;
    let mut session = shared.lock().await;
    let outcome = state
        .controller()
        .generate_skin_preview(&mut session, &req.name, &req.description)
        .await?;
    Ok(Json(outcome))
}

/// Pays for the current preview and adds it to the locker.
#[utoipa::path(
    post,
    path = "/creator/claim",
    responses(
        (status = 200, description = "Skin claimed", body = BuyResponse),
        (status = 409, description = "No preview to claim", body = ErrorBody),
        (status = 422, description = "Not enough points", body = ErrorBody)
    )
)]
pub async fn claim_handler(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<Json<BuyResponse>> {
    let shared = state.session(&identity).await?;
    let mut session = shared.lock().await;
    let skin = state.controller().claim_skin(&mut session).await?;
    Ok(Json(BuyResponse {
        skin,
        points: session.progress.points,
    }))
}
