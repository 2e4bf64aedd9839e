//! services/api/src/web/reading.rs
//!
//! Handlers for the profile, the reading flow and the daily reading stats.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use reading_rewards_core::controller::ReadingOutcome;
use reading_rewards_core::daily::ReadingSummary;
use reading_rewards_core::domain::{Identity, ReadingLevel, Skin, Story, StoryLength};
use reading_rewards_core::View;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::web::rest::{ApiResult, ErrorBody};
use crate::web::state::AppState;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    pub user_id: Uuid,
    pub email: String,
    pub username: String,
    pub points: u64,
    pub total_validated_seconds: u64,
    pub is_admin: bool,
    #[schema(value_type = String)]
    pub view: View,
    #[schema(value_type = Option<Object>)]
    pub equipped_skin: Option<Skin>,
    /// True when the last save failed; `POST /progress/retry` retries it.
    pub unsaved_changes: bool,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StoryRequest {
    #[schema(value_type = String, example = "3rd Grade")]
    pub reading_level: ReadingLevel,
    #[serde(default)]
    #[schema(value_type = String, example = "Medium")]
    pub length: StoryLength,
    pub topic: String,
}

#[derive(Serialize, ToSchema)]
pub struct StoryResponse {
    #[schema(value_type = Object)]
    pub story: Story,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FinishReadingRequest {
    /// Seconds the story was on screen, as measured by the client.
    pub elapsed_seconds: i64,
}

/// The comprehension question without its answer.
#[derive(Serialize, ToSchema)]
pub struct QuestionResponse {
    pub question: String,
    pub options: Vec<String>,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnswerRequest {
    pub option_index: usize,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GoalRequest {
    pub goal_minutes: u32,
}

//=========================================================================================
// Handlers
//=========================================================================================

/// The signed-in reader's profile.
#[utoipa::path(
    get,
    path = "/me",
    responses(
        (status = 200, description = "Current profile", body = MeResponse),
        (status = 401, description = "Not signed in", body = ErrorBody)
    )
)]
pub async fn me_handler(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<Json<MeResponse>> {
    let shared = state.session(&identity).await?;
    let session = shared.lock().await;
    let equipped_skin = state.controller().equipped_skin(&session).await?;

    Ok(Json(MeResponse {
        user_id: identity.user_id,
        email: identity.email.clone(),
        username: session.progress.username.clone(),
        points: session.progress.points,
        total_validated_seconds: session.progress.total_validated_seconds,
        is_admin: session.progress.is_admin,
        view: session.view(),
        equipped_skin,
        unsaved_changes: session.has_unsaved_changes(),
    }))
}

/// Generates a new story. Any finished story's results are left behind;
/// a story still being read or answered must be finished or abandoned first.
#[utoipa::path(
    post,
    path = "/stories",
    request_body = StoryRequest,
    responses(
        (status = 201, description = "Story generated", body = StoryResponse),
        (status = 400, description = "Missing topic", body = ErrorBody),
        (status = 409, description = "A story is in progress", body = ErrorBody),
        (status = 502, description = "Story generation failed", body = ErrorBody)
    )
)]
pub async fn generate_story_handler(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<StoryRequest>,
) -> ApiResult<impl IntoResponse> {
    let shared = state.session(&identity).await?;
    let mut session = shared.lock().await;
    let controller = state.controller();

    if !matches!(session.view(), View::Reading | View::Question) {
        controller.navigate(&mut session, View::Generator)?;
    }
    let story = controller
        .generate_story(&mut session, req.reading_level, req.length, &req.topic)
        .await?;
    Ok((StatusCode::CREATED, Json(StoryResponse { story })))
}

/// Stops the reading timer and returns the comprehension question.
#[utoipa::path(
    post,
    path = "/reading/finish",
    request_body = FinishReadingRequest,
    responses(
        (status = 200, description = "Comprehension question", body = QuestionResponse),
        (status = 400, description = "Negative reading time", body = ErrorBody),
        (status = 409, description = "No story is being read", body = ErrorBody)
    )
)]
pub async fn finish_reading_handler(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<FinishReadingRequest>,
) -> ApiResult<Json<QuestionResponse>> {
    let shared = state.session(&identity).await?;
    let mut session = shared.lock().await;
    let question = state
        .controller()
        .finish_reading(&mut session, req.elapsed_seconds)
        .await?;
    Ok(Json(QuestionResponse {
        question: question.question,
        options: question.options,
    }))
}

/// Answers the comprehension question and applies the reward.
#[utoipa::path(
    post,
    path = "/reading/answer",
    request_body = AnswerRequest,
    responses(
        (status = 200, description = "Reward and validation outcome", body = Object),
        (status = 400, description = "Unknown option", body = ErrorBody),
        (status = 409, description = "No question is pending", body = ErrorBody)
    )
)]
pub async fn answer_handler(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<AnswerRequest>,
) -> ApiResult<Json<ReadingOutcome>> {
    let shared = state.session(&identity).await?;
    let mut session = shared.lock().await;
    let outcome = state
        .controller()
        .answer_question(&mut session, req.option_index)
        .await?;
    Ok(Json(outcome))
}

/// Abandons the current story or results and returns to the generator.
#[utoipa::path(
    post,
    path = "/reading/home",
    responses((status = 204, description = "Back on the generator view"))
)]
pub async fn home_handler(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<StatusCode> {
    let shared = state.session(&identity).await?;
    let mut session = shared.lock().await;
    state.controller().return_home(&mut session);
    Ok(StatusCode::NO_CONTENT)
}

/// Today's progress, streak and the last seven days.
#[utoipa::path(
    get,
    path = "/stats",
    responses((status = 200, description = "Reading summary", body = Object))
)]
pub async fn stats_handler(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<Json<ReadingSummary>> {
    let shared = state.session(&identity).await?;
    let session = shared.lock().await;
    Ok(Json(state.controller().reading_summary(&session)))
}

/// Changes the daily reading goal.
#[utoipa::path(
    put,
    path = "/stats/goal",
    request_body = GoalRequest,
    responses(
        (status = 200, description = "Updated reading summary", body = Object),
        (status = 400, description = "Goal must be at least one minute", body = ErrorBody)
    )
)]
pub async fn set_goal_handler(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<GoalRequest>,
) -> ApiResult<Json<ReadingSummary>> {
    let shared = state.session(&identity).await?;
    let mut session = shared.lock().await;
    let controller = state.controller();
    controller.set_daily_goal(&mut session, req.goal_minutes).await?;
    Ok(Json(controller.reading_summary(&session)))
}

/// Retries saving progress after a failed save.
#[utoipa::path(
    post,
    path = "/progress/retry",
    responses(
        (status = 204, description = "Progress saved"),
        (status = 503, description = "Saving failed again", body = ErrorBody)
    )
)]
pub async fn retry_save_handler(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<StatusCode> {
    let shared = state.session(&identity).await?;
    let mut session = shared.lock().await;
    state.controller().retry_save(&mut session).await?;
    Ok(StatusCode::NO_CONTENT)
}
