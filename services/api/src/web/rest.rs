//! services/api/src/web/rest.rs
//!
//! The master definition for the OpenAPI specification and the mapping of
//! controller and port errors onto HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use reading_rewards_core::{ControllerError, PortError};
use serde::Serialize;
use tracing::error;
use utoipa::{OpenApi, ToSchema};

use crate::web::{admin, auth, reading, shop};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::signup_handler,
        auth::login_handler,
        auth::logout_handler,
        reading::me_handler,
        reading::generate_story_handler,
        reading::finish_reading_handler,
        reading::answer_handler,
        reading::home_handler,
        reading::stats_handler,
        reading::set_goal_handler,
        reading::retry_save_handler,
        shop::shop_handler,
        shop::buy_handler,
        shop::locker_handler,
        shop::equip_handler,
        shop::creator_handler,
        shop::preview_handler,
        shop::claim_handler,
        admin::list_skins_handler,
        admin::save_skin_handler,
        admin::delete_skin_handler,
        admin::toggle_skin_handler,
        admin::upload_handler,
        admin::list_users_handler,
        admin::update_user_handler,
    ),
    components(
        schemas(
            ErrorBody,
            auth::SignupRequest,
            auth::LoginRequest,
            auth::AuthResponse,
            reading::MeResponse,
            reading::StoryRequest,
            reading::StoryResponse,
            reading::FinishReadingRequest,
            reading::QuestionResponse,
            reading::AnswerRequest,
            reading::GoalRequest,
            shop::BuyResponse,
            shop::LockerResponse,
            shop::CreatorResponse,
            shop::PreviewRequest,
            admin::SaveSkinRequest,
            admin::UploadResponse,
            admin::UserUpdateRequest,
        )
    ),
    tags(
        (name = "Reading Rewards API", description = "Story reading, rewards and the skin economy.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// Error Responses
//=========================================================================================

/// The JSON body of every error response.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
    /// Whether repeating the same request may succeed.
    pub retryable: bool,
}

/// An error on its way to becoming an HTTP response.
#[derive(Debug)]
pub struct ApiFailure {
    status: StatusCode,
    body: ErrorBody,
}

pub type ApiResult<T> = Result<T, ApiFailure>;

impl ApiFailure {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                error: message.into(),
                retryable: false,
            },
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "Not signed in")
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn is_retryable(&self) -> bool {
        self.body.retryable
    }

    /// Replaces a 5xx status, leaving client errors untouched.
    pub fn with_status_if_server_error(mut self, status: StatusCode) -> Self {
        if self.status.is_server_error() {
            self.status = status;
            self.body.retryable = true;
        }
        self
    }
}

fn port_status(e: &PortError) -> StatusCode {
    match e {
        PortError::NotFound(_) => StatusCode::NOT_FOUND,
        PortError::Conflict(_) => StatusCode::CONFLICT,
        PortError::InvalidContent(_) => StatusCode::BAD_REQUEST,
        PortError::Unauthorized => StatusCode::UNAUTHORIZED,
        PortError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<PortError> for ApiFailure {
    fn from(e: PortError) -> Self {
        Self::new(port_status(&e), e.to_string())
    }
}

impl From<ControllerError> for ApiFailure {
    fn from(e: ControllerError) -> Self {
        let status = match &e {
            ControllerError::WrongView(_)
            | ControllerError::AlreadyOwned(_)
            | ControllerError::NoPreview => StatusCode::CONFLICT,
            ControllerError::InvalidOption(_)
            | ControllerError::EmptyTopic
            | ControllerError::EmptySkinRequest
            | ControllerError::UnsupportedImage(_)
            | ControllerError::Reward(_)
            | ControllerError::Goal(_) => StatusCode::BAD_REQUEST,
            ControllerError::UnknownSkin(_) => StatusCode::NOT_FOUND,
            ControllerError::NotOwned(_) | ControllerError::NotAdmin => StatusCode::FORBIDDEN,
            ControllerError::InsufficientPoints { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ControllerError::Content(_) => StatusCode::BAD_GATEWAY,
            ControllerError::Persistence(_) => StatusCode::SERVICE_UNAVAILABLE,
            ControllerError::Port(port) => port_status(port),
        };
        Self {
            status,
            body: ErrorBody {
                error: e.to_string(),
                retryable: e.is_retryable(),
            },
        }
    }
}

impl IntoResponse for ApiFailure {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(status = %self.status, "Request failed: {}", self.body.error);
        }
        (self.status, Json(self.body)).into_response()
    }
}
