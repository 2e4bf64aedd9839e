pub mod admin;
pub mod auth;
pub mod middleware;
pub mod reading;
pub mod rest;
pub mod shop;
pub mod state;

use axum::{
    extract::DefaultBodyLimit,
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    middleware as axum_middleware,
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, services::ServeDir};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::error::ApiError;
pub use middleware::require_auth;
use rest::ApiDoc;
use state::AppState;

const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Builds the complete application router: public auth routes, the
/// authenticated API, static blob files and the Swagger UI.
pub fn router(state: Arc<AppState>) -> Result<Router, ApiError> {
    let origin = state
        .config
        .cors_origin
        .parse::<HeaderValue>()
        .map_err(|e| ApiError::Internal(format!("Invalid CORS_ORIGIN: {}", e)))?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/auth/signup", post(auth::signup_handler))
        .route("/auth/login", post(auth::login_handler))
        .route("/auth/logout", post(auth::logout_handler));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route("/me", get(reading::me_handler))
        .route("/stories", post(reading::generate_story_handler))
        .route("/reading/finish", post(reading::finish_reading_handler))
        .route("/reading/answer", post(reading::answer_handler))
        .route("/reading/home", post(reading::home_handler))
        .route("/stats", get(reading::stats_handler))
        .route("/stats/goal", put(reading::set_goal_handler))
        .route("/progress/retry", post(reading::retry_save_handler))
        .route("/shop", get(shop::shop_handler))
        .route("/shop/{id}/buy", post(shop::buy_handler))
        .route("/locker", get(shop::locker_handler))
        .route("/locker/{id}/equip", post(shop::equip_handler))
        .route("/creator", get(shop::creator_handler))
        .route("/creator/preview", post(shop::preview_handler))
        .route("/creator/claim", post(shop::claim_handler))
        .route(
            "/admin/skins",
            get(admin::list_skins_handler).post(admin::save_skin_handler),
        )
        .route("/admin/skins/{id}", delete(admin::delete_skin_handler))
        .route("/admin/skins/{id}/toggle", post(admin::toggle_skin_handler))
        .route("/admin/uploads", post(admin::upload_handler))
        .route("/admin/users", get(admin::list_users_handler))
        .route("/admin/users/{id}", put(admin::update_user_handler))
        .layer(axum_middleware::from_fn_with_state(state.clone(), require_auth));

    let blob_service = ServeDir::new(&state.config.blob_dir);
    let api_router = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .nest_service(&state.config.public_blob_url, blob_service)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(cors)
        .with_state(state);

    // Merge the API router with the Swagger UI router for a complete application.
    Ok(Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi())))
}
