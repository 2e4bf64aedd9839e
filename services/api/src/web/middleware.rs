//! services/api/src/web/middleware.rs
//!
//! Authentication middleware for protecting routes.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::debug;

use crate::web::auth::session_token;
use crate::web::rest::ApiFailure;
use crate::web::state::AppState;

/// Validates the auth session cookie and inserts the resolved `Identity`
/// into the request extensions. Missing or invalid sessions get a 401.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiFailure> {
    let token = session_token(req.headers()).ok_or_else(ApiFailure::unauthorized)?;

    let identity = state.identity.validate(token).await.map_err(|e| {
        debug!("Rejected auth session: {}", e);
        match e {
            reading_rewards_core::PortError::Unexpected(_) => ApiFailure::from(e),
            _ => ApiFailure::unauthorized(),
        }
    })?;

    req.extensions_mut().insert(identity);
    Ok(next.run(req).await)
}
