//! services/api/src/web/state.rs
//!
//! Defines the application state shared by all handlers.

use crate::config::Config;
use axum::http::StatusCode;
use reading_rewards_core::domain::Identity;
use reading_rewards_core::ports::IdentityService;
use reading_rewards_core::registry::SharedSession;
use reading_rewards_core::{Controller, SessionRegistry};
use std::sync::Arc;

use crate::web::rest::ApiFailure;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<SessionRegistry>,
    pub identity: Arc<dyn IdentityService>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn controller(&self) -> &Controller {
        self.registry.controller()
    }

    /// The live session of the authenticated identity.
    pub async fn session(&self, identity: &Identity) -> Result<SharedSession, ApiFailure> {
        self.registry.session(identity).await.map_err(|e| {
            ApiFailure::from(e).with_status_if_server_error(StatusCode::SERVICE_UNAVAILABLE)
        })
    }
}
