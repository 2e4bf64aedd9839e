//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{
        DbAdapter, LocalBlobStorage, OfflineContentGenerator, OpenAiContentAdapter,
        PasswordIdentityService,
    },
    config::Config,
    error::ApiError,
    web::{self, state::AppState},
};
use async_openai::{config::OpenAIConfig, Client};
use reading_rewards_core::ports::{ContentGenerator, IdentityService};
use reading_rewards_core::registry::spawn_identity_listener;
use reading_rewards_core::{Controller, Services, SessionRegistry, SystemClock};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let db_adapter = DbAdapter::new(db_pool);
    info!("Running database migrations...");
    db_adapter.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Initialize Service Adapters ---
    let content: Arc<dyn ContentGenerator> = match &config.openai_api_key {
        Some(key) => {
            let client = Client::with_config(OpenAIConfig::new().with_api_key(key));
            Arc::new(OpenAiContentAdapter::new(
                client,
                config.story_model.clone(),
                config.image_model.clone(),
            ))
        }
        None => {
            warn!("OPENAI_API_KEY is not set, using the offline content generator.");
            Arc::new(OfflineContentGenerator)
        }
    };
    tokio::fs::create_dir_all(&config.blob_dir).await?;
    let blobs = Arc::new(LocalBlobStorage::new(
        config.blob_dir.clone(),
        config.public_blob_url.clone(),
    ));
    let identity = Arc::new(PasswordIdentityService::new(db_adapter.clone()));
    let db = Arc::new(db_adapter);

    // --- 4. Build the Controller, Session Registry & Shared AppState ---
    let controller = Controller::new(
        Services {
            content,
            progress: db.clone(),
            catalog: db,
            blobs,
            clock: Arc::new(SystemClock),
        },
        config.rules,
    );
    let registry = Arc::new(
        SessionRegistry::new(controller)
            .with_idle_timeout(chrono::Duration::minutes(config.session_idle_minutes)),
    );

    let shutdown = CancellationToken::new();
    let listener_task = spawn_identity_listener(registry.clone(), identity.subscribe(), shutdown.clone());

    let app_state = Arc::new(AppState {
        registry,
        identity,
        config: config.clone(),
    });

    // --- 5. Create the Web Router ---
    let app = web::router(app_state)?;

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    let server_shutdown = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if tokio::signal::ctrl_c().await.is_err() {
                warn!("Could not listen for the shutdown signal.");
            }
            info!("Shutdown signal received.");
            server_shutdown.cancel();
        })
        .await?;

    // --- 7. Tear Down Background Tasks ---
    shutdown.cancel();
    if let Err(e) = listener_task.await {
        warn!("Identity listener ended abnormally: {}", e);
    }
    info!("Server stopped.");
    Ok(())
}
