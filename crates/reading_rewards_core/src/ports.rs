//! crates/reading_rewards_core/src/ports.rs
//!
//! Defines the service contracts (traits) the core consumes. These traits form
//! the boundary of the hexagonal architecture: persistence, identity, content
//! generation and blob storage all live behind them.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::domain::{
    AdminSkin, ComprehensionQuestion, Identity, ProgressRecord, ReadingLevel, Story, StoryLength,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Generated content was malformed: {0}")]
    InvalidContent(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Content Generation
//=========================================================================================

/// Raw story text as returned by the generator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedStory {
    pub title: String,
    pub body: String,
}

/// A generated image, either already hosted or as raw PNG bytes that still
/// need to be uploaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeneratedImage {
    Hosted(String),
    Png(Bytes),
}

#[async_trait]
pub trait ContentGenerator: Send + Sync {
    async fn generate_story(
        &self,
        level: ReadingLevel,
        length: StoryLength,
        topic: &str,
    ) -> PortResult<GeneratedStory>;

    /// Produces a four-option question about the story.
    async fn generate_comprehension_check(&self, story: &Story) -> PortResult<ComprehensionQuestion>;

    async fn generate_cosmetic_image(&self, prompt: &str) -> PortResult<GeneratedImage>;
}

//=========================================================================================
// Identity
//=========================================================================================

/// Notification of a change in who is signed in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityEvent {
    SignedIn(Identity),
    SignedOut(Uuid),
}

/// A bearer token for a signed-in identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSession {
    pub token: String,
    pub identity: Identity,
    pub expires_at: DateTime<Utc>,
}

#[async_trait]
pub trait IdentityService: Send + Sync {
    async fn sign_up(&self, email: &str, password: &str) -> PortResult<AuthSession>;

    async fn sign_in(&self, email: &str, password: &str) -> PortResult<AuthSession>;

    async fn sign_out(&self, token: &str) -> PortResult<()>;

    /// Resolves a token to its identity, failing with `Unauthorized` when the
    /// token is unknown or expired.
    async fn validate(&self, token: &str) -> PortResult<Identity>;

    /// Identity changes after initial load. Each call gets its own receiver.
    fn subscribe(&self) -> broadcast::Receiver<IdentityEvent>;
}

//=========================================================================================
// Document Store
//=========================================================================================

/// A stored record together with the account it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredProgress {
    pub user_id: Uuid,
    pub record: ProgressRecord,
}

#[async_trait]
pub trait ProgressStore: Send + Sync {
    async fn load_progress(&self, user_id: Uuid) -> PortResult<Option<ProgressRecord>>;

    async fn save_progress(&self, user_id: Uuid, record: &ProgressRecord) -> PortResult<()>;

    /// Every stored record, ordered by username.
    async fn list_progress(&self) -> PortResult<Vec<StoredProgress>>;
}

#[async_trait]
pub trait SkinCatalogStore: Send + Sync {
    /// All admin skins, newest first.
    async fn list_admin_skins(&self) -> PortResult<Vec<AdminSkin>>;

    /// Admin skins currently offered in the shop, newest first.
    async fn list_active_admin_skins(&self) -> PortResult<Vec<AdminSkin>>;

    async fn save_admin_skin(&self, skin: &AdminSkin) -> PortResult<()>;

    async fn delete_admin_skin(&self, skin_id: &str) -> PortResult<()>;
}

//=========================================================================================
// Blob Storage and Time
//=========================================================================================

#[async_trait]
pub trait BlobStorage: Send + Sync {
    /// Stores the bytes under `path` and returns a public reference to them.
    async fn upload(&self, bytes: Bytes, path: &str, content_type: &str) -> PortResult<String>;
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
