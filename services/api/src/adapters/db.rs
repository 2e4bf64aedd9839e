//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, the concrete implementation of
//! the `ProgressStore` and `SkinCatalogStore` ports from the core crate. It
//! also holds the account and auth-session queries used by the identity
//! adapter. All interactions with PostgreSQL go through `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reading_rewards_core::domain::{AdminSkin, Identity, ProgressRecord};
use reading_rewards_core::ports::{
    PortError, PortResult, ProgressStore, SkinCatalogStore, StoredProgress,
};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter backed by a PostgreSQL connection pool.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

/// The stored credentials of an account.
#[derive(Debug, Clone, FromRow)]
pub struct UserCredentials {
    pub user_id: Uuid,
    pub email: String,
    pub hashed_password: String,
}

impl UserCredentials {
    pub fn identity(&self) -> Identity {
        Identity {
            user_id: self.user_id,
            email: self.email.clone(),
        }
    }
}

#[derive(FromRow)]
struct AuthSessionRecord {
    user_id: Uuid,
    email: String,
    expires_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct ProgressRow {
    user_id: Uuid,
    document: Json<ProgressRecord>,
}

#[derive(FromRow)]
struct AdminSkinRecord {
    document: Json<AdminSkin>,
}

//=========================================================================================
// Accounts and Auth Sessions
//=========================================================================================

impl DbAdapter {
    /// Inserts a new account. A taken email address is a `Conflict`.
    pub async fn create_user(&self, email: &str, hashed_password: &str) -> PortResult<UserCredentials> {
        sqlx::query_as::<_, UserCredentials>(
            "INSERT INTO users (user_id, email, hashed_password) VALUES ($1, $2, $3) \
             RETURNING user_id, email, hashed_password",
        )
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(hashed_password)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                PortError::Conflict(format!("An account for {} already exists", email))
            }
            other => unexpected(other),
        })
    }

    pub async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        sqlx::query_as::<_, UserCredentials>(
            "SELECT user_id, email, hashed_password FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("User {} not found", email)),
            other => unexpected(other),
        })
    }

    pub async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        sqlx::query("INSERT INTO auth_sessions (id, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(session_id)
            .bind(user_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    /// Resolves a live auth session to its identity. Unknown and expired
    /// sessions are `Unauthorized`.
    pub async fn validate_auth_session(&self, session_id: &str) -> PortResult<Identity> {
        let record = sqlx::query_as::<_, AuthSessionRecord>(
            "SELECT s.user_id, u.email, s.expires_at FROM auth_sessions s \
             JOIN users u ON u.user_id = s.user_id WHERE s.id = $1",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .ok_or(PortError::Unauthorized)?;

        if record.expires_at <= Utc::now() {
            return Err(PortError::Unauthorized);
        }
        Ok(Identity {
            user_id: record.user_id,
            email: record.email,
        })
    }

    /// Deletes an auth session, returning the user it belonged to.
    pub async fn delete_auth_session(&self, session_id: &str) -> PortResult<Option<Uuid>> {
        sqlx::query_scalar::<_, Uuid>("DELETE FROM auth_sessions WHERE id = $1 RETURNING user_id")
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)
    }
}

//=========================================================================================
// `ProgressStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl ProgressStore for DbAdapter {
    async fn load_progress(&self, user_id: Uuid) -> PortResult<Option<ProgressRecord>> {
        let document = sqlx::query_scalar::<_, Json<ProgressRecord>>(
            "SELECT document FROM progress_records WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            PortError::Unexpected(format!("Failed to load progress for {}: {}", user_id, e))
        })?;
        Ok(document.map(|Json(record)| record))
    }

    async fn save_progress(&self, user_id: Uuid, record: &ProgressRecord) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO progress_records (user_id, document, updated_at) VALUES ($1, $2, NOW()) \
             ON CONFLICT (user_id) DO UPDATE SET document = EXCLUDED.document, updated_at = NOW()",
        )
        .bind(user_id)
        .bind(Json(record))
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn list_progress(&self) -> PortResult<Vec<StoredProgress>> {
        let rows = sqlx::query_as::<_, ProgressRow>(
            "SELECT user_id, document FROM progress_records ORDER BY document->>'username'",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(rows
            .into_iter()
            .map(|row| StoredProgress {
                user_id: row.user_id,
                record: row.document.0,
            })
            .collect())
    }
}

//=========================================================================================
// `SkinCatalogStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl SkinCatalogStore for DbAdapter {
    async fn list_admin_skins(&self) -> PortResult<Vec<AdminSkin>> {
        let records = sqlx::query_as::<_, AdminSkinRecord>(
            "SELECT document FROM admin_skins ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.document.0).collect())
    }

    async fn list_active_admin_skins(&self) -> PortResult<Vec<AdminSkin>> {
        let records = sqlx::query_as::<_, AdminSkinRecord>(
            "SELECT document FROM admin_skins WHERE is_active ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.document.0).collect())
    }

    async fn save_admin_skin(&self, skin: &AdminSkin) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO admin_skins (id, document, is_active, created_at) VALUES ($1, $2, $3, $4) \
             ON CONFLICT (id) DO UPDATE SET document = EXCLUDED.document, is_active = EXCLUDED.is_active",
        )
        .bind(&skin.id)
        .bind(Json(skin))
        .bind(skin.is_active)
        .bind(skin.created_at)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn delete_admin_skin(&self, skin_id: &str) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM admin_skins WHERE id = $1")
            .bind(skin_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Admin skin {} not found", skin_id)));
        }
        Ok(())
    }
}
