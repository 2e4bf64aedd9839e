//! services/api/src/adapters/identity.rs
//!
//! Password-based implementation of the `IdentityService` port. Passwords
//! are hashed with Argon2 and sign-ins are represented by database-backed
//! auth sessions. Every sign-in and sign-out is broadcast to subscribers.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use reading_rewards_core::domain::Identity;
use reading_rewards_core::ports::{AuthSession, IdentityEvent, IdentityService, PortError, PortResult};
use tokio::sync::broadcast;
use tracing::{debug, error};
use uuid::Uuid;

use crate::adapters::db::DbAdapter;

/// How long an auth session stays valid.
pub const SESSION_DAYS: i64 = 30;

const EVENT_CAPACITY: usize = 64;
const MIN_PASSWORD_LEN: usize = 6;

pub struct PasswordIdentityService {
    db: DbAdapter,
    events: broadcast::Sender<IdentityEvent>,
}

impl PasswordIdentityService {
    pub fn new(db: DbAdapter) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self { db, events }
    }

    async fn start_session(&self, identity: Identity) -> PortResult<AuthSession> {
        let token = Uuid::new_v4().to_string();
        let expires_at = Utc::now() + Duration::days(SESSION_DAYS);
        self.db
            .create_auth_session(&token, identity.user_id, expires_at)
            .await?;
        self.publish(IdentityEvent::SignedIn(identity.clone()));
        Ok(AuthSession {
            token,
            identity,
            expires_at,
        })
    }

    fn publish(&self, event: IdentityEvent) {
        // Sending only fails when nobody is listening.
        if self.events.send(event).is_err() {
            debug!("No identity subscribers to notify.");
        }
    }
}

fn normalize_email(email: &str) -> PortResult<String> {
    let email = email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(PortError::InvalidContent("A valid email address is required".to_string()));
    }
    Ok(email)
}

fn hash_password(password: &str) -> PortResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| {
            error!("Failed to hash password: {:?}", e);
            PortError::Unexpected("Failed to hash password".to_string())
        })
}

fn verify_password(password: &str, stored_hash: &str) -> PortResult<bool> {
    let parsed = PasswordHash::new(stored_hash).map_err(|e| {
        error!("Failed to parse password hash: {:?}", e);
        PortError::Unexpected("Authentication error".to_string())
    })?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

#[async_trait]
impl IdentityService for PasswordIdentityService {
    async fn sign_up(&self, email: &str, password: &str) -> PortResult<AuthSession> {
        let email = normalize_email(email)?;
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(PortError::InvalidContent(format!(
                "Passwords need at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }
        let user = self.db.create_user(&email, &hash_password(password)?).await?;
        self.start_session(user.identity()).await
    }

    async fn sign_in(&self, email: &str, password: &str) -> PortResult<AuthSession> {
        let email = normalize_email(email).map_err(|_| PortError::Unauthorized)?;
        let user = match self.db.get_user_by_email(&email).await {
            Ok(user) => user,
            Err(PortError::NotFound(_)) => return Err(PortError::Unauthorized),
            Err(e) => return Err(e),
        };
        if !verify_password(password, &user.hashed_password)? {
            return Err(PortError::Unauthorized);
        }
        self.start_session(user.identity()).await
    }

    async fn sign_out(&self, token: &str) -> PortResult<()> {
        if let Some(user_id) = self.db.delete_auth_session(token).await? {
            self.publish(IdentityEvent::SignedOut(user_id));
        }
        Ok(())
    }

    async fn validate(&self, token: &str) -> PortResult<Identity> {
        self.db.validate_auth_session(token).await
    }

    fn subscribe(&self) -> broadcast::Receiver<IdentityEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Maya@Example.COM ").unwrap(), "maya@example.com");
        assert!(normalize_email("not-an-email").is_err());
        assert!(normalize_email("   ").is_err());
    }

    #[test]
    fn test_password_hash_round_trip() {
        let hash = hash_password("correct horse").unwrap();
        assert!(verify_password("correct horse", &hash).unwrap());
        assert!(!verify_password("wrong horse", &hash).unwrap());
    }

    #[test]
    fn test_garbage_hash_is_an_error() {
        assert!(verify_password("anything", "not a phc string").is_err());
    }
}
