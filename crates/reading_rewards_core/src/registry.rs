//! crates/reading_rewards_core/src/registry.rs
//!
//! Keeps one live `ReaderSession` per signed-in identity and follows identity
//! changes reported by the identity service.
//!
//! The registry map only hands out per-user slots; loading a record happens
//! under the slot's own lock, so a slow store only delays that user. Sessions
//! that stay untouched for longer than the idle timeout are swept by the
//! listener task.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::controller::{Controller, ControllerResult, ProgressUpdate, ReaderSession, UserSummary};
use crate::domain::Identity;
use crate::ports::IdentityEvent;

pub type SharedSession = Arc<Mutex<ReaderSession>>;

/// How long a session may go unused before it is dropped from memory.
pub const DEFAULT_IDLE_TIMEOUT_MINUTES: i64 = 30;

/// How often the listener task sweeps idle sessions.
const SWEEP_INTERVAL: std::time::Duration = std::time::Duration::from_secs(60);

type Slot = Arc<Mutex<Option<SharedSession>>>;

struct Entry {
    slot: Slot,
    last_seen: DateTime<Utc>,
}

pub struct SessionRegistry {
    controller: Controller,
    sessions: Mutex<HashMap<Uuid, Entry>>,
    idle_timeout: Duration,
}

impl SessionRegistry {
    pub fn new(controller: Controller) -> Self {
        Self {
            controller,
            sessions: Mutex::new(HashMap::new()),
            idle_timeout: Duration::minutes(DEFAULT_IDLE_TIMEOUT_MINUTES),
        }
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    pub fn controller(&self) -> &Controller {
        &self.controller
    }

    /// The user's slot, created empty if needed, with its last use stamped.
    async fn touch(&self, user_id: Uuid) -> Slot {
        let now = self.controller.now();
        let mut sessions = self.sessions.lock().await;
        let entry = sessions.entry(user_id).or_insert_with(|| Entry {
            slot: Arc::new(Mutex::new(None)),
            last_seen: now,
        });
        entry.last_seen = now;
        entry.slot.clone()
    }

    /// Returns the live session for the identity, loading it on first use.
    pub async fn session(&self, identity: &Identity) -> ControllerResult<SharedSession> {
        let slot = self.touch(identity.user_id).await;
        let mut loaded = slot.lock().await;
        if let Some(existing) = loaded.as_ref() {
            return Ok(existing.clone());
        }

        let session = self.controller.open_session(identity.clone()).await?;
        let shared = Arc::new(Mutex::new(session));
        *loaded = Some(shared.clone());
        Ok(shared)
    }

    /// Creates the starting record for a new account and makes it the live
    /// session. Runs under the user's slot lock, so a concurrent sign-in
    /// event either waits for the new record or has its default record
    /// replaced by it.
    pub async fn create_account(
        &self,
        identity: Identity,
        username: &str,
        avatar_url: Option<&str>,
        is_admin: bool,
    ) -> ControllerResult<SharedSession> {
        let slot = self.touch(identity.user_id).await;
        let mut loaded = slot.lock().await;
        let session = self
            .controller
            .create_account(identity, username, avatar_url, is_admin)
            .await?;

        match loaded.as_ref() {
            Some(existing) => {
                *existing.lock().await = session;
                Ok(existing.clone())
            }
            None => {
                let shared = Arc::new(Mutex::new(session));
                *loaded = Some(shared.clone());
                Ok(shared)
            }
        }
    }

    /// Applies an administrative correction to a user's record. A live
    /// session is updated in place so its next save keeps the correction;
    /// otherwise the stored record is changed while the slot is held.
    pub async fn update_user_progress(
        &self,
        user_id: Uuid,
        update: &ProgressUpdate,
    ) -> ControllerResult<UserSummary> {
        let slot = self.touch(user_id).await;
        let loaded = slot.lock().await;
        match loaded.as_ref() {
            Some(shared) => {
                let mut target = shared.lock().await;
                self.controller.apply_progress_update(&mut target, update).await
            }
            None => self.controller.update_stored_progress(user_id, update).await,
        }
    }

    /// Drops the in-memory session. Ephemeral reading state is lost; the
    /// progress record was already handed to the store.
    pub async fn close(&self, user_id: Uuid) -> bool {
        self.sessions.lock().await.remove(&user_id).is_some()
    }

    pub async fn active_count(&self) -> usize {
        self.sessions.lock().await.len()
    }

    /// Drops sessions unused for longer than the idle timeout. Sessions in use
    /// are skipped, and unsaved records get one more save attempt; a session
    /// that still cannot be saved stays in memory. Returns how many were
    /// dropped.
    pub async fn evict_idle(&self) -> usize {
        let cutoff = self.controller.now() - self.idle_timeout;
        let candidates: Vec<(Uuid, Slot, DateTime<Utc>)> = self
            .sessions
            .lock()
            .await
            .iter()
            .filter(|(_, entry)| entry.last_seen < cutoff)
            .map(|(user_id, entry)| (*user_id, entry.slot.clone(), entry.last_seen))
            .collect();

        let mut evictable = Vec::new();
        for (user_id, slot, last_seen) in candidates {
            let Ok(loaded) = slot.try_lock() else {
                continue;
            };
            if let Some(shared) = loaded.as_ref() {
                let Ok(mut session) = shared.try_lock() else {
                    continue;
                };
                if session.has_unsaved_changes() {
                    if let Err(e) = self.controller.retry_save(&mut session).await {
                        warn!(user_id = %user_id, "Keeping idle session with unsaved progress: {}", e);
                        continue;
                    }
                }
            }
            evictable.push((user_id, slot.clone(), last_seen));
        }

        let mut sessions = self.sessions.lock().await;
        let mut evicted = 0;
        for (user_id, slot, last_seen) in evictable {
            let untouched = sessions
                .get(&user_id)
                .is_some_and(|e| e.last_seen == last_seen && Arc::ptr_eq(&e.slot, &slot));
            if untouched {
                sessions.remove(&user_id);
                evicted += 1;
            }
        }
        if evicted > 0 {
            info!(evicted, remaining = sessions.len(), "Evicted idle sessions.");
        }
        evicted
    }

    pub async fn handle_event(&self, event: IdentityEvent) {
        match event {
            IdentityEvent::SignedIn(identity) => {
                if let Err(e) = self.session(&identity).await {
                    error!(user_id = %identity.user_id, "Failed to load session on sign-in: {}", e);
                }
            }
            IdentityEvent::SignedOut(user_id) => {
                if self.close(user_id).await {
                    info!(user_id = %user_id, "Session closed on sign-out.");
                }
            }
        }
    }
}

/// Follows identity changes and sweeps idle sessions until `shutdown` is
/// cancelled or the sender side goes away.
pub fn spawn_identity_listener(
    registry: Arc<SessionRegistry>,
    mut events: broadcast::Receiver<IdentityEvent>,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Identity listener started.");
        let mut sweep = tokio::time::interval(SWEEP_INTERVAL);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = sweep.tick() => {
                    let evicted = registry.evict_idle().await;
                    debug!(evicted, "Idle session sweep finished.");
                }
                received = events.recv() => match received {
                    Ok(event) => registry.handle_event(event).await,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Identity listener fell behind, skipped {} events.", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            }
        }
        info!("Identity listener stopped.");
    })
}
