//! crates/reading_rewards_core/src/controller.rs
//!
//! The application controller. It routes user actions through the rules
//! engine and the external services, owns the ephemeral state of the current
//! reading session, and hands every progress mutation to the document store.
//!
//! Persistence is optimistic: the in-memory record is mutated first and never
//! rolled back. Failed saves mark the session as unsaved; on purchase and
//! generation paths they are also returned as `ControllerError::Persistence`
//! so the user can retry.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::daily::{self, InvalidGoal, ReadingSummary};
use crate::domain::{
    AdminSkin, ComprehensionQuestion, Identity, ProgressRecord, Rarity, ReadingLevel, Skin,
    SkinId, SkinPreview, Story, StoryLength,
};
use crate::eligibility::{self, Eligibility};
use crate::fallback;
use crate::ports::{
    BlobStorage, Clock, ContentGenerator, GeneratedImage, PortError, ProgressStore,
    SkinCatalogStore, StoredProgress,
};
use crate::rewards::{self, Reward, RewardError};
use crate::settings::{self, RulesConfig};

//=========================================================================================
// Errors
//=========================================================================================

#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error("That action is not available from the {0:?} view")]
    WrongView(View),
    #[error("Answer option {0} does not exist")]
    InvalidOption(usize),
    #[error("A story topic is required")]
    EmptyTopic,
    #[error("A skin needs both a name and a description")]
    EmptySkinRequest,
    #[error(transparent)]
    Reward(#[from] RewardError),
    #[error(transparent)]
    Goal(#[from] InvalidGoal),
    #[error("Unknown skin: {0}")]
    UnknownSkin(SkinId),
    #[error("You already own {0}")]
    AlreadyOwned(SkinId),
    #[error("You do not own {0}")]
    NotOwned(SkinId),
    #[error("Not enough reading points: {needed} needed, {available} available")]
    InsufficientPoints { needed: u64, available: u64 },
    #[error("No generated skin is waiting to be claimed")]
    NoPreview,
    #[error("Administrator access required")]
    NotAdmin,
    #[error("Unsupported image type: {0}")]
    UnsupportedImage(String),
    #[error("Content generation failed: {0}")]
    Content(PortError),
    #[error("Your progress could not be saved, please try again: {0}")]
    Persistence(PortError),
    #[error(transparent)]
    Port(#[from] PortError),
}

impl ControllerError {
    /// Whether repeating the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ControllerError::Persistence(_) | ControllerError::Content(_))
    }
}

pub type ControllerResult<T> = Result<T, ControllerError>;

//=========================================================================================
// Session State
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum View {
    Generator,
    Reading,
    Question,
    Results,
    Shop,
    Locker,
    Creator,
    Admin,
    Help,
}

/// The story currently being read and, once reading finished, its measured
/// time and pending question.
#[derive(Debug, Clone)]
struct ActiveReading {
    story: Story,
    started_at: DateTime<Utc>,
    raw_seconds: u64,
    counted_seconds: u64,
    question: Option<ComprehensionQuestion>,
}

/// What a finished story earned, shown on the results view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingOutcome {
    pub raw_seconds: u64,
    /// Reading time after the story-length cap, before comprehension
    /// adjustment.
    pub counted_seconds: u64,
    pub question_correct: bool,
    pub explanation: Option<String>,
    pub reward: Reward,
    pub validation_note: Option<String>,
    pub points_balance: u64,
}

/// Result of asking for a new skin preview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PreviewOutcome {
    Denied(Eligibility),
    Ready(SkinPreview),
}

/// Input for creating or updating an admin skin.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminSkinDraft {
    pub id: Option<SkinId>,
    pub name: String,
    pub description: Option<String>,
    pub rarity: Rarity,
    pub cost: u64,
    pub image_url: String,
    pub is_active: bool,
}

/// Administrative corrections to a user's record. Absent fields are left
/// alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressUpdate {
    pub points: Option<u64>,
    pub total_validated_seconds: Option<u64>,
    pub generations_used_today: Option<u32>,
    pub goal_minutes: Option<u32>,
}

/// One row of the admin user list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub user_id: Uuid,
    pub username: String,
    pub points: u64,
    pub total_validated_seconds: u64,
    /// Generations counted against today's cap, zero once the window rolled.
    pub generations_used_today: u32,
    pub goal_minutes: u32,
    pub is_admin: bool,
}

/// Everything the controller knows about one signed-in user. Passed
/// explicitly to every action.
#[derive(Debug)]
pub struct ReaderSession {
    pub identity: Identity,
    pub progress: ProgressRecord,
    view: View,
    reading: Option<ActiveReading>,
    outcome: Option<ReadingOutcome>,
    preview: Option<SkinPreview>,
    unsaved: bool,
}

impl ReaderSession {
    pub fn new(identity: Identity, progress: ProgressRecord) -> Self {
        Self {
            identity,
            progress,
            view: View::Generator,
            reading: None,
            outcome: None,
            preview: None,
            unsaved: false,
        }
    }

    pub fn view(&self) -> View {
        self.view
    }

    pub fn current_story(&self) -> Option<&Story> {
        self.reading.as_ref().map(|r| &r.story)
    }

    pub fn pending_question(&self) -> Option<&ComprehensionQuestion> {
        self.reading.as_ref().and_then(|r| r.question.as_ref())
    }

    pub fn last_outcome(&self) -> Option<&ReadingOutcome> {
        self.outcome.as_ref()
    }

    pub fn preview(&self) -> Option<&SkinPreview> {
        self.preview.as_ref()
    }

    /// True when the last save of this record failed and has not been
    /// retried successfully.
    pub fn has_unsaved_changes(&self) -> bool {
        self.unsaved
    }

    fn discard_ephemeral(&mut self) {
        self.reading = None;
        self.outcome = None;
    }
}

//=========================================================================================
// Controller
//=========================================================================================

/// The external collaborators the controller calls out to.
#[derive(Clone)]
pub struct Services {
    pub content: Arc<dyn ContentGenerator>,
    pub progress: Arc<dyn ProgressStore>,
    pub catalog: Arc<dyn SkinCatalogStore>,
    pub blobs: Arc<dyn BlobStorage>,
    pub clock: Arc<dyn Clock>,
}

#[derive(Clone)]
pub struct Controller {
    services: Services,
    rules: RulesConfig,
}

impl Controller {
    pub fn new(services: Services, rules: RulesConfig) -> Self {
        Self { services, rules }
    }

    pub fn rules(&self) -> &RulesConfig {
        &self.rules
    }

    pub(crate) fn now(&self) -> DateTime<Utc> {
        self.services.clock.now()
    }

    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }

    // --- Persistence ---

    /// Saves the record, remembering a failure on the session. The caller
    /// decides whether the failure is reported.
    async fn persist(&self, session: &mut ReaderSession) -> Result<(), PortError> {
        match self
            .services
            .progress
            .save_progress(session.identity.user_id, &session.progress)
            .await
        {
            Ok(()) => {
                session.unsaved = false;
                Ok(())
            }
            Err(e) => {
                error!(user_id = %session.identity.user_id, "Failed to save progress: {}", e);
                session.unsaved = true;
                Err(e)
            }
        }
    }

    /// Save for economic transactions: failures are surfaced.
    async fn persist_or_report(&self, session: &mut ReaderSession) -> ControllerResult<()> {
        self.persist(session).await.map_err(ControllerError::Persistence)
    }

    /// Save for everything else: failures are logged and flagged only.
    async fn persist_in_background(&self, session: &mut ReaderSession) {
        if self.persist(session).await.is_err() {
            warn!(user_id = %session.identity.user_id, "Continuing with unsaved progress.");
        }
    }

    /// Retries saving the current in-memory record.
    pub async fn retry_save(&self, session: &mut ReaderSession) -> ControllerResult<()> {
        self.persist_or_report(session).await
    }

    // --- Accounts and Sessions ---

    /// Creates and stores the starting record for a freshly signed-up identity.
    pub async fn create_account(
        &self,
        identity: Identity,
        username: &str,
        avatar_url: Option<&str>,
        is_admin: bool,
    ) -> ControllerResult<ReaderSession> {
        let record = ProgressRecord::new_account(username, avatar_url, is_admin);
        let mut session = ReaderSession::new(identity, record);
        self.persist_or_report(&mut session).await?;
        info!(user_id = %session.identity.user_id, "Created new account progress.");
        Ok(session)
    }

    /// Loads the identity's record, creating a default one if none exists yet.
    pub async fn open_session(&self, identity: Identity) -> ControllerResult<ReaderSession> {
        match self.services.progress.load_progress(identity.user_id).await? {
            Some(record) => Ok(ReaderSession::new(identity, record)),
            None => {
                warn!(user_id = %identity.user_id, "No progress found, creating a default record.");
                let username = identity
                    .email
                    .split('@')
                    .next()
                    .unwrap_or_default()
                    .to_string();
                self.create_account(identity, &username, None, false).await
            }
        }
    }

    // --- Navigation ---

    /// Moves to another view. Going home discards the reading session;
    /// leaving the creator discards an unclaimed preview.
    pub fn navigate(&self, session: &mut ReaderSession, to: View) -> ControllerResult<()> {
        if to == View::Admin && !session.progress.is_admin {
            return Err(ControllerError::NotAdmin);
        }
        if matches!(to, View::Reading | View::Question | View::Results) && session.view != to {
            return Err(ControllerError::WrongView(session.view));
        }
        if session.view == View::Creator && to != View::Creator {
            session.preview = None;
        }
        if to == View::Generator {
            session.discard_ephemeral();
        }
        session.view = to;
        Ok(())
    }

    pub fn return_home(&self, session: &mut ReaderSession) {
        session.discard_ephemeral();
        session.preview = None;
        session.view = View::Generator;
    }

    // --- Reading Flow ---

    /// Asks the generator for a story and moves to the reading view. A failure
    /// leaves the user on the generator view.
    pub async fn generate_story(
        &self,
        session: &mut ReaderSession,
        level: ReadingLevel,
        length: StoryLength,
        topic: &str,
    ) -> ControllerResult<Story> {
        if session.view != View::Generator {
            return Err(ControllerError::WrongView(session.view));
        }
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(ControllerError::EmptyTopic);
        }

        let generated = self
            .services
            .content
            .generate_story(level, length, topic)
            .await
            .map_err(|e| {
                error!(user_id = %session.identity.user_id, "Failed to generate story: {}", e);
                ControllerError::Content(e)
            })?;

        let story = Story {
            title: generated.title,
            content: generated.body,
            reading_level: level,
            length,
        };
        session.discard_ephemeral();
        session.reading = Some(ActiveReading {
            story: story.clone(),
            started_at: self.now(),
            raw_seconds: 0,
            counted_seconds: 0,
            question: None,
        });
        session.view = View::Reading;
        Ok(story)
    }

    /// Records the measured reading time and fetches the comprehension check,
    /// falling back to a canned question if generation fails.
    pub async fn finish_reading(
        &self,
        session: &mut ReaderSession,
        elapsed_seconds: i64,
    ) -> ControllerResult<ComprehensionQuestion> {
        if session.view != View::Reading {
            return Err(ControllerError::WrongView(session.view));
        }
        let raw = u64::try_from(elapsed_seconds)
            .map_err(|_| RewardError::NegativeDuration(elapsed_seconds))?;

        let reading = session
            .reading
            .as_mut()
            .ok_or(ControllerError::WrongView(View::Reading))?;
        let max = reading.story.length.settings().max_time_seconds;
        reading.raw_seconds = raw;
        reading.counted_seconds = raw.min(max);

        let wall_clock = (self.now() - reading.started_at).num_seconds();
        if wall_clock >= 0 && raw > wall_clock as u64 + 5 {
            warn!(
                user_id = %session.identity.user_id,
                "Reported reading time {}s exceeds the {}s since the story was shown.",
                raw,
                wall_clock
            );
        }

        let question = match self
            .services
            .content
            .generate_comprehension_check(&reading.story)
            .await
        {
            Ok(q) if q.is_well_formed() => q,
            Ok(_) => {
                warn!("Generated comprehension question was malformed, using fallback.");
                fallback::fallback_question(&reading.story)
            }
            Err(e) => {
                warn!("Failed to generate comprehension question, using fallback: {}", e);
                fallback::fallback_question(&reading.story)
            }
        };

        reading.question = Some(question.clone());
        session.view = View::Question;
        Ok(question)
    }

    /// Scores the answer, applies the reward and daily tracking, and moves to
    /// the results view.
    pub async fn answer_question(
        &self,
        session: &mut ReaderSession,
        option_index: usize,
    ) -> ControllerResult<ReadingOutcome> {
        if session.view != View::Question {
            return Err(ControllerError::WrongView(session.view));
        }
        let reading = session
            .reading
            .as_ref()
            .ok_or(ControllerError::WrongView(View::Question))?;
        let question = reading
            .question
            .as_ref()
            .ok_or(ControllerError::WrongView(View::Question))?;
        if option_index >= question.options.len() {
            return Err(ControllerError::InvalidOption(option_index));
        }

        let passed = option_index == question.correct_option_index;
        let counted = i64::try_from(reading.counted_seconds).unwrap_or(i64::MAX);
        let reward = rewards::calculate_reward(reading.story.reading_level, counted, passed)?;

        let validation_note = if reading.raw_seconds > reading.counted_seconds {
            Some(format!(
                "Reading time was capped at {} seconds for a {} story.",
                reading.counted_seconds,
                reading.story.length.settings().label
            ))
        } else if !passed {
            Some("The answer was incorrect, so only half of the reading time counted.".to_string())
        } else {
            None
        };

        let raw_seconds = reading.raw_seconds;
        let counted_seconds = reading.counted_seconds;
        let explanation = question.explanation.clone();

        let today = self.today();
        session.progress.points += reward.points;
        daily::record_reading(&mut session.progress, today, reward.credited_seconds, passed);

        let outcome = ReadingOutcome {
            raw_seconds,
            counted_seconds,
            question_correct: passed,
            explanation,
            reward,
            validation_note,
            points_balance: session.progress.points,
        };
        info!(
            user_id = %session.identity.user_id,
            points = reward.points,
            credited_seconds = reward.credited_seconds,
            passed,
            "Story completed."
        );

        session.outcome = Some(outcome.clone());
        session.view = View::Results;
        self.persist_in_background(session).await;
        Ok(outcome)
    }

    // --- Stats ---

    pub fn reading_summary(&self, session: &ReaderSession) -> ReadingSummary {
        daily::reading_summary(&session.progress, self.today())
    }

    pub async fn set_daily_goal(&self, session: &mut ReaderSession, minutes: u32) -> ControllerResult<()> {
        daily::set_goal_minutes(&mut session.progress.daily_stats, minutes)?;
        self.persist_in_background(session).await;
        Ok(())
    }

    // --- Shop and Locker ---

    /// Built-in skins followed by active admin skins.
    async fn shop_catalogue(&self) -> ControllerResult<Vec<Skin>> {
        let mut skins = settings::builtin_skins();
        skins.extend(
            self.services
                .catalog
                .list_active_admin_skins()
                .await?
                .iter()
                .map(AdminSkin::to_skin),
        );
        Ok(skins)
    }

    /// Skins on offer to this user. Admins also see skins they own.
    pub async fn shop(&self, session: &ReaderSession) -> ControllerResult<Vec<Skin>> {
        let skins = self.shop_catalogue().await?;
        Ok(skins
            .into_iter()
            .filter(|s| session.progress.is_admin || !session.progress.owns(&s.id))
            .collect())
    }

    pub async fn buy_skin(&self, session: &mut ReaderSession, skin_id: &str) -> ControllerResult<Skin> {
        let skin = self
            .shop_catalogue()
            .await?
            .into_iter()
            .find(|s| s.id == skin_id)
            .ok_or_else(|| ControllerError::UnknownSkin(skin_id.to_string()))?;

        if session.progress.owns(&skin.id) {
            return Err(ControllerError::AlreadyOwned(skin.id));
        }
        if session.progress.points < skin.cost {
            return Err(ControllerError::InsufficientPoints {
                needed: skin.cost,
                available: session.progress.points,
            });
        }

        session.progress.points -= skin.cost;
        session.progress.owned_item_ids.insert(skin.id.clone());
        info!(user_id = %session.identity.user_id, skin = %skin.id, "Skin purchased.");

        self.persist_or_report(session).await?;
        Ok(skin)
    }

    /// All owned skins with their definitions, in id order.
    pub async fn locker(&self, session: &ReaderSession) -> ControllerResult<Vec<Skin>> {
        let mut known = settings::builtin_skins();
        known.extend(
            self.services
                .catalog
                .list_admin_skins()
                .await?
                .iter()
                .map(AdminSkin::to_skin),
        );

        Ok(session
            .progress
            .owned_item_ids
            .iter()
            .filter_map(|id| {
                session
                    .progress
                    .personal_skin(id)
                    .cloned()
                    .or_else(|| known.iter().find(|s| &s.id == id).cloned())
            })
            .collect())
    }

    /// The equipped skin, or the first owned one if the equipped id cannot be
    /// resolved.
    pub async fn equipped_skin(&self, session: &ReaderSession) -> ControllerResult<Option<Skin>> {
        let owned = self.locker(session).await?;
        let equipped = owned
            .iter()
            .find(|s| s.id == session.progress.equipped_item_id)
            .cloned();
        Ok(equipped.or_else(|| owned.into_iter().next()))
    }

    pub async fn equip_skin(&self, session: &mut ReaderSession, skin_id: &str) -> ControllerResult<()> {
        if !session.progress.owns(skin_id) {
            return Err(ControllerError::NotOwned(skin_id.to_string()));
        }
        session.progress.equipped_item_id = skin_id.to_string();
        self.persist_in_background(session).await;
        Ok(())
    }

    // --- Skin Creator ---

    pub fn check_generation(&self, session: &ReaderSession) -> Eligibility {
        eligibility::check_generation(&session.progress, self.today(), &self.rules)
    }

    /// Generates a preview image for a new skin. Debits the reading-time quota
    /// once an image (or its placeholder) is produced; points are only
    /// charged on claim.
    pub async fn generate_skin_preview(
        &self,
        session: &mut ReaderSession,
        name: &str,
        description: &str,
    ) -> ControllerResult<PreviewOutcome> {
        let (name, description) = (name.trim(), description.trim());
        if name.is_empty() || description.is_empty() {
            return Err(ControllerError::EmptySkinRequest);
        }

        let eligibility = self.check_generation(session);
        if !eligibility.allowed {
            info!(
                user_id = %session.identity.user_id,
                reason = eligibility.reason.as_deref().unwrap_or_default(),
                "Skin generation denied."
            );
            return Ok(PreviewOutcome::Denied(eligibility));
        }
        let cost = self.rules.skin_generation_cost;
        if session.progress.points < cost {
            return Err(ControllerError::InsufficientPoints {
                needed: cost,
                available: session.progress.points,
            });
        }

        session.view = View::Creator;
        session.preview = None;

        let prompt = skin_prompt(name, description);
        let image_url = match self.services.content.generate_cosmetic_image(&prompt).await {
            Ok(GeneratedImage::Hosted(url)) => url,
            Ok(GeneratedImage::Png(bytes)) => self.store_generated_image(name, bytes).await,
            Err(e) => {
                warn!("Failed to generate skin image, using placeholder: {}", e);
                fallback::placeholder_image(&prompt)
            }
        };

        let now = self.now();
        eligibility::claim_generation(&mut session.progress, now, &self.rules);
        let preview = SkinPreview {
            name: name.to_string(),
            prompt: description.to_string(),
            image_url,
        };
        session.preview = Some(preview.clone());

        self.persist_or_report(session).await?;
        Ok(PreviewOutcome::Ready(preview))
    }

    /// Uploads generated PNG bytes, keeping them inline if the upload fails.
    async fn store_generated_image(&self, name: &str, bytes: Bytes) -> String {
        let path = format!(
            "generated-skins/{}-{}.png",
            self.now().timestamp_millis(),
            slug(name)
        );
        match self.services.blobs.upload(bytes.clone(), &path, "image/png").await {
            Ok(url) => url,
            Err(e) => {
                warn!("Failed to upload generated image, keeping it inline: {}", e);
                format!("data:image/png;base64,{}", STANDARD.encode(&bytes))
            }
        }
    }

    /// Pays for the current preview and adds it to the locker.
    pub async fn claim_skin(&self, session: &mut ReaderSession) -> ControllerResult<Skin> {
        let cost = self.rules.skin_generation_cost;
        let preview = session.preview.clone().ok_or(ControllerError::NoPreview)?;
        if session.progress.points < cost {
            return Err(ControllerError::InsufficientPoints {
                needed: cost,
                available: session.progress.points,
            });
        }

        let skin = Skin {
            id: format!("skin_custom_{}", self.now().timestamp_millis()),
            name: preview.name,
            prompt: preview.prompt,
            rarity: Rarity::Custom,
            cost: 0,
            image_url: preview.image_url,
        };
        session.progress.points -= cost;
        session.progress.add_personal_skin(skin.clone());
        session.preview = None;
        session.view = View::Locker;
        info!(user_id = %session.identity.user_id, skin = %skin.id, "Generated skin claimed.");

        self.persist_or_report(session).await?;
        Ok(skin)
    }

    // --- Admin ---

    pub fn require_admin(session: &ReaderSession) -> ControllerResult<()> {
        if session.progress.is_admin {
            Ok(())
        } else {
            Err(ControllerError::NotAdmin)
        }
    }

    pub async fn list_admin_skins(&self, session: &ReaderSession) -> ControllerResult<Vec<AdminSkin>> {
        Self::require_admin(session)?;
        Ok(self.services.catalog.list_admin_skins().await?)
    }

    /// Creates a new admin skin, or updates the one with the draft's id.
    pub async fn save_admin_skin(
        &self,
        session: &ReaderSession,
        draft: AdminSkinDraft,
    ) -> ControllerResult<AdminSkin> {
        Self::require_admin(session)?;
        if draft.name.trim().is_empty() {
            return Err(ControllerError::EmptySkinRequest);
        }

        let now = self.now();
        let existing = match &draft.id {
            Some(id) => self
                .services
                .catalog
                .list_admin_skins()
                .await?
                .into_iter()
                .find(|s| &s.id == id),
            None => None,
        };
        let skin = AdminSkin {
            id: draft
                .id
                .unwrap_or_else(|| format!("admin_skin_{}", now.timestamp_millis())),
            name: draft.name.trim().to_string(),
            description: draft.description.filter(|d| !d.trim().is_empty()),
            rarity: draft.rarity,
            cost: draft.cost,
            image_url: draft.image_url,
            is_active: draft.is_active,
            created_at: existing.map_or(now, |s| s.created_at),
        };

        self.services.catalog.save_admin_skin(&skin).await?;
        info!(skin = %skin.id, "Admin skin saved.");
        Ok(skin)
    }

    pub async fn toggle_admin_skin(&self, session: &ReaderSession, skin_id: &str) -> ControllerResult<AdminSkin> {
        Self::require_admin(session)?;
        let mut skin = self
            .services
            .catalog
            .list_admin_skins()
            .await?
            .into_iter()
            .find(|s| s.id == skin_id)
            .ok_or_else(|| ControllerError::UnknownSkin(skin_id.to_string()))?;
        skin.is_active = !skin.is_active;
        self.services.catalog.save_admin_skin(&skin).await?;
        Ok(skin)
    }

    pub async fn delete_admin_skin(&self, session: &ReaderSession, skin_id: &str) -> ControllerResult<()> {
        Self::require_admin(session)?;
        self.services.catalog.delete_admin_skin(skin_id).await?;
        info!(skin = %skin_id, "Admin skin deleted.");
        Ok(())
    }

    /// Stores an uploaded image for an admin skin and returns its reference.
    /// The stored extension comes from the content type, never from the
    /// client's file name.
    pub async fn upload_admin_image(
        &self,
        session: &ReaderSession,
        file_name: &str,
        content_type: &str,
        bytes: Bytes,
    ) -> ControllerResult<String> {
        Self::require_admin(session)?;
        let (mime, extension) = image_extension(content_type)
            .ok_or_else(|| ControllerError::UnsupportedImage(content_type.to_string()))?;
        let stem = file_name.rsplit_once('.').map_or(file_name, |(stem, _)| stem);
        let path = format!(
            "admin-skins/{}-{}.{}",
            self.now().timestamp_millis(),
            slug(stem),
            extension
        );
        Ok(self.services.blobs.upload(bytes, &path, mime).await?)
    }

    // --- Admin: Users ---

    fn summarize(&self, user_id: Uuid, record: &ProgressRecord) -> UserSummary {
        let used_today = if record.generation_state.daily_window_start.date_naive() == self.today() {
            record.generation_state.generations_used_today
        } else {
            0
        };
        UserSummary {
            user_id,
            username: record.username.clone(),
            points: record.points,
            total_validated_seconds: record.total_validated_seconds,
            generations_used_today: used_today,
            goal_minutes: record.daily_stats.goal_minutes,
            is_admin: record.is_admin,
        }
    }

    /// Every stored account, as last saved.
    pub async fn list_users(&self, session: &ReaderSession) -> ControllerResult<Vec<UserSummary>> {
        Self::require_admin(session)?;
        let stored = self.services.progress.list_progress().await?;
        Ok(stored
            .iter()
            .map(|StoredProgress { user_id, record }| self.summarize(*user_id, record))
            .collect())
    }

    fn apply_update(&self, record: &mut ProgressRecord, update: &ProgressUpdate) -> ControllerResult<()> {
        if let Some(minutes) = update.goal_minutes {
            daily::set_goal_minutes(&mut record.daily_stats, minutes)?;
        }
        if let Some(points) = update.points {
            record.points = points;
        }
        if let Some(seconds) = update.total_validated_seconds {
            record.total_validated_seconds = seconds;
        }
        if let Some(used) = update.generations_used_today {
            let now = self.now();
            let state = &mut record.generation_state;
            if state.daily_window_start.date_naive() != now.date_naive() {
                state.seconds_spent_on_generations = 0;
                state.daily_window_start = now;
            }
            state.generations_used_today = used;
        }
        Ok(())
    }

    /// Applies an administrative correction to a user who has a live session.
    /// The caller has already checked that the acting user is an admin.
    pub async fn apply_progress_update(
        &self,
        target: &mut ReaderSession,
        update: &ProgressUpdate,
    ) -> ControllerResult<UserSummary> {
        self.apply_update(&mut target.progress, update)?;
        info!(user_id = %target.identity.user_id, ?update, "Progress overridden by an admin.");
        self.persist_or_report(target).await?;
        Ok(self.summarize(target.identity.user_id, &target.progress))
    }

    /// Applies an administrative correction directly to the stored record of
    /// a user without a live session.
    pub async fn update_stored_progress(
        &self,
        user_id: Uuid,
        update: &ProgressUpdate,
    ) -> ControllerResult<UserSummary> {
        let mut record = self
            .services
            .progress
            .load_progress(user_id)
            .await?
            .ok_or_else(|| PortError::NotFound(format!("No progress for user {}", user_id)))?;
        self.apply_update(&mut record, update)?;
        info!(user_id = %user_id, ?update, "Stored progress overridden by an admin.");
        self.services
            .progress
            .save_progress(user_id, &record)
            .await
            .map_err(ControllerError::Persistence)?;
        Ok(self.summarize(user_id, &record))
    }
}

/// Maps an accepted image content type to its canonical form and the file
/// extension it is stored with.
fn image_extension(content_type: &str) -> Option<(&'static str, &'static str)> {
    let mime = content_type.split(';').next().unwrap_or_default().trim();
    match mime.to_ascii_lowercase().as_str() {
        "image/png" => Some(("image/png", "png")),
        "image/jpeg" | "image/jpg" => Some(("image/jpeg", "jpg")),
        "image/webp" => Some(("image/webp", "webp")),
        "image/gif" => Some(("image/gif", "gif")),
        _ => None,
    }
}

/// Wraps the user's description into the styled prompt sent to the image
/// generator.
pub fn skin_prompt(name: &str, description: &str) -> String {
    format!(
        "Fortnite style character skin named '{}'. Description: {}. Style: Cartoon 3D render, cel-shaded, vibrant saturated colors, clean stylized details, heroic pose, full body character, white background, Unreal Engine aesthetic, battle royale game art style.",
        name, description
    )
}

/// Path-safe version of a name: ASCII alphanumerics kept, everything else
/// replaced by `_`, at most 20 characters.
fn slug(name: &str) -> String {
    name.chars()
        .take(20)
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slug() {
        assert_eq!(slug("Lava Knight!"), "Lava_Knight_");
        assert_eq!(slug("avatar.html"), "avatar_html");
        assert_eq!(slug("a very long skin name indeed").len(), 20);
    }

    #[test]
    fn test_image_extension_allow_list() {
        assert_eq!(image_extension("image/png"), Some(("image/png", "png")));
        assert_eq!(image_extension("IMAGE/JPEG; q=1"), Some(("image/jpeg", "jpg")));
        assert_eq!(image_extension("image/svg+xml"), None);
        assert_eq!(image_extension("text/html"), None);
    }

    #[test]
    fn test_retryable_errors() {
        assert!(ControllerError::Persistence(PortError::Unexpected("db".into())).is_retryable());
        assert!(!ControllerError::NoPreview.is_retryable());
    }
}
