//! crates/reading_rewards_core/src/domain.rs
//!
//! Defines the core data structures for the application: the persisted
//! per-user progress record and the content types that flow through a
//! reading session.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

use crate::settings::{self, LevelSettings, LengthSettings};

/// Identifier of a skin, e.g. `skin_cosmic_knight`.
pub type SkinId = String;

/// Id of the starter skin every account owns from sign-up.
pub const STARTER_SKIN_ID: &str = "skin_default";

//=========================================================================================
// Identity
//=========================================================================================

/// A signed-in user as reported by the identity service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: Uuid,
    pub email: String,
}

//=========================================================================================
// Reading Content
//=========================================================================================

/// The six ordered reading-level tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ReadingLevel {
    #[serde(rename = "1st Grade")]
    Grade1,
    #[serde(rename = "2nd Grade")]
    Grade2,
    #[serde(rename = "3rd Grade")]
    Grade3,
    #[serde(rename = "4th Grade")]
    Grade4,
    #[serde(rename = "5th Grade")]
    Grade5,
    #[serde(rename = "6th Grade")]
    Grade6,
}

impl ReadingLevel {
    pub const ALL: [ReadingLevel; 6] = [
        ReadingLevel::Grade1,
        ReadingLevel::Grade2,
        ReadingLevel::Grade3,
        ReadingLevel::Grade4,
        ReadingLevel::Grade5,
        ReadingLevel::Grade6,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ReadingLevel::Grade1 => "1st Grade",
            ReadingLevel::Grade2 => "2nd Grade",
            ReadingLevel::Grade3 => "3rd Grade",
            ReadingLevel::Grade4 => "4th Grade",
            ReadingLevel::Grade5 => "5th Grade",
            ReadingLevel::Grade6 => "6th Grade",
        }
    }

    /// Fixed reward rates and prompt hints for this tier.
    pub fn settings(self) -> &'static LevelSettings {
        settings::level_settings(self)
    }
}

/// How long a generated story should be. Also caps the reading time a
/// single story can be credited with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum StoryLength {
    Short,
    #[default]
    Medium,
    Long,
}

impl StoryLength {
    pub fn settings(self) -> &'static LengthSettings {
        settings::length_settings(self)
    }
}

/// A generated story, as held in the ephemeral session state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Story {
    pub title: String,
    pub content: String,
    pub reading_level: ReadingLevel,
    pub length: StoryLength,
}

/// A four-option multiple choice question about a story.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComprehensionQuestion {
    pub question: String,
    pub options: Vec<String>,
    pub correct_option_index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

impl ComprehensionQuestion {
    pub const OPTION_COUNT: usize = 4;

    /// Generated questions must carry a question, exactly four options and
    /// an in-range answer index.
    pub fn is_well_formed(&self) -> bool {
        !self.question.trim().is_empty()
            && self.options.len() == Self::OPTION_COUNT
            && self.options.iter().all(|o| !o.trim().is_empty())
            && self.correct_option_index < Self::OPTION_COUNT
    }
}

//=========================================================================================
// Skins
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Rarity {
    Common,
    Rare,
    Epic,
    Legendary,
    Custom,
}

/// A cosmetic item that can be bought, generated and equipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Skin {
    pub id: SkinId,
    pub name: String,
    pub prompt: String,
    pub rarity: Rarity,
    pub cost: u64,
    pub image_url: String,
}

/// A shop skin managed by an administrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminSkin {
    pub id: SkinId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub rarity: Rarity,
    pub cost: u64,
    pub image_url: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl AdminSkin {
    pub fn to_skin(&self) -> Skin {
        Skin {
            id: self.id.clone(),
            name: self.name.clone(),
            prompt: self
                .description
                .clone()
                .unwrap_or_else(|| format!("{} - Custom admin skin", self.name)),
            rarity: self.rarity,
            cost: self.cost,
            image_url: self.image_url.clone(),
        }
    }
}

/// A generated skin image waiting to be claimed into the locker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkinPreview {
    pub name: String,
    pub prompt: String,
    pub image_url: String,
}

//=========================================================================================
// Progress Record
//=========================================================================================

/// Reading totals for a single calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DaySession {
    pub date: NaiveDate,
    pub seconds_read: u64,
    pub stories_completed: u32,
    pub questions_correct: u32,
    pub questions_total: u32,
}

/// Per-day reading statistics and the retained session history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyStats {
    pub goal_minutes: u32,
    pub validated_seconds_today: u64,
    pub last_active_date: NaiveDate,
    /// Ordered by date, at most one entry per date.
    pub session_history: Vec<DaySession>,
}

impl DailyStats {
    pub const DEFAULT_GOAL_MINUTES: u32 = 15;
}

impl Default for DailyStats {
    /// A 15 minute goal and no history. The reference date is the epoch so
    /// the first reading event always starts a fresh day.
    fn default() -> Self {
        Self {
            goal_minutes: Self::DEFAULT_GOAL_MINUTES,
            validated_seconds_today: 0,
            last_active_date: DateTime::<Utc>::UNIX_EPOCH.date_naive(),
            session_history: Vec::new(),
        }
    }
}

/// Skin-generation quota bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationState {
    #[serde(default)]
    pub last_generation_at: Option<DateTime<Utc>>,
    pub generations_used_today: u32,
    pub daily_window_start: DateTime<Utc>,
    pub seconds_spent_on_generations: u64,
}

impl Default for GenerationState {
    /// Nothing used, with a window that starts at the epoch and is therefore
    /// already rolled over on any real date.
    fn default() -> Self {
        Self {
            last_generation_at: None,
            generations_used_today: 0,
            daily_window_start: DateTime::<Utc>::UNIX_EPOCH,
            seconds_spent_on_generations: 0,
        }
    }
}

/// The persistent state of one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRecord {
    pub username: String,
    pub points: u64,
    pub total_validated_seconds: u64,
    pub owned_item_ids: BTreeSet<SkinId>,
    /// Definitions of owned skins that only exist on this record (the
    /// starter avatar and generated skins).
    #[serde(default)]
    pub personal_skins: Vec<Skin>,
    pub equipped_item_id: SkinId,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub generation_state: GenerationState,
    #[serde(default)]
    pub daily_stats: DailyStats,
}

impl ProgressRecord {
    /// Builds the record a new account starts with: the starter skin owned and
    /// equipped, the initial point grant, and empty stats.
    pub fn new_account(username: &str, avatar_url: Option<&str>, is_admin: bool) -> Self {
        let starter = Skin {
            id: STARTER_SKIN_ID.to_string(),
            name: "Reader Rookie".to_string(),
            prompt: "The default reader avatar.".to_string(),
            rarity: Rarity::Common,
            cost: 0,
            image_url: avatar_url
                .map(str::to_string)
                .unwrap_or_else(|| settings::DEFAULT_AVATARS[0].image_url.to_string()),
        };

        Self {
            username: username.to_string(),
            points: if is_admin {
                settings::ADMIN_STARTING_POINTS
            } else {
                settings::STARTING_POINTS
            },
            total_validated_seconds: 0,
            owned_item_ids: BTreeSet::from([starter.id.clone()]),
            equipped_item_id: starter.id.clone(),
            personal_skins: vec![starter],
            is_admin,
            generation_state: GenerationState::default(),
            daily_stats: DailyStats::default(),
        }
    }

    pub fn owns(&self, skin_id: &str) -> bool {
        self.owned_item_ids.contains(skin_id)
    }

    /// Adds a skin that only lives on this record and marks it owned.
    pub fn add_personal_skin(&mut self, skin: Skin) {
        self.owned_item_ids.insert(skin.id.clone());
        if !self.personal_skins.iter().any(|s| s.id == skin.id) {
            self.personal_skins.push(skin);
        }
    }

    pub fn personal_skin(&self, skin_id: &str) -> Option<&Skin> {
        self.personal_skins.iter().find(|s| s.id == skin_id)
    }
}
