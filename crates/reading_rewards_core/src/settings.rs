//! crates/reading_rewards_core/src/settings.rs
//!
//! Fixed game tables: reward rates per reading level, story lengths, the
//! built-in shop catalogue and starter avatars, plus the tunable rule limits.

use crate::domain::{Rarity, ReadingLevel, Skin, StoryLength};

pub const STARTING_POINTS: u64 = 500;
pub const ADMIN_STARTING_POINTS: u64 = 50_000;

/// Retained days of session history, today included.
pub const HISTORY_RETENTION_DAYS: i64 = 30;

//=========================================================================================
// Rule Limits
//=========================================================================================

/// Tunable limits of the skin-generation economy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RulesConfig {
    /// Validated reading seconds debited per generation.
    pub required_seconds_per_generation: u64,
    pub max_generations_per_day: u32,
    /// Points charged when a generated skin is claimed.
    pub skin_generation_cost: u64,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            required_seconds_per_generation: 600,
            max_generations_per_day: 10,
            skin_generation_cost: 1500,
        }
    }
}

//=========================================================================================
// Reading Levels
//=========================================================================================

#[derive(Debug)]
pub struct LevelSettings {
    pub word_count: &'static str,
    pub prompt_addition: &'static str,
    pub points_per_second: f64,
    pub completion_bonus: u64,
    pub description: &'static str,
}

static LEVELS: [LevelSettings; 6] = [
    LevelSettings {
        word_count: "100-200",
        prompt_addition: "The story should use simple vocabulary and sentence structure suitable for a 1st grader.",
        points_per_second: 0.7,
        completion_bonus: 40,
        description: "Simple stories with basic vocabulary",
    },
    LevelSettings {
        word_count: "200-350",
        prompt_addition: "The story should be engaging for a 2nd grader with a developing vocabulary.",
        points_per_second: 0.8,
        completion_bonus: 60,
        description: "Engaging stories with developing vocabulary",
    },
    LevelSettings {
        word_count: "350-500",
        prompt_addition: "The story should use descriptive language and a clear plot suitable for a 3rd grader.",
        points_per_second: 0.9,
        completion_bonus: 90,
        description: "Descriptive stories with clear plots",
    },
    LevelSettings {
        word_count: "500-750",
        prompt_addition: "The story should have a more complex plot and vocabulary suitable for a 4th grader.",
        points_per_second: 1.0,
        completion_bonus: 125,
        description: "Complex plots with advanced vocabulary",
    },
    LevelSettings {
        word_count: "750-1000",
        prompt_addition: "The story should feature richer vocabulary, character development, and plot twists for a 5th grader.",
        points_per_second: 1.1,
        completion_bonus: 175,
        description: "Rich vocabulary with character development",
    },
    LevelSettings {
        word_count: "1000-1500",
        prompt_addition: "The story should be complex, with sophisticated themes and language suitable for a 6th grader preparing for middle school.",
        points_per_second: 1.2,
        completion_bonus: 250,
        description: "Sophisticated themes and complex language",
    },
];

pub(crate) fn level_settings(level: ReadingLevel) -> &'static LevelSettings {
    let index = match level {
        ReadingLevel::Grade1 => 0,
        ReadingLevel::Grade2 => 1,
        ReadingLevel::Grade3 => 2,
        ReadingLevel::Grade4 => 3,
        ReadingLevel::Grade5 => 4,
        ReadingLevel::Grade6 => 5,
    };
    &LEVELS[index]
}

//=========================================================================================
// Story Lengths
//=========================================================================================

#[derive(Debug)]
pub struct LengthSettings {
    pub label: &'static str,
    pub description: &'static str,
    pub word_count_multiplier: f64,
    pub prompt_addition: &'static str,
    /// Upper bound on the reading time one story can be credited with.
    pub max_time_seconds: u64,
}

static SHORT: LengthSettings = LengthSettings {
    label: "Short",
    description: "Quick tale (~1-2 minutes)",
    word_count_multiplier: 0.6,
    prompt_addition: "Keep the story brisk with 2-3 short paragraphs and a single, clear conflict.",
    max_time_seconds: 120,
};

static MEDIUM: LengthSettings = LengthSettings {
    label: "Medium",
    description: "Standard adventure (~3-4 minutes)",
    word_count_multiplier: 1.0,
    prompt_addition: "Provide a balanced beginning, middle, and end with vivid details.",
    max_time_seconds: 240,
};

static LONG: LengthSettings = LengthSettings {
    label: "Long",
    description: "Epic quest (~6-8 minutes)",
    word_count_multiplier: 1.4,
    prompt_addition: "Include multiple scenes or challenges and a satisfying resolution.",
    max_time_seconds: 480,
};

pub(crate) fn length_settings(length: StoryLength) -> &'static LengthSettings {
    match length {
        StoryLength::Short => &SHORT,
        StoryLength::Medium => &MEDIUM,
        StoryLength::Long => &LONG,
    }
}

//=========================================================================================
// Avatars and Built-in Skins
//=========================================================================================

#[derive(Debug)]
pub struct AvatarOption {
    pub id: &'static str,
    pub name: &'static str,
    pub image_url: &'static str,
}

pub static DEFAULT_AVATARS: [AvatarOption; 6] = [
    AvatarOption {
        id: "avatar_1",
        name: "Classic Reader",
        image_url: "https://api.dicebear.com/7.x/avataaars/svg?seed=reader1",
    },
    AvatarOption {
        id: "avatar_2",
        name: "Bookworm",
        image_url: "https://api.dicebear.com/7.x/avataaars/svg?seed=reader2",
    },
    AvatarOption {
        id: "avatar_3",
        name: "Story Seeker",
        image_url: "https://api.dicebear.com/7.x/avataaars/svg?seed=reader3",
    },
    AvatarOption {
        id: "avatar_4",
        name: "Adventure Reader",
        image_url: "https://api.dicebear.com/7.x/avataaars/svg?seed=reader4",
    },
    AvatarOption {
        id: "avatar_5",
        name: "Curious Scholar",
        image_url: "https://api.dicebear.com/7.x/avataaars/svg?seed=reader5",
    },
    AvatarOption {
        id: "avatar_6",
        name: "Magic Reader",
        image_url: "https://api.dicebear.com/7.x/avataaars/svg?seed=reader6",
    },
];

const STYLE_SUFFIX: &str = "cartoon 3D render, cel-shaded style, white background, Unreal Engine aesthetic.";

fn builtin(id: &str, name: &str, look: &str, rarity: Rarity, cost: u64, colors: &str) -> Skin {
    let seed = id.trim_start_matches("skin_").replace('_', "-");
    Skin {
        id: id.to_string(),
        name: name.to_string(),
        prompt: format!("Fortnite style character skin, {}, {}", look, STYLE_SUFFIX),
        rarity,
        cost,
        image_url: format!(
            "https://api.dicebear.com/7.x/bottts-neutral/svg?seed={}&{}",
            seed, colors
        ),
    }
}

/// The skins every shop offers regardless of admin configuration.
pub fn builtin_skins() -> Vec<Skin> {
    vec![
        builtin(
            "skin_cosmic_knight",
            "Cosmic Knight",
            "futuristic space knight with vibrant galaxy armor and a glowing purple energy sword",
            Rarity::Epic,
            2000,
            "backgroundColor=1a0c35&primaryColor=8b5cf6",
        ),
        builtin(
            "skin_forest_spirit",
            "Forest Spirit",
            "mystical forest guardian with glowing antlers, leaf and flower clothing and a magical lantern",
            Rarity::Rare,
            750,
            "backgroundColor=16a34a&primaryColor=22c55e",
        ),
        builtin(
            "skin_cyber_runner",
            "Cyber Runner",
            "cyberpunk street runner with neon jacket and holographic visor",
            Rarity::Rare,
            750,
            "backgroundColor=0ea5e9&primaryColor=06b6d4",
        ),
        builtin(
            "skin_time_tinkerer",
            "Time Tinkerer",
            "steampunk inventor with brass goggles, mechanical arm and gear-filled vest",
            Rarity::Common,
            250,
            "backgroundColor=d97706&primaryColor=f59e0b",
        ),
        builtin(
            "skin_sunfire_sorceress",
            "Sunfire Sorceress",
            "fire mage with golden armor, flame cape and a magical staff",
            Rarity::Epic,
            2000,
            "backgroundColor=dc2626&primaryColor=f97316",
        ),
        builtin(
            "skin_abyssal_diver",
            "Abyssal Diver",
            "deep sea explorer in a bioluminescent dive suit",
            Rarity::Legendary,
            5000,
            "backgroundColor=1e40af&primaryColor=3730a3",
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_rates_increase_with_tier() {
        let rates: Vec<f64> = ReadingLevel::ALL
            .iter()
            .map(|l| l.settings().points_per_second)
            .collect();
        assert!(rates.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(ReadingLevel::Grade4.settings().completion_bonus, 125);
    }

    #[test]
    fn test_builtin_skin_ids_are_unique() {
        let skins = builtin_skins();
        let mut ids: Vec<&str> = skins.iter().map(|s| s.id.as_str()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), skins.len());
        assert!(skins[0].image_url.contains("seed=cosmic-knight"));
    }
}
