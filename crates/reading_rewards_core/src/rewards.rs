//! crates/reading_rewards_core/src/rewards.rs
//!
//! The reward calculator: converts one finished reading into credited
//! seconds and points.

use serde::Serialize;

use crate::domain::ReadingLevel;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RewardError {
    #[error("Reading duration cannot be negative: {0}s")]
    NegativeDuration(i64),
}

/// The breakdown of points earned for one story.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reward {
    pub credited_seconds: u64,
    pub time_points: u64,
    pub completion_bonus: u64,
    pub accuracy_bonus: u64,
    pub points: u64,
}

/// A failed comprehension check halves the credited time, rounding down.
pub fn credited_seconds(raw_seconds: u64, passed: bool) -> u64 {
    if passed {
        raw_seconds
    } else {
        raw_seconds / 2
    }
}

/// Computes the reward for a finished story.
///
/// Zero seconds still earns the full completion bonus. Negative durations
/// are rejected.
pub fn calculate_reward(
    level: ReadingLevel,
    raw_seconds: i64,
    passed: bool,
) -> Result<Reward, RewardError> {
    let raw = u64::try_from(raw_seconds).map_err(|_| RewardError::NegativeDuration(raw_seconds))?;
    let settings = level.settings();

    let credited = credited_seconds(raw, passed);
    let time_points = (credited as f64 * settings.points_per_second).round() as u64;
    let completion_bonus = settings.completion_bonus;
    let accuracy_bonus = if passed {
        (completion_bonus as f64 * 0.1).round() as u64
    } else {
        0
    };

    Ok(Reward {
        credited_seconds: credited,
        time_points,
        completion_bonus,
        accuracy_bonus,
        points: time_points + completion_bonus + accuracy_bonus,
    })
}
