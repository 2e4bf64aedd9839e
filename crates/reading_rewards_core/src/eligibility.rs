//! crates/reading_rewards_core/src/eligibility.rs
//!
//! The generation-eligibility gate. A skin generation is paid for with
//! validated reading time (this module) and, separately, with points
//! (charged by the controller when the preview is claimed).

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::domain::{GenerationState, ProgressRecord};
use crate::settings::RulesConfig;

/// Why a generation check came back negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Denial {
    DailyLimitReached,
    InsufficientReadingTime,
}

/// Result of a read-only generation check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Eligibility {
    pub allowed: bool,
    /// How many generations could be claimed right now.
    pub available: u32,
    pub denial: Option<Denial>,
    /// Human-readable explanation for a denial.
    pub reason: Option<String>,
    /// Validated reading seconds still missing for one generation.
    pub shortfall_seconds: u64,
    pub generations_used_today: u32,
    pub max_generations_per_day: u32,
}

/// The quota counters as they apply on `today`: zeroed if the stored window
/// started on another calendar day.
fn effective_usage(state: &GenerationState, today: NaiveDate) -> (u32, u64) {
    if state.daily_window_start.date_naive() != today {
        (0, 0)
    } else {
        (state.generations_used_today, state.seconds_spent_on_generations)
    }
}

/// Checks whether one generation may be triggered. Does not mutate the
/// record.
pub fn check_generation(record: &ProgressRecord, today: NaiveDate, config: &RulesConfig) -> Eligibility {
    let (used_today, seconds_spent) = effective_usage(&record.generation_state, today);
    let max = config.max_generations_per_day;

    let denied = |denial: Denial, reason: String, shortfall_seconds: u64| Eligibility {
        allowed: false,
        available: 0,
        denial: Some(denial),
        reason: Some(reason),
        shortfall_seconds,
        generations_used_today: used_today,
        max_generations_per_day: max,
    };

    if used_today >= max {
        return denied(
            Denial::DailyLimitReached,
            format!("Daily limit reached ({} generations per day)", max),
            0,
        );
    }

    let required = config.required_seconds_per_generation;
    let available_seconds = record.total_validated_seconds.saturating_sub(seconds_spent);
    if available_seconds < required {
        let shortfall = required - available_seconds;
        return denied(
            Denial::InsufficientReadingTime,
            format!(
                "Insufficient validated reading time: need {} more minutes",
                shortfall.div_ceil(60)
            ),
            shortfall,
        );
    }

    let affordable_by_time = u32::try_from(available_seconds / required.max(1)).unwrap_or(u32::MAX);
    let affordable_by_cap = max - used_today;
    let available = affordable_by_time.min(affordable_by_cap);

    Eligibility {
        allowed: available > 0,
        available,
        denial: None,
        reason: None,
        shortfall_seconds: 0,
        generations_used_today: used_today,
        max_generations_per_day: max,
    }
}

/// Debits one generation's worth of reading time and counts it against
/// today's cap, rolling the daily window over first when needed.
pub fn claim_generation(record: &mut ProgressRecord, now: DateTime<Utc>, config: &RulesConfig) {
    let state = &mut record.generation_state;
    if state.daily_window_start.date_naive() != now.date_naive() {
        state.generations_used_today = 0;
        state.seconds_spent_on_generations = 0;
        state.daily_window_start = now;
    }

    state.seconds_spent_on_generations += config.required_seconds_per_generation;
    state.generations_used_today += 1;
    state.last_generation_at = Some(now);
}
