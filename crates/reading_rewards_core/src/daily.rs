//! crates/reading_rewards_core/src/daily.rs
//!
//! The daily-window tracker: accumulates validated reading time per calendar
//! day, maintains the retained session history and derives streaks.

use chrono::{Days, NaiveDate};
use serde::Serialize;

use crate::domain::{DailyStats, DaySession, ProgressRecord};
use crate::settings::HISTORY_RETENTION_DAYS;

/// Applies one completed reading event to the record.
///
/// Resets today's counter when the stored reference date is not `today`,
/// adds the credited seconds to today's and the lifetime totals, upserts
/// today's [`DaySession`] and drops history older than the retention window.
pub fn record_reading(record: &mut ProgressRecord, today: NaiveDate, credited_seconds: u64, passed: bool) {
    let stats = &mut record.daily_stats;

    if stats.last_active_date != today {
        stats.validated_seconds_today = 0;
    }
    stats.validated_seconds_today += credited_seconds;
    record.total_validated_seconds += credited_seconds;

    let correct = u32::from(passed);
    match stats.session_history.iter_mut().find(|s| s.date == today) {
        Some(session) => {
            session.seconds_read += credited_seconds;
            session.stories_completed += 1;
            session.questions_correct += correct;
            session.questions_total += 1;
        }
        None => {
            let position = stats.session_history.partition_point(|s| s.date < today);
            stats.session_history.insert(
                position,
                DaySession {
                    date: today,
                    seconds_read: credited_seconds,
                    stories_completed: 1,
                    questions_correct: correct,
                    questions_total: 1,
                },
            );
        }
    }

    retain_recent(&mut stats.session_history, today);
    stats.last_active_date = today;
}

/// Keeps the sessions dated within the last [`HISTORY_RETENTION_DAYS`] days
/// (today included), at most that many entries.
fn retain_recent(history: &mut Vec<DaySession>, today: NaiveDate) {
    let oldest_kept = today
        .checked_sub_days(Days::new(HISTORY_RETENTION_DAYS as u64 - 1))
        .unwrap_or(NaiveDate::MIN);
    history.retain(|s| s.date >= oldest_kept);

    let cap = HISTORY_RETENTION_DAYS as usize;
    if history.len() > cap {
        history.drain(..history.len() - cap);
    }
}

/// Counts consecutive days, walking back from `today`, whose session meets
/// the daily goal. Zero if today itself has not met the goal.
pub fn current_streak(stats: &DailyStats, today: NaiveDate) -> u32 {
    let goal_seconds = u64::from(stats.goal_minutes) * 60;
    let mut streak = 0;
    let mut day = today;

    loop {
        let met = stats
            .session_history
            .iter()
            .any(|s| s.date == day && s.seconds_read >= goal_seconds);
        if !met {
            break;
        }
        streak += 1;
        match day.pred_opt() {
            Some(previous) => day = previous,
            None => break,
        }
    }

    streak
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Daily goal must be at least one minute")]
pub struct InvalidGoal;

pub fn set_goal_minutes(stats: &mut DailyStats, minutes: u32) -> Result<(), InvalidGoal> {
    if minutes == 0 {
        return Err(InvalidGoal);
    }
    stats.goal_minutes = minutes;
    Ok(())
}

//=========================================================================================
// Read-only Summary
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayBar {
    pub date: NaiveDate,
    pub minutes: u64,
    pub is_today: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingSummary {
    pub today_seconds: u64,
    pub goal_minutes: u32,
    pub goal_met: bool,
    pub progress_percent: f64,
    pub streak: u32,
    pub total_validated_seconds: u64,
    /// The last seven days, oldest first.
    pub week: Vec<DayBar>,
}

pub fn reading_summary(record: &ProgressRecord, today: NaiveDate) -> ReadingSummary {
    let stats = &record.daily_stats;
    let today_seconds = if stats.last_active_date == today {
        stats.validated_seconds_today
    } else {
        0
    };
    let today_minutes = today_seconds / 60;
    let goal = u64::from(stats.goal_minutes.max(1));

    let week = (0..7u64)
        .rev()
        .filter_map(|back| today.checked_sub_days(Days::new(back)))
        .map(|date| DayBar {
            date,
            minutes: stats
                .session_history
                .iter()
                .find(|s| s.date == date)
                .map_or(0, |s| s.seconds_read / 60),
            is_today: date == today,
        })
        .collect();

    ReadingSummary {
        today_seconds,
        goal_minutes: stats.goal_minutes,
        goal_met: today_minutes >= goal,
        progress_percent: (today_minutes as f64 / goal as f64 * 100.0).min(100.0),
        streak: current_streak(stats, today),
        total_validated_seconds: record.total_validated_seconds,
        week,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn record() -> ProgressRecord {
        ProgressRecord::new_account("tester", None, false)
    }

    fn session(day: NaiveDate, seconds: u64) -> DaySession {
        DaySession {
            date: day,
            seconds_read: seconds,
            stories_completed: 1,
            questions_correct: 1,
            questions_total: 1,
        }
    }

    #[test]
    fn test_first_event_creates_session() {
        let mut rec = record();
        let today = date("2024-03-10");
        record_reading(&mut rec, today, 120, true);

        assert_eq!(rec.total_validated_seconds, 120);
        assert_eq!(rec.daily_stats.validated_seconds_today, 120);
        assert_eq!(rec.daily_stats.last_active_date, today);
        assert_eq!(rec.daily_stats.session_history, vec![session(today, 120)]);
    }

    #[test]
    fn test_same_day_events_accumulate_in_one_session() {
        let mut rec = record();
        let today = date("2024-03-10");
        record_reading(&mut rec, today, 120, true);
        record_reading(&mut rec, today, 30, false);

        let stats = &rec.daily_stats;
        assert_eq!(stats.validated_seconds_today, 150);
        assert_eq!(stats.session_history.len(), 1);
        let s = &stats.session_history[0];
        assert_eq!(s.seconds_read, 150);
        assert_eq!(s.stories_completed, 2);
        assert_eq!(s.questions_correct, 1);
        assert_eq!(s.questions_total, 2);
    }

    #[test]
    fn test_new_day_resets_today_but_not_total() {
        let mut rec = record();
        record_reading(&mut rec, date("2024-03-10"), 300, true);
        record_reading(&mut rec, date("2024-03-11"), 60, true);

        assert_eq!(rec.daily_stats.validated_seconds_today, 60);
        assert_eq!(rec.total_validated_seconds, 360);
        assert_eq!(rec.daily_stats.session_history.len(), 2);
    }

    #[test]
    fn test_rollover_is_not_applied_twice() {
        let mut rec = record();
        let today = date("2024-03-11");
        record_reading(&mut rec, date("2024-03-10"), 300, true);
        record_reading(&mut rec, today, 90, true);
        record_reading(&mut rec, today, 0, true);

        assert_eq!(rec.daily_stats.validated_seconds_today, 90);
    }

    #[test]
    fn test_history_retention_after_forty_days() {
        let mut rec = record();
        let start = date("2024-01-01");
        for offset in 0..40 {
            record_reading(&mut rec, start + Days::new(offset), 60, true);
        }
        let last = start + Days::new(39);

        let history = &rec.daily_stats.session_history;
        assert!(history.len() <= 30);
        assert!(history.iter().all(|s| (last - s.date).num_days() < 30));
        assert!(history.windows(2).all(|w| w[0].date < w[1].date));
        assert_eq!(history.last().map(|s| s.date), Some(last));
    }

    #[test]
    fn test_streak_five_consecutive_days() {
        let today = date("2024-05-05");
        let mut stats = DailyStats::default();
        for back in 0..5 {
            stats.session_history.push(session(today - Days::new(back), 900));
        }
        stats.session_history.sort_by_key(|s| s.date);

        assert_eq!(current_streak(&stats, today), 5);
    }

    #[test]
    fn test_streak_stops_at_shortfall() {
        let today = date("2024-05-05");
        let mut stats = DailyStats::default();
        for back in 0..5 {
            let seconds = if back == 2 { 899 } else { 900 };
            stats.session_history.push(session(today - Days::new(back), seconds));
        }

        assert_eq!(current_streak(&stats, today), 2);
    }

    #[test]
    fn test_streak_zero_when_today_short() {
        let today = date("2024-05-05");
        let mut stats = DailyStats::default();
        stats.session_history.push(session(today - Days::new(1), 3600));
        stats.session_history.push(session(today, 10));

        assert_eq!(current_streak(&stats, today), 0);
    }

    #[test]
    fn test_goal_must_be_positive() {
        let mut stats = DailyStats::default();
        assert_eq!(set_goal_minutes(&mut stats, 0), Err(InvalidGoal));
        assert_eq!(stats.goal_minutes, 15);
        set_goal_minutes(&mut stats, 20).unwrap();
        assert_eq!(stats.goal_minutes, 20);
    }

    #[test]
    fn test_summary_ignores_stale_today_counter() {
        let mut rec = record();
        record_reading(&mut rec, date("2024-05-04"), 1200, true);

        let summary = reading_summary(&rec, date("2024-05-05"));
        assert_eq!(summary.today_seconds, 0);
        assert!(!summary.goal_met);
        assert_eq!(summary.week.len(), 7);
        assert_eq!(summary.week[5].minutes, 20);
        assert!(summary.week[6].is_today);
    }

    #[test]
    fn test_summary_caps_progress() {
        let mut rec = record();
        let today = date("2024-05-05");
        record_reading(&mut rec, today, 3600, true);

        let summary = reading_summary(&rec, today);
        assert!(summary.goal_met);
        assert_eq!(summary.progress_percent, 100.0);
        assert_eq!(summary.streak, 1);
    }
}
