//! Read-only views derived from the session log.
//!
//! Nothing here touches the persisted [`Stats`](crate::models::Stats) counters; those
//! are maintained by the store as sessions are recorded.

use std::collections::HashSet;

use chrono::{DateTime, Duration, NaiveDate, TimeZone};

use crate::models::{DailyStat, Session};

const WEEK_DAYS: i64 = 7;

/// Calendar day of an epoch-millisecond timestamp in the given timezone.
pub fn local_date<Tz: TimeZone>(ms: i64, tz: &Tz) -> Option<NaiveDate> {
    tz.timestamp_millis_opt(ms)
        .single()
        .map(|dt| dt.date_naive())
}

pub fn today_sessions<'a, Tz: TimeZone>(
    sessions: &'a [Session],
    now: &DateTime<Tz>,
) -> Vec<&'a Session> {
    let tz = now.timezone();
    let today = now.date_naive();
    sessions
        .iter()
        .filter(|s| local_date(s.completed_at, &tz) == Some(today))
        .collect()
}

/// Trailing seven days, oldest first, today last. Days without work sessions report zero.
pub fn weekly_stats<Tz: TimeZone>(sessions: &[Session], now: &DateTime<Tz>) -> Vec<DailyStat> {
    let tz = now.timezone();
    let today = now.date_naive();

    (0..WEEK_DAYS)
        .rev()
        .map(|offset| {
            let day = today - Duration::days(offset);
            let (count, seconds) = sessions
                .iter()
                .filter(|s| s.is_work() && local_date(s.completed_at, &tz) == Some(day))
                .fold((0u64, 0u64), |(count, secs), s| (count + 1, secs + s.duration));

            DailyStat {
                date: day.format("%a").to_string(),
                sessions: count,
                focus_time: seconds as f64 / 60.0,
            }
        })
        .collect()
}

pub fn sessions_by_subject<'a>(sessions: &'a [Session], subject_id: &str) -> Vec<&'a Session> {
    sessions
        .iter()
        .filter(|s| s.subject_id == subject_id)
        .collect()
}

/// Consecutive calendar days with at least one work session, ending today. A streak
/// that ended yesterday is still alive until today is over.
pub fn current_streak<Tz: TimeZone>(sessions: &[Session], now: &DateTime<Tz>) -> u32 {
    let tz = now.timezone();
    let active_days: HashSet<NaiveDate> = sessions
        .iter()
        .filter(|s| s.is_work())
        .filter_map(|s| local_date(s.completed_at, &tz))
        .collect();

    let today = now.date_naive();
    let mut day = if active_days.contains(&today) {
        today
    } else {
        today - Duration::days(1)
    };

    let mut streak = 0;
    while active_days.contains(&day) {
        streak += 1;
        day = day - Duration::days(1);
    }
    streak
}
