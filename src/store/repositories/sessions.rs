//! Session recording: turns a finished timer block into a session and credits the
//! aggregate counters and the active subject.

use chrono::{DateTime, Local};
use uuid::Uuid;

use crate::{
    log_info,
    models::{Session, GENERAL_SUBJECT_ID, GENERAL_SUBJECT_NAME, MAX_SESSIONS},
    stats,
    store::{Collection, FocusStore},
    timer::TimerMode,
};

const ENABLE_LOGS: bool = true;

/// Everything needed to record one completed block.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRecord {
    pub mode: TimerMode,
    /// Configured duration of the mode, credited regardless of elapsed time.
    pub credited_duration: u64,
    pub subject_id: Option<String>,
    pub subject_name: Option<String>,
    /// Tree growth, 0-100, as observed by the caller.
    pub growth: f64,
    pub note: Option<String>,
}

impl CompletionRecord {
    /// Credits whatever subject is active in the store at this moment.
    pub fn for_active_subject(
        store: &FocusStore,
        mode: TimerMode,
        credited_duration: u64,
        growth: f64,
        note: Option<String>,
    ) -> Self {
        let active = store.active_subject();
        Self {
            mode,
            credited_duration,
            subject_id: active.map(|s| s.id.clone()),
            subject_name: active.map(|s| s.name.clone()),
            growth,
            note,
        }
    }
}

impl FocusStore {
    pub fn record_completion(&mut self, record: CompletionRecord) -> Session {
        self.record_completion_at(record, Local::now())
    }

    pub fn record_completion_at(
        &mut self,
        record: CompletionRecord,
        completed_at: DateTime<Local>,
    ) -> Session {
        let is_work = record.mode == TimerMode::Work;
        let growth = if record.growth.is_finite() {
            record.growth.clamp(0.0, 100.0)
        } else {
            0.0
        };

        let session = Session {
            id: Uuid::new_v4().to_string(),
            mode: record.mode,
            duration: record.credited_duration,
            subject_id: record
                .subject_id
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| GENERAL_SUBJECT_ID.to_string()),
            subject_name: record
                .subject_name
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| GENERAL_SUBJECT_NAME.to_string()),
            note: record
                .note
                .map(|note| note.trim().to_string())
                .filter(|note| !note.is_empty()),
            completed_at: completed_at.timestamp_millis(),
            tree_growth: growth,
        };

        self.data.sessions.insert(0, session.clone());
        self.data.sessions.truncate(MAX_SESSIONS);
        self.persist(Collection::Sessions);

        let totals = &mut self.data.stats;
        totals.total_sessions += 1;
        if is_work {
            totals.total_focus_time += session.duration;
            if growth >= 100.0 {
                totals.trees_grown += 1;
            }
        }
        totals.current_streak = stats::current_streak(&self.data.sessions, &completed_at);
        self.persist(Collection::Stats);

        if is_work && !session.is_general() {
            if let Some(subject) = self
                .data
                .subjects
                .iter_mut()
                .find(|s| s.id == session.subject_id)
            {
                subject.total_sessions += 1;
                subject.total_focus_time += session.duration;
                self.persist(Collection::Subjects);
            }
        }

        log_info!(
            "Recorded {} session ({}s) for {}",
            session.mode.as_str(),
            session.duration,
            session.subject_name
        );
        session
    }

    pub fn today_sessions(&self) -> Vec<&Session> {
        stats::today_sessions(&self.data.sessions, &Local::now())
    }

    pub fn weekly_stats(&self) -> Vec<crate::models::DailyStat> {
        stats::weekly_stats(&self.data.sessions, &Local::now())
    }

    pub fn sessions_by_subject(&self, subject_id: &str) -> Vec<&Session> {
        stats::sessions_by_subject(&self.data.sessions, subject_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_support::anonymous_store;
    use chrono::{Duration, TimeZone};

    fn record(mode: TimerMode, duration: u64, growth: f64) -> CompletionRecord {
        CompletionRecord {
            mode,
            credited_duration: duration,
            subject_id: None,
            subject_name: None,
            growth,
            note: None,
        }
    }

    #[test]
    fn work_completion_with_full_tree_updates_counters() {
        let (mut store, _) = anonymous_store();
        let session = store.record_completion(record(TimerMode::Work, 1500, 100.0));

        assert_eq!(session.subject_id, GENERAL_SUBJECT_ID);
        assert_eq!(session.subject_name, GENERAL_SUBJECT_NAME);
        let stats = store.stats();
        assert_eq!(stats.total_sessions, 1);
        assert_eq!(stats.total_focus_time, 1500);
        assert_eq!(stats.trees_grown, 1);
        assert_eq!(stats.current_streak, 1);
    }

    #[test]
    fn partial_growth_counts_focus_but_no_tree() {
        let (mut store, _) = anonymous_store();
        store.record_completion(record(TimerMode::Work, 1500, 99.5));

        assert_eq!(store.stats().total_focus_time, 1500);
        assert_eq!(store.stats().trees_grown, 0);
    }

    #[test]
    fn break_completion_only_counts_the_session() {
        let (mut store, _) = anonymous_store();
        store.record_completion(record(TimerMode::ShortBreak, 300, 100.0));
        store.record_completion(record(TimerMode::LongBreak, 900, 100.0));

        let stats = store.stats();
        assert_eq!(stats.total_sessions, 2);
        assert_eq!(stats.total_focus_time, 0);
        assert_eq!(stats.trees_grown, 0);
        assert_eq!(stats.current_streak, 0);
    }

    #[test]
    fn session_log_is_capped_newest_first() {
        let (mut store, _) = anonymous_store();
        let first = store.record_completion(record(TimerMode::Work, 60, 0.0));
        for _ in 0..99 {
            store.record_completion(record(TimerMode::ShortBreak, 60, 0.0));
        }
        assert_eq!(store.sessions().len(), MAX_SESSIONS);
        assert_eq!(store.sessions().last().map(|s| s.id.clone()), Some(first.id.clone()));

        let newest = store.record_completion(record(TimerMode::Work, 60, 0.0));
        assert_eq!(store.sessions().len(), MAX_SESSIONS);
        assert_eq!(store.sessions()[0].id, newest.id);
        assert!(store.sessions().iter().all(|s| s.id != first.id));
        assert_eq!(store.stats().total_sessions, 101);
    }

    #[test]
    fn active_subject_accumulates_work_only() {
        let (mut store, _) = anonymous_store();
        let subject = store.add_subject("Math", None).unwrap();
        store.set_active_subject(Some(subject.id.as_str())).unwrap();

        let work = CompletionRecord::for_active_subject(&store, TimerMode::Work, 1500, 100.0, None);
        store.record_completion(work);
        let rest =
            CompletionRecord::for_active_subject(&store, TimerMode::ShortBreak, 300, 100.0, None);
        store.record_completion(rest);

        let credited = store.active_subject().unwrap();
        assert_eq!(credited.total_sessions, 1);
        assert_eq!(credited.total_focus_time, 1500);
        assert_eq!(store.sessions_by_subject(&subject.id).len(), 2);
    }

    #[test]
    fn unknown_subject_id_is_recorded_without_crediting() {
        let (mut store, _) = anonymous_store();
        let mut orphan = record(TimerMode::Work, 1500, 100.0);
        orphan.subject_id = Some("deleted".into());
        orphan.subject_name = Some("Old".into());
        orphan.note = Some("  chapter 4 ".into());

        let session = store.record_completion(orphan);
        assert_eq!(session.subject_name, "Old");
        assert_eq!(session.note.as_deref(), Some("chapter 4"));
        assert_eq!(store.stats().total_focus_time, 1500);
    }

    #[test]
    fn streak_follows_recorded_days() {
        let (mut store, _) = anonymous_store();
        let day_one = Local.with_ymd_and_hms(2026, 10, 15, 12, 0, 0).unwrap();
        store.record_completion_at(record(TimerMode::Work, 1500, 100.0), day_one);
        store.record_completion_at(
            record(TimerMode::Work, 1500, 100.0),
            day_one + Duration::days(1),
        );
        assert_eq!(store.stats().current_streak, 2);

        store.record_completion_at(
            record(TimerMode::Work, 1500, 100.0),
            day_one + Duration::days(3),
        );
        assert_eq!(store.stats().current_streak, 1);
    }

    #[test]
    fn growth_is_clamped() {
        let (mut store, _) = anonymous_store();
        let session = store.record_completion(record(TimerMode::Work, 1500, 250.0));
        assert_eq!(session.tree_growth, 100.0);
        assert_eq!(store.stats().trees_grown, 1);
    }
}
