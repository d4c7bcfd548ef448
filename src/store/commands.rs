use std::path::{Path, PathBuf};

use chrono::Local;
use serde::Serialize;

use crate::{
    models::{DailyStat, Session, Stats, Subject, SubjectUpdate, Task},
    settings::{AppSettings, TimerConfig},
    stats,
    store::StorageWarning,
    AppState,
};

#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Overview {
    pub stats: Stats,
    pub today: Vec<Session>,
    pub week: Vec<DailyStat>,
    pub active_subject: Option<Subject>,
    pub current_subject: String,
}

#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SubjectSummary {
    pub subject: Subject,
    pub sessions: usize,
    pub open_tasks: usize,
}

pub async fn get_overview(state: &AppState) -> Result<Overview, String> {
    let store = state.store();
    let store = store.lock().await;
    let now = Local::now();

    Ok(Overview {
        stats: store.stats().clone(),
        today: stats::today_sessions(store.sessions(), &now)
            .into_iter()
            .cloned()
            .collect(),
        week: stats::weekly_stats(store.sessions(), &now),
        active_subject: store.active_subject().cloned(),
        current_subject: store.current_subject().to_string(),
    })
}

pub async fn list_sessions(
    state: &AppState,
    subject: Option<String>,
) -> Result<Vec<Session>, String> {
    let store = state.store();
    let store = store.lock().await;

    match subject {
        Some(name) => {
            let subject_id = resolve_subject_id(&store, &name)?;
            Ok(store
                .sessions_by_subject(&subject_id)
                .into_iter()
                .cloned()
                .collect())
        }
        None => Ok(store.sessions().to_vec()),
    }
}

pub async fn list_tasks(state: &AppState, subject: Option<String>) -> Result<Vec<Task>, String> {
    let store = state.store();
    let store = store.lock().await;

    match subject {
        Some(name) => {
            let subject_id = resolve_subject_id(&store, &name)?;
            Ok(store
                .tasks_by_subject(&subject_id)
                .into_iter()
                .cloned()
                .collect())
        }
        None => Ok(store.tasks().to_vec()),
    }
}

pub async fn add_task(
    state: &AppState,
    text: String,
    subject: Option<String>,
) -> Result<Task, String> {
    let store = state.store();
    let mut store = store.lock().await;
    let subject_id = subject
        .map(|name| resolve_subject_id(&store, &name))
        .transpose()?;
    store.add_task(&text, subject_id).map_err(|e| e.to_string())
}

pub async fn toggle_task(state: &AppState, task_id: String) -> Result<bool, String> {
    let store = state.store();
    let mut store = store.lock().await;
    store.toggle_task(&task_id).map_err(|e| e.to_string())
}

pub async fn delete_task(state: &AppState, task_id: String) -> Result<(), String> {
    let store = state.store();
    let mut store = store.lock().await;
    store.delete_task(&task_id).map_err(|e| e.to_string())
}

pub async fn list_subjects(state: &AppState) -> Result<Vec<SubjectSummary>, String> {
    let store = state.store();
    let store = store.lock().await;

    Ok(store
        .subjects()
        .iter()
        .map(|subject| SubjectSummary {
            sessions: store.sessions_by_subject(&subject.id).len(),
            open_tasks: store
                .tasks_by_subject(&subject.id)
                .iter()
                .filter(|t| !t.completed)
                .count(),
            subject: subject.clone(),
        })
        .collect())
}

pub async fn add_subject(
    state: &AppState,
    name: String,
    color: Option<String>,
) -> Result<Subject, String> {
    let store = state.store();
    let mut store = store.lock().await;
    store.add_subject(&name, color).map_err(|e| e.to_string())
}

pub async fn update_subject(
    state: &AppState,
    subject: String,
    update: SubjectUpdate,
) -> Result<Subject, String> {
    let store = state.store();
    let mut store = store.lock().await;
    let subject_id = resolve_subject_id(&store, &subject)?;
    store
        .update_subject(&subject_id, update)
        .map_err(|e| e.to_string())
}

pub async fn delete_subject(state: &AppState, subject: String) -> Result<(), String> {
    let store = state.store();
    let mut store = store.lock().await;
    let subject_id = resolve_subject_id(&store, &subject)?;
    store.delete_subject(&subject_id).map_err(|e| e.to_string())
}

/// `None` returns to general focus.
pub async fn set_active_subject(
    state: &AppState,
    subject: Option<String>,
) -> Result<Option<Subject>, String> {
    let store = state.store();
    let mut store = store.lock().await;
    let subject_id = subject
        .map(|name| resolve_subject_id(&store, &name))
        .transpose()?;
    store
        .set_active_subject(subject_id.as_deref())
        .map_err(|e| e.to_string())?;
    Ok(store.active_subject().cloned())
}

pub async fn set_current_subject(state: &AppState, label: String) -> Result<(), String> {
    let store = state.store();
    let mut store = store.lock().await;
    store.set_current_subject(&label);
    Ok(())
}

pub async fn get_settings(state: &AppState) -> Result<AppSettings, String> {
    let store = state.store();
    let store = store.lock().await;
    Ok(store.settings().clone())
}

pub async fn save_settings(state: &AppState, settings: AppSettings) -> Result<AppSettings, String> {
    let store = state.store();
    let mut store = store.lock().await;
    store.save_settings(settings);
    Ok(store.settings().clone())
}

pub async fn get_timer_config(state: &AppState) -> Result<TimerConfig, String> {
    let store = state.store();
    let store = store.lock().await;
    Ok(*store.timer_config())
}

/// Applies from the next mode switch or reset; a countdown in progress keeps its baseline.
pub async fn save_timer_config(
    state: &AppState,
    config: TimerConfig,
) -> Result<TimerConfig, String> {
    let store = state.store();
    let mut store = store.lock().await;
    store.save_timer_config(config).map_err(|e| e.to_string())?;
    Ok(*store.timer_config())
}

pub async fn export_data(state: &AppState, dir: PathBuf) -> Result<PathBuf, String> {
    let store = state.store();
    let store = store.lock().await;
    store.export_to_dir(&dir).map_err(|e| format!("{e:#}"))
}

pub async fn import_data(state: &AppState, path: &Path) -> Result<(), String> {
    let store = state.store();
    let mut store = store.lock().await;
    store.import_from_file(path).map_err(|e| format!("{e:#}"))
}

pub async fn take_storage_warnings(state: &AppState) -> Result<Vec<StorageWarning>, String> {
    let store = state.store();
    let mut store = store.lock().await;
    Ok(store.take_warnings())
}

/// Accepts either a subject id or a case-insensitive name.
fn resolve_subject_id(store: &crate::store::FocusStore, subject: &str) -> Result<String, String> {
    if store.subjects().iter().any(|s| s.id == subject) {
        return Ok(subject.to_string());
    }
    store
        .find_subject_by_name(subject)
        .map(|s| s.id.clone())
        .ok_or_else(|| format!("Subject not found: {subject}"))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{config::AppConfig, store::MemoryBackend};

    fn app() -> AppState {
        let (state, _events) =
            AppState::with_backend(AppConfig::default(), Arc::new(MemoryBackend::new()));
        state
    }

    #[tokio::test]
    async fn tasks_can_target_subjects_by_name() {
        let state = app();
        let physics = add_subject(&state, "Physics".into(), None).await.unwrap();
        let task = add_task(&state, "problem set".into(), Some("physics".into()))
            .await
            .unwrap();
        assert_eq!(task.subject_id.as_deref(), Some(physics.id.as_str()));

        assert!(toggle_task(&state, task.id.clone()).await.unwrap());
        let summaries = list_subjects(&state).await.unwrap();
        assert_eq!(summaries[0].open_tasks, 0);

        let err = add_task(&state, "x".into(), Some("chemistry".into()))
            .await
            .unwrap_err();
        assert_eq!(err, "Subject not found: chemistry");
    }

    #[tokio::test]
    async fn active_subject_round_trip() {
        let state = app();
        add_subject(&state, "History".into(), Some("#112233".into()))
            .await
            .unwrap();

        let active = set_active_subject(&state, Some("History".into()))
            .await
            .unwrap();
        assert_eq!(active.map(|s| s.color), Some("#112233".to_string()));

        let overview = get_overview(&state).await.unwrap();
        assert_eq!(overview.active_subject.unwrap().name, "History");
        assert_eq!(overview.week.len(), 7);

        assert!(set_active_subject(&state, None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn invalid_timer_config_is_reported() {
        let state = app();
        let err = save_timer_config(
            &state,
            TimerConfig {
                work: 30,
                ..TimerConfig::default()
            },
        )
        .await
        .unwrap_err();
        assert!(err.contains("at least 60 seconds"));
        assert_eq!(get_timer_config(&state).await.unwrap(), TimerConfig::default());
    }
}
