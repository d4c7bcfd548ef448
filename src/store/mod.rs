//! Persistent store: the canonical copy of every persisted collection.
//!
//! Every mutation lands in memory first and is then written through to the backend.
//! In anonymous scope each collection lives under its own key; in account scope the
//! whole data set is written as one combined record on every change. Write failures
//! never reach the caller; they are logged and queued as [`StorageWarning`]s.

mod backend;
pub mod commands;
pub mod keys;
mod repositories;
mod snapshot;

use std::{
    fmt, fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context, Result};
use chrono::{Local, Utc};
use serde::{de::DeserializeOwned, Serialize};

pub use backend::{MemoryBackend, StorageBackend};
pub use repositories::sessions::CompletionRecord;
pub use snapshot::{export_file_name, ExportSnapshot, ImportSnapshot, SyncRecord};

use crate::{
    identity::{self, Scope, User},
    log_info, log_warn,
    models::{now_ms, Session, Stats, Subject, Task},
    settings::{AppSettings, TimerConfig},
    stats,
};

const ENABLE_LOGS: bool = true;

/// Persisted collections, one storage key each in anonymous scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Tasks,
    Sessions,
    Subjects,
    Stats,
    CurrentSubject,
    ActiveSubjectId,
    Settings,
    TimerConfig,
}

impl Collection {
    pub fn key(&self) -> &'static str {
        match self {
            Collection::Tasks => keys::TASKS,
            Collection::Sessions => keys::SESSIONS,
            Collection::Subjects => keys::SUBJECTS,
            Collection::Stats => keys::STATS,
            Collection::CurrentSubject => keys::CURRENT_SUBJECT,
            Collection::ActiveSubjectId => keys::ACTIVE_SUBJECT_ID,
            Collection::Settings => keys::SETTINGS,
            Collection::TimerConfig => keys::TIMER_CONFIG,
        }
    }
}

/// In-memory working set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppData {
    pub tasks: Vec<Task>,
    /// Newest first.
    pub sessions: Vec<Session>,
    pub subjects: Vec<Subject>,
    pub stats: Stats,
    pub current_subject: String,
    pub active_subject_id: Option<String>,
    pub settings: AppSettings,
    pub timer_config: TimerConfig,
}

impl AppData {
    fn from_record(record: SyncRecord) -> Self {
        Self {
            tasks: record.tasks,
            sessions: record.sessions,
            subjects: record.subjects,
            stats: record.stats,
            current_subject: record.current_subject,
            active_subject_id: record.active_subject_id,
            settings: record.settings.normalized(),
            timer_config: record.timer_config.clamped(),
        }
    }
}

/// A write that did not reach durable storage. The in-memory state still holds it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageWarning {
    pub key: String,
    pub message: String,
}

impl fmt::Display for StorageWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to persist {}: {}", self.key, self.message)
    }
}

pub struct FocusStore {
    backend: Arc<dyn StorageBackend>,
    scope: Scope,
    data: AppData,
    loaded: bool,
    warnings: Vec<StorageWarning>,
}

impl FocusStore {
    pub fn new(backend: Arc<dyn StorageBackend>, scope: Scope) -> Self {
        Self {
            backend,
            scope,
            data: AppData::default(),
            loaded: false,
            warnings: Vec::new(),
        }
    }

    /// Builds a store and loads it for the given scope.
    pub fn open(backend: Arc<dyn StorageBackend>, scope: Scope) -> Self {
        let mut store = Self::new(backend, scope);
        store.load();
        store
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Replaces the working set with the data of another scope.
    pub fn switch_scope(&mut self, scope: Scope) {
        self.scope = scope;
        self.loaded = false;
        self.load();
    }

    pub fn load(&mut self) {
        self.data = match self.scope.clone() {
            Scope::Account(user) => self.load_account(&user),
            Scope::Anonymous => self.load_anonymous(),
        };
        self.refresh_streak();
        self.loaded = true;
        log_info!(
            "Loaded {} sessions, {} tasks, {} subjects",
            self.data.sessions.len(),
            self.data.tasks.len(),
            self.data.subjects.len()
        );
    }

    /// Account scope never falls back to anonymous keys: a missing record starts empty.
    fn load_account(&self, user: &User) -> AppData {
        let key = keys::sync_key(&user.id);
        match self.read_json::<SyncRecord>(&key) {
            Some(record) => AppData::from_record(record),
            None => {
                log_info!("No stored record for {}, starting fresh", user.username);
                AppData::default()
            }
        }
    }

    fn load_anonymous(&self) -> AppData {
        let defaults = AppData::default();
        AppData {
            tasks: self.read_json(keys::TASKS).unwrap_or(defaults.tasks),
            sessions: self.read_json(keys::SESSIONS).unwrap_or(defaults.sessions),
            subjects: self.read_json(keys::SUBJECTS).unwrap_or(defaults.subjects),
            stats: self.read_json(keys::STATS).unwrap_or(defaults.stats),
            current_subject: self
                .read_raw(keys::CURRENT_SUBJECT)
                .unwrap_or(defaults.current_subject),
            active_subject_id: self.read_raw(keys::ACTIVE_SUBJECT_ID),
            settings: self
                .read_json::<AppSettings>(keys::SETTINGS)
                .map(AppSettings::normalized)
                .unwrap_or(defaults.settings),
            timer_config: self
                .read_json::<TimerConfig>(keys::TIMER_CONFIG)
                .map(TimerConfig::clamped)
                .unwrap_or(defaults.timer_config),
        }
    }

    fn read_raw(&self, key: &str) -> Option<String> {
        match self.backend.get(key) {
            Ok(value) => value.filter(|v| !v.is_empty()),
            Err(err) => {
                log_warn!("Failed to read {key}: {err:#}");
                None
            }
        }
    }

    /// Corrupted values are treated as absent and removed.
    fn read_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.read_raw(key)?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(err) => {
                log_warn!("Discarding corrupted value under {key}: {err}");
                if let Err(err) = self.backend.remove(key) {
                    log_warn!("Failed to clear {key}: {err:#}");
                }
                None
            }
        }
    }

    pub(crate) fn refresh_streak(&mut self) {
        self.data.stats.current_streak = stats::current_streak(&self.data.sessions, &Local::now());
    }

    /// Writes one collection through the active scope.
    pub(crate) fn persist(&mut self, collection: Collection) {
        let result = if self.scope.mirrors_to_account() {
            self.write_account_record()
        } else {
            self.write_collection(collection)
        };

        if let Err(err) = result {
            let key = self
                .scope
                .sync_key()
                .unwrap_or_else(|| collection.key().to_string());
            log_warn!("Failed to persist {key}: {err:#}");
            self.warnings.push(StorageWarning {
                key,
                message: format!("{err:#}"),
            });
        }
    }

    fn write_collection(&self, collection: Collection) -> Result<()> {
        let key = collection.key();
        match collection {
            Collection::Tasks => self.write_json(key, &self.data.tasks),
            Collection::Sessions => self.write_json(key, &self.data.sessions),
            Collection::Subjects => self.write_json(key, &self.data.subjects),
            Collection::Stats => self.write_json(key, &self.data.stats),
            Collection::Settings => self.write_json(key, &self.data.settings),
            Collection::TimerConfig => self.write_json(key, &self.data.timer_config),
            Collection::CurrentSubject => self.backend.set(key, &self.data.current_subject),
            Collection::ActiveSubjectId => match &self.data.active_subject_id {
                Some(id) => self.backend.set(key, id),
                None => self.backend.remove(key),
            },
        }
    }

    fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let serialized =
            serde_json::to_string(value).with_context(|| format!("failed to serialize {key}"))?;
        self.backend.set(key, &serialized)
    }

    fn write_account_record(&self) -> Result<()> {
        // Nothing is written before the record has been read, or an unloaded empty
        // working set would overwrite it.
        let Some(user) = self.scope.user().filter(|_| self.loaded) else {
            return Ok(());
        };

        let now = now_ms();
        let record = self.sync_record(user.clone(), now);
        self.write_json(&keys::sync_key(&user.id), &record)?;
        identity::stamp_last_sync(self.backend.as_ref(), now)
    }

    fn sync_record(&self, user: User, last_updated: i64) -> SyncRecord {
        SyncRecord {
            user,
            tasks: self.data.tasks.clone(),
            sessions: self.data.sessions.clone(),
            subjects: self.data.subjects.clone(),
            stats: self.data.stats.clone(),
            settings: self.data.settings.clone(),
            timer_config: self.data.timer_config,
            active_subject_id: self.data.active_subject_id.clone(),
            current_subject: self.data.current_subject.clone(),
            last_updated,
        }
    }

    pub fn data(&self) -> &AppData {
        &self.data
    }

    pub fn tasks(&self) -> &[Task] {
        &self.data.tasks
    }

    pub fn sessions(&self) -> &[Session] {
        &self.data.sessions
    }

    pub fn subjects(&self) -> &[Subject] {
        &self.data.subjects
    }

    pub fn stats(&self) -> &Stats {
        &self.data.stats
    }

    pub fn settings(&self) -> &AppSettings {
        &self.data.settings
    }

    pub fn timer_config(&self) -> &TimerConfig {
        &self.data.timer_config
    }

    pub fn current_subject(&self) -> &str {
        &self.data.current_subject
    }

    pub fn warnings(&self) -> &[StorageWarning] {
        &self.warnings
    }

    pub fn take_warnings(&mut self) -> Vec<StorageWarning> {
        std::mem::take(&mut self.warnings)
    }

    /// Snapshot of the current in-memory state; storage is never consulted.
    pub fn export(&self) -> ExportSnapshot {
        ExportSnapshot {
            user: self
                .scope
                .user()
                .cloned()
                .unwrap_or_else(User::local_placeholder),
            tasks: self.data.tasks.clone(),
            sessions: self.data.sessions.clone(),
            subjects: self.data.subjects.clone(),
            stats: self.data.stats.clone(),
            settings: self.data.settings.clone(),
            timer_config: self.data.timer_config,
            exported_at: Utc::now().to_rfc3339(),
        }
    }

    pub fn export_to_dir(&self, dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create export directory {}", dir.display()))?;
        let path = dir.join(export_file_name(Local::now().date_naive()));
        let serialized = serde_json::to_string_pretty(&self.export())?;
        fs::write(&path, serialized)
            .with_context(|| format!("failed to write export to {}", path.display()))?;
        log_info!("Exported data to {}", path.display());
        Ok(path)
    }

    /// Replaces each collection present in the snapshot wholesale; absent ones stay.
    pub fn import(&mut self, snapshot: ImportSnapshot) {
        let recount = snapshot.sessions.is_some() || snapshot.stats.is_some();
        if let Some(tasks) = snapshot.tasks {
            self.data.tasks = tasks;
            self.persist(Collection::Tasks);
        }
        if let Some(sessions) = snapshot.sessions {
            self.data.sessions = sessions;
            self.data.sessions.truncate(crate::models::MAX_SESSIONS);
            self.persist(Collection::Sessions);
        }
        if let Some(subjects) = snapshot.subjects {
            self.data.subjects = subjects;
            self.persist(Collection::Subjects);
        }
        if let Some(stats) = snapshot.stats {
            self.data.stats = stats;
        }
        if recount {
            // The streak is derived from sessions, never taken from the file.
            self.refresh_streak();
            self.persist(Collection::Stats);
        }
        if let Some(settings) = snapshot.settings {
            self.data.settings = settings.normalized();
            self.persist(Collection::Settings);
        }
        if let Some(config) = snapshot.timer_config {
            self.data.timer_config = config.clamped();
            self.persist(Collection::TimerConfig);
        }
    }

    pub fn import_from_file(&mut self, path: &Path) -> Result<()> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read import file {}", path.display()))?;
        let snapshot: ImportSnapshot = serde_json::from_str(&contents)
            .with_context(|| format!("{} is not a valid backup", path.display()))?;
        self.import(snapshot);
        log_info!("Imported data from {}", path.display());
        Ok(())
    }
}
