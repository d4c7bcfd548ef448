use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{
    identity::User,
    models::{now_ms, Session, Stats, Subject, Task},
    settings::{AppSettings, TimerConfig},
};

/// Combined per-account record: everything the account owns, written in full on
/// every change.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SyncRecord {
    pub user: User,
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub sessions: Vec<Session>,
    #[serde(default)]
    pub subjects: Vec<Subject>,
    #[serde(default)]
    pub stats: Stats,
    #[serde(default)]
    pub settings: AppSettings,
    #[serde(default)]
    pub timer_config: TimerConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_subject_id: Option<String>,
    #[serde(default)]
    pub current_subject: String,
    #[serde(default)]
    pub last_updated: i64,
}

impl SyncRecord {
    pub fn empty(user: User) -> Self {
        Self {
            user,
            tasks: Vec::new(),
            sessions: Vec::new(),
            subjects: Vec::new(),
            stats: Stats::default(),
            settings: AppSettings::default(),
            timer_config: TimerConfig::default(),
            active_subject_id: None,
            current_subject: String::new(),
            last_updated: now_ms(),
        }
    }
}

/// Downloadable backup of the in-memory state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExportSnapshot {
    pub user: User,
    pub tasks: Vec<Task>,
    pub sessions: Vec<Session>,
    pub subjects: Vec<Subject>,
    pub stats: Stats,
    pub settings: AppSettings,
    pub timer_config: TimerConfig,
    /// RFC 3339 timestamp.
    pub exported_at: String,
}

/// Partial snapshot accepted by import. Absent collections are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ImportSnapshot {
    #[serde(default)]
    pub tasks: Option<Vec<Task>>,
    #[serde(default)]
    pub sessions: Option<Vec<Session>>,
    #[serde(default)]
    pub subjects: Option<Vec<Subject>>,
    #[serde(default)]
    pub stats: Option<Stats>,
    #[serde(default)]
    pub settings: Option<AppSettings>,
    #[serde(default)]
    pub timer_config: Option<TimerConfig>,
}

pub fn export_file_name(date: NaiveDate) -> String {
    format!("focusflow-backup-{}.json", date.format("%Y-%m-%d"))
}
