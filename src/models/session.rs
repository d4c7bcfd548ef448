use serde::{Deserialize, Serialize};

use crate::timer::TimerMode;

/// Sentinel subject credited when no subject is active.
pub const GENERAL_SUBJECT_ID: &str = "general";
pub const GENERAL_SUBJECT_NAME: &str = "General Focus";

/// The session log keeps only the most recent entries.
pub const MAX_SESSIONS: usize = 100;

/// A completed timer block. Never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub mode: TimerMode,
    /// Credited seconds: the configured duration of the mode, not wall time.
    pub duration: u64,
    pub subject_id: String,
    /// Denormalized so history still reads correctly after the subject is deleted.
    pub subject_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub completed_at: i64,
    pub tree_growth: f64,
}

impl Session {
    pub fn is_work(&self) -> bool {
        self.mode == TimerMode::Work
    }

    pub fn is_general(&self) -> bool {
        self.subject_id == GENERAL_SUBJECT_ID
    }
}
