//! Physical storage keys.

pub const TASKS: &str = "focusflow_tasks";
pub const SESSIONS: &str = "focusflow_sessions";
pub const SUBJECTS: &str = "focusflow_subjects";
pub const STATS: &str = "focusflow_stats";
pub const CURRENT_SUBJECT: &str = "focusflow_current_subject";
pub const SETTINGS: &str = "focusflow_settings";
pub const TIMER_CONFIG: &str = "focusflow_timer_config";
pub const ACTIVE_SUBJECT_ID: &str = "focusflow_active_subject_id";

/// Current signed-in identity.
pub const AUTH: &str = "focusflow_auth";
/// Account credentials table.
pub const USERS: &str = "focusflow_users";

pub fn sync_key(user_id: &str) -> String {
    format!("focusflow_sync_{user_id}")
}
