use serde::{Deserialize, Serialize};

/// Aggregate counters, maintained incrementally as sessions and tasks change.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct Stats {
    pub total_sessions: u64,
    /// Seconds, work sessions only.
    pub total_focus_time: u64,
    pub current_streak: u32,
    pub tasks_completed: u64,
    pub trees_grown: u64,
}

/// One day of the weekly series.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DailyStat {
    /// Short weekday label, e.g. "Mon".
    pub date: String,
    pub sessions: u64,
    /// Minutes.
    pub focus_time: f64,
}
