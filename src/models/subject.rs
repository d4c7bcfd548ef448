//! Subjects (categories) that receive credit for completed focus sessions.

use serde::{Deserialize, Serialize};

/// Display palette, assigned by insertion index unless a color is picked explicitly.
pub const SUBJECT_COLORS: [&str; 8] = [
    "#000000", // Black
    "#374151", // Gray 700
    "#1e3a5f", // Navy
    "#14532d", // Green 900
    "#7c2d12", // Orange 900
    "#581c87", // Purple 900
    "#831843", // Pink 900
    "#164e63", // Cyan 900
];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub id: String,
    pub name: String,
    pub color: String,
    #[serde(default = "default_icon")]
    pub icon: String,
    pub created_at: i64,
    /// Completed work sessions credited to this subject.
    #[serde(default)]
    pub total_sessions: u64,
    /// Focused seconds credited to this subject.
    #[serde(default)]
    pub total_focus_time: u64,
}

pub(crate) fn default_icon() -> String {
    "book".into()
}

impl Subject {
    pub fn palette_color(index: usize) -> &'static str {
        SUBJECT_COLORS[index % SUBJECT_COLORS.len()]
    }
}

/// Fields a caller may change on an existing subject.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectUpdate {
    pub name: Option<String>,
    pub color: Option<String>,
}
