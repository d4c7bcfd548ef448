mod session;
mod stats;
mod subject;
mod task;

pub use session::{Session, GENERAL_SUBJECT_ID, GENERAL_SUBJECT_NAME, MAX_SESSIONS};
pub use stats::{DailyStat, Stats};
pub use subject::{Subject, SubjectUpdate, SUBJECT_COLORS};
pub(crate) use subject::default_icon;
pub use task::Task;

/// Milliseconds since the Unix epoch, the timestamp format of every stored record.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
