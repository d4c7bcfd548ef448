pub mod commands;
pub mod controller;
pub mod state;

pub use controller::{SessionCompletedEvent, TimerController, TimerEvent, TimerSnapshot};
pub use state::{format_time, Completion, TimerMode, TimerState};
