use serde::{Deserialize, Serialize};

use crate::settings::TimerConfig;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "camelCase")]
pub enum TimerMode {
    #[default]
    Work,
    ShortBreak,
    LongBreak,
}

impl TimerMode {
    pub const ALL: [TimerMode; 3] = [TimerMode::Work, TimerMode::ShortBreak, TimerMode::LongBreak];

    pub fn as_str(&self) -> &'static str {
        match self {
            TimerMode::Work => "work",
            TimerMode::ShortBreak => "shortBreak",
            TimerMode::LongBreak => "longBreak",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TimerMode::Work => "focus",
            TimerMode::ShortBreak => "short break",
            TimerMode::LongBreak => "long break",
        }
    }

    pub fn is_break(&self) -> bool {
        !matches!(self, TimerMode::Work)
    }
}

impl std::str::FromStr for TimerMode {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "work" | "focus" => Ok(TimerMode::Work),
            "shortBreak" | "short-break" | "short" => Ok(TimerMode::ShortBreak),
            "longBreak" | "long-break" | "long" => Ok(TimerMode::LongBreak),
            other => Err(anyhow::anyhow!("unknown timer mode '{other}'")),
        }
    }
}

/// Raised once per exhausted countdown (or skip).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Completion {
    pub mode: TimerMode,
    /// Elapsed share of the countdown, 0-100, at the moment it finished.
    pub growth: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TimerState {
    pub mode: TimerMode,
    pub time_left: u64,
    pub is_running: bool,
    /// Duration the current countdown started from. Captured at mode switch so later
    /// config edits never reflow into a running countdown.
    pub initial_time: u64,
    pub progress: f64,
    #[serde(skip)]
    completion_raised: bool,
}

impl TimerState {
    pub fn new(config: &TimerConfig) -> Self {
        let initial = config.duration_for(TimerMode::Work);
        Self {
            mode: TimerMode::Work,
            time_left: initial,
            is_running: false,
            initial_time: initial,
            progress: 100.0,
            completion_raised: false,
        }
    }

    pub fn switch_mode(&mut self, mode: TimerMode, config: &TimerConfig) {
        let duration = config.duration_for(mode);
        *self = Self {
            mode,
            time_left: duration,
            is_running: false,
            initial_time: duration,
            progress: 100.0,
            completion_raised: false,
        };
    }

    /// Returns whether the timer is now running. A finished countdown cannot start.
    pub fn start(&mut self) -> bool {
        if self.time_left > 0 {
            self.is_running = true;
            self.completion_raised = false;
        }
        self.is_running
    }

    pub fn pause(&mut self) {
        self.is_running = false;
    }

    pub fn reset(&mut self, config: &TimerConfig) {
        let mode = self.mode;
        self.switch_mode(mode, config);
    }

    /// One-second step. Yields the completion exactly once when the countdown hits zero.
    pub fn tick(&mut self) -> Option<Completion> {
        if self.is_running && self.time_left > 0 {
            self.time_left -= 1;
            self.progress = compute_progress(self.time_left, self.initial_time);
        }

        if self.time_left == 0 && !self.completion_raised {
            self.completion_raised = true;
            self.is_running = false;
            return Some(Completion {
                mode: self.mode,
                growth: 100.0,
            });
        }

        None
    }

    /// Finishes the current block immediately. Always yields a completion for the current mode.
    pub fn skip(&mut self) -> Completion {
        let growth = (100.0 - self.progress).clamp(0.0, 100.0);
        self.is_running = false;
        self.time_left = 0;
        self.progress = 0.0;
        self.completion_raised = true;
        Completion {
            mode: self.mode,
            growth,
        }
    }

    /// Shifts both the remaining time and the baseline. Ignored while running.
    pub fn add_time(&mut self, delta_minutes: i64) -> bool {
        if self.is_running {
            return false;
        }
        let delta_secs = delta_minutes.saturating_mul(60);
        self.time_left = offset(self.time_left, delta_secs);
        self.initial_time = offset(self.initial_time, delta_secs);
        self.progress = compute_progress(self.time_left, self.initial_time);
        true
    }

    pub fn is_finished(&self) -> bool {
        self.time_left == 0
    }

    /// Elapsed share of the countdown, the tree-growth figure shown while focusing.
    pub fn growth(&self) -> f64 {
        (100.0 - self.progress).clamp(0.0, 100.0)
    }

    pub fn formatted_time(&self) -> String {
        format_time(self.time_left)
    }
}

pub fn format_time(seconds: u64) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

fn compute_progress(time_left: u64, initial_time: u64) -> f64 {
    if initial_time == 0 {
        return 0.0;
    }
    (time_left as f64 / initial_time as f64 * 100.0).clamp(0.0, 100.0)
}

fn offset(value: u64, delta_secs: i64) -> u64 {
    if delta_secs >= 0 {
        value.saturating_add(delta_secs.unsigned_abs())
    } else {
        value.saturating_sub(delta_secs.unsigned_abs())
    }
}
