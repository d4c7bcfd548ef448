use anyhow::{anyhow, bail, Result};
use serde::{Deserialize, Serialize};

use crate::timer::TimerMode;

/// Shortest duration any timer mode may be configured to.
pub const MIN_DURATION_SECS: u64 = 60;

const DEFAULT_LONG_BREAK_INTERVAL: u32 = 4;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum Theme {
    Light,
    Dark,
    #[default]
    System,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct AppSettings {
    pub sound_enabled: bool,
    pub notifications_enabled: bool,
    pub auto_start_breaks: bool,
    pub auto_start_pomodoros: bool,
    pub theme: Theme,
    pub rain_sound_enabled: bool,
    pub rain_volume: f32,
    /// Every n-th completed work session chains into a long break. Zero disables long breaks.
    pub long_break_interval: u32,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            sound_enabled: true,
            notifications_enabled: false,
            auto_start_breaks: false,
            auto_start_pomodoros: false,
            theme: Theme::System,
            rain_sound_enabled: false,
            rain_volume: 0.3,
            long_break_interval: DEFAULT_LONG_BREAK_INTERVAL,
        }
    }
}

impl AppSettings {
    pub fn normalized(mut self) -> Self {
        self.rain_volume = if self.rain_volume.is_finite() {
            self.rain_volume.clamp(0.0, 1.0)
        } else {
            AppSettings::default().rain_volume
        };
        self
    }
}

/// Durations in seconds for each timer mode.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct TimerConfig {
    pub work: u64,
    pub short_break: u64,
    pub long_break: u64,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            work: 25 * 60,
            short_break: 5 * 60,
            long_break: 15 * 60,
        }
    }
}

impl TimerConfig {
    pub fn duration_for(&self, mode: TimerMode) -> u64 {
        match mode {
            TimerMode::Work => self.work,
            TimerMode::ShortBreak => self.short_break,
            TimerMode::LongBreak => self.long_break,
        }
    }

    /// Edit-boundary check; the timer itself never validates durations.
    pub fn validate(&self) -> Result<()> {
        for mode in TimerMode::ALL {
            let secs = self.duration_for(mode);
            if secs < MIN_DURATION_SECS {
                bail!(
                    "{} duration must be at least {} seconds (got {})",
                    mode.label(),
                    MIN_DURATION_SECS,
                    secs
                );
            }
        }
        Ok(())
    }

    /// Raises any duration below the minimum, applied to stored and imported configs.
    pub fn clamped(self) -> Self {
        Self {
            work: self.work.max(MIN_DURATION_SECS),
            short_break: self.short_break.max(MIN_DURATION_SECS),
            long_break: self.long_break.max(MIN_DURATION_SECS),
        }
    }

    pub fn from_minutes(work: u64, short_break: u64, long_break: u64) -> Result<Self> {
        Ok(Self {
            work: minutes_to_secs(work)?,
            short_break: minutes_to_secs(short_break)?,
            long_break: minutes_to_secs(long_break)?,
        })
    }
}

pub fn minutes_to_secs(minutes: u64) -> Result<u64> {
    minutes
        .checked_mul(60)
        .ok_or_else(|| anyhow!("{minutes} minutes is too long a duration"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_settings_merge_over_defaults() {
        let parsed: AppSettings =
            serde_json::from_str(r#"{"autoStartBreaks":true,"theme":"dark"}"#).unwrap();
        assert!(parsed.auto_start_breaks);
        assert_eq!(parsed.theme, Theme::Dark);
        assert!(parsed.sound_enabled);
        assert_eq!(parsed.long_break_interval, 4);
    }

    #[test]
    fn partial_timer_config_merges_over_defaults() {
        let parsed: TimerConfig = serde_json::from_str(r#"{"work":3000}"#).unwrap();
        assert_eq!(parsed.work, 3000);
        assert_eq!(parsed.short_break, 300);
        assert_eq!(parsed.long_break, 900);
    }

    #[test]
    fn validate_rejects_sub_minute_durations() {
        let config = TimerConfig {
            short_break: 59,
            ..TimerConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("short break"));
        assert!(TimerConfig::default().validate().is_ok());
    }

    #[test]
    fn clamped_raises_to_minimum() {
        let config = TimerConfig {
            work: 10,
            short_break: 0,
            long_break: 1200,
        }
        .clamped();
        assert_eq!(config, TimerConfig { work: 60, short_break: 60, long_break: 1200 });
    }

    #[test]
    fn oversized_minute_counts_are_rejected() {
        assert_eq!(TimerConfig::from_minutes(25, 5, 15).unwrap(), TimerConfig::default());
        assert!(TimerConfig::from_minutes(u64::MAX, 5, 15).is_err());
        assert!(minutes_to_secs(u64::MAX / 60 + 1).is_err());
        assert_eq!(minutes_to_secs(u64::MAX / 60).unwrap(), u64::MAX / 60 * 60);
    }

    #[test]
    fn rain_volume_is_clamped() {
        let settings = AppSettings {
            rain_volume: 3.5,
            ..AppSettings::default()
        }
        .normalized();
        assert_eq!(settings.rain_volume, 1.0);
    }
}
