use anyhow::Result;

use crate::{
    settings::{AppSettings, TimerConfig},
    store::{Collection, FocusStore},
};

impl FocusStore {
    pub fn save_settings(&mut self, settings: AppSettings) {
        self.data.settings = settings.normalized();
        self.persist(Collection::Settings);
    }

    /// Rejects durations under one minute; the stored config is left untouched then.
    pub fn save_timer_config(&mut self, config: TimerConfig) -> Result<()> {
        config.validate()?;
        self.data.timer_config = config;
        self.persist(Collection::TimerConfig);
        Ok(())
    }

    /// Free-text label describing what the user is working on.
    pub fn set_current_subject(&mut self, label: &str) {
        self.data.current_subject = label.to_string();
        self.persist(Collection::CurrentSubject);
    }
}
