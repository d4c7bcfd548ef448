use std::{env, path::PathBuf, time::Duration};

use anyhow::{anyhow, Result};

const DATA_DIR_ENV: &str = "FOCUSFLOW_DATA_DIR";
const DEBUG_ENV: &str = "FOCUSFLOW_DEBUG";
const DB_FILE_NAME: &str = "focusflow.sqlite3";

/// Runtime configuration. User preferences live in the store, not here.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub debug: bool,
    /// Countdown resolution; one second outside of tests.
    pub tick_interval: Duration,
    /// Pause between a completion and an auto-chained start.
    pub auto_chain_delay: Duration,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let data_dir = match env::var_os(DATA_DIR_ENV) {
            Some(dir) => PathBuf::from(dir),
            None => dirs::data_dir()
                .map(|dir| dir.join("focusflow"))
                .ok_or_else(|| anyhow!("no platform data directory; set {DATA_DIR_ENV}"))?,
        };

        let debug = env::var(DEBUG_ENV)
            .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        Ok(Self {
            data_dir,
            debug,
            ..Self::default()
        })
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(DB_FILE_NAME)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("."),
            debug: false,
            tick_interval: Duration::from_secs(1),
            auto_chain_delay: Duration::from_secs(1),
        }
    }
}
