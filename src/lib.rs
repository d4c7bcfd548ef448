pub mod cli;
pub mod config;
pub mod db;
pub mod identity;
pub mod models;
pub mod settings;
pub mod stats;
pub mod store;
pub mod timer;
mod utils;

use std::{fs, sync::Arc};

use anyhow::Context;
use tokio::sync::{mpsc, Mutex};

use config::AppConfig;
use db::Database;
use identity::IdentityService;
use store::{FocusStore, StorageBackend};
use timer::{TimerController, TimerEvent};

const ENABLE_LOGS: bool = true;

pub struct AppState {
    pub(crate) config: AppConfig,
    pub(crate) identity: Mutex<IdentityService>,
    pub(crate) timer: TimerController,
}

impl AppState {
    /// Opens the on-disk database under the configured data directory.
    pub fn open(config: AppConfig) -> anyhow::Result<(Self, mpsc::UnboundedReceiver<TimerEvent>)> {
        fs::create_dir_all(&config.data_dir).with_context(|| {
            format!("failed to create data directory {}", config.data_dir.display())
        })?;

        let database = Database::new(config.db_path())?;
        log_info!("Using database at {}", database.path().display());
        Ok(Self::with_backend(config, Arc::new(database)))
    }

    /// Restores the signed-in identity, then loads that identity's data.
    pub fn with_backend(
        config: AppConfig,
        backend: Arc<dyn StorageBackend>,
    ) -> (Self, mpsc::UnboundedReceiver<TimerEvent>) {
        let mut identity = IdentityService::new(backend.clone());
        if let Some(user) = identity.restore() {
            log_info!("Restored identity {}", user.username);
        }

        let store = FocusStore::open(backend, identity.scope());
        let (timer, events) = TimerController::new(store, &config);

        let state = Self {
            config,
            identity: Mutex::new(identity),
            timer,
        };
        (state, events)
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn timer(&self) -> &TimerController {
        &self.timer
    }

    pub fn store(&self) -> Arc<Mutex<FocusStore>> {
        self.timer.store()
    }
}

pub async fn run() -> anyhow::Result<()> {
    cli::run().await
}
