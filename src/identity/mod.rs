//! Local-only account layer and storage scope selection.
//!
//! Credentials are kept in plain form in the users table; this layer only decides
//! which storage domain is active; it is not a security boundary.

pub mod commands;

use std::sync::Arc;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::{
    log_info, log_warn,
    models::now_ms,
    store::{keys, StorageBackend, SyncRecord},
};

const ENABLE_LOGS: bool = true;

const MIN_USERNAME_LEN: usize = 3;
const MIN_PASSWORD_LEN: usize = 4;
const GUEST_PREFIX: &str = "guest_";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub username: String,
    pub created_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_sync_at: Option<i64>,
}

impl User {
    pub fn is_guest(&self) -> bool {
        self.id.starts_with(GUEST_PREFIX)
    }

    /// Placeholder identity written into exports made without an account.
    pub fn local_placeholder() -> Self {
        Self {
            id: "local".into(),
            username: "local".into(),
            created_at: now_ms(),
            last_sync_at: None,
        }
    }
}

/// Storage domain in effect for a run, resolved once at startup or sign-in.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Scope {
    /// Each collection under its own key.
    #[default]
    Anonymous,
    /// One combined record under the identity's sync key.
    Account(User),
}

impl Scope {
    pub fn resolve(user: Option<&User>) -> Self {
        match user {
            Some(user) => Scope::Account(user.clone()),
            None => Scope::Anonymous,
        }
    }

    pub fn user(&self) -> Option<&User> {
        match self {
            Scope::Anonymous => None,
            Scope::Account(user) => Some(user),
        }
    }

    /// Whether every change must be mirrored into the combined account record.
    pub fn mirrors_to_account(&self) -> bool {
        matches!(self, Scope::Account(_))
    }

    pub fn sync_key(&self) -> Option<String> {
        self.user().map(|user| keys::sync_key(&user.id))
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Username already exists")]
    UsernameTaken,
    #[error("Username must be at least 3 characters")]
    UsernameTooShort,
    #[error("Password must be at least 4 characters")]
    PasswordTooShort,
    #[error("Invalid username or password")]
    InvalidCredentials,
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

/// Row of the credentials table. Never leaves this module.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredUser {
    id: String,
    username: String,
    password: String,
    created_at: i64,
}

impl From<&StoredUser> for User {
    fn from(stored: &StoredUser) -> Self {
        Self {
            id: stored.id.clone(),
            username: stored.username.clone(),
            created_at: stored.created_at,
            last_sync_at: None,
        }
    }
}

pub struct IdentityService {
    backend: Arc<dyn StorageBackend>,
    current: Option<User>,
}

impl IdentityService {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self {
            backend,
            current: None,
        }
    }

    /// Reloads the signed-in identity. Corrupted records are dropped; guest identities
    /// are ephemeral and never carried into a new run.
    pub fn restore(&mut self) -> Option<&User> {
        self.current = None;

        let raw = match self.backend.get(keys::AUTH) {
            Ok(raw) => raw,
            Err(err) => {
                log_warn!("Failed to read current identity: {err:#}");
                return None;
            }
        };

        if let Some(raw) = raw {
            match serde_json::from_str::<User>(&raw) {
                Ok(user) if user.is_guest() => {
                    log_info!("Discarding ephemeral guest identity {}", user.id);
                    self.clear_auth_record();
                }
                Ok(user) => self.current = Some(user),
                Err(err) => {
                    log_warn!("Corrupted identity record, clearing it: {err}");
                    self.clear_auth_record();
                }
            }
        }

        self.current.as_ref()
    }

    pub fn current(&self) -> Option<&User> {
        self.current.as_ref()
    }

    pub fn scope(&self) -> Scope {
        Scope::resolve(self.current.as_ref())
    }

    pub fn signup(&mut self, username: &str, password: &str) -> Result<User, AuthError> {
        let mut users = self.load_users()?;
        let username = username.trim();

        if users
            .iter()
            .any(|u| u.username.to_lowercase() == username.to_lowercase())
        {
            return Err(AuthError::UsernameTaken);
        }
        if username.chars().count() < MIN_USERNAME_LEN {
            return Err(AuthError::UsernameTooShort);
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::PasswordTooShort);
        }

        let stored = StoredUser {
            id: Uuid::new_v4().to_string(),
            username: username.to_string(),
            password: password.to_string(),
            created_at: now_ms(),
        };
        let user = User::from(&stored);
        users.push(stored);
        self.save_users(&users)?;

        self.sign_in(user.clone())?;
        self.write_empty_record(&user)?;

        log_info!("Created account {}", user.username);
        Ok(user)
    }

    pub fn login(&mut self, username: &str, password: &str) -> Result<User, AuthError> {
        let users = self.load_users()?;
        let wanted = username.trim().to_lowercase();

        let user = users
            .iter()
            .find(|u| u.username.to_lowercase() == wanted && u.password == password)
            .map(User::from)
            .ok_or(AuthError::InvalidCredentials)?;

        self.sign_in(user.clone())?;
        log_info!("Signed in as {}", user.username);
        Ok(user)
    }

    pub fn login_as_guest(&mut self) -> Result<User, AuthError> {
        let created_at = now_ms();
        let user = User {
            id: format!("{GUEST_PREFIX}{created_at}"),
            username: "Guest".into(),
            created_at,
            last_sync_at: None,
        };

        self.sign_in(user.clone())?;
        self.write_empty_record(&user)?;

        log_info!("Started guest identity {}", user.id);
        Ok(user)
    }

    pub fn logout(&mut self) {
        if let Some(user) = self.current.take() {
            log_info!("Signed out {}", user.username);
        }
        self.clear_auth_record();
    }

    fn sign_in(&mut self, user: User) -> anyhow::Result<()> {
        let serialized = serde_json::to_string(&user)?;
        self.backend
            .set(keys::AUTH, &serialized)
            .context("failed to persist current identity")?;
        self.current = Some(user);
        Ok(())
    }

    fn clear_auth_record(&self) {
        if let Err(err) = self.backend.remove(keys::AUTH) {
            log_warn!("Failed to clear identity record: {err:#}");
        }
    }

    fn write_empty_record(&self, user: &User) -> anyhow::Result<()> {
        let record = SyncRecord::empty(user.clone());
        let serialized = serde_json::to_string(&record)?;
        self.backend
            .set(&keys::sync_key(&user.id), &serialized)
            .context("failed to initialize account record")
    }

    fn load_users(&self) -> anyhow::Result<Vec<StoredUser>> {
        let Some(raw) = self.backend.get(keys::USERS)? else {
            return Ok(Vec::new());
        };
        match serde_json::from_str(&raw) {
            Ok(users) => Ok(users),
            Err(err) => {
                log_warn!("Corrupted credentials table, starting empty: {err}");
                Ok(Vec::new())
            }
        }
    }

    fn save_users(&self, users: &[StoredUser]) -> anyhow::Result<()> {
        let serialized = serde_json::to_string(users)?;
        self.backend
            .set(keys::USERS, &serialized)
            .context("failed to persist credentials table")
    }
}

/// Records when the signed-in identity's data was last written.
pub(crate) fn stamp_last_sync(backend: &dyn StorageBackend, at: i64) -> anyhow::Result<()> {
    let Some(raw) = backend.get(keys::AUTH)? else {
        return Ok(());
    };
    let mut user: User = serde_json::from_str(&raw).context("failed to parse identity record")?;
    user.last_sync_at = Some(at);
    backend.set(keys::AUTH, &serde_json::to_string(&user)?)
}
