//! Configuration loading.
//!
//! Configuration comes from an optional TOML file named by
//! `IMPULSE_TRACKER_CONFIG`, with two environment overrides:
//! - `IMPULSE_TRACKER_DATA_DIR`: where the event log lives
//! - `IMPULSE_TRACKER_ENV`: `development` (default) or `production`
//!
//! ```toml
//! data_dir = "/var/lib/impulse-tracker"
//! environment = "production"
//!
//! [user]
//! id = "00000000-0000-0000-0000-000000000001"
//! email = "demo@impulse-tracker.app"
//!
//! [storage]
//! max_log_size = 10000000
//! lock = "flock"
//!
//! [xp]
//! outcome_award = 10
//! ```

use crate::error::{Result, TrackerError};
use crate::log::LockMode;
use crate::user::{DEMO_USER_EMAIL, DEMO_USER_ID, UserProfile};
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const CONFIG_ENV: &str = "IMPULSE_TRACKER_CONFIG";
pub const DATA_DIR_ENV: &str = "IMPULSE_TRACKER_DATA_DIR";
pub const ENVIRONMENT_ENV: &str = "IMPULSE_TRACKER_ENV";

/// Used outside production when no data directory is configured.
const FALLBACK_DATA_DIR: &str = "./data";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

/// Main configuration struct
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Directory holding the event log, snapshots and profile
    #[serde(default)]
    pub data_dir: Option<PathBuf>,

    #[serde(default)]
    pub environment: Environment,

    #[serde(default)]
    pub user: UserConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub xp: XpConfig,
}

/// Identity of the single tracked user
#[derive(Debug, Clone, Deserialize)]
pub struct UserConfig {
    #[serde(default = "default_user_id")]
    pub id: String,
    #[serde(default = "default_user_email")]
    pub email: String,
}

impl Default for UserConfig {
    fn default() -> Self {
        UserConfig {
            id: default_user_id(),
            email: default_user_email(),
        }
    }
}

fn default_user_id() -> String {
    DEMO_USER_ID.to_string()
}

fn default_user_email() -> String {
    DEMO_USER_EMAIL.to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Rotate `app.jsonl` into the archive past this many bytes; 0 disables
    #[serde(default = "default_max_log_size")]
    pub max_log_size: u64,

    #[serde(default)]
    pub lock: LockMode,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            max_log_size: default_max_log_size(),
            lock: LockMode::default(),
        }
    }
}

fn default_max_log_size() -> u64 {
    10_000_000
}

#[derive(Debug, Clone, Deserialize)]
pub struct XpConfig {
    /// XP granted for every recorded outcome
    #[serde(default = "default_outcome_award")]
    pub outcome_award: u64,
}

impl Default for XpConfig {
    fn default() -> Self {
        XpConfig {
            outcome_award: default_outcome_award(),
        }
    }
}

fn default_outcome_award() -> u64 {
    10
}

impl Config {
    /// Parse a TOML configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            TrackerError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        Ok(toml::from_str(&contents)?)
    }

    /// Build the configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable lookup.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = match var(CONFIG_ENV) {
            Some(path) => Self::load(Path::new(&path))?,
            None => Config::default(),
        };

        if let Some(dir) = var(DATA_DIR_ENV).filter(|d| !d.is_empty()) {
            config.data_dir = Some(PathBuf::from(dir));
        }

        if let Some(env) = var(ENVIRONMENT_ENV) {
            config.environment = match env.as_str() {
                "production" => Environment::Production,
                "development" => Environment::Development,
                other => {
                    return Err(TrackerError::Config(format!(
                        "{ENVIRONMENT_ENV} must be 'development' or 'production', got '{other}'"
                    )));
                }
            };
        }

        Ok(config)
    }

    /// Use `dir` as the data directory.
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(dir.into());
        self
    }

    /// The data directory to open.
    ///
    /// Production refuses to start without one. Development falls back to
    /// `./data` and says so.
    pub fn resolve_data_dir(&self) -> Result<PathBuf> {
        match (&self.data_dir, self.environment) {
            (Some(dir), _) => Ok(dir.clone()),
            (None, Environment::Production) => Err(TrackerError::Config(format!(
                "no data directory configured; set {DATA_DIR_ENV} or data_dir"
            ))),
            (None, Environment::Development) => {
                log::warn!(
                    "no data directory configured, using {FALLBACK_DATA_DIR} (set {DATA_DIR_ENV})"
                );
                Ok(PathBuf::from(FALLBACK_DATA_DIR))
            }
        }
    }

    /// The profile created on first access.
    pub fn user_template(&self) -> UserProfile {
        UserProfile::new(&self.user.id, &self.user.email)
    }
}
