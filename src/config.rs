use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Application-level constants
pub const APP_NAME: &str = "MedReminder";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Multiplier in `alarm_id = medication_id * SLOT_ID_STRIDE + slot_index`.
/// Changing it orphans every alarm already handed to the OS.
pub const SLOT_ID_STRIDE: i64 = 100;

/// Upper bound on `times` entries per medication. Also the width of the
/// disarm sweep run for every known medication on each pass.
pub const MAX_TIMES_PER_MEDICATION: usize = 12;

/// SQLite file name inside the app data directory.
pub const DATABASE_FILE: &str = "medreminder.db";

/// Settings file name inside the app data directory.
pub const SETTINGS_FILE: &str = "settings.json";

/// Channel name used when settings do not override it.
pub const DEFAULT_NOTIFICATION_CHANNEL: &str = "Medication reminders";

/// Default tracing filter when neither `RUST_LOG` nor settings override it.
pub fn default_log_filter() -> &'static str {
    "medreminder_lib=info,medreminder=info,warn"
}

/// Get the application data directory
/// ~/MedReminder/ on all platforms
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_NAME)
}

/// Default settings file location.
pub fn settings_path() -> PathBuf {
    app_data_dir().join(SETTINGS_FILE)
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Settings I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed settings file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// User-editable settings persisted as JSON next to the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReminderSettings {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub log_filter: String,
    /// Override for the database location.
    pub database_path: Option<PathBuf>,
    /// Notification channel the host registers with the OS.
    pub notification_channel_name: String,
}

impl Default for ReminderSettings {
    fn default() -> Self {
        Self {
            log_filter: default_log_filter().to_string(),
            database_path: None,
            notification_channel_name: DEFAULT_NOTIFICATION_CHANNEL.to_string(),
        }
    }
}

impl ReminderSettings {
    /// Load settings from `path`. A missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No settings file, using defaults");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Write settings to `path`, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        std::fs::write(path, json).map_err(io_err)
    }

    /// Resolved database location: the override, or the app data directory.
    pub fn database_path(&self) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(|| app_data_dir().join(DATABASE_FILE))
    }
}
