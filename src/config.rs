//! Engine configuration, read from `~/.leadflow/config.json`.
//!
//! ```json
//! { "databasePath": "/var/lib/leadflow/crm.db", "busyTimeoutMs": 5000 }
//! ```
//!
//! Every key is optional. `DATABASE_URL`, when set, wins over `databasePath`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DATABASE_URL_ENV: &str = "DATABASE_URL";
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Could not find home directory")]
    HomeDirNotFound,

    #[error("Failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    pub database_path: PathBuf,
    /// How long SQLite waits on a locked database before giving up.
    pub busy_timeout_ms: u64,
}

impl Config {
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

/// On-disk shape. Missing keys fall back to defaults in [`load_config_from`].
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    #[serde(default)]
    database_path: Option<PathBuf>,
    #[serde(default)]
    busy_timeout_ms: Option<u64>,
}

/// `~/.leadflow`
fn config_dir() -> Result<PathBuf, ConfigError> {
    let home = dirs::home_dir().ok_or(ConfigError::HomeDirNotFound)?;
    Ok(home.join(".leadflow"))
}

pub fn default_database_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join("leadflow.db"))
}

/// Load configuration from ~/.leadflow/config.json, honouring `DATABASE_URL`.
pub fn load_config() -> Result<Config, ConfigError> {
    let path = config_dir()?.join("config.json");
    load_config_from(&path, std::env::var(DATABASE_URL_ENV).ok())
}

/// Read `path` if it exists and fill the gaps with defaults. A non-blank
/// `database_override` replaces whatever path the file names.
pub fn load_config_from(path: &Path, database_override: Option<String>) -> Result<Config, ConfigError> {
    let file: ConfigFile = if path.exists() {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?
    } else {
        log::debug!("No config at {}, using defaults", path.display());
        ConfigFile::default()
    };

    let database_path = match database_override.filter(|p| !p.trim().is_empty()) {
        Some(over) => {
            log::debug!("{DATABASE_URL_ENV} overrides database path");
            PathBuf::from(over.trim())
        }
        None => match file.database_path {
            Some(p) => p,
            None => default_database_path()?,
        },
    };

    Ok(Config {
        database_path,
        busy_timeout_ms: file.busy_timeout_ms.unwrap_or(DEFAULT_BUSY_TIMEOUT_MS),
    })
}
