use std::path::PathBuf;
use std::time::Duration;

use aistudy_common::{Error, Result};
use serde::{Deserialize, Serialize};

/// Top-level configuration shared by every maintenance command.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaintenanceConfig {
    pub database: DatabaseConfig,
    pub uploads: UploadsConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite file owned by the web application.
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("ai_study.db"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadsConfig {
    pub dir: PathBuf,
    pub max_age_hours: u64,
    /// File names that are never removed, e.g. `.gitkeep`.
    pub keep: Vec<String>,
}

impl Default for UploadsConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("uploads"),
            max_age_hours: 24,
            keep: vec![".gitkeep".to_string()],
        }
    }
}

impl UploadsConfig {
    pub fn max_age(&self) -> Result<Duration> {
        max_age_from_hours(self.max_age_hours)
    }
}

/// Convert an hour count to a `Duration`, rejecting values whose seconds do
/// not fit in a `u64`.
pub fn max_age_from_hours(hours: u64) -> Result<Duration> {
    hours
        .checked_mul(3600)
        .map(Duration::from_secs)
        .ok_or_else(|| Error::Config(format!("max_age_hours out of range: {hours}")))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` takes precedence when set.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}
