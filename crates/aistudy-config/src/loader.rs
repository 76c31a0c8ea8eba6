use std::path::{Path, PathBuf};

use aistudy_common::{Error, Result};
use tracing::{debug, info};

use crate::model::MaintenanceConfig;

/// Default config file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "aistudy.yml";

/// Loads `MaintenanceConfig` from YAML or TOML, picked by file extension.
pub struct ConfigLoader {
    path: PathBuf,
    explicit: bool,
}

impl ConfigLoader {
    /// Use `path` when given; otherwise fall back to `aistudy.yml` and
    /// tolerate its absence.
    pub fn new(path: Option<PathBuf>) -> Self {
        match path {
            Some(path) => Self {
                path,
                explicit: true,
            },
            None => Self {
                path: PathBuf::from(DEFAULT_CONFIG_FILE),
                explicit: false,
            },
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<MaintenanceConfig> {
        if !self.path.exists() {
            if self.explicit {
                return Err(Error::Config(format!(
                    "config file not found: {}",
                    self.path.display()
                )));
            }
            debug!("no config file at {}, using defaults", self.path.display());
            return Ok(MaintenanceConfig::default());
        }

        let contents = std::fs::read_to_string(&self.path)?;
        let config = parse_config(&self.path, &contents)?;
        info!("config loaded from {}", self.path.display());
        Ok(config)
    }
}

fn parse_config(path: &Path, contents: &str) -> Result<MaintenanceConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    match ext {
        "yml" | "yaml" => serde_yaml::from_str(contents)
            .map_err(|e| Error::Config(format!("YAML parse error: {e}"))),
        "toml" => {
            toml::from_str(contents).map_err(|e| Error::Config(format!("TOML parse error: {e}")))
        }
        other => Err(Error::Config(format!(
            "unsupported config extension: {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::model::LogFormat;

    #[test]
    fn missing_default_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let loader = ConfigLoader {
            path: dir.path().join(DEFAULT_CONFIG_FILE),
            explicit: false,
        };
        let config = loader.load().unwrap();
        assert_eq!(config, MaintenanceConfig::default());
        assert_eq!(config.database.path, PathBuf::from("ai_study.db"));
        assert_eq!(config.uploads.max_age().unwrap(), Duration::from_secs(24 * 3600));
        assert_eq!(config.uploads.keep, vec![".gitkeep".to_string()]);
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let loader = ConfigLoader::new(Some(dir.path().join("nope.yml")));
        let err = loader.load().unwrap_err();
        assert!(err.to_string().contains("config file not found"));
    }

    #[test]
    fn loads_partial_yaml_over_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aistudy.yaml");
        std::fs::write(
            &path,
            "database:\n  path: /srv/app/ai_study.db\nlogging:\n  format: json\n",
        )
        .unwrap();

        let config = ConfigLoader::new(Some(path)).load().unwrap();
        assert_eq!(config.database.path, PathBuf::from("/srv/app/ai_study.db"));
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.uploads.max_age_hours, 24);
    }

    #[test]
    fn loads_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aistudy.toml");
        std::fs::write(
            &path,
            "[uploads]\ndir = \"/tmp/up\"\nmax_age_hours = 6\nkeep = [\".gitkeep\", \"README\"]\n",
        )
        .unwrap();

        let config = ConfigLoader::new(Some(path)).load().unwrap();
        assert_eq!(config.uploads.dir, PathBuf::from("/tmp/up"));
        assert_eq!(config.uploads.max_age().unwrap(), Duration::from_secs(6 * 3600));
        assert_eq!(config.uploads.keep.len(), 2);
    }

    #[test]
    fn rejects_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aistudy.ini");
        std::fs::write(&path, "x=1").unwrap();
        let err = ConfigLoader::new(Some(path)).load().unwrap_err();
        assert!(err.to_string().contains("unsupported config extension"));
    }
}
