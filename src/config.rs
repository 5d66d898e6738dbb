use anyhow::{Context, Result};
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const APP_NAME: &str = "feedstore";
const CONFIG_FILE: &str = "config.json";

pub const DEFAULT_LOG_FILTER: &str = "feedstore=debug,tower_http=debug";
pub const DEFAULT_PORT: u16 = 3000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SQLite database file. Defaults to the per-user data directory.
    pub database_path: Option<PathBuf>,
    /// Port for the HTTP API.
    pub port: u16,
    /// `tracing` filter directives, used when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: None,
            port: DEFAULT_PORT,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl Config {
    /// Load the user's config file, then apply environment overrides.
    /// Falls back to defaults if the file fails to load.
    pub fn load() -> Self {
        let config = match config_path().and_then(|path| Self::load_from(&path)) {
            Ok(config) => config,
            Err(e) => {
                // Logging is not set up yet: the filter comes from this config.
                eprintln!("Failed to load config, using defaults: {:#}", e);
                Self::default()
            }
        };
        config.with_overrides(|key| std::env::var(key).ok())
    }

    /// Read a config file. A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).context("Failed to read config file")?;
        let config = serde_json::from_str(&content).context("Failed to parse config file")?;
        Ok(config)
    }

    /// Apply `FEEDSTORE_DB_PATH`, `FEEDSTORE_PORT` and `RUST_LOG` as looked
    /// up by `var`. Unparseable values are ignored.
    pub fn with_overrides(mut self, var: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(path) = var("FEEDSTORE_DB_PATH") {
            self.database_path = Some(PathBuf::from(path));
        }
        if let Some(port) = var("FEEDSTORE_PORT").and_then(|p| p.parse().ok()) {
            self.port = port;
        }
        if let Some(filter) = var("RUST_LOG") {
            self.log_filter = filter;
        }
        self
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content).context("Failed to write config file")?;
        Ok(())
    }

    /// Effective database location.
    pub fn database_path(&self) -> Result<PathBuf> {
        match &self.database_path {
            Some(path) => Ok(path.clone()),
            None => crate::db::default_path(),
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    let mut path =
        config_dir().ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
    path.push(APP_NAME);
    path.push(CONFIG_FILE);
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE);
        let config = Config {
            database_path: Some(PathBuf::from("/tmp/feeds.db")),
            port: 4100,
            log_filter: "feedstore=info".to_string(),
        };

        config.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, r#"{ "port": 8080 }"#).unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.log_filter, DEFAULT_LOG_FILTER);
        assert!(config.database_path.is_none());
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("FEEDSTORE_DB_PATH", "/data/feeds.db"),
            ("FEEDSTORE_PORT", "not-a-port"),
            ("RUST_LOG", "warn"),
        ]);

        let config = Config::default().with_overrides(|key| vars.get(key).map(|v| v.to_string()));
        assert_eq!(config.database_path, Some(PathBuf::from("/data/feeds.db")));
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.log_filter, "warn");
    }
}
