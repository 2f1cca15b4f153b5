//! Configuration of the report data layer.
//!
//! This module handles loading the configuration: where the backing
//! database lives, which snapshot cache backend to use and where to write
//! logs.
//!
//! Configuration is stored at `~/.config/trajectory-report/config.json`;
//! environment variables (also read from a `.env` file) override it.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::cache::{DirSnapshotCache, HttpSnapshotCache, SnapshotCache};
use crate::store::SqliteRelationStore;

/// Application name used for config/cache directory paths
const APP_NAME: &str = "trajectory-report";

/// Config file name
const CONFIG_FILE: &str = "config.json";

pub const ENV_DB_PATH: &str = "TRAJECTORY_DB_PATH";
pub const ENV_CACHE_URL: &str = "TRAJECTORY_CACHE_URL";
pub const ENV_CACHE_DIR: &str = "TRAJECTORY_CACHE_DIR";
pub const ENV_USE_CACHE: &str = "TRAJECTORY_USE_CACHE";
pub const ENV_LOG_DIR: &str = "TRAJECTORY_LOG_DIR";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum CacheBackend {
    Disabled,
    /// `path` defaults to the user cache directory.
    Directory { path: Option<PathBuf> },
    Http { url: String },
}

impl Default for CacheBackend {
    fn default() -> Self {
        CacheBackend::Directory { path: None }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database_path: Option<PathBuf>,
    pub cache: CacheBackend,
    pub use_cache: bool,
    pub log_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: None,
            cache: CacheBackend::default(),
            use_cache: true,
            log_dir: None,
        }
    }
}

impl Config {
    /// Load the config file, then apply environment overrides.
    pub fn load() -> Result<Self> {
        // Load .env file if present (silently ignore if not found)
        let _ = dotenvy::dotenv();

        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Override fields from variables returned by `lookup`.
    /// A cache URL wins over a cache directory.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(path) = lookup(ENV_DB_PATH) {
            self.database_path = Some(PathBuf::from(path));
        }
        if let Some(path) = lookup(ENV_CACHE_DIR) {
            self.cache = CacheBackend::Directory {
                path: Some(PathBuf::from(path)),
            };
        }
        if let Some(url) = lookup(ENV_CACHE_URL) {
            self.cache = CacheBackend::Http { url };
        }
        if let Some(value) = lookup(ENV_USE_CACHE) {
            self.use_cache = parse_flag(&value)
                .with_context(|| format!("Invalid {} value: {}", ENV_USE_CACHE, value))?;
        }
        if let Some(path) = lookup(ENV_LOG_DIR) {
            self.log_dir = Some(PathBuf::from(path));
        }
        Ok(())
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        if let CacheBackend::Directory { path: Some(ref path) } = self.cache {
            return Ok(path.clone());
        }
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    pub fn open_store(&self) -> Result<SqliteRelationStore> {
        let path = self
            .database_path
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("Database path is not configured (set {})", ENV_DB_PATH))?;
        Ok(SqliteRelationStore::new(path))
    }

    /// The configured snapshot cache, `None` when disabled.
    pub fn open_cache(&self) -> Result<Option<Box<dyn SnapshotCache>>> {
        let cache: Box<dyn SnapshotCache> = match &self.cache {
            CacheBackend::Disabled => return Ok(None),
            CacheBackend::Directory { .. } => Box::new(DirSnapshotCache::new(self.cache_dir()?)),
            CacheBackend::Http { url } => Box::new(
                HttpSnapshotCache::new(url).context("Failed to build cache service client")?,
            ),
        };
        Ok(Some(cache))
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_missing_file_gives_default() {
        let dir = tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config, Config::default());
        assert!(config.use_cache);
    }

    #[test]
    fn test_parse_partial_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"database_path": "/data/report.db", "cache": {"backend": "http", "url": "http://cache:8080"}}"#,
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.database_path, Some(PathBuf::from("/data/report.db")));
        assert_eq!(
            config.cache,
            CacheBackend::Http { url: "http://cache:8080".to_string() }
        );
        assert!(config.use_cache);
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("trajectory-report").join("config.json");
        let config = Config {
            database_path: Some(PathBuf::from("/data/report.db")),
            cache: CacheBackend::Directory {
                path: Some(dir.path().join("snapshots")),
            },
            use_cache: false,
            log_dir: Some(dir.path().join("logs")),
        };

        config.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config
            .apply_overrides(lookup(&[
                (ENV_DB_PATH, "/tmp/report.db"),
                (ENV_CACHE_DIR, "/tmp/snapshots"),
                (ENV_USE_CACHE, "no"),
            ]))
            .unwrap();

        assert_eq!(config.database_path, Some(PathBuf::from("/tmp/report.db")));
        assert_eq!(config.cache_dir().unwrap(), PathBuf::from("/tmp/snapshots"));
        assert!(!config.use_cache);
    }

    #[test]
    fn test_cache_url_wins_over_dir() {
        let mut config = Config::default();
        config
            .apply_overrides(lookup(&[(ENV_CACHE_DIR, "/tmp/snapshots"), (ENV_CACHE_URL, "http://cache:1")]))
            .unwrap();
        assert!(matches!(config.cache, CacheBackend::Http { .. }));
    }

    #[test]
    fn test_invalid_flag_is_error() {
        let mut config = Config::default();
        assert!(config.apply_overrides(lookup(&[(ENV_USE_CACHE, "maybe")])).is_err());
    }

    #[test]
    fn test_open_store_requires_path() {
        assert!(Config::default().open_store().is_err());
    }

    #[test]
    fn test_disabled_cache_opens_none() {
        let config = Config {
            cache: CacheBackend::Disabled,
            ..Config::default()
        };
        assert!(config.open_cache().unwrap().is_none());
    }
}
