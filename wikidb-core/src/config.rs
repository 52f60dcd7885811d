//! Startup configuration for the data-access layer.
//!
//! Read once before the pool and dispatcher are constructed. Every field
//! has a default, so an empty file (or [`WikiDbConfig::default`]) yields a
//! working local setup.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::pool::PoolOptions;
use crate::queries::{QueryRegistry, RegistryError};

/// Well-known dispatcher address used when none is configured.
pub const DEFAULT_QUEUE: &str = "wikidb.queue";

fn default_db_path() -> PathBuf {
    PathBuf::from("db/wiki.db")
}

fn default_driver() -> String {
    "sqlite".to_owned()
}

fn default_max_pool_size() -> usize {
    crate::pool::DEFAULT_MAX_SIZE
}

fn default_queue() -> String {
    DEFAULT_QUEUE.to_owned()
}

fn default_acquire_timeout_secs() -> u64 {
    crate::pool::DEFAULT_ACQUIRE_TIMEOUT.as_secs()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WikiDbConfig {
    /// SQLite database file.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Store driver identifier. Only `sqlite` is supported; anything else
    /// fails validation rather than being silently ignored.
    #[serde(default = "default_driver")]
    pub driver: String,

    /// Maximum concurrent connection leases.
    #[serde(default = "default_max_pool_size")]
    pub max_pool_size: usize,

    /// Path to the SQL query resource; absent means the compiled-in
    /// defaults.
    #[serde(default)]
    pub queries_file: Option<PathBuf>,

    /// Bus address the dispatcher consumes and proxies send to.
    #[serde(default = "default_queue")]
    pub queue: String,

    /// Seconds an acquire may wait behind the pool bound.
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,
}

impl Default for WikiDbConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            driver: default_driver(),
            max_pool_size: default_max_pool_size(),
            queries_file: None,
            queue: default_queue(),
            acquire_timeout_secs: default_acquire_timeout_secs(),
        }
    }
}

impl WikiDbConfig {
    /// Load and validate a TOML config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: Self = toml::from_str(&raw)
            .with_context(|| format!("config file {} is not valid TOML", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Fail fast on values the rest of the stack would trip over later.
    pub fn validate(&self) -> Result<()> {
        if self.driver != "sqlite" {
            anyhow::bail!(
                "unsupported database driver '{}' (only 'sqlite' is available)",
                self.driver
            );
        }
        if self.max_pool_size == 0 {
            anyhow::bail!("max_pool_size must be at least 1");
        }
        if self.queue.is_empty() {
            anyhow::bail!("queue address must not be empty");
        }
        Ok(())
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }

    /// Pool options for this configuration; `open()` the result to build
    /// the pool the service instances share.
    pub fn pool_options(&self) -> PoolOptions {
        PoolOptions::new(self.db_path.clone())
            .max_size(self.max_pool_size)
            .acquire_timeout(self.acquire_timeout())
    }

    /// Build the query registry: the configured resource file when one is
    /// set, otherwise the compiled-in defaults.
    pub fn query_registry(&self) -> Result<QueryRegistry, RegistryError> {
        match &self.queries_file {
            Some(path) => QueryRegistry::load(path),
            None => QueryRegistry::embedded(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_file_yields_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"").unwrap();

        let config = WikiDbConfig::load(file.path()).unwrap();
        assert_eq!(config.max_pool_size, 30);
        assert_eq!(config.queue, DEFAULT_QUEUE);
        assert_eq!(config.driver, "sqlite");
        assert!(config.queries_file.is_none());
    }

    #[test]
    fn overrides_are_applied() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(
            br#"
db_path = "/tmp/test-wiki.db"
max_pool_size = 4
queue = "wikidb.test"
acquire_timeout_secs = 1
"#,
        )
        .unwrap();

        let config = WikiDbConfig::load(file.path()).unwrap();
        assert_eq!(config.db_path, PathBuf::from("/tmp/test-wiki.db"));
        assert_eq!(config.max_pool_size, 4);
        assert_eq!(config.queue, "wikidb.test");
        assert_eq!(config.acquire_timeout(), Duration::from_secs(1));
    }

    #[test]
    fn unknown_driver_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(br#"driver = "hsqldb""#).unwrap();

        let err = WikiDbConfig::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("hsqldb"));
    }

    #[tokio::test]
    async fn pool_options_carry_configured_bound() {
        let dir = tempfile::tempdir().unwrap();
        let config = WikiDbConfig {
            db_path: dir.path().join("wiki.db"),
            max_pool_size: 3,
            ..WikiDbConfig::default()
        };

        let pool = config.pool_options().open().await.unwrap();
        assert_eq!(pool.max_size(), 3);
        assert_eq!(pool.available(), 3);
    }

    #[test]
    fn query_registry_prefers_the_configured_file() {
        // No file configured: compiled-in defaults.
        let config = WikiDbConfig::default();
        assert!(config.query_registry().is_ok());

        // A configured file that is missing must fail fast, not fall back.
        let config = WikiDbConfig {
            queries_file: Some(PathBuf::from("/nonexistent/queries.toml")),
            ..WikiDbConfig::default()
        };
        assert!(config.query_registry().is_err());
    }

    #[test]
    fn zero_pool_size_is_rejected() {
        let config = WikiDbConfig {
            max_pool_size: 0,
            ..WikiDbConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
