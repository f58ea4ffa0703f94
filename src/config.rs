//! Configuration for the backend client, push subscriptions, and the offline cache.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Environment variable overriding [`BackendConfig::base_url`].
pub const BACKEND_URL_ENV: &str = "UPTIME_PUSH_BACKEND_URL";

const APP_DIR: &str = "uptime-push";

/// Backend API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL every API path is appended to.
    pub base_url: String,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000/api".to_string(),
            request_timeout_secs: 30,
        }
    }
}

impl BackendConfig {
    /// Sets the backend base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Returns the request timeout as a [`Duration`].
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Push subscription manager configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PushConfig {
    /// How long to wait for an active worker registration, in milliseconds.
    pub ready_timeout_ms: u64,
    /// File holding the persisted key/value storage.
    pub storage_path: PathBuf,
}

impl Default for PushConfig {
    fn default() -> Self {
        let data_dir = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
        Self {
            ready_timeout_ms: 10_000,
            storage_path: data_dir.join(APP_DIR).join("storage.json"),
        }
    }
}

impl PushConfig {
    /// Sets the worker readiness timeout.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn with_ready_timeout(mut self, timeout: Duration) -> Self {
        self.ready_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Sets the storage file path.
    #[must_use]
    pub fn with_storage_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.storage_path = path.into();
        self
    }

    /// Returns the worker readiness timeout as a [`Duration`].
    #[must_use]
    pub const fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_timeout_ms)
    }
}

/// Offline cache worker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Directory holding one subdirectory per cache bucket.
    pub cache_dir: PathBuf,
    /// Origin the dashboard is served from; asset paths resolve against it.
    pub origin: String,
    /// Build-generated asset manifest (JSON with `version` and `files`).
    pub manifest_path: PathBuf,
    /// Number of assets fetched concurrently during install.
    pub precache_concurrency: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        let cache_dir = dirs::cache_dir().unwrap_or_else(|| PathBuf::from("."));
        let config_dir = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        Self {
            cache_dir: cache_dir.join(APP_DIR),
            origin: "http://localhost:5173".to_string(),
            manifest_path: config_dir.join(APP_DIR).join("assets.json"),
            precache_concurrency: 8,
        }
    }
}

impl CacheConfig {
    /// Sets the cache directory.
    #[must_use]
    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = dir.into();
        self
    }

    /// Sets the dashboard origin.
    #[must_use]
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = origin.into();
        self
    }

    /// Sets the number of concurrent precache fetches.
    #[must_use]
    pub const fn with_precache_concurrency(mut self, concurrency: usize) -> Self {
        self.precache_concurrency = concurrency;
        self
    }
}

/// Complete application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Backend API settings.
    pub backend: BackendConfig,
    /// Push subscription settings.
    pub push: PushConfig,
    /// Offline cache settings.
    pub cache: CacheConfig,
}

impl AppConfig {
    /// Returns the default config file location.
    #[must_use]
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join("config.toml")
    }

    /// Loads configuration from a TOML file. A missing file yields defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> crate::Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(contents) => Ok(toml::from_str(&contents)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("No config at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Loads from the default location and applies environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing config file cannot be parsed.
    pub fn load_or_default() -> crate::Result<Self> {
        Ok(Self::load(&Self::default_path())?.with_env_overrides(|key| std::env::var(key).ok()))
    }

    /// Applies overrides looked up through `lookup` (normally the process environment).
    #[must_use]
    pub fn with_env_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = lookup(BACKEND_URL_ENV).filter(|u| !u.trim().is_empty()) {
            self.backend.base_url = url;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_backend_config() {
        let config = BackendConfig::default();
        assert_eq!(config.base_url, "http://localhost:3000/api");
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn push_config_builder_pattern() {
        let config = PushConfig::default()
            .with_ready_timeout(Duration::from_millis(250))
            .with_storage_path("/tmp/store.json");
        assert_eq!(config.ready_timeout(), Duration::from_millis(250));
        assert_eq!(config.storage_path, PathBuf::from("/tmp/store.json"));
    }

    #[test]
    fn default_paths_are_namespaced() {
        let app = AppConfig::default();
        assert!(app.push.storage_path.to_string_lossy().contains("uptime-push"));
        assert!(app.cache.cache_dir.to_string_lossy().contains("uptime-push"));
        assert!(AppConfig::default_path().ends_with("uptime-push/config.toml"));
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [backend]
            base_url = "https://status.example.com/api"

            [cache]
            precache_concurrency = 2
            "#,
        )
        .unwrap();
        assert_eq!(config.backend.base_url, "https://status.example.com/api");
        assert_eq!(config.backend.request_timeout_secs, 30);
        assert_eq!(config.cache.precache_concurrency, 2);
        assert_eq!(config.push.ready_timeout_ms, 10_000);
    }

    #[test]
    fn config_serializes_to_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.backend.base_url, config.backend.base_url);
        assert_eq!(parsed.cache.origin, config.cache.origin);
    }

    #[test]
    fn load_missing_file_gives_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = AppConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.cache.precache_concurrency, 8);
    }

    #[test]
    fn load_rejects_invalid_toml() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "backend = [").unwrap();
        assert!(matches!(AppConfig::load(&path), Err(crate::Error::Config(_))));
    }

    #[test]
    fn env_override_replaces_base_url() {
        let config = AppConfig::default().with_env_overrides(|key| {
            (key == BACKEND_URL_ENV).then(|| "http://10.0.0.2:9000".to_string())
        });
        assert_eq!(config.backend.base_url, "http://10.0.0.2:9000");

        let untouched = AppConfig::default().with_env_overrides(|_| Some("  ".to_string()));
        assert_eq!(untouched.backend.base_url, "http://localhost:3000/api");
    }
}
