//! Worker configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (OFFCACHE_*)
//! 2. TOML config file (if OFFCACHE_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Which stores the interceptor consults on lookup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LookupScope {
    /// Every store visible to the origin, oldest first.
    #[default]
    AllStores,
    /// Only the current version's store.
    CurrentStore,
}

/// Worker configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (OFFCACHE_*)
/// 2. TOML config file (if OFFCACHE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Prefix shared by every store this application owns.
    ///
    /// Set via OFFCACHE_APP_PREFIX environment variable.
    #[serde(default = "default_app_prefix")]
    pub app_prefix: String,

    /// Version identifier. Changing it invalidates every older store.
    ///
    /// Set via OFFCACHE_VERSION environment variable.
    #[serde(default = "default_version")]
    pub version: String,

    /// Worker scope; relative precache URLs resolve against it.
    ///
    /// Set via OFFCACHE_SCOPE environment variable.
    #[serde(default = "default_scope")]
    pub scope: String,

    /// Root-relative path of the offline fallback document.
    ///
    /// Set via OFFCACHE_OFFLINE_URL environment variable.
    #[serde(default = "default_offline_url")]
    pub offline_url: String,

    /// Resources fetched and stored on install, in order.
    ///
    /// Set via OFFCACHE_PRECACHE_URLS environment variable (`[a, b, ...]`).
    #[serde(default = "default_precache_urls")]
    pub precache_urls: Vec<String>,

    /// Changelog text sent to pages after an update.
    ///
    /// Set via OFFCACHE_UPDATE_MESSAGE environment variable.
    #[serde(default = "default_update_message")]
    pub update_message: String,

    /// Path to SQLite cache database.
    ///
    /// Set via OFFCACHE_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// User-Agent string for HTTP requests.
    ///
    /// Set via OFFCACHE_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// HTTP request timeout in milliseconds.
    ///
    /// Set via OFFCACHE_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum bytes to read per response.
    ///
    /// Set via OFFCACHE_MAX_BYTES environment variable.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Activate right after a successful install instead of waiting.
    ///
    /// Set via OFFCACHE_SKIP_WAITING_ON_INSTALL environment variable.
    #[serde(default = "default_true")]
    pub skip_waiting_on_install: bool,

    /// Stores consulted on lookup.
    ///
    /// Set via OFFCACHE_LOOKUP_SCOPE environment variable
    /// (`all_stores` or `current_store`).
    #[serde(default)]
    pub lookup_scope: LookupScope,
}

fn default_app_prefix() -> String {
    "education-app".into()
}

fn default_version() -> String {
    "4.0.0".into()
}

fn default_scope() -> String {
    "http://localhost:8080/".into()
}

fn default_offline_url() -> String {
    "/offline.html".into()
}

fn default_precache_urls() -> Vec<String> {
    [
        "./",
        "./index.html",
        "./offline.html",
        "./manifest.json",
        "https://i.ibb.co/wFnz89n6/icon-192x192.png",
        "https://i.ibb.co/XGNQ8V4/icon-180x180.png",
        "https://www.gstatic.com/firebasejs/9.6.10/firebase-app-compat.js",
        "https://www.gstatic.com/firebasejs/9.6.10/firebase-auth-compat.js",
        "https://www.gstatic.com/firebasejs/9.6.10/firebase-database-compat.js",
        "https://www.gstatic.com/firebasejs/9.6.10/firebase-storage-compat.js",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_update_message() -> String {
    "অ্যাপ আপডেট হয়েছে! নতুন ফিচার: ফাইল ব্যবস্থাপনা, বই, গাইড, ভিডিও".into()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./offcache.sqlite")
}

fn default_user_agent() -> String {
    "offcache/0.1".into()
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_max_bytes() -> usize {
    10_485_760 // 10MB
}

fn default_true() -> bool {
    true
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            app_prefix: default_app_prefix(),
            version: default_version(),
            scope: default_scope(),
            offline_url: default_offline_url(),
            precache_urls: default_precache_urls(),
            update_message: default_update_message(),
            db_path: default_db_path(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            max_bytes: default_max_bytes(),
            skip_waiting_on_install: true,
            lookup_scope: LookupScope::AllStores,
        }
    }
}

impl WorkerConfig {
    /// Name of the store owned by the running version: `<prefix>-<version>`.
    pub fn cache_name(&self) -> String {
        format!("{}-{}", self.app_prefix, self.version)
    }

    /// Whether a store name carries this application's prefix.
    pub fn owns_store(&self, name: &str) -> bool {
        name.strip_prefix(self.app_prefix.as_str())
            .is_some_and(|rest| rest.starts_with('-'))
    }

    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `OFFCACHE_`
    /// 2. TOML file from `OFFCACHE_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("OFFCACHE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("OFFCACHE_")
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
