//! Client configuration.
//!
//! Settings are read from an optional TOML file and can be overridden with
//! `TUTORDESK__<SECTION>__<KEY>` environment variables. Every value has a
//! default, so running without a file is fine.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::boundary::{BuildMode, ErrorBoundary};
use crate::client::{ApiClient, ClientBuildError};
use crate::retry::RetryPolicy;
use crate::session::{
    FileSessionStore, MemorySessionStore, Navigator, RedirectPolicy, SessionExpiryInterceptor,
    SessionStore, DEFAULT_SESSION_KEY,
};

/// Prefix for environment variable overrides.
pub const ENV_PREFIX: &str = "TUTORDESK";

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file was not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// The configuration could not be parsed.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] config::ConfigError),

    /// The configuration parsed but holds an unusable value.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Remote API settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    pub base_url: String,
    /// Per-call time budget in seconds. 0 disables the timeout.
    pub timeout_secs: u64,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000/api".to_string(),
            timeout_secs: 30,
        }
    }
}

impl ApiSettings {
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}

/// Local session cache settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    pub storage_key: String,
    /// JSON file backing the session store; in-memory when unset.
    pub store_path: Option<String>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            storage_key: DEFAULT_SESSION_KEY.to_string(),
            store_path: None,
        }
    }
}

impl SessionSettings {
    pub fn open_store(&self) -> Arc<dyn SessionStore> {
        match &self.store_path {
            Some(path) => Arc::new(FileSessionStore::new(path)),
            None => Arc::new(MemorySessionStore::new()),
        }
    }
}

/// Application-level settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub mode: BuildMode,
    pub home_path: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            mode: BuildMode::Production,
            home_path: "/".to_string(),
        }
    }
}

/// All settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub api: ApiSettings,
    pub retry: RetryPolicy,
    pub session: SessionSettings,
    pub redirect: RedirectPolicy,
    pub app: AppSettings,
}

impl Settings {
    /// Loads settings from `path` (if given) plus environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file does not exist, cannot be parsed, or
    /// holds values that fail [`Settings::validate`].
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            if !path.exists() {
                return Err(ConfigError::FileNotFound(path.display().to_string()));
            }
            builder = builder.add_source(File::from(path).format(FileFormat::Toml));
        }

        let config = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Settings = config.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Parses settings from a TOML string, without environment overrides.
    pub fn from_toml(source: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::from_str(source, FileFormat::Toml))
            .build()?;
        let settings: Settings = config.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Checks values the type system cannot.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }

        let url = reqwest::Url::parse(&self.api.base_url).map_err(|e| {
            ConfigError::Invalid(format!("api.base_url '{}': {}", self.api.base_url, e))
        })?;
        if url.cannot_be_a_base() {
            return Err(ConfigError::Invalid(format!(
                "api.base_url '{}' cannot be used as a base",
                self.api.base_url
            )));
        }

        for rule in &self.redirect.rules {
            if !rule.prefix.starts_with('/') || !rule.entry.starts_with('/') {
                return Err(ConfigError::Invalid(format!(
                    "redirect rule '{}' -> '{}' must use absolute paths",
                    rule.prefix, rule.entry
                )));
            }
        }
        if !self.redirect.default_entry.starts_with('/') {
            return Err(ConfigError::Invalid(
                "redirect.default_entry must be an absolute path".to_string(),
            ));
        }

        if self.session.storage_key.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "session.storage_key must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Builds the session-expiry interceptor described by these settings.
    pub fn interceptor(&self, navigator: Arc<dyn Navigator>) -> SessionExpiryInterceptor {
        SessionExpiryInterceptor::new(self.session.open_store(), navigator, self.redirect.clone())
            .with_session_key(self.session.storage_key.clone())
    }

    /// Builds the API client with the interceptor registered.
    pub fn client(&self, navigator: Arc<dyn Navigator>) -> Result<ApiClient, ClientBuildError> {
        let mut builder = ApiClient::builder(self.api.base_url.clone())
            .interceptor(Arc::new(self.interceptor(navigator)))?;
        if let Some(timeout) = self.api.timeout() {
            builder = builder.timeout(timeout);
        }
        builder.build()
    }

    /// Builds an error boundary for the configured mode and home path.
    pub fn boundary(&self) -> ErrorBoundary {
        ErrorBoundary::new(self.app.mode).with_home_path(self.app.home_path.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::RedirectRule;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.api.base_url, "http://localhost:5000/api");
        assert_eq!(settings.api.timeout(), Some(Duration::from_secs(30)));
        assert_eq!(settings.retry, RetryPolicy::new(3, 1000));
        assert_eq!(settings.session.storage_key, "user");
        assert_eq!(settings.redirect, RedirectPolicy::default());
        assert_eq!(settings.app.mode, BuildMode::Production);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_from_toml_partial() {
        let settings = Settings::from_toml(
            r#"
            [api]
            base_url = "https://api.example.com/v1"
            timeout_secs = 0

            [retry]
            max_attempts = 5

            [app]
            mode = "development"
            "#,
        )
        .unwrap();

        assert_eq!(settings.api.base_url, "https://api.example.com/v1");
        assert_eq!(settings.api.timeout(), None);
        assert_eq!(settings.retry.max_attempts, 5);
        assert_eq!(settings.retry.base_delay_ms, 1000);
        assert_eq!(settings.app.mode, BuildMode::Development);
        assert_eq!(settings.app.home_path, "/");
    }

    #[test]
    fn test_from_toml_redirect_rules() {
        let settings = Settings::from_toml(
            r#"
            [redirect]
            default_entry = "/signin"

            [[redirect.rules]]
            prefix = "/staff"
            entry = "/staff/signin"
            "#,
        )
        .unwrap();

        assert_eq!(
            settings.redirect.rules,
            vec![RedirectRule::new("/staff", "/staff/signin")]
        );
        assert_eq!(settings.redirect.destination_for("/courses"), "/signin");
    }

    #[test]
    fn test_validate_rejects_zero_attempts() {
        let err = Settings::from_toml("[retry]\nmax_attempts = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_validate_rejects_bad_url() {
        let mut settings = Settings::default();
        settings.api.base_url = "localhost:5000".to_string();
        assert!(matches!(settings.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_relative_redirects() {
        let mut settings = Settings::default();
        settings.redirect.rules.push(RedirectRule::new("admin", "/admin/login"));
        assert!(matches!(settings.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_load_missing_file() {
        let err = Settings::load(Some(Path::new("/nonexistent/tutordesk.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = temp_dir.path().join("tutordesk.toml");
        std::fs::write(&path, "[session]\nstorage_key = \"auth_user\"\n").unwrap();

        let settings = Settings::load(Some(&path)).unwrap();
        assert_eq!(settings.session.storage_key, "auth_user");
    }

    #[test]
    fn test_client_from_settings() {
        let settings = Settings::default();
        let navigator = Arc::new(crate::session::MemoryNavigator::at("/"));
        let client = settings.client(navigator).unwrap();
        assert!(client.interceptor().is_some());
        assert_eq!(client.base_url(), "http://localhost:5000/api");
    }
}
