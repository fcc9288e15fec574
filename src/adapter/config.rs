//! Configuration
//!
//! JSON設定ファイルと環境変数からの設定読み込み

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::time::Duration;

use crate::adapter::http::client::{
    HttpTimeouts, DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_REQUEST_TIMEOUT_SECS,
};
use crate::adapter::http::retry::{
    RetryPolicy, INITIAL_RETRY_DELAY_MS, MAX_RETRIES, MAX_RETRY_DELAY_MS,
};
use crate::application::dto::session_config::{FailurePolicy, SessionConfig};

pub const DEFAULT_CONFIG_PATH: &str = "./.ingest/config.json";
pub const BASE_URL_ENV: &str = "INGEST_BASE_URL";
pub const API_KEY_ENV: &str = "INGEST_API_KEY";

#[derive(Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub base_url: String,
    pub api_key: String,

    // HTTP
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,

    // Retry (control requests only)
    pub max_retries: u32,
    pub initial_retry_delay_ms: u64,
    pub max_retry_delay_ms: u64,

    // Session
    pub failure_policy: FailurePolicy,
    pub sanitize_entity_names: bool,
    pub max_concurrent_uploads: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key: String::new(),
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            max_retries: MAX_RETRIES,
            initial_retry_delay_ms: INITIAL_RETRY_DELAY_MS,
            max_retry_delay_ms: MAX_RETRY_DELAY_MS,
            failure_policy: FailurePolicy::Continue,
            sanitize_entity_names: true,
            max_concurrent_uploads: 4,
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("initial_retry_delay_ms", &self.initial_retry_delay_ms)
            .field("max_retry_delay_ms", &self.max_retry_delay_ms)
            .field("failure_policy", &self.failure_policy)
            .field("sanitize_entity_names", &self.sanitize_entity_names)
            .field("max_concurrent_uploads", &self.max_concurrent_uploads)
            .finish()
    }
}

/// Expands tilde in path and returns the full path
pub fn expand_path(path: &str) -> String {
    shellexpand::tilde(path).to_string()
}

impl Config {
    /// 設定ファイルを読み込む
    pub fn load(path: &str) -> Result<Self> {
        let expanded = expand_path(path);
        let content = fs::read_to_string(&expanded)
            .with_context(|| format!("Failed to read config file: {}", expanded))?;
        let config: Config = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", expanded))?;
        Ok(config)
    }

    /// 設定ファイルがなければデフォルト値を使う
    pub fn load_or_default(path: &str) -> Result<Self> {
        if std::path::Path::new(&expand_path(path)).exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// 環境変数で上書きする
    pub fn apply_env(&mut self) {
        self.apply_env_from(|name| std::env::var(name).ok());
    }

    /// 任意の参照関数で上書きする（空の値は無視）
    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(BASE_URL_ENV).filter(|v| !v.trim().is_empty()) {
            self.base_url = url;
        }
        if let Some(key) = lookup(API_KEY_ENV).filter(|v| !v.trim().is_empty()) {
            self.api_key = key;
        }
    }

    /// 必須項目を検証する
    pub fn validate(&self) -> Result<()> {
        let base_url = self.base_url.trim();
        if base_url.is_empty() {
            bail!("base_url is not configured (set it in the config file or {})", BASE_URL_ENV);
        }
        if !(base_url.starts_with("https://") || base_url.starts_with("http://")) {
            bail!("base_url must start with http:// or https://: {}", base_url);
        }
        if self.api_key.trim().is_empty() {
            bail!("api_key is not configured (set it in the config file or {})", API_KEY_ENV);
        }
        if self.max_concurrent_uploads == 0 {
            bail!("max_concurrent_uploads must be at least 1");
        }
        Ok(())
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig::new(
            self.failure_policy,
            self.sanitize_entity_names,
            self.max_concurrent_uploads,
        )
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            initial_delay_ms: self.initial_retry_delay_ms,
            max_delay_ms: self.max_retry_delay_ms,
        }
    }

    pub fn timeouts(&self) -> HttpTimeouts {
        HttpTimeouts {
            connect: Duration::from_secs(self.connect_timeout_secs),
            request: Duration::from_secs(self.request_timeout_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_test_config() -> Config {
        Config {
            base_url: "https://ingest.example.com".to_string(),
            api_key: "secret-key".to_string(),
            ..Config::default()
        }
    }

    #[test]
    fn test_load_partial_config_uses_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"base_url": "https://ingest.example.com", "api_key": "k", "failure_policy": "fail_fast"}}"#
        )
        .unwrap();

        let config = Config::load(file.path().to_str().unwrap()).unwrap();

        assert_eq!(config.base_url, "https://ingest.example.com");
        assert_eq!(config.failure_policy, FailurePolicy::FailFast);
        assert_eq!(config.max_retries, MAX_RETRIES);
        assert_eq!(config.max_concurrent_uploads, 4);
        assert!(config.sanitize_entity_names);
    }

    #[test]
    fn test_load_invalid_json() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();

        let err = Config::load(file.path().to_str().unwrap()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.json");

        let config = Config::load_or_default(path.to_str().unwrap()).unwrap();
        assert!(config.base_url.is_empty());
        assert_eq!(config.connect_timeout_secs, DEFAULT_CONNECT_TIMEOUT_SECS);
    }

    #[test]
    fn test_apply_env_from_overrides() {
        let mut config = create_test_config();
        config.apply_env_from(|name| match name {
            API_KEY_ENV => Some("env-key".to_string()),
            BASE_URL_ENV => Some("  ".to_string()),
            _ => None,
        });

        assert_eq!(config.api_key, "env-key");
        assert_eq!(config.base_url, "https://ingest.example.com");
    }

    #[test]
    fn test_validate() {
        assert!(create_test_config().validate().is_ok());

        let mut config = create_test_config();
        config.api_key = String::new();
        assert!(config.validate().unwrap_err().to_string().contains(API_KEY_ENV));

        let mut config = create_test_config();
        config.base_url = "ftp://ingest.example.com".to_string();
        assert!(config.validate().is_err());

        let mut config = create_test_config();
        config.max_concurrent_uploads = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let debug = format!("{:?}", create_test_config());
        assert!(debug.contains("<redacted>"));
        assert!(!debug.contains("secret-key"));
    }

    #[test]
    fn test_derived_settings() {
        let mut config = create_test_config();
        config.failure_policy = FailurePolicy::FailFast;
        config.max_retries = 2;
        config.request_timeout_secs = 5;

        let session = config.session_config();
        assert_eq!(session.failure_policy, FailurePolicy::FailFast);
        assert_eq!(session.max_concurrent_uploads, 4);

        assert_eq!(config.retry_policy().max_retries, 2);
        assert_eq!(config.timeouts().request, Duration::from_secs(5));
    }

    #[test]
    fn test_expand_path_without_tilde() {
        assert_eq!(expand_path("/etc/ingest.json"), "/etc/ingest.json");
    }
}
