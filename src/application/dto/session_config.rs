//! # Session Configuration DTO
//!
//! セッション設定のData Transfer Object

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// ファイル単位の失敗に対するセッションの方針
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// 失敗をレコードに残してセッションを継続し、最後に完了する
    #[default]
    Continue,
    /// 最初の失敗でセッションを中断する
    FailFast,
}

/// セッション設定
///
/// セッションコントローラーとネゴシエーターが参照する設定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// ファイル単位の失敗時の方針
    pub failure_policy: FailurePolicy,
    /// エンティティ名のスペース/ダッシュをアンダースコアに置き換えるか
    pub sanitize_entity_names: bool,
    /// `upload_files` の同時実行数
    pub max_concurrent_uploads: usize,
    /// セッション開始時にプラットフォームへ送るメタデータ
    pub metadata: BTreeMap<String, String>,
}

impl SessionConfig {
    /// 新しいセッション設定を作成します。
    ///
    /// # 例
    ///
    /// ```
    /// use ingest_uploader::application::dto::session_config::{FailurePolicy, SessionConfig};
    ///
    /// let config = SessionConfig::new(FailurePolicy::FailFast, true, 2)
    ///     .with_metadata("client", "nightly-export");
    ///
    /// assert_eq!(config.failure_policy, FailurePolicy::FailFast);
    /// assert_eq!(config.max_concurrent_uploads, 2);
    /// assert_eq!(config.metadata["client"], "nightly-export");
    /// ```
    pub fn new(
        failure_policy: FailurePolicy,
        sanitize_entity_names: bool,
        max_concurrent_uploads: usize,
    ) -> Self {
        Self {
            failure_policy,
            sanitize_entity_names,
            max_concurrent_uploads: max_concurrent_uploads.max(1),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new(FailurePolicy::Continue, true, 4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_config_default() {
        let config = SessionConfig::default();
        assert_eq!(config.failure_policy, FailurePolicy::Continue);
        assert!(config.sanitize_entity_names);
        assert_eq!(config.max_concurrent_uploads, 4);
        assert!(config.metadata.is_empty());
    }

    #[test]
    fn test_concurrency_is_at_least_one() {
        let config = SessionConfig::new(FailurePolicy::Continue, false, 0);
        assert_eq!(config.max_concurrent_uploads, 1);
    }

    #[test]
    fn test_failure_policy_serde() {
        let policy: FailurePolicy = serde_json::from_str("\"fail_fast\"").unwrap();
        assert_eq!(policy, FailurePolicy::FailFast);
        assert_eq!(
            serde_json::to_string(&FailurePolicy::Continue).unwrap(),
            "\"continue\""
        );
    }
}
