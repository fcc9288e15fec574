//! # PresignedTarget Value Object
//!
//! 1回限りのアップロード先（URL + フォームフィールド）

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// S3 presigned POST が `key` フィールドで使うファイル名プレースホルダ
const FILENAME_PLACEHOLDER: &str = "${filename}";

/// presigned target
///
/// アップロードごとに新しく取得し、1回のアップロードで消費する。
/// 再利用を防ぐため `Clone` を実装しない。
#[derive(Debug, PartialEq, Eq)]
pub struct PresignedTarget {
    url: String,
    fields: BTreeMap<String, String>,
    expires_at: Option<DateTime<Utc>>,
}

impl PresignedTarget {
    pub fn new(
        url: impl Into<String>,
        fields: BTreeMap<String, String>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            url: url.into(),
            fields,
            expires_at,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// multipartフォームに含める必須フィールド
    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.fields
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// 指定時刻の時点で期限切れかどうか（期限が不明な場合は `false`）
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires| expires <= now)
    }

    /// アップロード後のオブジェクトキー
    ///
    /// `key` フィールドの `${filename}` を実際のファイル名で置き換える
    ///
    /// # Examples
    ///
    /// ```
    /// use std::collections::BTreeMap;
    /// use ingest_uploader::domain::entities::presigned_target::PresignedTarget;
    ///
    /// let mut fields = BTreeMap::new();
    /// fields.insert("key".to_string(), "pkg-1/sales/${filename}".to_string());
    /// let target = PresignedTarget::new("https://bucket.example.com", fields, None);
    ///
    /// assert_eq!(
    ///     target.object_key("report.csv").as_deref(),
    ///     Some("pkg-1/sales/report.csv")
    /// );
    /// ```
    pub fn object_key(&self, file_name: &str) -> Option<String> {
        self.fields
            .get("key")
            .map(|key| key.replace(FILENAME_PLACEHOLDER, file_name))
    }
}
