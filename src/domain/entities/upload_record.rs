//! # UploadRecord Entity
//!
//! ファイル単位のアップロード試行の記録

use chrono::{DateTime, Utc};
use std::fmt;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

/// アップロード結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOutcome {
    Pending,
    Succeeded,
    Failed,
}

impl fmt::Display for UploadOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UploadOutcome::Pending => "pending",
            UploadOutcome::Succeeded => "succeeded",
            UploadOutcome::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// アップロード元の種類（レポート用）
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceKind {
    Path(PathBuf),
    Memory { len: usize },
    Reader,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Path(path) => write!(f, "{}", path.display()),
            SourceKind::Memory { len } => write!(f, "<memory, {} bytes>", len),
            SourceKind::Reader => f.write_str("<stream>"),
        }
    }
}

/// アップロードレコード
///
/// `upload_file` 呼び出し時に `Pending` で作成され、
/// ネゴシエーターによってのみ `Succeeded` / `Failed` に更新される。
#[derive(Debug, Clone, PartialEq)]
pub struct UploadRecord {
    pub entity_name: String,
    pub file_name: String,
    pub source: SourceKind,
    pub outcome: UploadOutcome,
    pub failure_reason: Option<String>,
    /// プラットフォームが返したオブジェクトキー
    pub object_key: Option<String>,
    pub bytes_uploaded: Option<u64>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl UploadRecord {
    pub fn pending(
        entity_name: impl Into<String>,
        file_name: impl Into<String>,
        source: SourceKind,
    ) -> Self {
        Self {
            entity_name: entity_name.into(),
            file_name: file_name.into(),
            source,
            outcome: UploadOutcome::Pending,
            failure_reason: None,
            object_key: None,
            bytes_uploaded: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn mark_succeeded(&mut self, object_key: Option<String>, bytes: u64) {
        self.outcome = UploadOutcome::Succeeded;
        self.failure_reason = None;
        self.object_key = object_key;
        self.bytes_uploaded = Some(bytes);
        self.finished_at = Some(Utc::now());
    }

    pub fn mark_failed(&mut self, reason: impl Into<String>) {
        self.outcome = UploadOutcome::Failed;
        self.failure_reason = Some(reason.into());
        self.finished_at = Some(Utc::now());
    }

    #[inline]
    pub fn is_pending(&self) -> bool {
        self.outcome == UploadOutcome::Pending
    }

    #[inline]
    pub fn is_succeeded(&self) -> bool {
        self.outcome == UploadOutcome::Succeeded
    }
}

/// 呼び出し順を保持するレコード列
///
/// 同一セッション内の並行アップロードからも登録・更新できるよう
/// ミューテックスで保護する。
#[derive(Debug, Default)]
pub struct RecordLog {
    records: Mutex<Vec<UploadRecord>>,
}

impl RecordLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<UploadRecord>> {
        // A panic while holding the lock leaves the Vec itself intact.
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// レコードを末尾に追加し、そのインデックスを返す
    pub fn begin(&self, record: UploadRecord) -> usize {
        let mut records = self.lock();
        records.push(record);
        records.len() - 1
    }

    /// 指定インデックスのレコードを置き換える
    ///
    /// `begin` が返したインデックス以外では何もせず `false` を返す
    pub fn store(&self, index: usize, record: UploadRecord) -> bool {
        match self.lock().get_mut(index) {
            Some(slot) => {
                *slot = record;
                true
            }
            None => false,
        }
    }

    /// 現在のレコード列のスナップショット
    pub fn snapshot(&self) -> Vec<UploadRecord> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(file_name: &str) -> UploadRecord {
        UploadRecord::pending("sales", file_name, SourceKind::Memory { len: 3 })
    }

    #[test]
    fn test_pending_record() {
        let r = record("a.csv");
        assert!(r.is_pending());
        assert!(r.failure_reason.is_none());
        assert!(r.finished_at.is_none());
    }

    #[test]
    fn test_mark_succeeded() {
        let mut r = record("a.csv");
        r.mark_succeeded(Some("sales/a.csv".to_string()), 3);

        assert!(r.is_succeeded());
        assert_eq!(r.object_key.as_deref(), Some("sales/a.csv"));
        assert_eq!(r.bytes_uploaded, Some(3));
        assert!(r.finished_at.is_some());
    }

    #[test]
    fn test_mark_failed() {
        let mut r = record("a.csv");
        r.mark_failed("403 AccessDenied");

        assert_eq!(r.outcome, UploadOutcome::Failed);
        assert_eq!(r.failure_reason.as_deref(), Some("403 AccessDenied"));
    }

    #[test]
    fn test_record_log_preserves_call_order() {
        let log = RecordLog::new();
        let mut first = record("first.csv");
        let mut second = record("second.csv");
        let first_index = log.begin(first.clone());
        let second_index = log.begin(second.clone());

        // 2件目が先に完了しても順序は変わらない
        second.mark_succeeded(None, 1);
        assert!(log.store(second_index, second));
        first.mark_failed("boom");
        assert!(log.store(first_index, first));

        let records = log.snapshot();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].file_name, "first.csv");
        assert_eq!(records[0].outcome, UploadOutcome::Failed);
        assert_eq!(records[1].file_name, "second.csv");
        assert_eq!(records[1].outcome, UploadOutcome::Succeeded);
    }

    #[test]
    fn test_record_log_store_out_of_range() {
        let log = RecordLog::new();
        assert!(!log.store(3, record("x.csv")));
        assert!(log.is_empty());
        assert!(log.snapshot().is_empty());
    }

    #[test]
    fn test_source_kind_display() {
        assert_eq!(
            SourceKind::Path(PathBuf::from("/data/report.csv")).to_string(),
            "/data/report.csv"
        );
        assert_eq!(
            SourceKind::Memory { len: 12 }.to_string(),
            "<memory, 12 bytes>"
        );
        assert_eq!(SourceKind::Reader.to_string(), "<stream>");
    }
}
