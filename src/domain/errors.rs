//! # Domain Errors
//!
//! トランスポート層とセッション層のエラー分類

use thiserror::Error;

use crate::domain::entities::session::SessionState;

/// トランスポートエラー
///
/// コントロールAPIおよびオブジェクトストレージへの単一リクエストの失敗を表す。
/// セッション状態は持たない。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// APIキーが無効または期限切れ（401/403）
    #[error("authentication rejected ({status}): {message}")]
    Auth { status: u16, message: String },

    /// エンドポイントが存在しない（404）
    #[error("endpoint not found: {path}")]
    NotFound { path: String },

    /// プラットフォーム側のエラー（5xx）
    #[error("platform error ({status}): {message}")]
    Platform { status: u16, message: String },

    /// その他の非2xxレスポンス
    #[error("request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// ストレージがアップロードを拒否した
    #[error("upload rejected by storage ({status}): {reason}")]
    UploadRejected { status: u16, reason: String },

    /// 接続または読み取りのタイムアウト
    #[error("request timed out: {message}")]
    Timeout { message: String },

    /// ネットワークレベルの失敗
    #[error("network error: {message}")]
    Network { message: String },

    /// レスポンスを解釈できない
    #[error("invalid response: {message}")]
    InvalidResponse { message: String },
}

impl TransportError {
    /// コントロールエンドポイントの非2xxステータスを分類する
    ///
    /// # Examples
    ///
    /// ```
    /// use ingest_uploader::domain::errors::TransportError;
    ///
    /// let err = TransportError::from_control_status(401, "/upload/init", "bad key");
    /// assert!(matches!(err, TransportError::Auth { status: 401, .. }));
    ///
    /// let err = TransportError::from_control_status(503, "/upload/init", "busy");
    /// assert!(err.is_retryable());
    /// ```
    pub fn from_control_status(status: u16, path: &str, body: &str) -> Self {
        let message = body.trim().to_string();
        match status {
            401 | 403 => TransportError::Auth { status, message },
            404 => TransportError::NotFound {
                path: path.to_string(),
            },
            500..=599 => TransportError::Platform { status, message },
            _ => TransportError::Rejected { status, message },
        }
    }

    /// リトライ可能なエラーかどうか
    ///
    /// 冪等なコントロールリクエストに対してのみ意味を持つ。
    /// アップロードはこの判定に関係なくリトライしない。
    pub fn is_retryable(&self) -> bool {
        match self {
            TransportError::Platform { .. } => true,
            TransportError::Timeout { .. } => true,
            TransportError::Network { .. } => true,
            TransportError::Auth { .. } => false,
            TransportError::NotFound { .. } => false,
            TransportError::Rejected { .. } => false,
            TransportError::UploadRejected { .. } => false,
            TransportError::InvalidResponse { .. } => false,
        }
    }

    /// HTTPステータスコード（存在する場合）
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Auth { status, .. }
            | TransportError::Platform { status, .. }
            | TransportError::Rejected { status, .. }
            | TransportError::UploadRejected { status, .. } => Some(*status),
            TransportError::NotFound { .. } => Some(404),
            _ => None,
        }
    }
}

/// セッションエラー
///
/// セッションのライフサイクル操作とファイル単位のアップロードの失敗。
/// ファイル単位の失敗は必ずエンティティ名とファイル名を含む。
#[derive(Error, Debug)]
pub enum SessionError {
    /// セッション開始時にAPIキーが拒否された
    #[error("platform rejected the API key: {0}")]
    Auth(#[source] TransportError),

    /// セッション開始に失敗した
    #[error("failed to start upload session: {source}")]
    SessionStart { source: TransportError },

    /// 現在の状態では許可されない操作
    #[error("cannot {operation} while session is {state}")]
    State {
        operation: &'static str,
        state: SessionState,
    },

    /// ネットワーク呼び出し前の入力検証エラー
    #[error("invalid upload request: {0}")]
    Validation(String),

    /// presigned targetの取得に失敗した
    #[error("failed to obtain upload target for {entity}/{file_name}: {source}")]
    Negotiation {
        entity: String,
        file_name: String,
        source: TransportError,
    },

    /// ストレージへのアップロードに失敗した
    #[error("failed to upload {entity}/{file_name}: {source}")]
    Upload {
        entity: String,
        file_name: String,
        source: TransportError,
    },

    /// アップロード元の読み込みに失敗した
    #[error("failed to read {file_name} for entity {entity}: {source}")]
    Io {
        entity: String,
        file_name: String,
        source: std::io::Error,
    },

    /// セッションの完了に失敗した
    #[error("failed to complete session {session_id}: {source}")]
    Complete {
        session_id: String,
        source: TransportError,
    },
}

impl SessionError {
    /// 認証エラーかどうか
    pub fn is_auth(&self) -> bool {
        matches!(self, SessionError::Auth(_))
    }

    /// ファイル単位のアップロード失敗かどうか（レコードに記録される失敗）
    pub fn is_per_file(&self) -> bool {
        matches!(
            self,
            SessionError::Negotiation { .. } | SessionError::Upload { .. } | SessionError::Io { .. }
        )
    }

    /// 根本原因のトランスポートエラー（存在する場合）
    pub fn transport_error(&self) -> Option<&TransportError> {
        match self {
            SessionError::Auth(source)
            | SessionError::SessionStart { source }
            | SessionError::Negotiation { source, .. }
            | SessionError::Upload { source, .. }
            | SessionError::Complete { source, .. } => Some(source),
            _ => None,
        }
    }
}
