//! # Platform Transport Trait
//!
//! コントロールAPIとオブジェクトストレージへのHTTP呼び出しを抽象化

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt;

#[cfg(test)]
use mockall::automock;

use crate::domain::errors::TransportError;

/// コントロールリクエストのHTTPメソッド
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        };
        f.write_str(s)
    }
}

/// コントロールエンドポイントへのリクエスト
///
/// `path` はベースURLからの相対パス。認証ヘッダーはトランスポートが付与する。
#[derive(Debug, Clone, PartialEq)]
pub struct ControlRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<serde_json::Value>,
}

impl ControlRequest {
    pub fn post(path: impl Into<String>) -> Self {
        Self {
            method: Method::Post,
            path: path.into(),
            body: None,
        }
    }

    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// コントロールエンドポイントのレスポンス（2xxのみ）
#[derive(Debug, Clone, PartialEq)]
pub struct ControlResponse {
    pub status: u16,
    /// 空のボディは `Value::Null`
    pub body: serde_json::Value,
}

/// アップロードするファイル本体
pub enum PayloadBody {
    /// メモリ上のバイト列
    Bytes(Vec<u8>),
    /// 開いたローカルファイル（長さはアップロード前に確定している）
    File { file: tokio::fs::File, len: u64 },
}

/// アップロードするファイル
///
/// ローカルファイルはメモリに読み込まずにストレージへストリーミングする。
pub struct FilePayload {
    pub file_name: String,
    pub body: PayloadBody,
}

impl FilePayload {
    pub fn from_bytes(file_name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            body: PayloadBody::Bytes(data),
        }
    }

    /// 送信するバイト数
    pub fn len(&self) -> u64 {
        match &self.body {
            PayloadBody::Bytes(data) => data.len() as u64,
            PayloadBody::File { len, .. } => *len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// メモリ上のバイト列（ファイルの場合は `None`）
    pub fn bytes(&self) -> Option<&[u8]> {
        match &self.body {
            PayloadBody::Bytes(data) => Some(data),
            PayloadBody::File { .. } => None,
        }
    }
}

impl fmt::Debug for FilePayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.body {
            PayloadBody::Bytes(_) => "bytes",
            PayloadBody::File { .. } => "file",
        };
        f.debug_struct("FilePayload")
            .field("file_name", &self.file_name)
            .field("body", &kind)
            .field("len", &self.len())
            .finish()
    }
}

/// オブジェクトストレージのレスポンス（2xxのみ）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageResponse {
    pub status: u16,
    /// `Location` ヘッダー（存在する場合）
    pub location: Option<String>,
}

/// プラットフォームトランスポート
///
/// セッション状態を持たず、各呼び出しは独立している。
/// コントロールリクエストはリトライしても安全だが、
/// presigned URLへのアップロードは自動でリトライしてはならない。
#[cfg_attr(test, automock)]
#[async_trait]
pub trait PlatformTransport: Send + Sync {
    /// 認証付きでコントロールエンドポイントを呼び出す
    ///
    /// # Errors
    ///
    /// 401/403 で `Auth`、404 で `NotFound`、5xx で `Platform`、
    /// タイムアウトで `Timeout` を返す
    async fn send_control_request(
        &self,
        request: &ControlRequest,
    ) -> Result<ControlResponse, TransportError>;

    /// presigned URLへmultipartフォームでファイルを送信する
    ///
    /// # Errors
    ///
    /// 非2xxで `UploadRejected`（ステータスと理由付き）を返す
    async fn send_upload_request(
        &self,
        url: &str,
        form_fields: &BTreeMap<String, String>,
        file: FilePayload,
    ) -> Result<StorageResponse, TransportError>;
}
