//! # FileSource Value Object
//!
//! アップロード元（ファイルパス / メモリ上のバイト列 / 非同期ストリーム）

use std::fmt;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::domain::entities::upload_record::SourceKind;
use crate::domain::errors::SessionError;
use crate::domain::repositories::transport::{FilePayload, PayloadBody};

/// アップロード元
///
/// パス以外のソースにはファイル名が存在しないため、
/// 呼び出し側が明示的にファイル名を渡す必要がある。
pub enum FileSource {
    /// ローカルファイル
    Path(PathBuf),
    /// メモリ上のバイト列
    Memory(Vec<u8>),
    /// 任意の非同期ストリーム（例: オブジェクトストレージのレスポンスボディ）
    Reader(Box<dyn AsyncRead + Send + Unpin>),
}

impl FileSource {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        FileSource::Path(path.into())
    }

    pub fn from_bytes(data: impl Into<Vec<u8>>) -> Self {
        FileSource::Memory(data.into())
    }

    pub fn from_reader<R>(reader: R) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        FileSource::Reader(Box::new(reader))
    }

    /// レポート用のソース種別
    pub fn kind(&self) -> SourceKind {
        match self {
            FileSource::Path(path) => SourceKind::Path(path.clone()),
            FileSource::Memory(data) => SourceKind::Memory { len: data.len() },
            FileSource::Reader(_) => SourceKind::Reader,
        }
    }

    /// パスの最後の要素から導出されるファイル名
    pub fn default_file_name(&self) -> Option<String> {
        match self {
            FileSource::Path(path) => file_name_of(path),
            FileSource::Memory(_) | FileSource::Reader(_) => None,
        }
    }

    /// アップロード先のファイル名を決定する
    ///
    /// 明示的な名前が優先され、なければパスから導出する。
    ///
    /// # Errors
    ///
    /// 名前が空、またはパス以外のソースで名前が指定されていない場合に
    /// `SessionError::Validation` を返す
    pub fn resolve_file_name(&self, explicit: Option<&str>) -> Result<String, SessionError> {
        match explicit {
            Some(name) if name.trim().is_empty() => Err(SessionError::Validation(
                "file_name must not be empty".to_string(),
            )),
            Some(name) => Ok(name.to_string()),
            None => self.default_file_name().ok_or_else(|| match self {
                FileSource::Path(path) => SessionError::Validation(format!(
                    "cannot derive a file name from path {}",
                    path.display()
                )),
                _ => SessionError::Validation(
                    "file_name must be provided when uploading an in-memory or streamed source"
                        .to_string(),
                ),
            }),
        }
    }

    /// アップロード用のペイロードに変換する
    ///
    /// パスはファイルを開いて長さだけを確定し、内容はアップロード時にストリーミングする。
    /// 非同期ストリームは長さが分からないためメモリに読み込む。
    pub async fn into_payload(self, file_name: &str) -> std::io::Result<FilePayload> {
        let body = match self {
            FileSource::Path(path) => {
                let file = tokio::fs::File::open(&path).await?;
                let metadata = file.metadata().await?;
                if !metadata.is_file() {
                    return Err(std::io::Error::new(
                        std::io::ErrorKind::InvalidInput,
                        format!("{} is not a regular file", path.display()),
                    ));
                }
                PayloadBody::File {
                    file,
                    len: metadata.len(),
                }
            }
            FileSource::Memory(data) => PayloadBody::Bytes(data),
            FileSource::Reader(mut reader) => {
                let mut buf = Vec::new();
                reader.read_to_end(&mut buf).await?;
                PayloadBody::Bytes(buf)
            }
        };
        Ok(FilePayload {
            file_name: file_name.to_string(),
            body,
        })
    }
}

impl fmt::Debug for FileSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileSource::Path(path) => f.debug_tuple("Path").field(path).finish(),
            FileSource::Memory(data) => f.debug_struct("Memory").field("len", &data.len()).finish(),
            FileSource::Reader(_) => f.write_str("Reader(..)"),
        }
    }
}

impl From<PathBuf> for FileSource {
    fn from(path: PathBuf) -> Self {
        FileSource::Path(path)
    }
}

impl From<&Path> for FileSource {
    fn from(path: &Path) -> Self {
        FileSource::Path(path.to_path_buf())
    }
}

impl From<Vec<u8>> for FileSource {
    fn from(data: Vec<u8>) -> Self {
        FileSource::Memory(data)
    }
}

fn file_name_of(path: &Path) -> Option<String> {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .filter(|name| !name.is_empty())
}
