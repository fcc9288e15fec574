//! # Negotiate Upload Use Case
//!
//! presigned targetの取得とファイルのアップロード

use chrono::Utc;
use log::{debug, error, info};
use std::sync::Arc;

use crate::application::dto::platform::{self, PresignRequest, PresignResponse};
use crate::domain::entities::file_source::FileSource;
use crate::domain::entities::presigned_target::PresignedTarget;
use crate::domain::entities::session::{Session, SessionId};
use crate::domain::entities::upload_record::UploadRecord;
use crate::domain::errors::{SessionError, TransportError};
use crate::domain::repositories::transport::{ControlRequest, PlatformTransport};
use crate::domain::services::entity_naming::EntityNamingService;

/// アップロード要求
#[derive(Debug)]
pub struct UploadRequest {
    /// 論理データセット名
    pub entity_name: String,
    pub source: FileSource,
    /// アップロード先のファイル名（パス以外のソースでは必須）
    pub file_name: Option<String>,
}

impl UploadRequest {
    pub fn new(entity_name: impl Into<String>, source: FileSource) -> Self {
        Self {
            entity_name: entity_name.into(),
            source,
            file_name: None,
        }
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }
}

/// 検証済みでレコード登録済みのアップロード
///
/// `prepare` で作成し、`execute` で消費する
#[derive(Debug)]
pub struct PreparedUpload {
    index: usize,
    record: UploadRecord,
    source: FileSource,
}

/// アップロードネゴシエーター
///
/// 1ファイルにつき、presigned targetの取得とアップロードを1回ずつ行う。
/// targetは毎回新しく取得し、再利用しない。
pub struct UploadNegotiator {
    transport: Arc<dyn PlatformTransport>,
    sanitize_entity_names: bool,
}

impl UploadNegotiator {
    /// 新しいネゴシエーターを作成
    ///
    /// # Arguments
    ///
    /// * `transport` - プラットフォームトランスポート
    /// * `sanitize_entity_names` - エンティティ名を正規化するか
    pub fn new(transport: Arc<dyn PlatformTransport>, sanitize_entity_names: bool) -> Self {
        Self {
            transport,
            sanitize_entity_names,
        }
    }

    /// 1ファイルをアップロードする
    ///
    /// 結果に関係なく、レコードは呼び出し順でセッションに残る
    ///
    /// # Errors
    ///
    /// - セッションが `Open` でない場合は `SessionError::State`
    /// - 入力が不正な場合は `SessionError::Validation`（ネットワーク呼び出しなし）
    /// - target取得の失敗は `SessionError::Negotiation`
    /// - アップロードの失敗は `SessionError::Upload`
    pub async fn upload(
        &self,
        session: &Session,
        request: UploadRequest,
    ) -> Result<UploadRecord, SessionError> {
        let prepared = self.prepare(session, request)?;
        self.execute(session, prepared).await
    }

    /// 入力を検証し、`Pending` レコードを登録する
    ///
    /// ネットワーク呼び出しは行わない。検証に失敗した場合はレコードを登録しない。
    pub fn prepare(
        &self,
        session: &Session,
        request: UploadRequest,
    ) -> Result<PreparedUpload, SessionError> {
        session.ensure_open("upload a file")?;

        let entity_name =
            EntityNamingService::prepare(&request.entity_name, self.sanitize_entity_names)?;
        let file_name = request
            .source
            .resolve_file_name(request.file_name.as_deref())?;

        let record = UploadRecord::pending(entity_name, file_name, request.source.kind());
        let index = session.records().begin(record.clone());

        Ok(PreparedUpload {
            index,
            record,
            source: request.source,
        })
    }

    /// 登録済みのアップロードを実行し、レコードを最終状態に更新する
    pub async fn execute(
        &self,
        session: &Session,
        prepared: PreparedUpload,
    ) -> Result<UploadRecord, SessionError> {
        let PreparedUpload {
            index,
            mut record,
            source,
        } = prepared;

        let result = self
            .transfer(session, &record.entity_name, &record.file_name, source)
            .await;

        let outcome = match result {
            Ok((object_key, bytes)) => {
                info!(
                    "File {} uploaded successfully for entity {} ({} bytes)",
                    record.file_name, record.entity_name, bytes
                );
                record.mark_succeeded(object_key, bytes);
                Ok(record.clone())
            }
            Err(e) => {
                error!("{}", e);
                record.mark_failed(e.to_string());
                Err(e)
            }
        };

        finish(session, index, record);
        outcome
    }

    /// 実行せずにレコードを `Failed` で確定する
    ///
    /// ネットワーク呼び出しは行わない
    pub fn skip(&self, session: &Session, prepared: PreparedUpload, reason: &str) -> UploadRecord {
        let PreparedUpload {
            index, mut record, ..
        } = prepared;
        info!(
            "Skipping {} for entity {}: {}",
            record.file_name, record.entity_name, reason
        );
        record.mark_failed(reason);
        finish(session, index, record.clone());
        record
    }

    async fn transfer(
        &self,
        session: &Session,
        entity_name: &str,
        file_name: &str,
        source: FileSource,
    ) -> Result<(Option<String>, u64), SessionError> {
        let session_id = session.ensure_open("upload a file")?;

        let payload = source
            .into_payload(file_name)
            .await
            .map_err(|e| SessionError::Io {
                entity: entity_name.to_string(),
                file_name: file_name.to_string(),
                source: e,
            })?;
        let size = payload.len();

        let negotiation_error = |source: TransportError| SessionError::Negotiation {
            entity: entity_name.to_string(),
            file_name: file_name.to_string(),
            source,
        };

        let target = self
            .request_target(session_id, entity_name, file_name)
            .await
            .map_err(negotiation_error)?;

        if let Some(expires_at) = target.expires_at().filter(|_| target.is_expired_at(Utc::now())) {
            return Err(negotiation_error(TransportError::InvalidResponse {
                message: format!("presigned target already expired at {}", expires_at),
            }));
        }

        debug!(
            "Uploading {} ({} bytes) to presigned target for entity {}",
            file_name, size, entity_name
        );

        let response = self
            .transport
            .send_upload_request(target.url(), target.fields(), payload)
            .await
            .map_err(|source| SessionError::Upload {
                entity: entity_name.to_string(),
                file_name: file_name.to_string(),
                source,
            })?;

        let object_key = target.object_key(file_name).or(response.location);
        Ok((object_key, size))
    }

    async fn request_target(
        &self,
        session_id: &SessionId,
        entity_name: &str,
        file_name: &str,
    ) -> Result<PresignedTarget, TransportError> {
        let request = ControlRequest::post(platform::presign_path(session_id, entity_name))
            .with_body(platform::encode(&PresignRequest { file_name }));

        let response = self.transport.send_control_request(&request).await?;
        let presign: PresignResponse = platform::decode(&response)?;

        debug!(
            "Generated upload target for entity {} and file {}",
            entity_name, file_name
        );
        Ok(presign.presigned_url_data.into())
    }
}

fn finish(session: &Session, index: usize, record: UploadRecord) {
    let stored = session.records().store(index, record);
    debug_assert!(stored, "record index {} was not registered", index);
}
