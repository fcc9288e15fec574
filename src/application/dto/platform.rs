//! # Platform Messages
//!
//! コントロールAPIのリクエスト/レスポンス形式

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::entities::presigned_target::PresignedTarget;
use crate::domain::entities::session::SessionId;
use crate::domain::errors::TransportError;
use crate::domain::repositories::transport::ControlResponse;

pub const INIT_PATH: &str = "/upload/init";

pub fn presign_path(session_id: &SessionId, entity_name: &str) -> String {
    format!("/upload/{}/entity/{}", session_id, entity_name)
}

pub fn complete_path(session_id: &SessionId) -> String {
    format!("/upload/{}/complete", session_id)
}

pub fn abort_path(session_id: &SessionId) -> String {
    format!("/upload/{}/abort", session_id)
}

/// `POST /upload/init`
#[derive(Debug, Clone, Serialize)]
pub struct InitRequest<'a> {
    #[serde(skip_serializing_if = "is_empty_metadata")]
    pub metadata: &'a BTreeMap<String, String>,
}

fn is_empty_metadata(metadata: &&BTreeMap<String, String>) -> bool {
    metadata.is_empty()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitResponse {
    pub data_package_id: String,
}

/// `POST /upload/{id}/entity/{entity}`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PresignRequest<'a> {
    pub file_name: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresignResponse {
    pub presigned_url_data: PresignedUrlData,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresignedUrlData {
    pub url: String,
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl From<PresignedUrlData> for PresignedTarget {
    fn from(data: PresignedUrlData) -> Self {
        PresignedTarget::new(data.url, data.fields, data.expires_at)
    }
}

/// `POST /upload/{id}/abort`
#[derive(Debug, Clone, Serialize)]
pub struct AbortRequest<'a> {
    pub reason: &'a str,
}

/// シリアライズ可能な値をJSONボディに変換する
pub fn encode<T: Serialize>(value: &T) -> serde_json::Value {
    // Plain structs of strings and maps cannot fail to serialize.
    serde_json::to_value(value).unwrap_or(serde_json::Value::Null)
}

/// レスポンスボディを型付きメッセージに変換する
pub fn decode<T: DeserializeOwned>(response: &ControlResponse) -> Result<T, TransportError> {
    serde_json::from_value(response.body.clone()).map_err(|e| TransportError::InvalidResponse {
        message: format!("unexpected response body (status {}): {}", response.status, e),
    })
}
