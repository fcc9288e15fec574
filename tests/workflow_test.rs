//! Workflow Integration Tests
//!
//! IngestWorkflow の統合テスト

use async_trait::async_trait;
use clap::Parser;
use serde_json::json;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

use ingest_uploader::adapter::config::Config;
use ingest_uploader::domain::entities::session::SessionState;
use ingest_uploader::domain::errors::TransportError;
use ingest_uploader::domain::repositories::transport::{
    ControlRequest, ControlResponse, FilePayload, PlatformTransport, StorageResponse,
};
use ingest_uploader::driver::cli::Args;
use ingest_uploader::driver::workflow::IngestWorkflow;

/// テスト用のConfigファイルを作成
fn create_test_config(dir: &Path) -> String {
    let config_path = dir.join("test-config.json");
    let config_content = r#"{
  "base_url": "https://ingest.example.com",
  "api_key": "test-key",
  "max_concurrent_uploads": 2
}"#;
    fs::write(&config_path, config_content).unwrap();
    config_path.to_string_lossy().to_string()
}

fn create_test_file(dir: &Path, name: &str) -> String {
    let path = dir.join(name);
    fs::write(&path, "id,amount\n1,100\n").unwrap();
    path.to_string_lossy().to_string()
}

/// `init` に含まれたメタデータを記録するトランスポート
#[derive(Default)]
struct AcceptingTransport {
    init_bodies: Mutex<Vec<serde_json::Value>>,
    uploads: Mutex<Vec<String>>,
}

#[async_trait]
impl PlatformTransport for AcceptingTransport {
    async fn send_control_request(
        &self,
        request: &ControlRequest,
    ) -> Result<ControlResponse, TransportError> {
        let body = match request.path.as_str() {
            "/upload/init" => {
                self.init_bodies
                    .lock()
                    .unwrap()
                    .push(request.body.clone().unwrap_or_default());
                json!({"dataPackageId": "wf-1"})
            }
            path if path.starts_with("/upload/wf-1/entity/") => json!({
                "presignedUrlData": {"url": "https://storage.example.com", "fields": {}}
            }),
            _ => serde_json::Value::Null,
        };
        Ok(ControlResponse { status: 200, body })
    }

    async fn send_upload_request(
        &self,
        _url: &str,
        _form_fields: &BTreeMap<String, String>,
        file: FilePayload,
    ) -> Result<StorageResponse, TransportError> {
        self.uploads.lock().unwrap().push(file.file_name);
        Ok(StorageResponse {
            status: 204,
            location: Some("https://storage.example.com/object".to_string()),
        })
    }
}

#[tokio::test]
async fn test_workflow_execute_dry_run_success() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = create_test_config(temp_dir.path());
    let file = create_test_file(temp_dir.path(), "report.csv");

    let config = Config::load(&config_path).unwrap();
    let args = Args::parse_from([
        "ingest-uploader",
        "--dry-run",
        "-c",
        config_path.as_str(),
        "sales",
        file.as_str(),
    ]);

    let workflow = IngestWorkflow::new(config);
    let result = workflow.execute(args).await;

    assert!(result.is_ok(), "Dry run should succeed: {:?}", result.err());
    assert!(result.unwrap().is_none());
}

#[tokio::test]
async fn test_workflow_execute_dry_run_missing_file() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = create_test_config(temp_dir.path());
    let file = create_test_file(temp_dir.path(), "report.csv");
    let missing = temp_dir.path().join("missing.csv");

    let config = Config::load(&config_path).unwrap();
    let args = Args::parse_from([
        "ingest-uploader",
        "--dry-run",
        "sales",
        file.as_str(),
        missing.to_str().unwrap(),
    ]);

    let err = IngestWorkflow::new(config).execute(args).await.unwrap_err();
    assert!(err.to_string().contains("1 of 2 files"));
}

#[tokio::test]
async fn test_workflow_execute_uploads_all_files() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = create_test_config(temp_dir.path());
    let first = create_test_file(temp_dir.path(), "a.csv");
    let second = create_test_file(temp_dir.path(), "b.csv");

    let config = Config::load(&config_path).unwrap();
    let transport = Arc::new(AcceptingTransport::default());
    let workflow = IngestWorkflow::with_transport(config, transport.clone());
    let args = Args::parse_from(["ingest-uploader", "sales", first.as_str(), second.as_str()]);

    let report = workflow.execute(args).await.unwrap().unwrap();

    assert_eq!(report.state, SessionState::Closed);
    assert!(report.is_success());
    assert_eq!(report.succeeded_count(), 2);
    assert_eq!(
        report.records[0].object_key.as_deref(),
        Some("https://storage.example.com/object")
    );

    let mut uploads = transport.uploads.lock().unwrap().clone();
    uploads.sort();
    assert_eq!(uploads, vec!["a.csv", "b.csv"]);

    let init_bodies = transport.init_bodies.lock().unwrap();
    let client = init_bodies[0]["metadata"]["client"].as_str().unwrap();
    assert!(client.starts_with("ingest-uploader/"));
}

#[tokio::test]
async fn test_workflow_rejects_invalid_entity() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = create_test_config(temp_dir.path());
    let file = create_test_file(temp_dir.path(), "a.csv");

    let config = Config::load(&config_path).unwrap();
    let transport = Arc::new(AcceptingTransport::default());
    let workflow = IngestWorkflow::with_transport(config, transport.clone());
    let args = Args::parse_from(["ingest-uploader", "sales/2024", file.as_str()]);

    assert!(workflow.execute(args).await.is_err());
    assert!(transport.init_bodies.lock().unwrap().is_empty());
}
