//! Workflow Orchestration
//!
//! ワークフローのオーケストレーション

use anyhow::{bail, Context, Result};
use log::info;
use std::path::Path;
use std::sync::Arc;

use crate::adapter::config::Config;
use crate::adapter::http::client::HttpTransport;
use crate::adapter::http::retry::RetryingTransport;
use crate::application::dto::session_config::{FailurePolicy, SessionConfig};
use crate::application::use_cases::negotiate_upload::UploadRequest;
use crate::application::use_cases::upload_session::{with_session, SessionReport};
use crate::domain::entities::file_source::FileSource;
use crate::domain::entities::upload_record::UploadOutcome;
use crate::domain::errors::SessionError;
use crate::domain::repositories::transport::PlatformTransport;
use crate::domain::services::entity_naming::EntityNamingService;

use super::cli::Args;

pub const CLIENT_NAME: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Apply command line overrides on top of the loaded configuration
pub fn apply_args(config: &mut Config, args: &Args) {
    if let Some(base_url) = &args.base_url {
        config.base_url = base_url.clone();
    }
    if args.fail_fast {
        config.failure_policy = FailurePolicy::FailFast;
    }
}

/// Session start metadata describing this client
pub fn client_metadata(session_config: SessionConfig) -> SessionConfig {
    let session_config = session_config.with_metadata("client", CLIENT_NAME);
    match hostname::get() {
        Ok(host) => session_config.with_metadata("hostname", host.to_string_lossy()),
        Err(_) => session_config,
    }
}

/// File Upload Workflow
pub struct IngestWorkflow {
    config: Config,
    transport: Option<Arc<dyn PlatformTransport>>,
}

impl IngestWorkflow {
    /// Create a workflow that talks to the configured platform over HTTP
    pub fn new(config: Config) -> Self {
        Self {
            config,
            transport: None,
        }
    }

    /// Create a workflow with an injected transport
    pub fn with_transport(config: Config, transport: Arc<dyn PlatformTransport>) -> Self {
        Self {
            config,
            transport: Some(transport),
        }
    }

    fn transport(&self) -> Result<Arc<dyn PlatformTransport>> {
        if let Some(transport) = &self.transport {
            return Ok(transport.clone());
        }

        self.config.validate()?;
        let http = HttpTransport::new(
            self.config.base_url.clone(),
            self.config.api_key.clone(),
            self.config.timeouts(),
        )
        .context("Failed to create HTTP transport")?;
        Ok(Arc::new(RetryingTransport::new(
            http,
            self.config.retry_policy(),
        )))
    }

    /// Execute the upload workflow
    ///
    /// Returns `None` in dry-run mode.
    pub async fn execute(&self, args: Args) -> Result<Option<SessionReport>> {
        info!("Starting ingest uploader...");
        info!("Dry run: {}", args.dry_run);

        let sanitize = self.config.sanitize_entity_names;
        let entity_name = EntityNamingService::prepare(&args.entity, sanitize)?;

        if args.dry_run {
            dry_run(&entity_name, &args.files)?;
            return Ok(None);
        }

        let transport = self.transport()?;
        println!("✓ Using platform: {}", self.config.base_url);
        println!(
            "  Failure policy: {:?} | Concurrency: {}",
            self.config.failure_policy, self.config.max_concurrent_uploads
        );

        let requests: Vec<UploadRequest> = args
            .files
            .iter()
            .map(|path| UploadRequest::new(args.entity.as_str(), FileSource::from_path(path.clone())))
            .collect();

        let session_config = client_metadata(self.config.session_config());
        let (_, report) = with_session(transport, session_config, move |session| {
            Box::pin(async move {
                let results = session.upload_files(requests).await;
                Ok::<_, SessionError>(results)
            })
        })
        .await
        .context("Upload session failed")?;

        print_report(&report);
        Ok(Some(report))
    }
}

fn dry_run(entity_name: &str, files: &[std::path::PathBuf]) -> Result<()> {
    println!("✓ Dry-run mode (not actually uploading)");
    println!("  Would upload {} files to entity {}:", files.len(), entity_name);

    let mut missing = 0;
    for path in files {
        match describe_file(path) {
            Ok(len) => println!("    - {} ({} bytes)", path.display(), len),
            Err(e) => {
                missing += 1;
                println!("    ✗ {}: {}", path.display(), e);
            }
        }
    }

    if missing > 0 {
        bail!("{} of {} files cannot be read", missing, files.len());
    }
    Ok(())
}

fn describe_file(path: &Path) -> Result<u64> {
    let metadata = std::fs::metadata(path)
        .with_context(|| format!("Failed to read metadata for {}", path.display()))?;
    if !metadata.is_file() {
        bail!("not a regular file");
    }
    Ok(metadata.len())
}

fn print_report(report: &SessionReport) {
    if let Some(id) = &report.session_id {
        println!("✓ Session {} ({})", id, report.state);
    }
    for record in &report.records {
        match record.outcome {
            UploadOutcome::Succeeded => println!(
                "  ✓ {}/{} -> {}",
                record.entity_name,
                record.file_name,
                record.object_key.as_deref().unwrap_or("-")
            ),
            _ => println!(
                "  ✗ {}/{}: {}",
                record.entity_name,
                record.file_name,
                record.failure_reason.as_deref().unwrap_or("not attempted")
            ),
        }
    }
    println!(
        "✓ Uploaded {} files ({} failed)",
        report.succeeded_count(),
        report.failed_count()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn create_test_config() -> Config {
        Config {
            base_url: "https://ingest.example.com".to_string(),
            api_key: "secret".to_string(),
            ..Config::default()
        }
    }

    #[test]
    fn test_apply_args_overrides() {
        let mut config = create_test_config();
        let args = Args::parse_from([
            "ingest-uploader",
            "--base-url",
            "http://localhost:8080",
            "--fail-fast",
            "sales",
            "a.csv",
        ]);

        apply_args(&mut config, &args);

        assert_eq!(config.base_url, "http://localhost:8080");
        assert_eq!(config.failure_policy, FailurePolicy::FailFast);
    }

    #[test]
    fn test_apply_args_keeps_config() {
        let mut config = create_test_config();
        let args = Args::parse_from(["ingest-uploader", "sales", "a.csv"]);

        apply_args(&mut config, &args);

        assert_eq!(config.base_url, "https://ingest.example.com");
        assert_eq!(config.failure_policy, FailurePolicy::Continue);
    }

    #[test]
    fn test_client_metadata() {
        let config = client_metadata(SessionConfig::default());
        assert_eq!(config.metadata["client"], CLIENT_NAME);
        assert!(CLIENT_NAME.starts_with("ingest-uploader/"));
    }

    #[test]
    fn test_describe_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.csv");
        std::fs::write(&path, vec![b'x'; 200]).unwrap();

        assert_eq!(describe_file(&path).unwrap(), 200);
        assert!(describe_file(dir.path()).is_err());
        assert!(describe_file(&dir.path().join("missing.csv")).is_err());
    }

    #[tokio::test]
    async fn test_execute_without_credentials_fails() {
        let workflow = IngestWorkflow::new(Config::default());
        let args = Args::parse_from(["ingest-uploader", "sales", "a.csv"]);

        let err = workflow.execute(args).await.unwrap_err();
        assert!(err.to_string().contains("base_url"));
    }
}
