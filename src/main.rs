//! Ingest Uploader
//!
//! ファイルをデータインジェストプラットフォームにアップロード

// coverage_nightly cfg が設定されている場合のみ coverage_attribute を有効化
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

use anyhow::Result;
use clap::Parser;

use ingest_uploader::adapter::config::Config;
use ingest_uploader::driver::workflow::apply_args;
use ingest_uploader::driver::{Args, IngestWorkflow};

#[cfg_attr(coverage_nightly, coverage(off))]
#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let args = Args::parse();

    // Load configuration (file, then environment, then command line)
    let mut config = Config::load_or_default(&args.config)?;
    config.apply_env();
    apply_args(&mut config, &args);

    // Create workflow with injected dependencies
    let workflow = IngestWorkflow::new(config);

    if let Some(report) = workflow.execute(args).await? {
        if !report.is_success() {
            std::process::exit(1);
        }
    }
    Ok(())
}
