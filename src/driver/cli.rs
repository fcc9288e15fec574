//! CLI Argument Parsing
//!
//! CLIの引数解析

use clap::Parser;
use std::path::PathBuf;

use crate::adapter::config::DEFAULT_CONFIG_PATH;

/// ファイルをインジェストプラットフォームにアップロードするCLI
#[derive(Parser, Debug, Clone)]
#[command(name = "ingest-uploader")]
#[command(about = "Upload files to the data ingestion platform in one session", long_about = None)]
pub struct Args {
    /// Entity (logical dataset) the files belong to
    pub entity: String,

    /// Files to upload
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Config file path
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: String,

    /// Platform base URL (overrides config and INGEST_BASE_URL)
    #[arg(long)]
    pub base_url: Option<String>,

    /// Abort the session on the first failed file
    #[arg(long)]
    pub fail_fast: bool,

    /// Dry run mode - validate files without contacting the platform
    #[arg(long)]
    pub dry_run: bool,
}
