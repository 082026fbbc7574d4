//! Command-line surface for minio-uploader.
//!
//! All behaviour lives in [`minio_uploader_core`]; this module parses arguments, wires
//! the production `mc` client and reports the outcome. [`run`] is separate from `main`
//! so tests can drive a whole batch in-process.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use minio_uploader_core::batch::{run_batch, RunReport};
use minio_uploader_core::client::McClient;
use minio_uploader_core::config::StorageConfig;
use minio_uploader_core::install::McInstaller;
use minio_uploader_core::logger::{RunLog, DEFAULT_LOG_DIR};
use minio_uploader_core::runner::ProcessRunner;

pub const USAGE: &str = "Usage: minio-uploader <paths.txt>";

/// Upload the files listed in a manifest to a MinIO bucket using mc.
#[derive(Parser, Debug)]
#[clap(
    name = "minio-uploader",
    version,
    about = "Upload the files listed in a manifest to a MinIO bucket using mc"
)]
pub struct Cli {
    /// Manifest with one `id;source;target` entry per line
    pub manifest: PathBuf,

    /// Directory the run log is written to
    #[clap(long, default_value = DEFAULT_LOG_DIR)]
    pub log_dir: PathBuf,

    /// Exit non-zero when any individual upload failed
    #[clap(long)]
    pub fail_on_error: bool,
}

impl Cli {
    /// Whether the finished batch should make the process exit non-zero.
    pub fn fails_run(&self, report: &RunReport) -> bool {
        self.fail_on_error && report.has_failures()
    }
}

/// Run one batch against the manifest named by `cli`, logging to `log`.
pub async fn run(cli: &Cli, log: &mut RunLog) -> Result<RunReport> {
    tracing::info!(manifest = %cli.manifest.display(), "run_started");

    let config = StorageConfig::from_env();
    let installer = McInstaller::from_env();

    let connect = |mc: PathBuf| McClient::new(ProcessRunner, mc, config.clone());
    let report = match run_batch(&cli.manifest, &installer, &config, connect, log).await {
        Ok(report) => report,
        Err(e) => {
            tracing::error!(error = %e, "Batch aborted");
            return Err(anyhow::Error::new(e));
        }
    };

    match serde_json::to_string_pretty(&report) {
        Ok(json) => tracing::debug!(json = %json, "Run report"),
        Err(e) => tracing::error!(error = ?e, "Failed to serialise run report"),
    }
    Ok(report)
}
