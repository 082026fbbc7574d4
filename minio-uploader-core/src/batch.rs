//! The upload batch: manifest → pre-flight → mc setup → sequential uploads.
//!
//! Every step before the upload loop is fail-fast: a bad manifest, a missing source
//! file, a failed `mc` install or a failed client configuration aborts the run before
//! anything is copied. The manifest is checked before `mc` is touched, so a broken
//! manifest never reaches the network.
//!
//! Inside the loop, failures are recorded and reported but never abort the batch; every
//! entry is attempted, in manifest order. Whether per-file failures should change the
//! exit status is left to the caller via [`RunReport::has_failures`].

use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{error, info};

use crate::client::{destination, ClientError, StorageClient};
use crate::config::StorageConfig;
use crate::install::{InstallError, McInstaller};
use crate::logger::RunLog;
use crate::manifest::{read_manifest, validate_sources, ManifestError, TransferEntry};

#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    #[error("failed to read manifest: {0}")]
    Manifest(#[source] ManifestError),
    #[error("source validation failed: {0}")]
    Validation(#[source] ManifestError),
    #[error("failed to install mc: {0}")]
    Install(#[from] InstallError),
    #[error("failed to configure mc: {0}")]
    Client(#[from] ClientError),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadFailure {
    /// 1-based position in the manifest's entry list.
    pub position: usize,
    pub source_path: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunReport {
    pub attempted: usize,
    pub succeeded: usize,
    pub failures: Vec<UploadFailure>,
}

impl RunReport {
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// Run the whole batch for `manifest`.
///
/// `connect` builds the storage client once `mc` is known to be present; it receives
/// the path of the executable to drive.
pub async fn run_batch<S, F>(
    manifest: &Path,
    installer: &McInstaller,
    config: &StorageConfig,
    connect: F,
    log: &mut RunLog,
) -> Result<RunReport, BatchError>
where
    S: StorageClient,
    F: FnOnce(PathBuf) -> S,
{
    log.write("Starting file upload...");
    let entries = prepare(manifest, log)?;

    let mc = match installer.ensure(log).await {
        Ok(path) => path,
        Err(e) => {
            log.write(format!("Failed to download mc: {e}"));
            return Err(e.into());
        }
    };

    let mut client = connect(mc);
    if let Err(e) = client.configure(log).await {
        log.write(format!("Configuration failed: {e}"));
        return Err(e.into());
    }

    let report = upload_all(&client, config, &entries, log).await;
    info!(
        attempted = report.attempted,
        succeeded = report.succeeded,
        failed = report.failures.len(),
        "Batch finished"
    );
    Ok(report)
}

/// Read and validate the manifest, logging the reason on failure.
pub fn prepare(manifest: &Path, log: &mut RunLog) -> Result<Vec<TransferEntry>, BatchError> {
    let entries = match read_manifest(manifest) {
        Ok(entries) => entries,
        Err(e) => {
            log.write(format!("Failed to read manifest: {e}"));
            return Err(BatchError::Manifest(e));
        }
    };
    if let Err(e) = validate_sources(&entries) {
        log.write(format!("Source validation failed: {e}"));
        return Err(BatchError::Validation(e));
    }
    log.write(format!(
        "Manifest {} lists {} file(s)",
        manifest.display(),
        entries.len()
    ));
    Ok(entries)
}

/// Upload every entry in order. Failures are logged and collected, never propagated.
pub async fn upload_all<S: StorageClient>(
    client: &S,
    config: &StorageConfig,
    entries: &[TransferEntry],
    log: &mut RunLog,
) -> RunReport {
    let total = entries.len();
    let mut report = RunReport::default();

    log.write("Uploading files...");
    log.separator();

    for (idx, entry) in entries.iter().enumerate() {
        let position = idx + 1;
        let dest = destination(config, &entry.target_path);
        log.write(format!(
            "[{position}/{total}] Uploading: {} -> {dest}",
            entry.source_path
        ));
        report.attempted += 1;

        match client.upload_file(&entry.source_path, &dest, log).await {
            Ok(outcome) => {
                report.succeeded += 1;
                log.write(format!(
                    "[{position}/{total}] OK {} ({:.2} MB)",
                    entry.source_path,
                    outcome.size_mb()
                ));
            }
            Err(e) => {
                error!(position, source = %entry.source_path, error = %e, "Upload failed");
                log.write(format!(
                    "[{position}/{total}] Upload failed {}: {e}",
                    entry.source_path
                ));
                report.failures.push(UploadFailure {
                    position,
                    source_path: entry.source_path.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }

    log.write("All files processed!");
    log.write(format!(
        "Succeeded: {}/{}, failed: {}",
        report.succeeded,
        report.attempted,
        report.failures.len()
    ));
    report
}
