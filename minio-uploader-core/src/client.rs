//! Facade over the `mc` command-line client.
//!
//! [`McClient`] owns the `mc` executable path and the [`StorageConfig`] and turns the
//! handful of operations the uploader needs into `mc` invocations through a
//! [`CommandRunner`]. It moves through `Unconfigured → Configured → Ready`: the alias is
//! registered, the server is reachable, and the bucket exists. Uploads are refused until
//! the client is `Ready`.
//!
//! [`StorageClient`] is the narrow trait the batch driver depends on, so the driver can
//! be tested against `MockStorageClient` without any subprocesses at all.

use async_trait::async_trait;
use std::path::PathBuf;
use tracing::{error, info, warn};

#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;

use crate::config::StorageConfig;
use crate::logger::RunLog;
use crate::runner::{render_command, CommandOutput, CommandRunner};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to configure mc alias\noutput: {output}")]
    Config { output: String },
    #[error("failed to connect to MinIO server {endpoint}\noutput: {output}")]
    Connectivity { endpoint: String, output: String },
    #[error("failed to create bucket {bucket}\noutput: {output}")]
    Bucket { bucket: String, output: String },
    #[error("upload failed\noutput: {output}")]
    Upload { output: String },
    #[error("failed to read file info for {path}: {source}")]
    Stat {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("mc client used before configuration completed")]
    NotReady,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Unconfigured,
    Configured,
    Ready,
}

/// What a successful upload reports back.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadOutcome {
    pub source_path: String,
    pub destination: String,
    pub size_bytes: u64,
    pub client_output: String,
}

impl UploadOutcome {
    pub fn size_mb(&self) -> f64 {
        self.size_bytes as f64 / (1024.0 * 1024.0)
    }
}

/// The operations the batch driver needs from object storage.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait StorageClient: Send + Sync {
    /// Register credentials, check the server is reachable and make sure the bucket
    /// exists.
    async fn configure(&mut self, log: &mut RunLog) -> Result<(), ClientError>;

    /// Check the bucket is listable, creating it if it is not.
    async fn ensure_bucket(&mut self, log: &mut RunLog) -> Result<(), ClientError>;

    /// Copy one local file to a full `<alias>/<bucket>/<key>` destination.
    async fn upload_file(
        &self,
        source_path: &str,
        destination: &str,
        log: &mut RunLog,
    ) -> Result<UploadOutcome, ClientError>;
}

pub struct McClient<R> {
    runner: R,
    mc: PathBuf,
    config: StorageConfig,
    state: ClientState,
}

impl<R: CommandRunner> McClient<R> {
    pub fn new(runner: R, mc: impl Into<PathBuf>, config: StorageConfig) -> Self {
        Self {
            runner,
            mc: mc.into(),
            config,
            state: ClientState::Unconfigured,
        }
    }

    pub fn state(&self) -> ClientState {
        self.state
    }

    async fn mc(&self, args: &[String]) -> Result<CommandOutput, ClientError> {
        self.runner
            .run(&self.mc, args)
            .await
            .map_err(|source| ClientError::Spawn {
                command: render_command(&self.mc, args),
                source,
            })
    }
}

#[async_trait]
impl<R: CommandRunner> StorageClient for McClient<R> {
    async fn configure(&mut self, log: &mut RunLog) -> Result<(), ClientError> {
        let cfg = &self.config;
        let alias_args = args([
            "alias",
            "set",
            cfg.alias.as_str(),
            cfg.endpoint.as_str(),
            cfg.access_key.as_str(),
            cfg.secret_key.as_str(),
        ]);
        let output = self.mc(&alias_args).await?;
        if !output.success {
            error!(alias = %cfg.alias, code = ?output.code, "mc alias set failed");
            return Err(ClientError::Config {
                output: output.combined,
            });
        }
        self.state = ClientState::Configured;
        log.write("mc configured");

        log.write(format!(
            "Testing connection to MinIO server ({})...",
            self.config.endpoint
        ));
        let output = self.mc(&args(["ls", self.config.alias.as_str()])).await?;
        if !output.success {
            error!(endpoint = %self.config.endpoint, code = ?output.code, "MinIO server unreachable");
            return Err(ClientError::Connectivity {
                endpoint: self.config.endpoint.clone(),
                output: output.combined,
            });
        }

        self.ensure_bucket(log).await?;

        log.write("Connected!");
        log.write(format!("MinIO server: {}", self.config.endpoint));
        log.write(format!("Bucket: {}", self.config.bucket));
        log.separator();
        info!(
            endpoint = %self.config.endpoint,
            bucket = %self.config.bucket,
            "mc client ready"
        );
        Ok(())
    }

    async fn ensure_bucket(&mut self, log: &mut RunLog) -> Result<(), ClientError> {
        let bucket_path = self.config.bucket_path();
        let listed = self.mc(&args(["ls", bucket_path.as_str()])).await?;
        if !listed.success {
            warn!(bucket = %bucket_path, "Bucket not listable, attempting to create it");
            let created = self.mc(&args(["mb", bucket_path.as_str()])).await?;
            if !created.success {
                error!(bucket = %bucket_path, code = ?created.code, "mc mb failed");
                return Err(ClientError::Bucket {
                    bucket: self.config.bucket.clone(),
                    output: created.combined,
                });
            }
            log.write(format!("Created bucket: {}", self.config.bucket));
        }
        if self.state == ClientState::Configured {
            self.state = ClientState::Ready;
        }
        Ok(())
    }

    async fn upload_file(
        &self,
        source_path: &str,
        destination: &str,
        log: &mut RunLog,
    ) -> Result<UploadOutcome, ClientError> {
        if self.state != ClientState::Ready {
            return Err(ClientError::NotReady);
        }

        let cp_args = args(["cp", source_path, destination]);
        log.write(format!("cmd: {}", render_command(&self.mc, &cp_args)));

        let output = self.mc(&cp_args).await?;
        if !output.success {
            error!(source = source_path, destination, code = ?output.code, "mc cp failed");
            return Err(ClientError::Upload {
                output: output.combined,
            });
        }

        let metadata = tokio::fs::metadata(source_path)
            .await
            .map_err(|source| ClientError::Stat {
                path: source_path.to_string(),
                source,
            })?;

        let outcome = UploadOutcome {
            source_path: source_path.to_string(),
            destination: destination.to_string(),
            size_bytes: metadata.len(),
            client_output: output.combined,
        };

        log.write("Upload succeeded");
        log.write(format!("Source: {}", outcome.source_path));
        log.write(format!("Destination: {}", outcome.destination));
        log.write(format!("Size: {:.2} MB", outcome.size_mb()));
        log.write(format!("mc output: {}", outcome.client_output));
        log.separator();
        info!(
            source = source_path,
            destination,
            size_bytes = outcome.size_bytes,
            "Uploaded file"
        );
        Ok(outcome)
    }
}

/// `<alias>/<bucket>/<key>` for a manifest target path.
///
/// Empty and `.` segments are dropped, so `/a//b/./c` lands at `a/b/c`. A target with
/// nothing left names the bucket itself. `\` is a path separator only on Windows;
/// elsewhere it is kept as part of the key.
pub fn destination(config: &StorageConfig, target: &str) -> String {
    let target = if cfg!(windows) {
        target.replace('\\', "/")
    } else {
        target.to_string()
    };
    let key = target
        .split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect::<Vec<_>>()
        .join("/");
    if key.is_empty() {
        config.bucket_path()
    } else {
        format!("{}/{}", config.bucket_path(), key)
    }
}

fn args<const N: usize>(parts: [&str; N]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}
