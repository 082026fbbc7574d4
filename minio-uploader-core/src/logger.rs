//! The run transcript: every operator-facing line goes to the console and to a log file.
//!
//! A [`RunLog`] is created once per process run and passed by `&mut` to whatever needs
//! to report progress. Each line is prefixed with `[YYYY-MM-DD HH:MM:SS]`, written to the
//! console, appended to the file and synced before [`RunLog::write`] returns, so the file
//! is complete even if the process is killed mid-batch.
//!
//! Diagnostic `tracing` events are separate from the transcript; each transcript line is
//! additionally emitted at `info` level under the `transcript` target.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

pub const DEFAULT_LOG_DIR: &str = "logs";
const FILE_PREFIX: &str = "minio_upload_";

#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("failed to create log file {path}: {source}")]
    Setup {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

pub struct RunLog {
    console: Box<dyn Write + Send>,
    file: Option<File>,
    path: PathBuf,
}

impl RunLog {
    /// Open a fresh log file under `dir`, mirroring to stdout.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, LogError> {
        Self::open_with_console(dir, Box::new(io::stdout()))
    }

    /// Like [`RunLog::open`] but mirrors to the given console sink.
    pub fn open_with_console(
        dir: impl AsRef<Path>,
        console: Box<dyn Write + Send>,
    ) -> Result<Self, LogError> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).map_err(|source| {
            tracing::error!(error = ?source, path = %dir.display(), "Failed to create log directory");
            LogError::Setup {
                path: dir.to_path_buf(),
                source,
            }
        })?;

        let stamp = chrono::Local::now().format("%Y-%m-%d_%H-%M-%S").to_string();
        let (file, path) = create_unique(dir, &stamp)?;
        tracing::info!(path = %path.display(), "Opened run log");

        Ok(Self {
            console,
            file: Some(file),
            path,
        })
    }

    /// Write one timestamped entry to the console and the log file.
    pub fn write(&mut self, message: impl AsRef<str>) {
        let message = message.as_ref().trim_end_matches('\n');
        let stamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
        let line = format!("[{stamp}] {message}\n");

        tracing::info!(target: "transcript", "{message}");

        if let Err(e) = self
            .console
            .write_all(line.as_bytes())
            .and_then(|_| self.console.flush())
        {
            tracing::error!(error = ?e, "Failed to write transcript line to console");
        }

        if let Some(file) = self.file.as_mut() {
            if let Err(e) = file.write_all(line.as_bytes()).and_then(|_| file.sync_data()) {
                tracing::error!(error = ?e, path = %self.path.display(), "Failed to write transcript line to log file");
            }
        }
    }

    /// Write a horizontal rule, used between upload blocks.
    pub fn separator(&mut self) {
        self.write("-".repeat(50));
    }

    /// Release the file handle. Further writes only reach the console.
    pub fn close(&mut self) {
        if let Some(file) = self.file.take() {
            if let Err(e) = file.sync_all() {
                tracing::error!(error = ?e, path = %self.path.display(), "Failed to sync log file on close");
            }
            tracing::debug!(path = %self.path.display(), "Closed run log");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.file.is_none()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLog {
    fn drop(&mut self) {
        self.close();
    }
}

// Two runs started within the same second get `_1`, `_2`, ... suffixes.
fn create_unique(dir: &Path, stamp: &str) -> Result<(File, PathBuf), LogError> {
    let mut attempt = 0u32;
    loop {
        let name = if attempt == 0 {
            format!("{FILE_PREFIX}{stamp}.log")
        } else {
            format!("{FILE_PREFIX}{stamp}_{attempt}.log")
        };
        let path = dir.join(name);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => return Ok((file, path)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => attempt += 1,
            Err(source) => {
                tracing::error!(error = ?source, path = %path.display(), "Failed to create log file");
                return Err(LogError::Setup { path, source });
            }
        }
    }
}
