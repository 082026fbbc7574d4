//! Subprocess seam for the external `mc` client.
//!
//! Every interaction with `mc` goes through [`CommandRunner`], so the client facade and
//! the batch driver can be exercised against a mock that returns canned exit codes and
//! output instead of a real binary and a live server.

use async_trait::async_trait;
use std::io;
use std::path::Path;

#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;

/// Result of one completed subprocess call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    /// Exit code, `None` when the process was terminated by a signal.
    pub code: Option<i32>,
    /// stdout followed by stderr, lossily decoded.
    pub combined: String,
}

impl CommandOutput {
    pub fn ok(combined: impl Into<String>) -> Self {
        Self {
            success: true,
            code: Some(0),
            combined: combined.into(),
        }
    }

    pub fn failed(code: i32, combined: impl Into<String>) -> Self {
        Self {
            success: false,
            code: Some(code),
            combined: combined.into(),
        }
    }
}

/// Runs an external program to completion.
///
/// A non-zero exit is reported through [`CommandOutput::success`], not as an error;
/// `Err` means the process could not be spawned or awaited at all.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, program: &Path, args: &[String]) -> io::Result<CommandOutput>;
}

/// Production runner backed by `tokio::process`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessRunner;

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, program: &Path, args: &[String]) -> io::Result<CommandOutput> {
        tracing::debug!(program = %program.display(), ?args, "Spawning subprocess");
        let output = tokio::process::Command::new(program)
            .args(args)
            .output()
            .await
            .map_err(|e| {
                tracing::error!(error = ?e, program = %program.display(), "Failed to launch process");
                e
            })?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        let result = CommandOutput {
            success: output.status.success(),
            code: output.status.code(),
            combined,
        };
        tracing::debug!(
            program = %program.display(),
            success = result.success,
            code = ?result.code,
            "Subprocess finished"
        );
        Ok(result)
    }
}

/// Render a command line the way an operator would type it.
pub fn render_command(program: &Path, args: &[String]) -> String {
    let mut rendered = program.display().to_string();
    for arg in args {
        rendered.push(' ');
        rendered.push_str(arg);
    }
    rendered
}
