use clap::error::ErrorKind;
use clap::Parser;
use minio_uploader::cli::{run, Cli, USAGE};
use minio_uploader_core::logger::{RunLog, DEFAULT_LOG_DIR};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    // Diagnostics go to stderr; stdout carries only the run transcript.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let parsed = Cli::try_parse();
    if let Err(e) = &parsed {
        if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) {
            e.exit();
        }
    }

    let log_dir = parsed
        .as_ref()
        .map(|cli| cli.log_dir.clone())
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_LOG_DIR));
    let mut log = match RunLog::open(&log_dir) {
        Ok(log) => log,
        Err(e) => {
            eprintln!("Failed to initialise run log: {e}");
            return ExitCode::FAILURE;
        }
    };

    let cli = match parsed {
        Ok(cli) => cli,
        Err(e) => {
            // clap's rendering carries its own usage block; keep only the reason.
            let rendered = e.to_string();
            log.write(USAGE);
            log.write(rendered.lines().next().unwrap_or_default());
            return ExitCode::FAILURE;
        }
    };

    let code = match run(&cli, &mut log).await {
        Ok(report) if cli.fails_run(&report) => {
            tracing::warn!(failed = report.failures.len(), "Exiting non-zero after upload failures");
            ExitCode::FAILURE
        }
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "minio-uploader exited with error");
            ExitCode::FAILURE
        }
    };

    log.write(format!("Log file saved at: {}", log.path().display()));
    log.close();
    code
}
