//! Locating, and if necessary installing, the `mc` executable.
//!
//! Lookup order is the system search path first, then `<exe dir>/bin/mc` next to the
//! running program. When neither exists, [`McInstaller::ensure`] downloads the build for
//! the current platform into that local `bin` directory.

use futures::StreamExt;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{error, info};

use crate::logger::RunLog;

/// Overrides the platform download URL with a full URL to an `mc` binary.
pub const DOWNLOAD_URL_ENV: &str = "MC_DOWNLOAD_URL";

const LINUX_AMD64_URL: &str = "https://dl.min.io/client/mc/release/linux-amd64/mc";
const DARWIN_AMD64_URL: &str = "https://dl.min.io/client/mc/release/darwin-amd64/mc";
const WINDOWS_AMD64_URL: &str = "https://dl.min.io/client/mc/release/windows-amd64/mc.exe";

#[derive(Debug, thiserror::Error)]
pub enum InstallError {
    #[error("unsupported platform: {os}/{arch}")]
    UnsupportedPlatform { os: String, arch: String },
    #[error("download from {url} failed: {reason}")]
    Download { url: String, reason: String },
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Where an existing `mc` was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Located {
    System(PathBuf),
    Local(PathBuf),
}

impl Located {
    pub fn path(&self) -> &Path {
        match self {
            Located::System(p) | Located::Local(p) => p,
        }
    }
}

#[derive(Debug, Clone)]
pub struct McInstaller {
    bin_dir: PathBuf,
    search_path: Option<OsString>,
    download_url: Option<String>,
}

impl McInstaller {
    pub fn new(bin_dir: impl Into<PathBuf>) -> Self {
        Self {
            bin_dir: bin_dir.into(),
            search_path: std::env::var_os("PATH"),
            download_url: None,
        }
    }

    /// Installer rooted at `<dir of the running executable>/bin`, honouring
    /// [`DOWNLOAD_URL_ENV`].
    pub fn from_env() -> Self {
        let exe_dir = std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(Path::to_path_buf))
            .unwrap_or_else(|| PathBuf::from("."));
        Self::new(exe_dir.join("bin"))
            .with_download_url(std::env::var(DOWNLOAD_URL_ENV).ok().filter(|u| !u.is_empty()))
    }

    pub fn with_search_path(mut self, search_path: Option<OsString>) -> Self {
        self.search_path = search_path;
        self
    }

    pub fn with_download_url(mut self, url: Option<String>) -> Self {
        self.download_url = url;
        self
    }

    pub fn executable_name() -> &'static str {
        if cfg!(windows) {
            "mc.exe"
        } else {
            "mc"
        }
    }

    /// Where a downloaded copy lives.
    pub fn local_path(&self) -> PathBuf {
        self.bin_dir.join(Self::executable_name())
    }

    pub fn locate(&self) -> Option<Located> {
        if let Some(found) = self.search_system() {
            return Some(Located::System(found));
        }
        let local = self.local_path();
        local.is_file().then_some(Located::Local(local))
    }

    pub fn exists(&self) -> bool {
        self.locate().is_some()
    }

    /// The path commands should be run with: the located copy, or the local install
    /// location if nothing has been found yet.
    pub fn executable_path(&self) -> PathBuf {
        self.locate()
            .map(|l| l.path().to_path_buf())
            .unwrap_or_else(|| self.local_path())
    }

    /// Return a usable `mc`, downloading it when no copy is present.
    pub async fn ensure(&self, log: &mut RunLog) -> Result<PathBuf, InstallError> {
        match self.locate() {
            Some(Located::System(path)) => {
                log.write(format!("Found mc on the system path: {}", path.display()));
                Ok(path)
            }
            Some(Located::Local(path)) => {
                log.write(format!("Found mc in the local bin directory: {}", path.display()));
                Ok(path)
            }
            None => {
                log.write("mc not found, downloading...");
                self.install(log).await
            }
        }
    }

    /// Download `mc` into the local bin directory regardless of what is installed.
    pub async fn install(&self, log: &mut RunLog) -> Result<PathBuf, InstallError> {
        let url = match &self.download_url {
            Some(url) => url.clone(),
            None => download_url_for(std::env::consts::OS, std::env::consts::ARCH)?.to_string(),
        };
        let dest = self.local_path();

        tokio::fs::create_dir_all(&self.bin_dir)
            .await
            .map_err(|source| {
                error!(error = ?source, path = %self.bin_dir.display(), "Failed to create bin directory");
                InstallError::Io {
                    path: self.bin_dir.clone(),
                    source,
                }
            })?;

        // An existing copy is only replaced once the new one is complete.
        let partial = partial_path(&dest);
        log.write(format!("Downloading mc from {url}"));
        let bytes = download_to(&url, &partial).await?;
        make_executable(&partial).await?;
        tokio::fs::rename(&partial, &dest)
            .await
            .map_err(|source| {
                error!(error = ?source, path = %dest.display(), "Failed to move mc into place");
                InstallError::Io {
                    path: dest.clone(),
                    source,
                }
            })?;

        log.write(format!("mc downloaded to {}", dest.display()));
        info!(url = %url, path = %dest.display(), bytes, "Installed mc");
        Ok(dest)
    }

    fn search_system(&self) -> Option<PathBuf> {
        let search_path = self.search_path.as_ref()?;
        std::env::split_paths(search_path)
            .filter(|dir| !dir.as_os_str().is_empty())
            .map(|dir| dir.join(Self::executable_name()))
            .find(|candidate| is_executable(candidate))
    }
}

/// The release URL for an OS/arch pair as reported by `std::env::consts`.
pub fn download_url_for(os: &str, arch: &str) -> Result<&'static str, InstallError> {
    match (os, arch) {
        ("linux", "x86_64") => Ok(LINUX_AMD64_URL),
        ("macos", "x86_64") => Ok(DARWIN_AMD64_URL),
        ("windows", "x86_64") => Ok(WINDOWS_AMD64_URL),
        _ => {
            error!(os, arch, "No mc build available for this platform");
            Err(InstallError::UnsupportedPlatform {
                os: os.to_string(),
                arch: arch.to_string(),
            })
        }
    }
}

/// `mc` → `mc.part`, next to the final location.
fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().map(OsString::from).unwrap_or_default();
    name.push(".part");
    dest.with_file_name(name)
}

/// Stream the body at `url` into `dest`, returning the number of bytes written.
/// If this call created `dest` and then failed, the partial file is removed; a file
/// that was already there before the request succeeded is left alone.
pub async fn download_to(url: &str, dest: &Path) -> Result<u64, InstallError> {
    let mut created = false;
    let result = stream_to_file(url, dest, &mut created).await;
    if let Err(e) = &result {
        error!(error = %e, url, path = %dest.display(), "Download failed");
        if created {
            let _ = tokio::fs::remove_file(dest).await;
        }
    }
    result
}

async fn stream_to_file(url: &str, dest: &Path, created: &mut bool) -> Result<u64, InstallError> {
    let download_err = |reason: String| InstallError::Download {
        url: url.to_string(),
        reason,
    };
    let io_err = |source: std::io::Error| InstallError::Io {
        path: dest.to_path_buf(),
        source,
    };

    let response = reqwest::get(url)
        .await
        .map_err(|e| download_err(e.to_string()))?;
    let status = response.status();
    if !status.is_success() {
        return Err(download_err(format!("server responded with {status}")));
    }

    let mut file = tokio::fs::File::create(dest).await.map_err(io_err)?;
    *created = true;
    let mut body = response.bytes_stream();
    let mut written = 0u64;
    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|e| download_err(e.to_string()))?;
        file.write_all(&chunk).await.map_err(io_err)?;
        written += chunk.len() as u64;
    }
    file.flush().await.map_err(io_err)?;
    file.sync_all().await.map_err(io_err)?;
    Ok(written)
}

#[cfg(unix)]
async fn make_executable(path: &Path) -> Result<(), InstallError> {
    use std::os::unix::fs::PermissionsExt;
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
        .await
        .map_err(|source| InstallError::Io {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(not(unix))]
async fn make_executable(_path: &Path) -> Result<(), InstallError> {
    Ok(())
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
