mod common;

use common::quiet_log;
use minio_uploader_core::install::{download_to, download_url_for, InstallError, Located, McInstaller};
use std::fs;
use std::path::Path;
use tempfile::tempdir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Serve exactly one HTTP response on a loopback port and return the URL to fetch.
async fn serve_once(status_line: &'static str, body: &'static [u8]) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = [0u8; 4096];
        let _ = socket.read(&mut request).await;
        let head = format!(
            "HTTP/1.1 {status_line}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            body.len()
        );
        socket.write_all(head.as_bytes()).await.unwrap();
        socket.write_all(body).await.unwrap();
        let _ = socket.shutdown().await;
    });
    format!("http://{addr}/mc")
}

#[cfg(unix)]
fn make_executable(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) {}

#[test]
fn supported_platforms_map_to_release_urls() {
    assert_eq!(
        download_url_for("linux", "x86_64").unwrap(),
        "https://dl.min.io/client/mc/release/linux-amd64/mc"
    );
    assert_eq!(
        download_url_for("macos", "x86_64").unwrap(),
        "https://dl.min.io/client/mc/release/darwin-amd64/mc"
    );
    assert_eq!(
        download_url_for("windows", "x86_64").unwrap(),
        "https://dl.min.io/client/mc/release/windows-amd64/mc.exe"
    );
}

#[test]
fn other_platforms_are_unsupported() {
    for (os, arch) in [("freebsd", "x86_64"), ("linux", "aarch64"), ("macos", "aarch64")] {
        let err = download_url_for(os, arch).unwrap_err();
        assert!(
            matches!(&err, InstallError::UnsupportedPlatform { os: o, arch: a } if o == os && a == arch),
            "got {err:?}"
        );
    }
}

#[test]
fn nothing_is_located_in_an_empty_environment() {
    let dir = tempdir().unwrap();
    let installer = McInstaller::new(dir.path().join("bin")).with_search_path(None);
    assert_eq!(installer.locate(), None);
    assert!(!installer.exists());
    assert_eq!(installer.executable_path(), installer.local_path());
}

#[test]
fn local_bin_copy_is_found() {
    let dir = tempdir().unwrap();
    let bin = dir.path().join("bin");
    fs::create_dir_all(&bin).unwrap();
    let local = bin.join(McInstaller::executable_name());
    fs::write(&local, b"binary").unwrap();

    let installer = McInstaller::new(&bin).with_search_path(None);
    assert_eq!(installer.locate(), Some(Located::Local(local.clone())));
    assert!(installer.exists());
    assert_eq!(installer.executable_path(), local);
}

#[test]
fn system_path_takes_precedence_over_local_bin() {
    let dir = tempdir().unwrap();
    let bin = dir.path().join("bin");
    let system = dir.path().join("usr-bin");
    fs::create_dir_all(&bin).unwrap();
    fs::create_dir_all(&system).unwrap();
    fs::write(bin.join(McInstaller::executable_name()), b"local").unwrap();
    let system_mc = system.join(McInstaller::executable_name());
    fs::write(&system_mc, b"system").unwrap();
    make_executable(&system_mc);

    let search = std::env::join_paths([dir.path().join("empty"), system.clone()]).unwrap();
    let installer = McInstaller::new(&bin).with_search_path(Some(search));
    assert_eq!(installer.locate(), Some(Located::System(system_mc)));
}

#[cfg(unix)]
#[test]
fn non_executable_file_on_path_is_ignored() {
    let dir = tempdir().unwrap();
    let system = dir.path().join("usr-bin");
    fs::create_dir_all(&system).unwrap();
    fs::write(system.join("mc"), b"not executable").unwrap();

    let installer = McInstaller::new(dir.path().join("bin"))
        .with_search_path(Some(system.into_os_string()));
    assert_eq!(installer.locate(), None);
}

#[tokio::test]
async fn ensure_returns_existing_copy_without_downloading() {
    let dir = tempdir().unwrap();
    let mut log = quiet_log(&dir.path().join("logs"));
    let bin = dir.path().join("bin");
    fs::create_dir_all(&bin).unwrap();
    let local = bin.join(McInstaller::executable_name());
    fs::write(&local, b"binary").unwrap();

    let installer = McInstaller::new(&bin)
        .with_search_path(None)
        .with_download_url(Some("http://127.0.0.1:1/never".to_string()));
    assert_eq!(installer.ensure(&mut log).await.unwrap(), local);
}

#[tokio::test]
async fn ensure_downloads_into_local_bin_when_absent() {
    let dir = tempdir().unwrap();
    let mut log = quiet_log(&dir.path().join("logs"));
    let url = serve_once("200 OK", b"#!/bin/sh\necho mc\n").await;

    let bin = dir.path().join("tools").join("bin");
    let installer = McInstaller::new(&bin)
        .with_search_path(None)
        .with_download_url(Some(url));
    let path = installer.ensure(&mut log).await.expect("download should succeed");

    assert_eq!(path, bin.join(McInstaller::executable_name()));
    assert_eq!(fs::read(&path).unwrap(), b"#!/bin/sh\necho mc\n");
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }
    assert_eq!(installer.locate(), Some(Located::Local(path)));
}

#[tokio::test]
async fn error_status_is_download_error_and_leaves_no_file() {
    let dir = tempdir().unwrap();
    let mut log = quiet_log(&dir.path().join("logs"));
    let url = serve_once("404 Not Found", b"no such object").await;

    let installer = McInstaller::new(dir.path().join("bin"))
        .with_search_path(None)
        .with_download_url(Some(url.clone()));
    let err = installer.ensure(&mut log).await.unwrap_err();

    match err {
        InstallError::Download { url: failed, reason } => {
            assert_eq!(failed, url);
            assert!(reason.contains("404"), "reason was {reason}");
        }
        other => panic!("expected Download, got {other:?}"),
    }
    assert!(!installer.local_path().exists());
    let leftovers: Vec<_> = fs::read_dir(dir.path().join("bin")).unwrap().collect();
    assert!(leftovers.is_empty(), "bin directory holds {leftovers:?}");
}

#[tokio::test]
async fn unreachable_server_is_download_error() {
    let dir = tempdir().unwrap();
    let mut log = quiet_log(&dir.path().join("logs"));
    // Bind then drop, so the port is known to be closed.
    let addr = std::net::TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap();

    let installer = McInstaller::new(dir.path().join("bin"))
        .with_search_path(None)
        .with_download_url(Some(format!("http://{addr}/mc")));
    let err = installer.install(&mut log).await.unwrap_err();
    assert!(matches!(err, InstallError::Download { .. }), "got {err:?}");
}

#[tokio::test]
async fn failed_reinstall_keeps_the_working_copy() {
    let dir = tempdir().unwrap();
    let mut log = quiet_log(&dir.path().join("logs"));
    let bin = dir.path().join("bin");
    fs::create_dir_all(&bin).unwrap();
    let local = bin.join(McInstaller::executable_name());
    fs::write(&local, b"working mc").unwrap();
    let addr = std::net::TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap();

    let installer = McInstaller::new(&bin)
        .with_search_path(None)
        .with_download_url(Some(format!("http://{addr}/mc")));
    let err = installer.install(&mut log).await.unwrap_err();

    assert!(matches!(err, InstallError::Download { .. }), "got {err:?}");
    assert_eq!(fs::read(&local).unwrap(), b"working mc");
    assert_eq!(installer.locate(), Some(Located::Local(local)));
}

#[tokio::test]
async fn reinstall_replaces_the_existing_copy() {
    let dir = tempdir().unwrap();
    let mut log = quiet_log(&dir.path().join("logs"));
    let bin = dir.path().join("bin");
    fs::create_dir_all(&bin).unwrap();
    let local = bin.join(McInstaller::executable_name());
    fs::write(&local, b"old mc").unwrap();
    let url = serve_once("200 OK", b"new mc").await;

    let installer = McInstaller::new(&bin)
        .with_search_path(None)
        .with_download_url(Some(url));
    assert_eq!(installer.install(&mut log).await.unwrap(), local);

    assert_eq!(fs::read(&local).unwrap(), b"new mc");
    let names: Vec<_> = fs::read_dir(&bin)
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert_eq!(names, vec![local.file_name().unwrap().to_os_string()]);
}

#[tokio::test]
async fn download_error_does_not_remove_a_file_it_did_not_create() {
    let dir = tempdir().unwrap();
    let dest = dir.path().join("mc");
    fs::write(&dest, b"already here").unwrap();
    let url = serve_once("500 Internal Server Error", b"").await;

    let err = download_to(&url, &dest).await.unwrap_err();

    assert!(matches!(err, InstallError::Download { .. }), "got {err:?}");
    assert_eq!(fs::read(&dest).unwrap(), b"already here");
}
