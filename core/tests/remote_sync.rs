//! Fetch/publish integration tests against real FTP and SFTP servers.
//!
//! Containers: `sitesync-ftp` on port 2121 and `sitesync-sftp` on port 2222.
//!
//! Requires: `docker compose -f tests/docker/docker-compose.yml up -d`
//! Skips gracefully if containers are not running.

mod common;

use std::time::Duration;

use common::{credentials, require_docker, unique_dir, PORT_FTP, PORT_SFTP};
use sitesync_core::config::{ConnectionRequest, Credentials, Protocol, SyncOptions};
use sitesync_core::errors::SyncError;
use sitesync_core::files::FetchedFile;
use sitesync_core::remote::{Connector, DirectoryStatus, NetworkConnector};
use sitesync_core::sync::{fetch_tree, publish_tree, WalkLimits};

fn site_files() -> Vec<FetchedFile> {
    vec![
        FetchedFile {
            name: "index.html".to_string(),
            content: "<!doctype html><h1>Hello</h1>".to_string(),
        },
        FetchedFile {
            name: "css/site.css".to_string(),
            content: "body { color: #333; }".to_string(),
        },
        FetchedFile {
            name: "js/app/main.js".to_string(),
            content: "console.log('héllo');".to_string(),
        },
        FetchedFile {
            name: ".well-known/x.html".to_string(),
            content: "<p>hidden dir</p>".to_string(),
        },
    ]
}

fn sorted(mut files: Vec<FetchedFile>) -> Vec<FetchedFile> {
    files.sort_by(|a, b| a.name.cmp(&b.name));
    files
}

/// Publish a fresh tree under `base`, fetch it back and compare.
fn round_trip(protocol: Protocol, port: u16, base: &str) {
    let connector = NetworkConnector;
    let files = site_files();

    let report = publish_tree(
        &connector,
        &credentials(protocol, port, base),
        &files,
        &SyncOptions::for_publish(),
    )
    .expect("publish should succeed");
    assert!(report.is_complete(), "publish failures: {:?}", report.failed);
    assert!(report
        .directories
        .iter()
        .any(|s| s.status == DirectoryStatus::Created));

    let fetched = fetch_tree(
        &connector,
        &credentials(protocol, port, base),
        &SyncOptions::for_fetch(),
        &WalkLimits::default(),
    )
    .expect("fetch should succeed");

    let prefix = base.trim_start_matches('/');
    let expected: Vec<FetchedFile> = files
        .into_iter()
        .map(|f| FetchedFile {
            name: format!("{prefix}/{}", f.name),
            content: f.content,
        })
        .collect();
    assert_eq!(sorted(fetched), sorted(expected));
}

#[test]
fn ftp_publish_then_fetch() {
    require_docker!(PORT_FTP);
    let base = format!("/{}", unique_dir("ftp-roundtrip"));
    round_trip(Protocol::Ftp, PORT_FTP, &base);
}

#[test]
fn sftp_publish_then_fetch() {
    require_docker!(PORT_SFTP);
    let base = format!("/upload/{}", unique_dir("sftp-roundtrip"));
    round_trip(Protocol::Sftp, PORT_SFTP, &base);
}

#[test]
fn sftp_republish_reports_existing_directories() {
    require_docker!(PORT_SFTP);
    let base = format!("/upload/{}", unique_dir("sftp-republish"));
    let creds = credentials(Protocol::Sftp, PORT_SFTP, &base);

    publish_tree(&NetworkConnector, &creds, &site_files(), &SyncOptions::for_publish())
        .expect("first publish should succeed");
    let report = publish_tree(&NetworkConnector, &creds, &site_files(), &SyncOptions::for_publish())
        .expect("second publish should succeed");

    assert!(report.is_complete());
    assert!(report
        .directories
        .iter()
        .all(|s| s.status == DirectoryStatus::Existed));
}

#[test]
fn ftp_wrong_password_is_a_connection_error() {
    require_docker!(PORT_FTP);
    let mut creds = credentials(Protocol::Ftp, PORT_FTP, "/");
    creds.password = "wrong".to_string();

    let err = NetworkConnector
        .connect(&creds, Duration::from_secs(5))
        .err()
        .expect("login should be rejected");
    assert!(matches!(err, SyncError::Connection(_)), "got {err:?}");
}

#[test]
fn sftp_wrong_password_is_a_connection_error() {
    require_docker!(PORT_SFTP);
    let mut creds = credentials(Protocol::Sftp, PORT_SFTP, "/");
    creds.password = "wrong".to_string();

    let err = NetworkConnector
        .connect(&creds, Duration::from_secs(5))
        .err()
        .expect("auth should be rejected");
    assert!(matches!(err, SyncError::Connection(_)), "got {err:?}");
}

#[test]
fn refused_connection_fails_fast() {
    // Nothing listens on port 1 locally; no container needed.
    let creds = Credentials::resolve(&ConnectionRequest {
        host: Some("127.0.0.1".to_string()),
        port: Some(1),
        ..Default::default()
    })
    .expect("credentials should resolve");

    let err = fetch_tree(
        &NetworkConnector,
        &creds,
        &SyncOptions::for_fetch(),
        &WalkLimits::default(),
    )
    .unwrap_err();
    assert!(matches!(err, SyncError::Connection(_)), "got {err:?}");
}
