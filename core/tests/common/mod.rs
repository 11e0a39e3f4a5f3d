//! Shared helpers for the sitesync core integration tests.
//!
//! The tests talk to real FTP and SFTP servers started from
//! `tests/docker/docker-compose.yml` and skip themselves when those
//! containers are not reachable.

// Each integration test is compiled as its own crate, so not every test file
// uses every function from this shared module.
#![allow(dead_code)]

use std::net::TcpStream;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use sitesync_core::config::{ConnectionRequest, Credentials, Protocol};

/// pure-ftpd container (passive ports 30000-30009).
pub const PORT_FTP: u16 = 2121;
/// OpenSSH SFTP-only container.
pub const PORT_SFTP: u16 = 2222;

pub const TEST_USER: &str = "testuser";
pub const TEST_PASSWORD: &str = "testpass";

/// Check if a TCP port is reachable on the given host.
pub fn is_port_reachable(host: &str, port: u16) -> bool {
    let addr = format!("{host}:{port}");
    if let Ok(addr) = addr.parse() {
        TcpStream::connect_timeout(&addr, Duration::from_secs(2)).is_ok()
    } else {
        false
    }
}

/// Skip the current test if a container is not reachable on the given port.
macro_rules! require_docker {
    ($port:expr) => {
        if !common::is_port_reachable("127.0.0.1", $port) {
            eprintln!(
                "SKIPPED: container not reachable on port {} \
                 (start with: cd tests/docker && docker compose up -d)",
                $port
            );
            return;
        }
    };
}
pub(crate) use require_docker;

/// Credentials for the test user against the local container.
pub fn credentials(protocol: Protocol, port: u16, path: &str) -> Credentials {
    Credentials::resolve(&ConnectionRequest {
        host: Some("127.0.0.1".to_string()),
        port: Some(port),
        username: Some(TEST_USER.to_string()),
        password: Some(TEST_PASSWORD.to_string()),
        path: Some(path.to_string()),
        protocol: Some(protocol),
    })
    .expect("test credentials should be valid")
}

/// A directory name that no earlier run has used.
pub fn unique_dir(prefix: &str) -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    format!("{prefix}-{}-{nanos}", std::process::id())
}
