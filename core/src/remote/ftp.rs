//! Plain FTP adapter built on `suppaftp`'s blocking client.
//!
//! Listings come from `LIST` and are parsed with `suppaftp::list::File`,
//! which understands both UNIX and DOS style lines. `LIST -a` is tried
//! first so dot-entries are not hidden. Directory chains are
//! ensured by changing into each prefix and creating it when that fails.

use std::io::Cursor;
use std::net::TcpStream;
use std::time::Duration;

use suppaftp::list::File;
use suppaftp::types::FileType;
use suppaftp::{FtpError, FtpStream};
use tracing::debug;

use crate::config::{Credentials, Protocol};
use crate::errors::{FileError, SyncError};
use crate::files::path::{ancestor_chain, join_remote};
use crate::files::{EntryKind, RemoteEntry};

use super::{connect_tcp, DirectoryStatus, DirectoryStep, RemoteFs};

/// A logged-in FTP control connection in binary transfer mode.
pub struct FtpFs {
    stream: FtpStream,
    /// Whether the server still accepts `LIST -a`.
    list_hidden: bool,
}

impl FtpFs {
    /// Connect, log in and switch to binary mode.
    ///
    /// `timeout` bounds the TCP connect and each read or write of the
    /// greeting, login and `TYPE` exchange.
    pub fn connect(credentials: &Credentials, timeout: Duration) -> Result<Self, SyncError> {
        let tcp = connect_tcp(credentials, timeout)?;
        set_socket_timeout(&tcp, Some(timeout))?;
        let mut stream = FtpStream::connect_with_stream(tcp).map_err(|e| {
            SyncError::Connection(format!(
                "FTP greeting from {} failed: {e}",
                credentials.address()
            ))
        })?;

        if let Err(e) = stream.login(credentials.username.as_str(), credentials.password.as_str())
        {
            let _ = stream.quit();
            return Err(SyncError::Connection(format!("FTP login failed: {e}")));
        }
        if let Err(e) = stream.transfer_type(FileType::Binary) {
            let _ = stream.quit();
            return Err(SyncError::Connection(format!(
                "FTP binary mode rejected: {e}"
            )));
        }
        // Setup is done; transfers are not bound by the connect budget.
        if let Err(e) = set_socket_timeout(stream.get_ref(), None) {
            let _ = stream.quit();
            return Err(e);
        }

        debug!("FTP connected to {}", credentials.address());
        Ok(Self {
            stream,
            list_hidden: true,
        })
    }

    fn list_lines(&mut self, dir: &str) -> Result<Vec<String>, FileError> {
        if self.list_hidden {
            match self.stream.list(Some(list_all_arg(dir).as_str())) {
                Ok(lines) => return Ok(lines),
                Err(FtpError::UnexpectedResponse(_)) => {
                    debug!("LIST -a {dir} rejected, retrying with plain LIST");
                    let lines = self
                        .stream
                        .list(Some(dir))
                        .map_err(|e| map_ftp_error(e, "LIST", dir))?;
                    // Plain LIST works where -a did not: stop asking for it.
                    self.list_hidden = false;
                    return Ok(lines);
                }
                Err(e) => return Err(map_ftp_error(e, "LIST", dir)),
            }
        }
        self.stream
            .list(Some(dir))
            .map_err(|e| map_ftp_error(e, "LIST", dir))
    }
}

fn set_socket_timeout(tcp: &TcpStream, timeout: Option<Duration>) -> Result<(), SyncError> {
    tcp.set_read_timeout(timeout)
        .and_then(|()| tcp.set_write_timeout(timeout))
        .map_err(|e| SyncError::Connection(format!("Failed to set FTP socket timeout: {e}")))
}

/// `LIST` argument that also asks for dot-entries, which many servers hide
/// by default.
fn list_all_arg(dir: &str) -> String {
    format!("-a {dir}")
}

fn map_ftp_error(e: FtpError, op: &str, path: &str) -> FileError {
    FileError::OperationFailed(format!("{op} {path}: {e}"))
}

fn classify(file: &File) -> EntryKind {
    if file.is_directory() {
        EntryKind::Directory
    } else if file.is_symlink() {
        EntryKind::Symlink
    } else if file.is_file() {
        EntryKind::File
    } else {
        EntryKind::Other
    }
}

/// Turn raw `LIST` lines into entries, dropping `.`/`..` and lines that do
/// not describe a file (such as the `total N` header).
fn parse_listing(dir: &str, lines: &[String]) -> Vec<RemoteEntry> {
    let mut entries = Vec::with_capacity(lines.len());
    for line in lines {
        let file = match line.parse::<File>() {
            Ok(f) => f,
            Err(_) => {
                debug!("Skipping unparsable LIST line in {dir}: {line:?}");
                continue;
            }
        };
        let name = file.name();
        if name == "." || name == ".." {
            continue;
        }
        entries.push(RemoteEntry {
            name: name.to_string(),
            full_path: join_remote(dir, name),
            kind: classify(&file),
        });
    }
    entries
}

impl RemoteFs for FtpFs {
    fn protocol(&self) -> Protocol {
        Protocol::Ftp
    }

    fn list(&mut self, dir: &str) -> Result<Vec<RemoteEntry>, FileError> {
        let lines = self.list_lines(dir)?;
        Ok(parse_listing(dir, &lines))
    }

    fn download(&mut self, path: &str) -> Result<Vec<u8>, FileError> {
        self.stream
            .retr_as_buffer(path)
            .map(Cursor::into_inner)
            .map_err(|e| map_ftp_error(e, "RETR", path))
    }

    fn upload(&mut self, path: &str, data: &[u8]) -> Result<(), FileError> {
        let mut reader = Cursor::new(data);
        self.stream
            .put_file(path, &mut reader)
            .map(|_| ())
            .map_err(|e| map_ftp_error(e, "STOR", path))
    }

    fn ensure_directory_chain(&mut self, dir: &str) -> Vec<DirectoryStep> {
        let mut steps = Vec::new();
        for prefix in ancestor_chain(dir) {
            let status = if self.stream.cwd(prefix.as_str()).is_ok() {
                DirectoryStatus::Existed
            } else {
                match self.stream.mkdir(prefix.as_str()) {
                    Ok(()) => DirectoryStatus::Created,
                    Err(e) => DirectoryStatus::Failed(e.to_string()),
                }
            };
            // Nothing below a directory that could not be created can exist.
            let failed = matches!(status, DirectoryStatus::Failed(_));
            steps.push(DirectoryStep::new(prefix, status));
            if failed {
                break;
            }
        }
        steps
    }

    fn disconnect(&mut self) -> Result<(), FileError> {
        self.stream
            .quit()
            .map_err(|e| FileError::OperationFailed(format!("QUIT: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::net::TcpListener;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Instant;

    use super::*;
    use crate::config::ConnectionRequest;
    use crate::remote::{Connector, NetworkConnector};

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parses_unix_listing() {
        let raw = lines(&[
            "total 12",
            "drwxr-xr-x    2 ftp      ftp          4096 Jan 01 12:00 .",
            "drwxr-xr-x    3 ftp      ftp          4096 Jan 01 12:00 ..",
            "-rw-r--r--    1 ftp      ftp           120 Jan 01 12:00 index.html",
            "drwxr-xr-x    2 ftp      ftp          4096 Jan 01 12:00 css",
            "lrwxrwxrwx    1 ftp      ftp            10 Jan 01 12:00 current -> index.html",
        ]);
        let entries = parse_listing("/public_html", &raw);
        assert_eq!(entries.len(), 3);

        assert_eq!(entries[0].name, "index.html");
        assert_eq!(entries[0].full_path, "/public_html/index.html");
        assert_eq!(entries[0].kind, EntryKind::File);

        assert_eq!(entries[1].name, "css");
        assert_eq!(entries[1].kind, EntryKind::Directory);

        assert_eq!(entries[2].kind, EntryKind::Symlink);
    }

    #[test]
    fn parses_dos_listing() {
        let raw = lines(&[
            "04-27-20  10:09PM       <DIR>          assets",
            "04-27-20  10:09PM                 1024 site.css",
        ]);
        let entries = parse_listing("/", &raw);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].full_path, "/assets");
        assert_eq!(entries[0].kind, EntryKind::Directory);
        assert_eq!(entries[1].full_path, "/site.css");
        assert_eq!(entries[1].kind, EntryKind::File);
    }

    #[test]
    fn keeps_dot_entries() {
        let raw = lines(&[
            "drwxr-xr-x    2 ftp      ftp          4096 Jan 01 12:00 .",
            "drwxr-xr-x    3 ftp      ftp          4096 Jan 01 12:00 ..",
            "drwxr-xr-x    2 ftp      ftp          4096 Jan 01 12:00 .well-known",
            "-rw-r--r--    1 ftp      ftp            42 Jan 01 12:00 .app.js",
        ]);
        let entries = parse_listing("/www", &raw);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].full_path, "/www/.well-known");
        assert_eq!(entries[0].kind, EntryKind::Directory);
        assert_eq!(entries[1].full_path, "/www/.app.js");
        assert_eq!(entries[1].kind, EntryKind::File);
    }

    #[test]
    fn list_asks_for_hidden_entries() {
        assert_eq!(list_all_arg("/public_html"), "-a /public_html");
    }

    #[test]
    fn empty_listing() {
        assert!(parse_listing("/", &[]).is_empty());
    }

    fn local_credentials(port: u16) -> Credentials {
        Credentials::resolve(&ConnectionRequest {
            host: Some("127.0.0.1".to_string()),
            port: Some(port),
            protocol: Some(Protocol::Ftp),
            ..Default::default()
        })
        .unwrap()
    }

    /// Accept one client, optionally send `greeting`, then stay silent until
    /// released.
    fn stalled_server(greeting: Option<&'static str>) -> (u16, mpsc::Sender<()>, thread::JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let (release, hold) = mpsc::channel::<()>();
        let server = thread::spawn(move || {
            let (mut socket, _) = listener.accept().unwrap();
            if let Some(greeting) = greeting {
                socket.write_all(greeting.as_bytes()).unwrap();
            }
            let _ = hold.recv();
        });
        (port, release, server)
    }

    #[test]
    fn silent_server_times_out_waiting_for_greeting() {
        let (port, release, server) = stalled_server(None);

        let started = Instant::now();
        let result = NetworkConnector.connect(&local_credentials(port), Duration::from_secs(1));
        let elapsed = started.elapsed();
        release.send(()).unwrap();
        server.join().unwrap();

        match result {
            Err(SyncError::Connection(msg)) => assert!(msg.contains("greeting"), "got {msg}"),
            Err(other) => panic!("expected connection error, got {other:?}"),
            Ok(_) => panic!("connect to a silent server succeeded"),
        }
        assert!(elapsed < Duration::from_secs(5), "took {elapsed:?}");
    }

    #[test]
    fn stalled_login_times_out() {
        let (port, release, server) = stalled_server(Some("220 ready\r\n"));

        let started = Instant::now();
        let result = FtpFs::connect(&local_credentials(port), Duration::from_secs(1));
        let elapsed = started.elapsed();
        release.send(()).unwrap();
        server.join().unwrap();

        match result {
            Err(SyncError::Connection(msg)) => assert!(msg.contains("login"), "got {msg}"),
            Err(other) => panic!("expected connection error, got {other:?}"),
            Ok(_) => panic!("login against a stalled server succeeded"),
        }
        assert!(elapsed < Duration::from_secs(5), "took {elapsed:?}");
    }
}
