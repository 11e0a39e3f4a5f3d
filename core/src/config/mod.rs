//! Per-request connection settings and transfer options.
//!
//! [`ConnectionRequest`] is the loosely-typed shape received from callers;
//! [`Credentials::resolve()`] turns it into a validated, fully-defaulted
//! [`Credentials`] value that lives for exactly one connect/operate/disconnect
//! cycle.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};

use crate::errors::SyncError;

/// Ports that imply SFTP when no protocol is given explicitly.
pub const SFTP_PORTS: [u16; 2] = [22, 8010];

/// Default connect timeout for fetch operations.
pub const FETCH_CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Default connect timeout for publish operations.
pub const PUBLISH_CONNECT_TIMEOUT: Duration = Duration::from_secs(20);

/// Transfer protocol spoken to the remote host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Ftp,
    Sftp,
}

impl Protocol {
    /// Well-known port for the protocol.
    pub fn default_port(self) -> u16 {
        match self {
            Self::Ftp => 21,
            Self::Sftp => 22,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ftp => "ftp",
            Self::Sftp => "sftp",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ftp => f.write_str("FTP"),
            Self::Sftp => f.write_str("SFTP"),
        }
    }
}

/// Pick the protocol from an explicit flag or the port.
///
/// An explicit `sftp` always wins. Otherwise port 22 or 8010 selects SFTP
/// and everything else (including no port at all) selects FTP.
pub fn select_protocol(explicit: Option<Protocol>, port: Option<u16>) -> Protocol {
    if explicit == Some(Protocol::Sftp) {
        return Protocol::Sftp;
    }
    match port {
        Some(p) if SFTP_PORTS.contains(&p) => Protocol::Sftp,
        _ => Protocol::Ftp,
    }
}

/// Port to connect to: the given one, or 22 for an explicit `sftp`
/// request and 21 otherwise.
pub fn resolve_port(explicit: Option<Protocol>, port: Option<u16>) -> u16 {
    match port {
        Some(p) if p != 0 => p,
        _ if explicit == Some(Protocol::Sftp) => Protocol::Sftp.default_port(),
        _ => Protocol::Ftp.default_port(),
    }
}

/// Connection fields as they arrive in a request body.
///
/// Every field is optional so that validation can report a missing host as
/// an input error instead of a deserialization failure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionRequest {
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default, deserialize_with = "deserialize_port")]
    pub port: Option<u16>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub protocol: Option<Protocol>,
}

/// Accepts a port as a JSON number or a numeric string. Zero, `null` and the
/// empty string mean "not given".
fn deserialize_port<'de, D>(deserializer: D) -> Result<Option<u16>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum PortValue {
        Number(u64),
        Text(String),
    }

    let value = Option::<PortValue>::deserialize(deserializer)?;
    let port = match value {
        None => return Ok(None),
        Some(PortValue::Number(n)) => n,
        Some(PortValue::Text(s)) => {
            let s = s.trim();
            if s.is_empty() {
                return Ok(None);
            }
            s.parse::<u64>()
                .map_err(|_| serde::de::Error::custom(format!("invalid port: {s}")))?
        }
    };
    match port {
        0 => Ok(None),
        p => u16::try_from(p)
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("port out of range: {p}"))),
    }
}

/// Validated connection settings for a single operation.
///
/// Never persisted. The password is excluded from `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub base_path: String,
    pub protocol: Protocol,
}

impl Credentials {
    /// Validate a request and fill in defaults.
    pub fn resolve(request: &ConnectionRequest) -> Result<Self, SyncError> {
        let host = request.host.as_deref().unwrap_or("").trim();
        if host.is_empty() {
            return Err(SyncError::Input("host is required".to_string()));
        }

        let port = resolve_port(request.protocol, request.port);
        let protocol = select_protocol(request.protocol, Some(port));
        let base_path = request
            .path
            .as_deref()
            .filter(|p| !p.is_empty())
            .unwrap_or("/")
            .to_string();

        Ok(Self {
            host: host.to_string(),
            port,
            username: request.username.clone().unwrap_or_default(),
            password: request.password.clone().unwrap_or_default(),
            base_path,
            protocol,
        })
    }

    /// `host:port` for socket resolution.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// One-line description safe for logs: secrets are reduced to whether
    /// they were provided.
    pub fn log_summary(&self) -> String {
        format!(
            "host={} port={} protocol={} path={} username={} password={}",
            self.host,
            self.port,
            self.protocol.as_str(),
            self.base_path,
            presence(&self.username),
            presence(&self.password),
        )
    }
}

fn presence(value: &str) -> &'static str {
    if value.is_empty() {
        "(empty)"
    } else {
        "(provided)"
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &presence(&self.username))
            .field("password", &presence(&self.password))
            .field("base_path", &self.base_path)
            .field("protocol", &self.protocol)
            .finish()
    }
}

/// What to do when one file of a publish batch fails to upload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Record the failure and keep uploading the remaining files.
    #[default]
    Continue,
    /// Stop at the first failure.
    Abort,
}

/// Knobs for a single fetch or publish.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Lowercase file extensions (without the dot) that a fetch keeps.
    pub extensions: Vec<String>,
    pub connect_timeout: Duration,
    pub failure_policy: FailurePolicy,
}

impl SyncOptions {
    pub fn for_fetch() -> Self {
        Self {
            connect_timeout: FETCH_CONNECT_TIMEOUT,
            ..Self::default()
        }
    }

    pub fn for_publish() -> Self {
        Self {
            connect_timeout: PUBLISH_CONNECT_TIMEOUT,
            ..Self::default()
        }
    }
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            extensions: default_extensions(),
            connect_timeout: FETCH_CONNECT_TIMEOUT,
            failure_policy: FailurePolicy::default(),
        }
    }
}

/// Text asset extensions fetched by default.
pub fn default_extensions() -> Vec<String> {
    ["html", "htm", "css", "js"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(value: serde_json::Value) -> ConnectionRequest {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn sftp_ports_select_sftp() {
        assert_eq!(select_protocol(None, Some(22)), Protocol::Sftp);
        assert_eq!(select_protocol(None, Some(8010)), Protocol::Sftp);
    }

    #[test]
    fn other_ports_select_ftp() {
        assert_eq!(select_protocol(None, Some(21)), Protocol::Ftp);
        assert_eq!(select_protocol(None, Some(2121)), Protocol::Ftp);
        assert_eq!(select_protocol(None, None), Protocol::Ftp);
    }

    #[test]
    fn explicit_sftp_wins_over_port() {
        assert_eq!(select_protocol(Some(Protocol::Sftp), Some(21)), Protocol::Sftp);
    }

    #[test]
    fn explicit_ftp_does_not_override_sftp_port() {
        assert_eq!(select_protocol(Some(Protocol::Ftp), Some(22)), Protocol::Sftp);
    }

    #[test]
    fn default_ports() {
        assert_eq!(resolve_port(None, None), 21);
        assert_eq!(resolve_port(Some(Protocol::Ftp), None), 21);
        assert_eq!(resolve_port(Some(Protocol::Sftp), None), 22);
        assert_eq!(resolve_port(Some(Protocol::Sftp), Some(0)), 22);
        assert_eq!(resolve_port(None, Some(2222)), 2222);
    }

    #[test]
    fn port_accepts_number_and_string() {
        assert_eq!(request(serde_json::json!({"port": 22})).port, Some(22));
        assert_eq!(request(serde_json::json!({"port": "8010"})).port, Some(8010));
        assert_eq!(request(serde_json::json!({"port": ""})).port, None);
        assert_eq!(request(serde_json::json!({"port": null})).port, None);
        assert_eq!(request(serde_json::json!({"port": 0})).port, None);
        assert_eq!(request(serde_json::json!({})).port, None);
    }

    #[test]
    fn port_rejects_garbage() {
        let err = serde_json::from_value::<ConnectionRequest>(serde_json::json!({"port": "abc"}));
        assert!(err.is_err());
        let err = serde_json::from_value::<ConnectionRequest>(serde_json::json!({"port": 70000}));
        assert!(err.is_err());
    }

    #[test]
    fn protocol_rejects_unknown_values() {
        let err =
            serde_json::from_value::<ConnectionRequest>(serde_json::json!({"protocol": "ftps"}));
        assert!(err.is_err());
    }

    #[test]
    fn resolve_requires_host() {
        let err = Credentials::resolve(&request(serde_json::json!({"host": "   "}))).unwrap_err();
        assert!(err.is_client_error());
        assert_eq!(err.to_string(), "host is required");

        let err = Credentials::resolve(&ConnectionRequest::default()).unwrap_err();
        assert!(err.is_client_error());
    }

    #[test]
    fn resolve_applies_defaults() {
        let creds = Credentials::resolve(&request(serde_json::json!({"host": " example.com "})))
            .unwrap();
        assert_eq!(creds.host, "example.com");
        assert_eq!(creds.port, 21);
        assert_eq!(creds.protocol, Protocol::Ftp);
        assert_eq!(creds.base_path, "/");
        assert_eq!(creds.username, "");
        assert_eq!(creds.password, "");
        assert_eq!(creds.address(), "example.com:21");
    }

    #[test]
    fn resolve_selects_sftp_from_port() {
        let creds = Credentials::resolve(&request(serde_json::json!({
            "host": "h", "port": "22", "username": "u", "password": "p", "path": "/www"
        })))
        .unwrap();
        assert_eq!(creds.protocol, Protocol::Sftp);
        assert_eq!(creds.port, 22);
        assert_eq!(creds.base_path, "/www");
    }

    #[test]
    fn resolve_explicit_sftp_defaults_to_port_22() {
        let creds = Credentials::resolve(&request(serde_json::json!({
            "host": "h", "protocol": "sftp"
        })))
        .unwrap();
        assert_eq!(creds.protocol, Protocol::Sftp);
        assert_eq!(creds.port, 22);
    }

    #[test]
    fn debug_and_summary_hide_secrets() {
        let creds = Credentials::resolve(&request(serde_json::json!({
            "host": "h", "username": "deploy", "password": "hunter2"
        })))
        .unwrap();
        let debug = format!("{creds:?}");
        assert!(!debug.contains("hunter2"));
        assert!(!debug.contains("deploy"));
        assert!(debug.contains("(provided)"));

        let summary = creds.log_summary();
        assert!(!summary.contains("hunter2"));
        assert!(summary.contains("password=(provided)"));
    }

    #[test]
    fn summary_marks_empty_password() {
        let creds = Credentials::resolve(&request(serde_json::json!({"host": "h"}))).unwrap();
        assert!(creds.log_summary().contains("password=(empty)"));
    }

    #[test]
    fn option_timeouts() {
        assert_eq!(SyncOptions::for_fetch().connect_timeout, Duration::from_secs(15));
        assert_eq!(SyncOptions::for_publish().connect_timeout, Duration::from_secs(20));
        assert_eq!(SyncOptions::default().failure_policy, FailurePolicy::Continue);
        assert_eq!(SyncOptions::default().extensions, vec!["html", "htm", "css", "js"]);
    }

    #[test]
    fn failure_policy_serde() {
        let policy: FailurePolicy = serde_json::from_value(serde_json::json!("abort")).unwrap();
        assert_eq!(policy, FailurePolicy::Abort);
        assert_eq!(
            serde_json::to_value(FailurePolicy::Continue).unwrap(),
            serde_json::json!("continue")
        );
    }
}
