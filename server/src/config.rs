use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use sitesync_core::config::{default_extensions, FailurePolicy, SyncOptions};
use sitesync_core::sync::WalkLimits;
use tracing::warn;

/// Environment variable naming the config file when `--config` is absent.
pub const CONFIG_ENV: &str = "SITESYNC_CONFIG";

/// Server settings loaded from a JSON file.
///
/// Every field has a default, so a partial file (or none at all) is valid.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ServerConfig {
    pub listen: String,
    pub fetch_timeout_secs: u64,
    pub publish_timeout_secs: u64,
    pub extensions: Vec<String>,
    pub publish_failure_policy: FailurePolicy,
    /// Directory depth limit for fetches. None = unlimited.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<usize>,
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:8080".to_string(),
            fetch_timeout_secs: 15,
            publish_timeout_secs: 20,
            extensions: default_extensions(),
            publish_failure_policy: FailurePolicy::default(),
            max_depth: None,
            max_body_bytes: 32 * 1024 * 1024,
        }
    }
}

impl ServerConfig {
    /// Load from `path`, falling back to `$SITESYNC_CONFIG`, then defaults.
    ///
    /// A configured file that does not exist yields defaults; one that
    /// exists but does not parse is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => Some(p.to_path_buf()),
            None => std::env::var_os(CONFIG_ENV).map(PathBuf::from),
        };
        let config = match path {
            Some(p) if p.exists() => Self::from_file(&p)?,
            Some(p) => {
                warn!("Config file {} not found, using defaults", p.display());
                Self::default()
            }
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&data)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    fn validate(&self) -> Result<()> {
        if self.fetch_timeout_secs == 0 || self.publish_timeout_secs == 0 {
            bail!("Connect timeouts must be at least one second");
        }
        if self.extensions.iter().all(|e| e.trim().is_empty()) {
            bail!("At least one file extension must be configured");
        }
        if self.max_body_bytes == 0 {
            bail!("maxBodyBytes must be greater than zero");
        }
        Ok(())
    }

    pub fn fetch_options(&self) -> SyncOptions {
        SyncOptions {
            extensions: self.extensions.clone(),
            connect_timeout: Duration::from_secs(self.fetch_timeout_secs),
            failure_policy: self.publish_failure_policy,
        }
    }

    pub fn publish_options(&self) -> SyncOptions {
        SyncOptions {
            extensions: self.extensions.clone(),
            connect_timeout: Duration::from_secs(self.publish_timeout_secs),
            failure_policy: self.publish_failure_policy,
        }
    }

    pub fn walk_limits(&self) -> WalkLimits {
        WalkLimits {
            max_depth: self.max_depth,
        }
    }
}
