use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info};

pub const DEFAULT_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_PAGE_SIZE: u32 = 200;
pub const DEFAULT_AUTH_SCHEME: &str = "FortifyToken";

/// What to do when a name lookup returns more than one resource.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NameMatch {
    /// Use the first match and log a warning.
    #[default]
    First,
    /// Fail the item with `SyncError::AmbiguousName`.
    Unique,
}

/// Where and how to reach the remote service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default = "default_auth_scheme")]
    pub auth_scheme: String,
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_connect_timeout_secs() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_SECS
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

fn default_auth_scheme() -> String {
    DEFAULT_AUTH_SCHEME.to_string()
}

fn default_dir() -> PathBuf {
    PathBuf::from(".")
}

/// Settings shared by the upload, download and commit flows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    pub service: ServiceConfig,
    /// Directory the artifact files are read from (upload) and written to (download).
    #[serde(default = "default_dir")]
    pub artifact_dir: PathBuf,
    /// Directory holding the per-flow failure ledgers.
    #[serde(default = "default_dir")]
    pub ledger_dir: PathBuf,
    #[serde(default)]
    pub name_match: NameMatch,
}

impl SyncConfig {
    pub fn trace_loaded(&self) {
        info!(
            base_url = %self.service.base_url,
            artifact_dir = %self.artifact_dir.display(),
            ledger_dir = %self.ledger_dir.display(),
            name_match = ?self.name_match,
            timeout_secs = self.service.timeout_secs,
            "Loaded SyncConfig"
        );
        debug!(?self, "SyncConfig loaded (full debug)");
    }
}

/// How the single credential-acquisition step obtains a token.
#[derive(Clone)]
pub enum Credential {
    /// Token obtained out of band, used as-is.
    Token(String),
    /// Exchanged once for a token before the first call.
    Password { username: String, password: String },
}

impl Credential {
    pub fn trace_loaded(&self) {
        match self {
            Credential::Token(token) => {
                info!(token_len = token.len(), "Using pre-obtained service token")
            }
            Credential::Password { username, .. } => {
                info!(username = %username, "Using username/password credential exchange")
            }
        }
    }
}

// Keeps secrets out of `{:?}` output and debug logs.
impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credential::Token(_) => f.write_str("Credential::Token(***)"),
            Credential::Password { username, .. } => f
                .debug_struct("Credential::Password")
                .field("username", username)
                .field("password", &"***")
                .finish(),
        }
    }
}
