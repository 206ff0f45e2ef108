//! Error taxonomy shared by every fpr-sync pipeline.
//!
//! Per-item errors (`Transport`, `Status`, `MalformedResponse`, `AmbiguousName`, `Io`) are isolated by the
//! orchestrators and turned into ledger entries. `MalformedArtifactName` is skipped without a ledger entry.
//! `Ledger` and `Auth` abort the whole pass.

use std::path::PathBuf;
use thiserror::Error;

/// Result alias used throughout the core crate.
pub type Result<T> = std::result::Result<T, SyncError>;

#[derive(Debug, Error)]
pub enum SyncError {
    /// The request never produced a response (connect failure, timeout, broken body stream).
    #[error("request to {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    /// The service answered with a non-2xx status.
    #[error("{endpoint} returned HTTP {status}")]
    Status { endpoint: String, status: u16 },

    /// The service answered 2xx but the body lacks required fields or is not valid JSON.
    #[error("malformed response from {endpoint}: {reason}")]
    MalformedResponse { endpoint: String, reason: String },

    /// Strict name matching found more than one resource with the same name.
    #[error("{count} {kind}s named '{name}' found, expected at most one")]
    AmbiguousName {
        kind: &'static str,
        name: String,
        count: usize,
    },

    #[error("malformed artifact file name '{file_name}': {reason}")]
    MalformedArtifactName { file_name: String, reason: String },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The failure ledger could not be read or written.
    #[error("failure ledger {}: {reason}", path.display())]
    Ledger { path: PathBuf, reason: String },

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("cannot extract archive {}: {reason}", archive.display())]
    Archive { archive: PathBuf, reason: String },

    #[error("no tool directory or archive matching '{prefix}X.Y.Z' in {}", base_dir.display())]
    ToolNotFound { base_dir: PathBuf, prefix: String },
}

impl SyncError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SyncError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn malformed(endpoint: impl Into<String>, reason: impl Into<String>) -> Self {
        SyncError::MalformedResponse {
            endpoint: endpoint.into(),
            reason: reason.into(),
        }
    }

    /// True for errors that abort a pass instead of being recorded per item.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SyncError::Ledger { .. } | SyncError::Auth(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ledger_and_auth_errors_are_fatal() {
        let ledger = SyncError::Ledger {
            path: PathBuf::from("failed_uploads.json"),
            reason: "disk full".into(),
        };
        assert!(ledger.is_fatal());
        assert!(SyncError::Auth("bad password".into()).is_fatal());
    }

    #[test]
    fn remote_errors_are_not_fatal() {
        let status = SyncError::Status {
            endpoint: "/api/v1/projects".into(),
            status: 503,
        };
        assert!(!status.is_fatal());
        assert_eq!(status.to_string(), "/api/v1/projects returned HTTP 503");

        let malformed = SyncError::malformed("/api/v1/projects", "missing field `data`");
        assert!(!malformed.is_fatal());
        assert!(malformed.to_string().contains("missing field `data`"));
    }
}
