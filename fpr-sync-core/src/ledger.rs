//! Failure Ledger: the durable list of items a pass could not complete.
//!
//! The ledger is always replaced wholesale. `persist` writes a sibling temp file and renames it over
//! the previous ledger, so a crash leaves either the old list or the new one, never a mix. An absent
//! file means nothing is pending.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Result, SyncError};

/// The three flows, each with its own ledger file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Upload,
    Download,
    Commit,
}

impl Flow {
    pub fn ledger_file_name(self) -> &'static str {
        match self {
            Flow::Upload => "failed_uploads.json",
            Flow::Download => "failed_downloads.json",
            Flow::Commit => "failed_commits.json",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Flow::Upload => "upload",
            Flow::Download => "download",
            Flow::Commit => "commit",
        }
    }
}

/// What is needed to retry the item without repeating finished work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FailureContext {
    /// Upload direction: the local file; ids are re-resolved on retry.
    FilePath { file_path: PathBuf },
    /// Download and commit directions: the version was resolved before the failure.
    VersionId { version_id: i64 },
    /// Download direction: the application's versions could not be listed at all.
    ApplicationId { application_id: i64 },
}

/// `version` value of a record that stands for every version of an application.
pub const ALL_VERSIONS: &str = "*";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub application: String,
    pub version: String,
    #[serde(flatten)]
    pub context: FailureContext,
}

impl FailureRecord {
    pub fn upload(
        application: impl Into<String>,
        version: impl Into<String>,
        file_path: impl Into<PathBuf>,
    ) -> Self {
        FailureRecord {
            application: application.into(),
            version: version.into(),
            context: FailureContext::FilePath {
                file_path: file_path.into(),
            },
        }
    }

    /// A record for a version whose id is already known (download and commit flows).
    pub fn resolved(
        application: impl Into<String>,
        version: impl Into<String>,
        version_id: i64,
    ) -> Self {
        FailureRecord {
            application: application.into(),
            version: version.into(),
            context: FailureContext::VersionId { version_id },
        }
    }

    /// A download record for an application whose versions were never enumerated.
    pub fn unlisted(application: impl Into<String>, application_id: i64) -> Self {
        FailureRecord {
            application: application.into(),
            version: ALL_VERSIONS.to_string(),
            context: FailureContext::ApplicationId { application_id },
        }
    }

    pub fn file_path(&self) -> Option<&Path> {
        match &self.context {
            FailureContext::FilePath { file_path } => Some(file_path),
            _ => None,
        }
    }

    pub fn version_id(&self) -> Option<i64> {
        match self.context {
            FailureContext::VersionId { version_id } => Some(version_id),
            _ => None,
        }
    }

    pub fn application_id(&self) -> Option<i64> {
        match self.context {
            FailureContext::ApplicationId { application_id } => Some(application_id),
            _ => None,
        }
    }
}

/// Sole owner of one flow's persisted retry state.
#[derive(Debug, Clone)]
pub struct FailureLedger {
    path: PathBuf,
}

impl FailureLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The ledger for `flow` inside `ledger_dir`.
    pub fn for_flow(ledger_dir: &Path, flow: Flow) -> Self {
        Self::new(ledger_dir.join(flow.ledger_file_name()))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Reads the durable list; an absent ledger is an empty list.
    pub fn load(&self) -> Result<Vec<FailureRecord>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(ledger = %self.path.display(), "No ledger present");
                return Ok(Vec::new());
            }
            Err(e) => return Err(self.error(format!("cannot read: {e}"))),
        };
        let records: Vec<FailureRecord> =
            serde_json::from_str(&raw).map_err(|e| self.error(format!("cannot parse: {e}")))?;
        info!(ledger = %self.path.display(), records = records.len(), "Loaded failure ledger");
        Ok(records)
    }

    /// Replaces the durable list with `records`.
    pub fn persist(&self, records: &[FailureRecord]) -> Result<()> {
        let body = serde_json::to_string_pretty(records)
            .map_err(|e| self.error(format!("cannot encode: {e}")))?;
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)
            .map_err(|e| self.error(format!("cannot create {}: {e}", dir.display())))?;

        let mut tmp = tempfile::Builder::new()
            .prefix(".ledger")
            .suffix(".tmp")
            .tempfile_in(&dir)
            .map_err(|e| self.error(format!("cannot create temp file: {e}")))?;
        tmp.write_all(body.as_bytes())
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|e| self.error(format!("cannot write temp file: {e}")))?;
        tmp.persist(&self.path)
            .map_err(|e| self.error(format!("cannot replace ledger: {}", e.error)))?;

        info!(ledger = %self.path.display(), records = records.len(), "Persisted failure ledger");
        Ok(())
    }

    /// Removes the durable state; removing an absent ledger is not an error.
    pub fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                info!(ledger = %self.path.display(), "Cleared failure ledger");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.error(format!("cannot remove: {e}"))),
        }
    }

    fn error(&self, reason: String) -> SyncError {
        SyncError::Ledger {
            path: self.path.clone(),
            reason,
        }
    }
}
