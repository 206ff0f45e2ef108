//! # contract: the remote application-security service as seen by the pipelines
//!
//! This module defines the single trait ([`SscClient`]) every pipeline talks to, and the plain data
//! types it returns. The real implementation (HTTP, bearer-style token, pagination) lives in the
//! `fpr-sync` crate; tests use the generated `MockSscClient`.
//!
//! ## Contract
//! - Every method is one logical round-trip; `list_*` methods hide pagination.
//! - Any non-2xx answer is a [`SyncError::Status`]; a 2xx answer without the required fields is a
//!   [`SyncError::MalformedResponse`]. Implementations never retry internally.
//! - `find_*` methods return exact-name matches only, possibly more than one.
//!
//! [`SyncError::Status`]: crate::error::SyncError::Status
//! [`SyncError::MalformedResponse`]: crate::error::SyncError::MalformedResponse

use std::path::Path;
use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A named project tracked by the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    pub id: i64,
    pub name: String,
}

/// Commit state of a version as reported by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitState {
    /// The service did not report a commit flag.
    Open,
    /// Created but left uncommitted ("finish later").
    FinishLater,
    Committed,
}

impl CommitState {
    /// Maps the service's optional `committed` flag onto a state.
    pub fn from_committed_flag(committed: Option<bool>) -> Self {
        match committed {
            Some(true) => CommitState::Committed,
            Some(false) => CommitState::FinishLater,
            None => CommitState::Open,
        }
    }
}

/// A named release of exactly one application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    pub id: i64,
    pub name: String,
    pub application_id: i64,
    /// Present when the service embeds the parent application (pending-commit listing does).
    pub application_name: Option<String>,
    pub commit_state: CommitState,
}

/// Artifact body as a stream of byte chunks. Chunks may be empty.
pub type ArtifactStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>>> + Send>>;

/// Operations the pipelines need from the remote service.
///
/// The trait is `Send + Sync` and intended for async/await usage from a single task; the pipelines
/// never issue two calls concurrently.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait SscClient: Send + Sync {
    /// Applications whose name equals `name` exactly.
    async fn find_applications(&self, name: &str) -> Result<Vec<Application>>;

    async fn create_application(&self, name: &str, description: &str) -> Result<Application>;

    /// Versions of `application_id` whose name equals `name` exactly.
    async fn find_versions(&self, application_id: i64, name: &str) -> Result<Vec<Version>>;

    async fn create_version(
        &self,
        application_id: i64,
        name: &str,
        description: &str,
    ) -> Result<Version>;

    /// Every application, all pages.
    async fn list_applications(&self) -> Result<Vec<Application>>;

    /// Every version of one application, all pages.
    async fn list_versions(&self, application_id: i64) -> Result<Vec<Version>>;

    /// Sends the file at `file_path` as a new artifact of `version_id`.
    async fn upload_artifact(&self, version_id: i64, file_path: &Path) -> Result<()>;

    /// Opens the current artifact of `version_id` as a chunk stream.
    async fn download_artifact(&self, version_id: i64) -> Result<ArtifactStream>;

    /// Versions whose commit state is "finish later", filtered server-side.
    async fn list_pending_versions(&self) -> Result<Vec<Version>>;

    async fn commit_version(&self, version_id: i64) -> Result<()>;
}
