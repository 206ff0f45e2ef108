//! Transfer Unit: one artifact moved in one direction for an already-resolved version.
//!
//! Downloads are skip-if-present and land through a temp file renamed into place after the last
//! chunk, so a file under the final name is always complete. Uploads always send.

use std::io::Write;
use std::path::{Path, PathBuf};

use futures::StreamExt;
use tracing::{debug, info};

use crate::contract::SscClient;
use crate::error::{Result, SyncError};
use crate::naming::ArtifactName;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// A file with the target name already existed; nothing was fetched.
    Skipped(PathBuf),
    Downloaded { path: PathBuf, bytes: u64 },
}

pub async fn upload<C>(client: &C, version_id: i64, file_path: &Path) -> Result<()>
where
    C: SscClient + ?Sized,
{
    debug!(version_id, file = %file_path.display(), "Uploading artifact");
    client.upload_artifact(version_id, file_path).await?;
    info!(version_id, file = %file_path.display(), "Uploaded artifact");
    Ok(())
}

pub async fn download<C>(
    client: &C,
    artifact_dir: &Path,
    name: &ArtifactName,
    version_id: i64,
) -> Result<DownloadOutcome>
where
    C: SscClient + ?Sized,
{
    let target = artifact_dir.join(name.file_name());
    if target.exists() {
        info!(file = %target.display(), version_id, "Artifact already present, skipping download");
        return Ok(DownloadOutcome::Skipped(target));
    }

    let mut stream = client.download_artifact(version_id).await?;

    // Dropped (and deleted) on any early return below.
    let mut part = tempfile::Builder::new()
        .prefix(".download")
        .suffix(".part")
        .tempfile_in(artifact_dir)
        .map_err(|e| SyncError::io(artifact_dir, e))?;

    let mut bytes = 0u64;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if chunk.is_empty() {
            continue;
        }
        part.write_all(&chunk)
            .map_err(|e| SyncError::io(part.path(), e))?;
        bytes += chunk.len() as u64;
    }
    part.flush().map_err(|e| SyncError::io(part.path(), e))?;
    part.persist(&target)
        .map_err(|e| SyncError::io(&target, e.error))?;

    info!(file = %target.display(), version_id, bytes, "Downloaded artifact");
    Ok(DownloadOutcome::Downloaded {
        path: target,
        bytes,
    })
}
