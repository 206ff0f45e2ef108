//! Batch orchestration: one sequential pass over a work set, isolating every per-item failure.
//!
//! This module drives the Resolver and the Transfer Unit for each item of a pass:
//!   - Upload pass: every `*.fpr` file of the artifact directory
//!   - Download pass: every (application, version) pair of the remote catalog
//!   - Retry passes: every record of the flow's failure ledger
//!
//! # Failure isolation
//! No per-item error leaves the loop. Remote and local I/O errors become [`FailureRecord`]s in the
//! pass's own accumulator; malformed artifact names are logged and skipped. Only errors that make the
//! pass itself meaningless (enumeration of the work set, ledger I/O) are returned to the caller.
//!
//! # Ledger policy
//! - Main passes persist the accumulated failures when there are any and otherwise leave the ledger
//!   alone (a stale ledger waits for its retry pass).
//! - Retry passes load the full list, attempt every record, then persist the re-failures or clear.
//!
//! # Navigation
//! - Entrypoints: [`upload_all`], [`download_all`], [`retry_uploads`], [`retry_downloads`]
//! - Supporting types: [`PassReport`], [`LedgerAction`].

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{error, info, warn};

use crate::config::NameMatch;
use crate::contract::SscClient;
use crate::error::{Result, SyncError};
use crate::ledger::{FailureLedger, FailureRecord, Flow};
use crate::naming::{self, ArtifactName};
use crate::resolver::Resolver;
use crate::transfer::{self, DownloadOutcome};

/// What happened to the durable ledger at the end of a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerAction {
    Untouched,
    Persisted(PathBuf),
    Cleared,
}

/// Outcome of one pass. `failures` is exactly what the ledger received (if anything).
#[derive(Debug)]
pub struct PassReport {
    pub flow: Flow,
    pub total: usize,
    pub succeeded: usize,
    pub skipped: usize,
    pub malformed: usize,
    /// Applications whose versions could not be listed (download flow only).
    pub unlisted: usize,
    pub failures: Vec<FailureRecord>,
    pub ledger: LedgerAction,
}

impl PassReport {
    pub(crate) fn new(flow: Flow, total: usize) -> Self {
        PassReport {
            flow,
            total,
            succeeded: 0,
            skipped: 0,
            malformed: 0,
            unlisted: 0,
            failures: Vec::new(),
            ledger: LedgerAction::Untouched,
        }
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Lists the artifact files of `dir` in name order. Non-files and other extensions are ignored;
/// names that are not valid UTF-8 are kept so the caller can report them.
pub fn artifact_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|e| SyncError::io(dir, e))?;
    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| SyncError::io(dir, e))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let is_artifact = path
            .file_name()
            .is_some_and(|n| naming::has_artifact_extension(&n.to_string_lossy()));
        if is_artifact {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Uploads every artifact file of `artifact_dir`, creating applications and versions as needed.
pub async fn upload_all<C, P>(
    client: &C,
    name_match: NameMatch,
    artifact_dir: &Path,
    ledger: &FailureLedger,
    mut progress: P,
) -> Result<PassReport>
where
    C: SscClient + ?Sized,
    P: FnMut(usize, usize),
{
    // Ledger records must stay valid from any working directory.
    let artifact_dir =
        fs::canonicalize(artifact_dir).map_err(|e| SyncError::io(artifact_dir, e))?;
    let files = artifact_files(&artifact_dir)?;
    let resolver = Resolver::new(client, name_match);
    let mut report = PassReport::new(Flow::Upload, files.len());
    info!(dir = %artifact_dir.display(), total = report.total, "[UPLOAD] Starting upload pass");

    for (index, path) in files.iter().enumerate() {
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            error!(file = %path.display(), "[UPLOAD] Skipping artifact file with a non-UTF-8 name");
            report.malformed += 1;
            progress(index + 1, report.total);
            continue;
        };
        match ArtifactName::parse(file_name) {
            Ok(name) => {
                if let Some(record) = upload_one(client, &resolver, &name, path).await {
                    report.failures.push(record);
                } else {
                    report.succeeded += 1;
                }
            }
            Err(e) => {
                error!(file = %path.display(), error = %e, "[UPLOAD] Skipping malformed artifact file");
                report.malformed += 1;
            }
        }
        progress(index + 1, report.total);
    }

    finish_main_pass(ledger, report)
}

async fn upload_one<C>(
    client: &C,
    resolver: &Resolver<'_, C>,
    name: &ArtifactName,
    path: &Path,
) -> Option<FailureRecord>
where
    C: SscClient + ?Sized,
{
    let result = async {
        let version_id = resolver.resolve(name.application(), name.version()).await?;
        transfer::upload(client, version_id, path).await
    }
    .await;
    match result {
        Ok(()) => None,
        Err(e) => {
            error!(
                application = %name.application(),
                version = %name.version(),
                file = %path.display(),
                error = %e,
                "[UPLOAD] Item failed, recording for retry"
            );
            Some(FailureRecord::upload(
                name.application(),
                name.version(),
                path,
            ))
        }
    }
}

/// Downloads the current artifact of every version of every application into `artifact_dir`.
pub async fn download_all<C, P>(
    client: &C,
    artifact_dir: &Path,
    ledger: &FailureLedger,
    mut progress: P,
) -> Result<PassReport>
where
    C: SscClient + ?Sized,
    P: FnMut(usize, usize),
{
    fs::create_dir_all(artifact_dir).map_err(|e| SyncError::io(artifact_dir, e))?;

    let applications = client.list_applications().await?;
    info!(applications = applications.len(), "[DOWNLOAD] Enumerated applications");

    let mut work = Vec::new();
    let mut unlisted = Vec::new();
    for application in &applications {
        match client.list_versions(application.id).await {
            Ok(versions) => work.extend(
                versions
                    .into_iter()
                    .map(|v| (application.name.clone(), v.name, v.id)),
            ),
            Err(e) => {
                error!(
                    application = %application.name,
                    application_id = application.id,
                    error = %e,
                    "[DOWNLOAD] Cannot list versions, recording application for retry"
                );
                unlisted.push(FailureRecord::unlisted(&application.name, application.id));
            }
        }
    }

    let mut report = PassReport::new(Flow::Download, work.len());
    if !unlisted.is_empty() {
        warn!(unlisted = unlisted.len(), "[DOWNLOAD] Some applications could not be enumerated");
        report.unlisted = unlisted.len();
        report.failures.extend(unlisted);
    }
    info!(total = report.total, "[DOWNLOAD] Starting download pass");
    for (index, (application, version, version_id)) in work.iter().enumerate() {
        download_one(client, artifact_dir, application, version, *version_id, &mut report).await;
        progress(index + 1, report.total);
    }

    finish_main_pass(ledger, report)
}

async fn download_one<C>(
    client: &C,
    artifact_dir: &Path,
    application: &str,
    version: &str,
    version_id: i64,
    report: &mut PassReport,
) where
    C: SscClient + ?Sized,
{
    let name = match ArtifactName::new(application, version) {
        Ok(name) => name,
        Err(e) => {
            error!(application, version, version_id, error = %e, "[DOWNLOAD] Name pair cannot form a file name, skipped");
            report.malformed += 1;
            return;
        }
    };
    match transfer::download(client, artifact_dir, &name, version_id).await {
        Ok(DownloadOutcome::Skipped(_)) => report.skipped += 1,
        Ok(DownloadOutcome::Downloaded { .. }) => report.succeeded += 1,
        Err(e) => {
            error!(application, version, version_id, error = %e, "[DOWNLOAD] Item failed, recording for retry");
            report
                .failures
                .push(FailureRecord::resolved(application, version, version_id));
        }
    }
}

/// Replays the upload ledger: re-resolves each record's ids and re-sends its file.
pub async fn retry_uploads<C, P>(
    client: &C,
    name_match: NameMatch,
    ledger: &FailureLedger,
    mut progress: P,
) -> Result<PassReport>
where
    C: SscClient + ?Sized,
    P: FnMut(usize, usize),
{
    let records = ledger.load()?;
    let mut report = PassReport::new(Flow::Upload, records.len());
    if records.is_empty() {
        return finish_retry_pass(ledger, report);
    }
    info!(total = report.total, ledger = %ledger.path().display(), "[UPLOAD] Starting retry pass");

    let resolver = Resolver::new(client, name_match);
    for (index, record) in records.iter().enumerate() {
        match upload_target(record) {
            Ok((name, path)) => match upload_one(client, &resolver, &name, path).await {
                Some(failure) => report.failures.push(failure),
                None => report.succeeded += 1,
            },
            Err(reason) => {
                error!(application = %record.application, version = %record.version, reason, "[UPLOAD] Dropping unusable ledger record");
                report.malformed += 1;
            }
        }
        progress(index + 1, report.total);
    }

    finish_retry_pass(ledger, report)
}

fn upload_target(record: &FailureRecord) -> std::result::Result<(ArtifactName, &Path), String> {
    let path = record.file_path().ok_or("record has no file_path")?;
    let name = ArtifactName::new(record.application.as_str(), record.version.as_str())
        .map_err(|e| e.to_string())?;
    Ok((name, path))
}

/// Replays the download ledger using the version ids captured by the failed pass.
pub async fn retry_downloads<C, P>(
    client: &C,
    artifact_dir: &Path,
    ledger: &FailureLedger,
    mut progress: P,
) -> Result<PassReport>
where
    C: SscClient + ?Sized,
    P: FnMut(usize, usize),
{
    let records = ledger.load()?;
    let mut report = PassReport::new(Flow::Download, records.len());
    if records.is_empty() {
        return finish_retry_pass(ledger, report);
    }
    fs::create_dir_all(artifact_dir).map_err(|e| SyncError::io(artifact_dir, e))?;
    info!(total = report.total, ledger = %ledger.path().display(), "[DOWNLOAD] Starting retry pass");

    let mut processed = 0;
    for record in &records {
        match (record.version_id(), record.application_id()) {
            (Some(version_id), _) => {
                download_one(
                    client,
                    artifact_dir,
                    &record.application,
                    &record.version,
                    version_id,
                    &mut report,
                )
                .await
            }
            (None, Some(application_id)) => {
                match client.list_versions(application_id).await {
                    Ok(versions) => {
                        info!(application = %record.application, versions = versions.len(), "[DOWNLOAD] Re-listed application");
                        // The application record expands into its versions.
                        report.total = report.total - 1 + versions.len();
                        for version in versions {
                            download_one(
                                client,
                                artifact_dir,
                                &record.application,
                                &version.name,
                                version.id,
                                &mut report,
                            )
                            .await;
                            processed += 1;
                            progress(processed, report.total);
                        }
                        continue;
                    }
                    Err(e) => {
                        error!(application = %record.application, application_id, error = %e, "[DOWNLOAD] Cannot list versions, keeping application for retry");
                        report.unlisted += 1;
                        report.failures.push(record.clone());
                    }
                }
            }
            (None, None) => {
                error!(application = %record.application, version = %record.version, "[DOWNLOAD] Dropping ledger record without version_id");
                report.malformed += 1;
            }
        }
        processed += 1;
        progress(processed, report.total);
    }

    finish_retry_pass(ledger, report)
}

/// Main-pass policy: persist when anything failed, otherwise leave the ledger alone.
pub(crate) fn finish_main_pass(ledger: &FailureLedger, mut report: PassReport) -> Result<PassReport> {
    if !report.failures.is_empty() {
        ledger.persist(&report.failures)?;
        warn!(
            flow = report.flow.as_str(),
            failed = report.failures.len(),
            ledger = %ledger.path().display(),
            "Pass finished with failures; run again with --retry"
        );
        report.ledger = LedgerAction::Persisted(ledger.path().to_path_buf());
    }
    info!(
        flow = report.flow.as_str(),
        total = report.total,
        succeeded = report.succeeded,
        skipped = report.skipped,
        malformed = report.malformed,
        failed = report.failures.len(),
        "Pass complete"
    );
    Ok(report)
}

/// Retry-pass policy: the re-failures fully replace the ledger, or the ledger is removed.
pub(crate) fn finish_retry_pass(
    ledger: &FailureLedger,
    mut report: PassReport,
) -> Result<PassReport> {
    if report.failures.is_empty() {
        if ledger.exists() {
            ledger.clear()?;
            report.ledger = LedgerAction::Cleared;
        }
        info!(
            flow = report.flow.as_str(),
            retried = report.total,
            "Retry pass complete, nothing pending"
        );
        return Ok(report);
    }
    finish_main_pass(ledger, report)
}
