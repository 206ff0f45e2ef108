//! Commit Driver: finalizes every version left in the "finish later" state.
//!
//! Shares the failure-isolation and ledger policy of [`crate::synchronise`]: a failed commit is
//! logged with its version id and recorded, the remaining versions are still attempted.

use tracing::{error, info};

use crate::contract::{SscClient, Version};
use crate::error::Result;
use crate::ledger::{FailureLedger, FailureRecord, Flow};
use crate::synchronise::{finish_main_pass, finish_retry_pass, PassReport};

pub async fn commit_pending<C, P>(
    client: &C,
    ledger: &FailureLedger,
    mut progress: P,
) -> Result<PassReport>
where
    C: SscClient + ?Sized,
    P: FnMut(usize, usize),
{
    let pending = client.list_pending_versions().await?;
    let mut report = PassReport::new(Flow::Commit, pending.len());
    info!(total = report.total, "[COMMIT] Starting commit pass");

    for (index, version) in pending.iter().enumerate() {
        let application = application_label(version);
        commit_one(client, &application, &version.name, version.id, &mut report).await;
        progress(index + 1, report.total);
    }

    finish_main_pass(ledger, report)
}

/// Replays the commit ledger by version id.
pub async fn retry_commits<C, P>(
    client: &C,
    ledger: &FailureLedger,
    mut progress: P,
) -> Result<PassReport>
where
    C: SscClient + ?Sized,
    P: FnMut(usize, usize),
{
    let records = ledger.load()?;
    let mut report = PassReport::new(Flow::Commit, records.len());
    if records.is_empty() {
        return finish_retry_pass(ledger, report);
    }
    info!(total = report.total, ledger = %ledger.path().display(), "[COMMIT] Starting retry pass");

    for (index, record) in records.iter().enumerate() {
        match record.version_id() {
            Some(version_id) => {
                commit_one(
                    client,
                    &record.application,
                    &record.version,
                    version_id,
                    &mut report,
                )
                .await
            }
            None => {
                error!(application = %record.application, version = %record.version, "[COMMIT] Dropping ledger record without version_id");
                report.malformed += 1;
            }
        }
        progress(index + 1, report.total);
    }

    finish_retry_pass(ledger, report)
}

async fn commit_one<C>(
    client: &C,
    application: &str,
    version: &str,
    version_id: i64,
    report: &mut PassReport,
) where
    C: SscClient + ?Sized,
{
    match client.commit_version(version_id).await {
        Ok(()) => {
            info!(application, version, version_id, "[COMMIT] Version committed");
            report.succeeded += 1;
        }
        Err(e) => {
            error!(application, version, version_id, error = %e, "[COMMIT] Commit failed, recording for retry");
            report
                .failures
                .push(FailureRecord::resolved(application, version, version_id));
        }
    }
}

fn application_label(version: &Version) -> String {
    version
        .application_name
        .clone()
        .unwrap_or_else(|| format!("#{}", version.application_id))
}
