use crate::metrics_defs::{
    REMOTE_APPEND_FAILURE, SUBMISSION_FAILED, SUBMISSION_INVALID, SUBMISSION_RECEIVED,
    SUBMISSION_STORED,
};
use crate::sheets::{RemoteError, SheetsStore};
use crate::types::{EmailAddress, Record, Submission, Tier};
use crate::workbook::{LocalWriteError, WorkbookStore};
use std::path::Path;
use std::sync::Arc;

#[derive(thiserror::Error, Debug)]
pub enum SubmitError {
    #[error("invalid email")]
    InvalidEmail,

    #[error("both storage tiers failed: {0}")]
    Storage(#[from] LocalWriteError),
}

struct SubmissionsInner {
    remote: SheetsStore,
    local: WorkbookStore,
}

/// Accepts submissions and stores each one in exactly one tier.
///
/// The remote spreadsheet is tried first. Any remote failure, including the
/// remote tier not being configured at all, falls back to the local workbook.
/// Callers only learn which tier was used, never why the remote was skipped.
#[derive(Clone)]
pub struct Submissions {
    inner: Arc<SubmissionsInner>,
}

impl Submissions {
    pub fn new(remote: SheetsStore, local: WorkbookStore) -> Self {
        Submissions {
            inner: Arc::new(SubmissionsInner { remote, local }),
        }
    }

    /// Whether the remote tier has both a credential and a spreadsheet id.
    pub fn remote_configured(&self) -> bool {
        self.inner.remote.is_configured()
    }

    pub fn local_path(&self) -> &Path {
        self.inner.local.path()
    }

    pub async fn submit(&self, submission: &Submission) -> Result<Tier, SubmitError> {
        metrics::counter!(SUBMISSION_RECEIVED.name).increment(1);

        let Some(email) = EmailAddress::parse(submission.email.as_ref()) else {
            metrics::counter!(SUBMISSION_INVALID.name).increment(1);
            return Err(SubmitError::InvalidEmail);
        };

        let record = Record::now(&email);
        let result = self.store(&record).await;

        match &result {
            Ok(tier) => {
                metrics::counter!(SUBMISSION_STORED.name, "tier" => tier.as_str()).increment(1)
            }
            Err(_) => metrics::counter!(SUBMISSION_FAILED.name).increment(1),
        }
        result
    }

    async fn store(&self, record: &Record) -> Result<Tier, SubmitError> {
        let remote = &self.inner.remote;

        if remote.is_configured() {
            match remote.append(record).await {
                Ok(()) => return Ok(Tier::Remote),
                Err(err) => {
                    metrics::counter!(REMOTE_APPEND_FAILURE.name).increment(1);
                    log_remote_failure(&err);
                }
            }
        } else {
            tracing::info!("Skipping Google Sheets because credentials or spreadsheet id missing");
        }

        match self.inner.local.append(record).await {
            Ok(()) => {
                tracing::info!(email = %record.email, "Saved email to local fallback");
                Ok(Tier::Local)
            }
            Err(err) => {
                tracing::error!(error = %err, "Failed to write local fallback");
                Err(err.into())
            }
        }
    }
}

fn log_remote_failure(err: &RemoteError) {
    match err {
        RemoteError::Status { status, body } => {
            tracing::error!(
                status = %status,
                response = %body,
                "Error adding to Google Sheets"
            );
        }
        _ => tracing::error!(error = %err, "Error adding to Google Sheets"),
    }
}
