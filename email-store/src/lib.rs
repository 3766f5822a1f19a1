pub mod api;
pub mod config;
pub mod credentials;
pub mod metrics_defs;
pub mod sheets;
pub mod submission;
pub mod types;
pub mod workbook;

#[cfg(test)]
mod testutils;

use api::ApiError;
use config::Config;
use credentials::Credential;
use sheets::SheetsStore;
use submission::Submissions;
use workbook::WorkbookStore;

/// Builds both storage tiers from `config` and serves the HTTP API until the
/// listener fails.
pub async fn run(config: Config, credential: Option<Credential>) -> Result<(), ApiError> {
    match &credential {
        Some(credential) => tracing::info!(
            client_email = credential.client_email().unwrap_or("N/A"),
            "Google credentials detected"
        ),
        None => tracing::warn!(
            "No Google credentials found in environment ({} or {}). Google Sheets will be disabled until you set them.",
            credentials::CREDENTIALS_BASE64_VAR,
            credentials::CREDENTIALS_VAR
        ),
    }
    if config.remote.spreadsheet_id.trim().is_empty() {
        tracing::warn!("No spreadsheet id configured. Google Sheets will be disabled until you set it.");
    }

    let remote = SheetsStore::new(&config.remote, credential.as_ref());
    let local = WorkbookStore::new(&config.local.path);
    tracing::info!(path = %config.local.path.display(), "Local fallback store");

    let submissions = Submissions::new(remote, local);
    api::serve(config.listener, submissions, config.static_dir.as_deref()).await
}
