use crate::config::RemoteStore as RemoteStoreConfig;
use crate::credentials::Credential;
use crate::metrics_defs::REMOTE_APPEND_DURATION;
use crate::types::Record;
use async_trait::async_trait;
use google_cloud_auth::credentials::service_account::{AccessSpecifier, Builder};
use google_cloud_auth::credentials::{CacheableResource, Credentials};
use http::{Extensions, HeaderMap};
use reqwest::StatusCode;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use url::Url;

pub const SPREADSHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";

// Values are parsed as if typed into the UI.
const VALUE_INPUT_OPTION: &str = "USER_ENTERED";

#[derive(thiserror::Error, Debug)]
pub enum RemoteError {
    #[error("remote store is not configured")]
    NotConfigured,
    #[error("authorization failed: {0}")]
    Auth(String),
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("sheets API responded with {status}")]
    Status { status: StatusCode, body: String },
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// Produces the authorization headers attached to each API call.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn headers(&self) -> Result<HeaderMap, RemoteError>;
}

/// OAuth2 tokens for a service account, refreshed and cached by `google-cloud-auth`.
pub struct ServiceAccountTokens {
    credentials: Result<Credentials, String>,
}

impl ServiceAccountTokens {
    pub fn new(credential: &Credential) -> Self {
        let credentials = Builder::new(credential.to_json())
            .with_access_specifier(AccessSpecifier::from_scopes([SPREADSHEETS_SCOPE]))
            .build()
            .map_err(|e| e.to_string());

        if let Err(err) = &credentials {
            tracing::error!(error = %err, "Invalid service account credentials");
        }

        ServiceAccountTokens { credentials }
    }
}

#[async_trait]
impl TokenSource for ServiceAccountTokens {
    async fn headers(&self) -> Result<HeaderMap, RemoteError> {
        let credentials = self
            .credentials
            .as_ref()
            .map_err(|err| RemoteError::Auth(err.clone()))?;

        match credentials
            .headers(Extensions::new())
            .await
            .map_err(|e| RemoteError::Auth(e.to_string()))?
        {
            CacheableResource::New { data, .. } => Ok(data),
            CacheableResource::NotModified => {
                Err(RemoteError::Auth("no authorization headers available".into()))
            }
        }
    }
}

#[derive(Serialize)]
struct AppendRequest<'a> {
    values: [[&'a str; 2]; 1],
}

struct Target {
    spreadsheet_id: String,
    range: String,
    api_url: Url,
    tokens: Arc<dyn TokenSource>,
}

/// Appends records to a Google Sheets range.
///
/// The store is only usable when both a credential and a spreadsheet id were
/// provided. Otherwise every append fails with `RemoteError::NotConfigured`
/// without touching the network.
#[derive(Clone)]
pub struct SheetsStore {
    client: reqwest::Client,
    target: Option<Arc<Target>>,
}

impl SheetsStore {
    pub fn new(config: &RemoteStoreConfig, credential: Option<&Credential>) -> Self {
        let spreadsheet_id = config.spreadsheet_id.trim();
        let tokens = match credential {
            Some(credential) if !spreadsheet_id.is_empty() => {
                Some(Arc::new(ServiceAccountTokens::new(credential)) as Arc<dyn TokenSource>)
            }
            _ => None,
        };
        SheetsStore::with_token_source(config, tokens)
    }

    pub fn with_token_source(
        config: &RemoteStoreConfig,
        tokens: Option<Arc<dyn TokenSource>>,
    ) -> Self {
        let spreadsheet_id = config.spreadsheet_id.trim();
        let target = match tokens {
            Some(tokens) if !spreadsheet_id.is_empty() => Some(Arc::new(Target {
                spreadsheet_id: spreadsheet_id.to_string(),
                range: config.range.clone(),
                api_url: config.api_url.clone(),
                tokens,
            })),
            _ => None,
        };

        SheetsStore {
            client: reqwest::Client::new(),
            target,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.target.is_some()
    }

    pub async fn append(&self, record: &Record) -> Result<(), RemoteError> {
        let target = self.target.as_ref().ok_or(RemoteError::NotConfigured)?;
        let start = Instant::now();
        let result = self.send_append(target, record).await;
        metrics::histogram!(REMOTE_APPEND_DURATION.name).record(start.elapsed().as_secs_f64());
        result
    }

    async fn send_append(&self, target: &Target, record: &Record) -> Result<(), RemoteError> {
        let url = append_url(target)?;
        let headers = target.tokens.headers().await?;

        let response = self
            .client
            .post(url)
            .headers(headers)
            .json(&AppendRequest {
                values: [[record.email.as_str(), record.timestamp.as_str()]],
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteError::Status { status, body });
        }

        tracing::info!(status = %status, "Google Sheets append success");
        Ok(())
    }
}

/// `{api_url}/v4/spreadsheets/{id}/values/{range}:append?valueInputOption=USER_ENTERED`
fn append_url(target: &Target) -> Result<Url, RemoteError> {
    let range = format!("{}:append", target.range);
    let mut url = target.api_url.clone();
    url.path_segments_mut()
        .map_err(|_| RemoteError::InvalidUrl(target.api_url.to_string()))?
        .pop_if_empty()
        .extend([
            "v4",
            "spreadsheets",
            target.spreadsheet_id.as_str(),
            "values",
            range.as_str(),
        ]);
    url.query_pairs_mut()
        .append_pair("valueInputOption", VALUE_INPUT_OPTION);
    Ok(url)
}
