use crate::config::{DEFAULT_LOCAL_PATH, Listener as ListenerConfig};
use crate::submission::{SubmitError, Submissions};
use crate::types::{Submission, Tier};
use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::{
        StatusCode,
        header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    },
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use std::io;
use std::path::Path;
use tokio::net::TcpListener;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

const XLSX_CONTENT_TYPE: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

const REMOTE_STORED_MESSAGE: &str = "Email stored successfully in Google Sheets";
const LOCAL_STORED_MESSAGE: &str =
    "Email stored locally (fallback) because Sheets failed or not configured";
const INVALID_EMAIL_MESSAGE: &str = "Invalid email";
const STORAGE_FAILED_MESSAGE: &str = "Failed to save email (sheets + fallback both failed)";

#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
}

pub async fn serve(
    listener: ListenerConfig,
    submissions: Submissions,
    static_dir: Option<&Path>,
) -> Result<(), ApiError> {
    let app = router(submissions, static_dir);

    let addr = format!("{}:{}", listener.host, listener.port);
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "Server running");

    axum::serve(listener, app).await?;
    Ok(())
}

pub fn router(submissions: Submissions, static_dir: Option<&Path>) -> Router {
    let router = Router::new()
        .route("/submit-email", post(submit_email))
        .route("/download", get(download))
        .route("/health", get(health))
        .with_state(submissions);

    let router = match static_dir {
        Some(dir) => router.fallback_service(ServeDir::new(dir)),
        None => router,
    };

    router.layer(TraceLayer::new_for_http())
}

#[derive(Serialize)]
struct MessageResponse {
    message: &'static str,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    google_configured: bool,
}

async fn submit_email(
    State(submissions): State<Submissions>,
    payload: Result<Json<Submission>, JsonRejection>,
) -> Result<Json<MessageResponse>, SubmitError> {
    // A body that is not a JSON object carries no email, which validation rejects.
    let submission = payload
        .map(|Json(submission)| submission)
        .unwrap_or_else(|rejection| {
            tracing::debug!(error = %rejection, "Unreadable submission body");
            Submission::default()
        });

    let message = match submissions.submit(&submission).await? {
        Tier::Remote => REMOTE_STORED_MESSAGE,
        Tier::Local => LOCAL_STORED_MESSAGE,
    };

    Ok(Json(MessageResponse { message }))
}

impl IntoResponse for SubmitError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            SubmitError::InvalidEmail => (StatusCode::BAD_REQUEST, INVALID_EMAIL_MESSAGE),
            SubmitError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, STORAGE_FAILED_MESSAGE),
        };

        (status, Json(ErrorResponse { error })).into_response()
    }
}

async fn download(State(submissions): State<Submissions>) -> Response {
    let path = submissions.local_path();
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| DEFAULT_LOCAL_PATH.to_string());

    match tokio::fs::read(path).await {
        Ok(contents) => (
            [
                (CONTENT_TYPE, XLSX_CONTENT_TYPE.to_string()),
                (
                    CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{file_name}\""),
                ),
            ],
            contents,
        )
            .into_response(),
        Err(err) if err.kind() == io::ErrorKind::NotFound => (
            StatusCode::NOT_FOUND,
            format!("No local {file_name} file found"),
        )
            .into_response(),
        Err(err) => {
            tracing::error!(error = %err, path = %path.display(), "Error sending file");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn health(State(submissions): State<Submissions>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        google_configured: submissions.remote_configured(),
    })
}
