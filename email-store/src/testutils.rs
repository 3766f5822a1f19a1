use crate::sheets::{RemoteError, TokenSource};
use async_trait::async_trait;
use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, Uri, header::AUTHORIZATION};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use url::Url;

pub struct StaticToken(pub &'static str);

#[async_trait]
impl TokenSource for StaticToken {
    async fn headers(&self) -> Result<HeaderMap, RemoteError> {
        let mut headers = HeaderMap::new();
        let value = HeaderValue::from_str(&format!("Bearer {}", self.0))
            .map_err(|e| RemoteError::Auth(e.to_string()))?;
        headers.insert(AUTHORIZATION, value);
        Ok(headers)
    }
}

pub struct FailingToken;

#[async_trait]
impl TokenSource for FailingToken {
    async fn headers(&self) -> Result<HeaderMap, RemoteError> {
        Err(RemoteError::Auth("invalid_grant".into()))
    }
}

#[derive(Clone, Debug)]
pub struct CapturedRequest {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub authorization: Option<String>,
    pub body: serde_json::Value,
}

#[derive(Clone)]
struct MockState {
    status: StatusCode,
    requests: Arc<Mutex<Vec<CapturedRequest>>>,
}

/// In-process stand-in for the Sheets API. Records every request and
/// answers all of them with the configured status.
pub struct MockSheetsServer {
    pub url: Url,
    requests: Arc<Mutex<Vec<CapturedRequest>>>,
    handle: JoinHandle<()>,
}

impl MockSheetsServer {
    pub async fn spawn(status: StatusCode) -> Self {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let state = MockState {
            status,
            requests: requests.clone(),
        };
        let app = Router::new().fallback(record_request).with_state(state);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        MockSheetsServer {
            url: Url::parse(&format!("http://{addr}/")).unwrap(),
            requests,
            handle,
        }
    }

    pub fn requests(&self) -> Vec<CapturedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Drop for MockSheetsServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn record_request(
    State(state): State<MockState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    state.requests.lock().unwrap().push(CapturedRequest {
        method: method.to_string(),
        path: uri.path().to_string(),
        query: uri.query().map(String::from),
        authorization: headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(String::from),
        body: serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null),
    });

    let body = if state.status.is_success() {
        json!({"spreadsheetId": "sheet-123", "updates": {"updatedRows": 1}})
    } else {
        json!({"error": {"code": state.status.as_u16(), "status": "PERMISSION_DENIED"}})
    };
    (state.status, Json(body)).into_response()
}

/// A URL nothing is listening on.
pub async fn closed_port_url() -> Url {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    Url::parse(&format!("http://{addr}/")).unwrap()
}
