//! Recorded API request execution.
//!
//! Replays an [`ApiRequest`] payload over HTTP: query parameters and headers
//! are taken from the recorded key/value lists (blank pairs are dropped),
//! authentication comes either inline from the recording or from browser
//! storage at run time, and the response body is parsed as JSON when it is
//! JSON. Auth enrichment is best effort: a missing storage key downgrades
//! the request to unauthenticated rather than failing it.

use base64::Engine as _;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use reqwest::{Method, Url};
use serde_json::Value;

use crate::model::{ApiAuth, ApiRequest, AuthKind, StorageRef};
use crate::page::PageDriver;
use crate::result::{GrabarError, GrabarResult};

/// What an executed request came back with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    /// HTTP status code
    pub status: u16,
    /// Parsed JSON body, or the raw text wrapped in a JSON string
    pub body: Value,
}

impl ApiResponse {
    /// True for any 2xx status.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// Executes recorded API requests with a shared connection pool.
#[derive(Debug, Clone, Default)]
pub struct ApiRequestExecutor {
    client: reqwest::Client,
}

impl ApiRequestExecutor {
    /// Executor with a fresh client.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replay one recorded request.
    ///
    /// `page` is consulted only when the recording points its credentials at
    /// browser storage; pass `None` for recordings with inline auth.
    ///
    /// # Errors
    ///
    /// [`GrabarError::InvalidRequest`] for an unparseable URL;
    /// [`GrabarError::Request`] for transport failures.
    pub async fn execute(
        &self,
        request: &ApiRequest,
        page: Option<&dyn PageDriver>,
    ) -> GrabarResult<ApiResponse> {
        let url = build_url(request)?;
        let method = parse_method(&request.method);
        tracing::debug!(%url, %method, "executing recorded api request");

        let mut builder = self
            .client
            .request(method, url)
            .headers(build_headers(request));

        if let Some(auth) = &request.auth {
            if let Some(value) = authorization_value(auth, page).await {
                builder = builder.header(AUTHORIZATION, value);
            }
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let text = response.text().await?;
        let body = serde_json::from_str(&text).unwrap_or(Value::String(text));

        Ok(ApiResponse { status, body })
    }
}

/// Recorded URL plus the query pairs where both key and value survive
/// trimming.
fn build_url(request: &ApiRequest) -> GrabarResult<Url> {
    let mut url = Url::parse(request.url.trim()).map_err(|e| GrabarError::InvalidRequest {
        message: format!("bad url '{}': {e}", request.url),
    })?;
    {
        let mut pairs = url.query_pairs_mut();
        for kv in &request.params {
            let key = kv.key.trim();
            let value = kv.value.trim();
            if !key.is_empty() && !value.is_empty() {
                pairs.append_pair(key, value);
            }
        }
    }
    Ok(url)
}

fn build_headers(request: &ApiRequest) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for kv in &request.headers {
        let key = kv.key.trim();
        if key.is_empty() {
            continue;
        }
        match (
            HeaderName::from_bytes(key.as_bytes()),
            HeaderValue::from_str(kv.value.trim()),
        ) {
            (Ok(name), Ok(value)) => {
                headers.insert(name, value);
            }
            _ => tracing::warn!(header = key, "skipping malformed recorded header"),
        }
    }
    headers
}

fn parse_method(method: &str) -> Method {
    Method::from_bytes(method.trim().to_uppercase().as_bytes()).unwrap_or(Method::GET)
}

/// Authorization header value for the recorded auth, inline credentials
/// first, then browser storage. `None` when nothing usable is available.
async fn authorization_value(auth: &ApiAuth, page: Option<&dyn PageDriver>) -> Option<String> {
    match auth.kind {
        AuthKind::Bearer => {
            if let Some(token) = non_empty(auth.token.as_deref()) {
                return Some(format!("Bearer {token}"));
            }
            let storage = auth.storage.as_ref()?;
            let key = non_empty(storage.key.as_deref())?;
            let token = storage_value(page, storage, key).await?;
            Some(format!("Bearer {token}"))
        }
        AuthKind::Basic => {
            let (username, password) = match (
                non_empty(auth.username.as_deref()),
                non_empty(auth.password.as_deref()),
            ) {
                (Some(u), Some(p)) => (u.to_string(), p.to_string()),
                _ => {
                    let storage = auth.storage.as_ref()?;
                    let u_key = non_empty(storage.username_key.as_deref())?;
                    let p_key = non_empty(storage.password_key.as_deref())?;
                    let u = storage_value(page, storage, u_key).await?;
                    let p = storage_value(page, storage, p_key).await?;
                    (u, p)
                }
            };
            let encoded =
                base64::engine::general_purpose::STANDARD.encode(format!("{username}:{password}"));
            Some(format!("Basic {encoded}"))
        }
    }
}

async fn storage_value(
    page: Option<&dyn PageDriver>,
    storage: &StorageRef,
    key: &str,
) -> Option<String> {
    let Some(page) = page else {
        tracing::warn!(key, "auth points at browser storage but no page is attached");
        return None;
    };
    match page.storage_get(storage.location, key).await {
        Ok(Some(value)) if !value.trim().is_empty() => Some(value),
        Ok(_) => {
            tracing::warn!(key, "storage key missing, sending request unauthenticated");
            None
        }
        Err(err) => {
            tracing::warn!(key, %err, "storage lookup failed, sending request unauthenticated");
            None
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
