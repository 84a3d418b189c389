//! Remote store backed by a realtime-database REST endpoint.
//!
//! ### Endpoints
//!
//! - **Read**: `GET {database_url}/{document_path}.json`; a `null` body is
//!   the empty catalog.
//! - **Write**: `PUT` of the whole document to the same URL.
//! - **Push**: the same URL with `Accept: text/event-stream`, driven on a
//!   spawned task (see [`events`]).
//! - **Probe**: `GET ...?shallow=true` at connect time.
//!
//! ### Error mapping
//!
//! - transport failures, timeouts, 5xx and undecodable bodies → `RemoteUnavailable`
//! - any other 4xx → `RemoteRejected` with the status code
//!
//! No retries here; the catalog service owns retry policy.

pub mod events;
pub mod url;

pub use events::{SseDecoder, SseError, SseEvent};
pub use url::{UrlError, document_url};

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url, header};
use tokio::task::AbortHandle;

use appshelf_core::{AppConfig, Catalog, ChangeSink, Error, RemoteStore, SubscriptionHandle};

/// Configuration for the REST remote store.
#[derive(Debug, Clone)]
pub struct RestConfig {
    /// Database base URL.
    pub database_url: String,
    /// Document path inside the database (default: "apps").
    pub document_path: String,
    /// Timeout for one-shot requests (default: 20s). Also bounds connecting
    /// the event stream, which otherwise stays open.
    pub timeout: Duration,
    /// User agent string (default: "appshelf/0.1").
    pub user_agent: String,
}

impl RestConfig {
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            document_path: "apps".to_string(),
            timeout: Duration::from_millis(20_000),
            user_agent: "appshelf/0.1".to_string(),
        }
    }

    /// Build from application configuration; the database URL is required.
    pub fn from_app_config(config: &AppConfig) -> Result<Self, Error> {
        Ok(Self {
            database_url: config.require_database_url()?.to_string(),
            document_path: config.document_path.clone(),
            timeout: config.timeout(),
            user_agent: config.user_agent.clone(),
        })
    }
}

/// HTTP access to the catalog document.
#[derive(Debug, Clone)]
pub struct DocumentEndpoint {
    http: Client,
    url: Url,
}

impl DocumentEndpoint {
    pub fn new(http: Client, url: Url) -> Self {
        Self { http, url }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// One-shot GET of the whole document.
    pub async fn fetch(&self) -> Result<Catalog, Error> {
        let start = Instant::now();
        let response = self
            .http
            .get(self.url.as_str())
            .header(header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(transport_error)?;
        let response = check_status(response).await?;

        let bytes = response.bytes().await.map_err(transport_error)?;
        let value: serde_json::Value = serde_json::from_slice(&bytes)
            .map_err(|e| Error::RemoteUnavailable(format!("undecodable document: {e}")))?;
        let doc = Catalog::from_json_value(value)
            .map_err(|e| Error::RemoteUnavailable(format!("undecodable document: {e}")))?;

        tracing::debug!(
            url = %self.url,
            elapsed_ms = start.elapsed().as_millis() as u64,
            bytes = bytes.len(),
            "fetched catalog document"
        );
        Ok(doc)
    }

    /// PUT the whole document.
    pub async fn put(&self, doc: &Catalog) -> Result<(), Error> {
        let response = self
            .http
            .put(self.url.as_str())
            .json(doc)
            .send()
            .await
            .map_err(transport_error)?;
        check_status(response).await?;
        Ok(())
    }

    /// Cheap reachability check that does not download the document.
    pub async fn probe(&self) -> Result<(), Error> {
        let response = self
            .http
            .get(self.url.as_str())
            .query(&[("shallow", "true")])
            .send()
            .await
            .map_err(transport_error)?;
        check_status(response).await?;
        Ok(())
    }
}

fn transport_error(err: reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::RemoteUnavailable(format!("request timed out: {err}"))
    } else {
        Error::RemoteUnavailable(format!("network error: {err}"))
    }
}

/// Map a non-success status to the error taxonomy.
pub fn status_error(status: StatusCode, body: &str) -> Error {
    let message = if body.is_empty() { status.to_string() } else { format!("{status}: {body}") };
    if status.is_client_error() {
        Error::RemoteRejected { status: Some(status.as_u16()), message }
    } else {
        Error::RemoteUnavailable(message)
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, Error> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(status_error(status, body.trim()))
}

/// Realtime-database remote store.
pub struct RestRemoteStore {
    endpoint: DocumentEndpoint,
    stream_http: Client,
    subscriptions: Mutex<HashMap<u64, AbortHandle>>,
    next_id: AtomicU64,
}

impl RestRemoteStore {
    /// Create a store without contacting the service.
    pub fn new(config: RestConfig) -> Result<Self, Error> {
        let url = document_url(&config.database_url, &config.document_path)
            .map_err(|e| Error::InvalidInput(e.to_string()))?;

        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::RemoteUnavailable(format!("failed to build HTTP client: {e}")))?;

        let stream_http = Client::builder()
            .user_agent(&config.user_agent)
            .connect_timeout(config.timeout)
            .use_rustls_tls()
            .build()
            .map_err(|e| Error::RemoteUnavailable(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            endpoint: DocumentEndpoint::new(http, url),
            stream_http,
            subscriptions: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
        })
    }

    /// Create a store and verify the service is reachable.
    ///
    /// Fails fast with `RemoteUnavailable` when it is not.
    pub async fn connect(config: RestConfig) -> Result<Self, Error> {
        let store = Self::new(config)?;
        store.endpoint.probe().await?;
        tracing::info!(url = %store.endpoint.url(), "connected to remote catalog");
        Ok(store)
    }

    pub fn endpoint(&self) -> &DocumentEndpoint {
        &self.endpoint
    }

    /// Number of live event streams.
    pub fn subscription_count(&self) -> usize {
        self.subscriptions().len()
    }

    fn subscriptions(&self) -> MutexGuard<'_, HashMap<u64, AbortHandle>> {
        self.subscriptions.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl RemoteStore for RestRemoteStore {
    async fn fetch_once(&self) -> Result<Catalog, Error> {
        self.endpoint.fetch().await
    }

    async fn write_all(&self, doc: &Catalog) -> Result<(), Error> {
        self.endpoint.put(doc).await
    }

    async fn subscribe(&self, on_change: ChangeSink) -> Result<SubscriptionHandle, Error> {
        let response = self
            .stream_http
            .get(self.endpoint.url().as_str())
            .header(header::ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(transport_error)?;
        let response = check_status(response).await?;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let endpoint = self.endpoint.clone();
        let task = tokio::spawn(events::pump_events(response.bytes_stream(), endpoint, on_change));
        self.subscriptions().insert(id, task.abort_handle());

        tracing::debug!(subscription = id, "opened event stream");
        Ok(SubscriptionHandle::new(id))
    }

    fn unsubscribe(&self, handle: SubscriptionHandle) {
        if let Some(task) = self.subscriptions().remove(&handle.id()) {
            task.abort();
            tracing::debug!(subscription = handle.id(), "closed event stream");
        }
    }
}

impl Drop for RestRemoteStore {
    fn drop(&mut self) {
        for (_, task) in self.subscriptions().drain() {
            task.abort();
        }
    }
}
