//! CouchDB storage implementation.
//!
//! Uses the CouchDB HTTP API (`/{db}/{id}`, `_bulk_docs`, `_all_docs` and
//! design document views).

use crate::config::CouchConfig;
use async_trait::async_trait;
use futures::StreamExt;
use rcdb_core::{BulkReadStore, ByteStream, DocumentStore, StoreError, StoreResult};
use rcdb_model::{Document, ViewQuery, ViewResponse, WriteAck};
use rcdb_types::DESIGN_PREFIX;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info};

/// CouchDB's error body, `{"error": ..., "reason": ...}`.
#[derive(Debug, Deserialize)]
struct CouchErrorBody {
    #[serde(default)]
    error: String,
    #[serde(default)]
    reason: String,
}

/// A [`DocumentStore`] backed by one CouchDB database.
pub struct CouchStore {
    config: CouchConfig,
    client: Client,
    base_url: String,
}

impl CouchStore {
    /// Creates a store for the configured database. No request is made.
    pub fn new(config: CouchConfig) -> StoreResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| StoreError::Network(format!("failed to create HTTP client: {e}")))?;
        let base_url = config.database_url();

        Ok(Self {
            config,
            client,
            base_url,
        })
    }

    pub fn config(&self) -> &CouchConfig {
        &self.config
    }

    /// Creates the database if it does not exist. Returns true if it was created.
    pub async fn ensure_database(&self) -> StoreResult<bool> {
        let response = self.send(self.request(Method::PUT, &self.base_url)).await?;
        match response.status() {
            status if status.is_success() => {
                info!(database = %self.config.database, "created database");
                Ok(true)
            }
            StatusCode::PRECONDITION_FAILED => {
                debug!(database = %self.config.database, "database already exists");
                Ok(false)
            }
            _ => Err(error_from(response).await),
        }
    }

    fn doc_url(&self, id: &str) -> String {
        format!("{}/{}", self.base_url, encode_id(id))
    }

    fn view_url(&self, design: &str, view: &str) -> String {
        format!(
            "{}/{DESIGN_PREFIX}{}/_view/{}",
            self.base_url,
            urlencoding::encode(design),
            urlencoding::encode(view)
        )
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let request = self.client.request(method, url);
        match &self.config.username {
            Some(username) => request.basic_auth(username, self.config.password.as_deref()),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> StoreResult<Response> {
        request
            .send()
            .await
            .map_err(|e| StoreError::Network(format!("request failed: {e}")))
    }

    /// Sends a request and decodes a successful JSON body; any other status
    /// is mapped to a [`StoreError`].
    async fn send_json<T: serde::de::DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> StoreResult<T> {
        let response = self.send(request).await?;
        if !response.status().is_success() {
            return Err(error_from(response).await);
        }
        decode(response).await
    }

    async fn post_all_docs(&self, ids: &[String], include_docs: bool) -> StoreResult<ViewResponse> {
        debug!(count = ids.len(), include_docs, "fetching from _all_docs");
        let url = format!("{}/_all_docs", self.base_url);
        let mut request = self.request(Method::POST, &url).json(&json!({ "keys": ids }));
        if include_docs {
            request = request.query(&[("include_docs", "true")]);
        }
        self.send_json(request).await
    }
}

#[async_trait]
impl DocumentStore for CouchStore {
    fn store_name(&self) -> &'static str {
        "CouchDB"
    }

    async fn get(&self, id: &str) -> StoreResult<Document> {
        debug!(id, "GET document");
        self.send_json(self.request(Method::GET, &self.doc_url(id)))
            .await
    }

    async fn insert(&self, doc: &Document) -> StoreResult<WriteAck> {
        let Some(id) = doc.id() else {
            // CouchDB assigns an id on POST
            debug!("POST document without id");
            return self
                .send_json(self.request(Method::POST, &self.base_url).json(doc))
                .await;
        };

        debug!(id, rev = ?doc.rev(), "PUT document");
        let response = self
            .send(self.request(Method::PUT, &self.doc_url(id)).json(doc))
            .await?;
        match response.status() {
            status if status.is_success() => decode(response).await,
            StatusCode::CONFLICT | StatusCode::FORBIDDEN => {
                let body = error_body(response).await;
                Ok(WriteAck::failure(Some(id.to_string()), body.error, body.reason))
            }
            _ => Err(error_from(response).await),
        }
    }

    async fn bulk_insert(&self, docs: &[Document]) -> StoreResult<Vec<WriteAck>> {
        debug!(count = docs.len(), "POST _bulk_docs");
        let url = format!("{}/_bulk_docs", self.base_url);
        self.send_json(self.request(Method::POST, &url).json(&json!({ "docs": docs })))
            .await
    }

    async fn remove(&self, id: &str, rev: &str) -> StoreResult<WriteAck> {
        debug!(id, rev, "DELETE document");
        self.send_json(
            self.request(Method::DELETE, &self.doc_url(id))
                .query(&[("rev", rev)]),
        )
        .await
    }

    async fn list_view(
        &self,
        design: &str,
        view: &str,
        query: &ViewQuery,
    ) -> StoreResult<ViewResponse> {
        debug!(design, view, "querying view");
        let request = self
            .request(Method::GET, &self.view_url(design, view))
            .query(&view_params(query)?);
        self.send_json(request).await
    }
}

#[async_trait]
impl BulkReadStore for CouchStore {
    async fn fetch_many(&self, ids: &[String]) -> StoreResult<ViewResponse> {
        self.post_all_docs(ids, true).await
    }

    async fn fetch_revs(&self, ids: &[String]) -> StoreResult<ViewResponse> {
        self.post_all_docs(ids, false).await
    }

    async fn head(&self, id: &str) -> StoreResult<String> {
        debug!(id, "HEAD document");
        let response = self
            .send(self.request(Method::HEAD, &self.doc_url(id)))
            .await?;
        if !response.status().is_success() {
            // HEAD responses carry no body
            return Err(status_error(response.status(), id.to_string(), String::new()));
        }
        response
            .headers()
            .get(reqwest::header::ETAG)
            .and_then(|etag| etag.to_str().ok())
            .map(|etag| etag.trim_matches('"').to_string())
            .ok_or_else(|| StoreError::Http {
                status: response.status().as_u16(),
                error: "missing_etag".to_string(),
                reason: format!("no ETag returned for {id}"),
            })
    }

    async fn view_stream(
        &self,
        design: &str,
        view: &str,
        query: &ViewQuery,
    ) -> StoreResult<ByteStream> {
        debug!(design, view, "streaming view");
        let request = self
            .request(Method::GET, &self.view_url(design, view))
            .query(&view_params(query)?);
        let response = self.send(request).await?;
        if !response.status().is_success() {
            return Err(error_from(response).await);
        }
        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| StoreError::Network(format!("stream failed: {e}"))))
            .boxed())
    }
}

/// Percent-encodes a document id for use as a path segment. The `_design/`
/// prefix stays literal so CouchDB routes the request to the design handler.
fn encode_id(id: &str) -> String {
    match id.strip_prefix(DESIGN_PREFIX) {
        Some(name) => format!("{DESIGN_PREFIX}{}", urlencoding::encode(name)),
        None => urlencoding::encode(id).into_owned(),
    }
}

/// View options as query parameters. Keys are JSON-encoded, as CouchDB expects.
fn view_params(query: &ViewQuery) -> StoreResult<Vec<(&'static str, String)>> {
    let mut params = Vec::new();
    if query.include_docs {
        params.push(("include_docs", "true".to_string()));
    }
    if let Some(key) = &query.key {
        params.push(("key", serde_json::to_string(key)?));
    }
    if let Some(keys) = &query.keys {
        params.push(("keys", serde_json::to_string(keys)?));
    }
    if let Some(limit) = query.limit {
        params.push(("limit", limit.to_string()));
    }
    if let Some(skip) = query.skip {
        params.push(("skip", skip.to_string()));
    }
    if query.descending {
        params.push(("descending", "true".to_string()));
    }
    Ok(params)
}

async fn decode<T: serde::de::DeserializeOwned>(response: Response) -> StoreResult<T> {
    let body = response
        .bytes()
        .await
        .map_err(|e| StoreError::Network(format!("failed to read response: {e}")))?;
    Ok(serde_json::from_slice(&body)?)
}

async fn error_body(response: Response) -> CouchErrorBody {
    let text = response.text().await.unwrap_or_default();
    serde_json::from_str(&text).unwrap_or(CouchErrorBody {
        error: String::new(),
        reason: text,
    })
}

async fn error_from(response: Response) -> StoreError {
    let status = response.status();
    let body = error_body(response).await;
    status_error(status, body.error, body.reason)
}

fn status_error(status: StatusCode, error: String, reason: String) -> StoreError {
    let detail = if reason.is_empty() { error.clone() } else { reason.clone() };
    match status {
        StatusCode::NOT_FOUND => StoreError::NotFound(detail),
        StatusCode::CONFLICT => StoreError::Conflict(detail),
        StatusCode::FORBIDDEN => StoreError::Forbidden(detail),
        StatusCode::UNAUTHORIZED => StoreError::Unauthorized(detail),
        _ => StoreError::Http {
            status: status.as_u16(),
            error,
            reason,
        },
    }
}
