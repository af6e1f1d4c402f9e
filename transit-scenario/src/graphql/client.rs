//! Transitland GraphQL HTTP client.
//!
//! Posts `{query, variables}` documents to the GraphQL endpoint with the
//! API key header, and unwraps the `data` member of the response.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tokio::sync::Semaphore;
use tracing::trace;

use super::error::QueryError;

/// Default Transitland GraphQL endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://transit.land/api/v2/query";

/// Default maximum concurrent requests.
const DEFAULT_MAX_CONCURRENT: usize = 16;

/// A GraphQL query executor.
///
/// Implementations return the response's `data` member, or an error if the
/// request failed or the response carried GraphQL errors.
#[async_trait]
pub trait QueryClient: Send + Sync {
    async fn query(&self, document: &str, variables: Value) -> Result<Value, QueryError>;
}

#[async_trait]
impl<C: QueryClient + ?Sized> QueryClient for Arc<C> {
    async fn query(&self, document: &str, variables: Value) -> Result<Value, QueryError> {
        (**self).query(document, variables).await
    }
}

/// Run a query and deserialize its `data` member.
///
/// A `null` data member decodes as an empty object, so response types whose
/// fields all default decode to their empty value.
pub async fn query_as<T, C>(client: &C, document: &str, variables: Value) -> Result<T, QueryError>
where
    T: DeserializeOwned,
    C: QueryClient + ?Sized,
{
    let data = client.query(document, variables).await?;
    let data = if data.is_null() { json!({}) } else { data };
    serde_json::from_value(data).map_err(QueryError::json)
}

/// Configuration for the HTTP query client.
#[derive(Debug, Clone)]
pub struct QueryClientConfig {
    /// GraphQL endpoint URL
    pub endpoint: String,
    /// Value for the `apikey` header, if any
    pub api_key: Option<String>,
    /// Maximum concurrent requests
    pub max_concurrent: usize,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl QueryClientConfig {
    /// Create a new config for the given endpoint, without an API key.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: None,
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            timeout_secs: 60,
        }
    }

    /// Set the API key sent in the `apikey` header.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Set maximum concurrent requests.
    pub fn with_max_concurrent(mut self, n: usize) -> Self {
        self.max_concurrent = n;
        self
    }

    /// Set request timeout.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

impl Default for QueryClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_ENDPOINT)
    }
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    errors: Option<Vec<RemoteError>>,
}

#[derive(Deserialize)]
struct RemoteError {
    #[serde(default)]
    message: String,
}

/// GraphQL client over HTTP.
///
/// Uses a semaphore to limit concurrent requests.
#[derive(Debug, Clone)]
pub struct HttpQueryClient {
    http: reqwest::Client,
    endpoint: String,
    semaphore: Arc<Semaphore>,
}

impl HttpQueryClient {
    /// Create a new client with the given configuration.
    pub fn new(config: QueryClientConfig) -> Result<Self, QueryError> {
        let mut headers = HeaderMap::new();

        if let Some(key) = config.api_key.as_deref().filter(|k| !k.is_empty()) {
            let value = HeaderValue::from_str(key).map_err(|_| QueryError::Status {
                status: 0,
                message: "Invalid API key format".to_string(),
            })?;
            headers.insert("apikey", value);
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            endpoint: config.endpoint,
            semaphore: Arc::new(Semaphore::new(config.max_concurrent.max(1))),
        })
    }

    /// The endpoint this client posts to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl QueryClient for HttpQueryClient {
    async fn query(&self, document: &str, variables: Value) -> Result<Value, QueryError> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| QueryError::Status {
                status: 0,
                message: "Semaphore closed".to_string(),
            })?;

        let response = self
            .http
            .post(&self.endpoint)
            .json(&json!({ "query": document, "variables": variables }))
            .send()
            .await?;

        let status = response.status();

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(QueryError::Unauthorized);
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(QueryError::Status {
                status: status.as_u16(),
                message: body.chars().take(500).collect(),
            });
        }

        let body = response.text().await?;
        trace!(bytes = body.len(), "GraphQL response received");

        decode_envelope(&body)
    }
}

/// Split a GraphQL response body into its `data` member or an error.
fn decode_envelope(body: &str) -> Result<Value, QueryError> {
    let envelope: Envelope = serde_json::from_str(body).map_err(QueryError::json)?;

    if let Some(errors) = envelope.errors.filter(|e| !e.is_empty()) {
        return Err(QueryError::Remote {
            messages: errors.into_iter().map(|e| e.message).collect(),
        });
    }

    Ok(envelope.data.unwrap_or(Value::Null))
}
