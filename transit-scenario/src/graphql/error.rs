//! GraphQL client error types.

/// Errors from a [`QueryClient`](super::QueryClient).
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    /// HTTP request failed (network error, timeout, etc.)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Endpoint returned a non-success status code
    #[error("API error {status}: {message}")]
    Status { status: u16, message: String },

    /// Response carried a GraphQL `errors` list
    #[error("query failed: {}", messages.join("; "))]
    Remote { messages: Vec<String> },

    /// Response body or `data` member could not be decoded
    #[error("JSON parse error: {message}")]
    Json { message: String },

    /// Every attempt failed; `source` is the last failure
    #[error("gave up after {attempts} attempts: {source}")]
    ExhaustedRetries {
        attempts: u32,
        #[source]
        source: Box<QueryError>,
    },

    /// Invalid API key or unauthorized
    #[error("unauthorized (invalid API key)")]
    Unauthorized,
}

impl QueryError {
    pub(crate) fn json(err: impl std::fmt::Display) -> Self {
        QueryError::Json {
            message: err.to_string(),
        }
    }
}
