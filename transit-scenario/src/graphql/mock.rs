//! Scripted query client for tests and offline development.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use super::client::QueryClient;
use super::error::QueryError;

type Handler = Box<dyn Fn(&Value) -> Result<Value, QueryError> + Send + Sync>;

#[derive(Default)]
struct MockState {
    handlers: Vec<(String, Handler)>,
    calls: Vec<(String, Value)>,
}

/// Query client that answers from registered handlers.
///
/// A handler is selected by the first registered pattern contained in the
/// query document, and receives the query variables. Every call is logged,
/// matched or not. Clones share handlers and the call log.
#[derive(Clone, Default)]
pub struct MockQueryClient {
    state: Arc<Mutex<MockState>>,
}

impl MockQueryClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for documents containing `pattern`.
    pub fn respond_to<F>(&self, pattern: impl Into<String>, handler: F)
    where
        F: Fn(&Value) -> Result<Value, QueryError> + Send + Sync + 'static,
    {
        self.lock().handlers.push((pattern.into(), Box::new(handler)));
    }

    /// Number of queries received so far.
    pub fn call_count(&self) -> usize {
        self.lock().calls.len()
    }

    /// Variables of every received query whose document contains `pattern`.
    pub fn calls_matching(&self, pattern: &str) -> Vec<Value> {
        self.lock()
            .calls
            .iter()
            .filter(|(doc, _)| doc.contains(pattern))
            .map(|(_, vars)| vars.clone())
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        // A handler that panicked poisons the lock; the state is still usable.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl QueryClient for MockQueryClient {
    async fn query(&self, document: &str, variables: Value) -> Result<Value, QueryError> {
        let mut state = self.lock();
        state.calls.push((document.to_string(), variables.clone()));

        let handler = state
            .handlers
            .iter()
            .find(|(pattern, _)| document.contains(pattern.as_str()))
            .map(|(_, h)| h);

        match handler {
            Some(h) => h(&variables),
            None => Err(QueryError::Status {
                status: 404,
                message: format!(
                    "No mock response for query. Registered: {:?}",
                    state.handlers.iter().map(|(p, _)| p.as_str()).collect::<Vec<_>>()
                ),
            }),
        }
    }
}
