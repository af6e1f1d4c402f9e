//! Transitland GraphQL query layer.
//!
//! Everything above this module talks to a [`QueryClient`], which takes a
//! query document and variables and returns the response's `data` member.
//! Clients compose:
//!
//! - [`HttpQueryClient`] posts to the API with the `apikey` header
//! - [`RetryingClient`] retries any failure after a fixed delay
//! - [`CachedQueryClient`] memoizes successful responses
//! - [`MockQueryClient`] answers from scripted handlers in tests

mod cache;
mod client;
pub mod documents;
mod error;
mod mock;
mod retry;

pub use cache::{CacheConfig, CachedQueryClient};
pub use client::{DEFAULT_ENDPOINT, HttpQueryClient, QueryClient, QueryClientConfig, query_as};
pub use error::QueryError;
pub use mock::MockQueryClient;
pub use retry::{RetryPolicy, RetryingClient};
