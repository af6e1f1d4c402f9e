//! Application state for the web layer.

use std::sync::Arc;

use chrono::{Local, NaiveDate};

use crate::graphql::QueryClient;

/// Source of the current date.
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

/// The local system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// A clock stuck on one date.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Query API client, usually retrying and cached
    pub client: Arc<dyn QueryClient>,

    /// Supplies default dates for requests that omit them
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    /// Create a new app state using the system clock.
    pub fn new(client: impl QueryClient + 'static) -> Self {
        Self {
            client: Arc::new(client),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }
}
