//! Web layer.
//!
//! Streams scenario and WSDOT report progress to HTTP clients as
//! newline-delimited JSON, one [`ScenarioProgress`](crate::scenario::ScenarioProgress)
//! per line.

mod dto;
mod routes;
mod state;

pub use dto::*;
pub use routes::{AppError, create_router};
pub use state::{AppState, Clock, FixedClock, SystemClock};
