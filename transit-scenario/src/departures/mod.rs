//! Departure storage and the route-oriented index built from it.

mod cache;
mod index;

pub use cache::DepartureCache;
pub use index::{RouteDepartureIndex, StopDepartures};
