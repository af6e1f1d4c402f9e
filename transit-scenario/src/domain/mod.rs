//! Domain types for transit scenarios.
//!
//! Entities mirror the Transitland GraphQL payloads; time and calendar
//! types enforce their invariants at construction so downstream code can
//! trust them.

mod calendar;
mod departure;
mod geom;
mod time;
mod transit;

pub use calendar::{Weekday, date_range};
pub use departure::{Departure, StopDepartureTuple};
pub use geom::{Bbox, PointGeometry};
pub use time::{GtfsTime, SECONDS_PER_DAY, TimeError};
pub use transit::{
    Agency, FeedOnestop, FeedRef, FeedVersion, FeedVersionRef, Route, RouteId, RouteStop,
    RouteStopRoute, Stop, StopId, TripId, route_type_name,
};
