//! The assembled result of a scenario run.

use serde::{Deserialize, Serialize};

use crate::departures::{DepartureCache, RouteDepartureIndex};
use crate::domain::{FeedVersion, Route, RouteId, Stop, StopId};

/// Stops, routes, feed versions and departures for a scenario.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioSnapshot {
    #[serde(default)]
    pub stops: Vec<Stop>,
    #[serde(default)]
    pub routes: Vec<Route>,
    #[serde(default)]
    pub feed_versions: Vec<FeedVersion>,
    #[serde(default, rename = "stopDepartureCache")]
    pub departure_cache: DepartureCache,
    /// True once every stage has finished.
    #[serde(default)]
    pub is_complete: bool,
    /// Schedule queries that failed; their departures are missing.
    #[serde(default)]
    pub failed_schedule_tasks: usize,
}

impl ScenarioSnapshot {
    pub fn stop(&self, id: StopId) -> Option<&Stop> {
        self.stops.iter().find(|s| s.id == id)
    }

    pub fn route(&self, id: RouteId) -> Option<&Route> {
        self.routes.iter().find(|r| r.id == id)
    }

    /// Build the route-oriented view of this snapshot's departures.
    pub fn route_index(&self) -> RouteDepartureIndex {
        RouteDepartureIndex::from_cache(&self.departure_cache)
    }
}
