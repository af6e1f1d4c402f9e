//! Hourly departure counts for one service date.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use tracing::debug;

use crate::domain::{RouteId, StopId, TripId};
use crate::scenario::ScenarioSnapshot;

/// Departures at one stop, by clock hour.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StopFrequency {
    pub hourly: [u32; 24],
    pub total: u32,
    pub route_ids: BTreeSet<RouteId>,
}

impl StopFrequency {
    /// Departures in `hour`; zero for hours outside 0-23.
    pub fn in_hour(&self, hour: usize) -> u32 {
        self.hourly.get(hour).copied().unwrap_or(0)
    }
}

/// Departures of one route in one direction, by clock hour.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteDirectionFrequency {
    /// Distinct trips seen departing any stop in each hour.
    pub hourly_trips: [BTreeSet<TripId>; 24],
    /// Stop departures in each hour.
    pub hourly: [u32; 24],
    pub total: u32,
    pub stops: BTreeSet<StopId>,
}

impl RouteDirectionFrequency {
    pub fn trips_in_hour(&self, hour: usize) -> Option<&BTreeSet<TripId>> {
        self.hourly_trips.get(hour)
    }
}

/// Per-stop and per-route-direction departure counts for one date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrequencyIndex {
    pub date: NaiveDate,
    pub stops: BTreeMap<StopId, StopFrequency>,
    pub routes: BTreeMap<(RouteId, u8), RouteDirectionFrequency>,
}

impl FrequencyIndex {
    /// Count the snapshot's departures on `date`.
    ///
    /// Every stop in the snapshot gets an entry, with zero counts if it has
    /// no service that day. After-midnight departures count towards their
    /// wrapped clock hour.
    pub fn extract(snapshot: &ScenarioSnapshot, date: NaiveDate) -> Self {
        let mut stops = BTreeMap::new();
        let mut routes: BTreeMap<(RouteId, u8), RouteDirectionFrequency> = BTreeMap::new();
        let mut departures = 0usize;

        for stop in &snapshot.stops {
            let mut freq = StopFrequency::default();
            for dep in snapshot.departure_cache.get(stop.id, date) {
                let hour = dep.departure_time.hour_of_day();
                freq.hourly[hour] += 1;
                freq.total += 1;
                freq.route_ids.insert(dep.route_id);

                let route = routes.entry((dep.route_id, dep.direction_id)).or_default();
                route.hourly_trips[hour].insert(dep.trip_id);
                route.hourly[hour] += 1;
                route.total += 1;
                route.stops.insert(stop.id);

                departures += 1;
            }
            stops.insert(stop.id, freq);
        }

        let mut by_hour = [0u32; 24];
        for freq in stops.values() {
            for (total, n) in by_hour.iter_mut().zip(freq.hourly) {
                *total += n;
            }
        }
        debug!(
            date = %date,
            stops = stops.len(),
            route_directions = routes.len(),
            departures,
            by_hour = ?by_hour,
            "Extracted frequencies"
        );

        Self { date, stops, routes }
    }

    pub fn stop(&self, stop_id: StopId) -> Option<&StopFrequency> {
        self.stops.get(&stop_id)
    }

    pub fn route(&self, route_id: RouteId, direction_id: u8) -> Option<&RouteDirectionFrequency> {
        self.routes.get(&(route_id, direction_id))
    }
}
