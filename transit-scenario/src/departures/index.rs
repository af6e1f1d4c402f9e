//! Route-oriented view of the departure cache.
//!
//! The cache answers "what leaves this stop on this date?". Headway and
//! filter calculations need the inverse: "where does this route stop, and
//! when, in one direction on one date?". Building the inverse once avoids
//! scanning every stop for every route.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;

use crate::domain::{Departure, RouteId, StopId};

use super::cache::DepartureCache;

/// Departures of one route-direction on one date, grouped by stop.
pub type StopDepartures = BTreeMap<StopId, Vec<Departure>>;

type DirectionMap = HashMap<(RouteId, NaiveDate), StopDepartures>;

static EMPTY: StopDepartures = BTreeMap::new();

/// Inverted index of a [`DepartureCache`] keyed by route, direction and date.
///
/// Holds copies of the records. Rebuild it after the cache changes.
#[derive(Debug, Default)]
pub struct RouteDepartureIndex {
    directions: [DirectionMap; 2],
}

impl RouteDepartureIndex {
    /// Build the index in a single pass over the cache.
    ///
    /// Records with a direction other than 0 or 1 are indexed under 1.
    pub fn from_cache(cache: &DepartureCache) -> Self {
        let mut directions: [DirectionMap; 2] = Default::default();

        for (stop_id, date, departures) in cache.iter() {
            for departure in departures {
                let dir = usize::from(departure.direction_id != 0);
                directions[dir]
                    .entry((departure.route_id, date))
                    .or_default()
                    .entry(stop_id)
                    .or_default()
                    .push(*departure);
            }
        }

        Self { directions }
    }

    /// Per-stop departures for a route-direction on a date, or an empty map.
    pub fn get_route_date(&self, route_id: RouteId, direction_id: u8, date: NaiveDate) -> &StopDepartures {
        let dir = usize::from(direction_id != 0);
        self.directions[dir]
            .get(&(route_id, date))
            .unwrap_or(&EMPTY)
    }

    /// True if the route has any departure in either direction on the date.
    pub fn route_runs_on(&self, route_id: RouteId, date: NaiveDate) -> bool {
        self.directions
            .iter()
            .any(|m| m.get(&(route_id, date)).is_some_and(|stops| !stops.is_empty()))
    }

    /// Number of (route, direction, date) keys in the index.
    pub fn key_count(&self) -> usize {
        self.directions.iter().map(HashMap::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::GtfsTime;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 8, d).unwrap()
    }

    fn dep(h: u32, trip: i64, dir: u8, route: i64) -> Departure {
        Departure::new(GtfsTime::from_hms(h, 0, 0), trip, dir, route)
    }

    fn sample_cache() -> DepartureCache {
        let mut cache = DepartureCache::new();
        cache.add(1, date(19), vec![dep(8, 1, 0, 10), dep(9, 2, 1, 10), dep(9, 3, 0, 20)]);
        cache.add(2, date(19), vec![dep(8, 1, 0, 10)]);
        cache.add(2, date(20), vec![dep(8, 4, 0, 10)]);
        cache
    }

    #[test]
    fn groups_by_route_direction_and_date() {
        let index = RouteDepartureIndex::from_cache(&sample_cache());

        let r10_d0 = index.get_route_date(10, 0, date(19));
        assert_eq!(r10_d0.len(), 2);
        assert_eq!(r10_d0[&1].len(), 1);
        assert_eq!(r10_d0[&2].len(), 1);

        let r10_d1 = index.get_route_date(10, 1, date(19));
        assert_eq!(r10_d1.keys().copied().collect::<Vec<_>>(), vec![1]);

        assert_eq!(index.get_route_date(10, 0, date(20))[&2][0].trip_id, 4);
        assert_eq!(index.key_count(), 4);
    }

    #[test]
    fn unknown_keys_are_empty() {
        let index = RouteDepartureIndex::from_cache(&sample_cache());
        assert!(index.get_route_date(99, 0, date(19)).is_empty());
        assert!(index.get_route_date(20, 1, date(19)).is_empty());
        assert!(!index.route_runs_on(20, date(20)));
        assert!(index.route_runs_on(20, date(19)));
    }

    #[test]
    fn repeated_reads_are_equal() {
        let index = RouteDepartureIndex::from_cache(&sample_cache());
        let first = index.get_route_date(10, 0, date(19)).clone();
        let second = index.get_route_date(10, 0, date(19)).clone();
        assert_eq!(first, second);
    }
}
