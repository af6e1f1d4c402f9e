//! Per-stop, per-date store of scheduled departures.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::domain::{Departure, StopId};

type DateMap = BTreeMap<NaiveDate, Vec<Departure>>;

/// Departures keyed by stop, then by service date.
///
/// Lists are append-only: adding the same records twice stores them twice.
/// Lookups never fail; a stop or date with no data yields an empty slice.
///
/// Serializes as an array of `[stop_id, [[date, [stop_time, ...]], ...]]`
/// entries so fixtures stay valid JSON with non-string keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DepartureCache {
    stops: BTreeMap<StopId, DateMap>,
}

impl DepartureCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append departures for a stop on a date. Empty input is a no-op.
    pub fn add(&mut self, stop_id: StopId, date: NaiveDate, departures: Vec<Departure>) {
        if departures.is_empty() {
            return;
        }
        self.stops
            .entry(stop_id)
            .or_default()
            .entry(date)
            .or_default()
            .extend(departures);
    }

    /// Departures for a stop on a date, possibly empty.
    pub fn get(&self, stop_id: StopId, date: NaiveDate) -> &[Departure] {
        self.stops
            .get(&stop_id)
            .and_then(|dates| dates.get(&date))
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// True if the stop has at least one departure on the date.
    pub fn has_service(&self, stop_id: StopId, date: NaiveDate) -> bool {
        !self.get(stop_id, date).is_empty()
    }

    /// Every date with departures for a stop, in ascending order.
    pub fn dates_for(&self, stop_id: StopId) -> impl Iterator<Item = NaiveDate> + '_ {
        self.stops
            .get(&stop_id)
            .into_iter()
            .flat_map(|dates| dates.keys().copied())
    }

    /// Number of stops with any stored departures.
    pub fn len(&self) -> usize {
        self.stops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stops.is_empty()
    }

    /// Total number of stored departure records.
    pub fn departure_count(&self) -> usize {
        self.stops
            .values()
            .flat_map(|dates| dates.values())
            .map(Vec::len)
            .sum()
    }

    /// Iterate `(stop_id, date, departures)` in stop then date order.
    pub fn iter(&self) -> impl Iterator<Item = (StopId, NaiveDate, &[Departure])> + '_ {
        self.stops.iter().flat_map(|(&stop_id, dates)| {
            dates
                .iter()
                .map(move |(&date, deps)| (stop_id, date, deps.as_slice()))
        })
    }
}

impl Serialize for DepartureCache {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.stops.iter().map(|(stop_id, dates)| {
            let dates: Vec<(&NaiveDate, &Vec<Departure>)> = dates.iter().collect();
            (stop_id, dates)
        }))
    }
}

impl<'de> Deserialize<'de> for DepartureCache {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let entries: Vec<(StopId, Vec<(NaiveDate, Vec<Departure>)>)> =
            Vec::deserialize(deserializer)?;
        let mut cache = DepartureCache::new();
        for (stop_id, dates) in entries {
            for (date, departures) in dates {
                cache.add(stop_id, date, departures);
            }
        }
        Ok(cache)
    }
}
