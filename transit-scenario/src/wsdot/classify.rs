//! Stop classification by service level.
//!
//! Each criterion of a tier contributes a set of stops; the tier's stops
//! are the intersection of those sets. Hour criteria are checked twice:
//! once against each stop's own departures, once against the route
//! directions serving it.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info};

use crate::domain::{StopId, TripId};
use crate::scenario::ScenarioSnapshot;

use super::frequency::FrequencyIndex;
use super::levels::{HourCriterion, NightSegment, ServiceLevelConfig};

/// Qualifying stops per tier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Classification {
    pub level_stops: BTreeMap<String, BTreeSet<StopId>>,
    /// For every indexed stop, whether it is in each tier.
    pub per_stop_flags: BTreeMap<StopId, BTreeMap<String, bool>>,
}

impl Classification {
    pub fn stops_in(&self, level: &str) -> Option<&BTreeSet<StopId>> {
        self.level_stops.get(level)
    }
}

/// Classify the snapshot's stops using service on a representative weekday
/// and weekend day.
pub fn classify(
    snapshot: &ScenarioSnapshot,
    weekday_date: NaiveDate,
    weekend_date: NaiveDate,
    levels: &[ServiceLevelConfig],
) -> Classification {
    let weekday = FrequencyIndex::extract(snapshot, weekday_date);
    let weekend = FrequencyIndex::extract(snapshot, weekend_date);
    classify_indexes(&weekday, &weekend, levels)
}

/// Classify from prebuilt frequency indexes.
pub fn classify_indexes(
    weekday: &FrequencyIndex,
    weekend: &FrequencyIndex,
    levels: &[ServiceLevelConfig],
) -> Classification {
    let mut level_stops = BTreeMap::new();
    for level in levels {
        let stops = evaluate_level(level, weekday, weekend);
        info!(level = %level.name, stops = stops.len(), "Classified service level");
        level_stops.insert(level.name.clone(), stops);
    }

    let all_stops: BTreeSet<StopId> = weekday.stops.keys().chain(weekend.stops.keys()).copied().collect();
    let per_stop_flags = all_stops
        .into_iter()
        .map(|stop_id| {
            let flags = level_stops
                .iter()
                .map(|(name, stops)| (name.clone(), stops.contains(&stop_id)))
                .collect();
            (stop_id, flags)
        })
        .collect();

    Classification {
        level_stops,
        per_stop_flags,
    }
}

/// Stops meeting every criterion of one tier.
pub fn evaluate_level(level: &ServiceLevelConfig, weekday: &FrequencyIndex, weekend: &FrequencyIndex) -> BTreeSet<StopId> {
    let mut contributions: Vec<(&str, BTreeSet<StopId>)> = Vec::new();

    if let Some(peak) = &level.peak {
        contributions.push(("peak stops", stop_level(weekday, peak)));
        contributions.push(("peak routes", route_level(weekday, &peak.hours, peak.min_tph, peak.min_total)));
    }
    if let Some(extended) = &level.extended {
        contributions.push(("extended stops", stop_level(weekday, extended)));
        contributions.push((
            "extended routes",
            route_level(weekday, &extended.hours, extended.min_tph, extended.min_total),
        ));
    }
    if let Some(segments) = &level.night_segments {
        contributions.push(("night", night_level(weekday, segments)));
    }
    if let Some(min_trips) = level.any {
        let all_hours: Vec<usize> = (0..24).collect();
        contributions.push(("any", route_level(weekday, &all_hours, 0, min_trips)));
    }
    if let Some(weekend_criterion) = &level.weekend {
        contributions.push(("weekend stops", stop_level(weekend, weekend_criterion)));
        contributions.push((
            "weekend routes",
            route_level(
                weekend,
                &weekend_criterion.hours,
                weekend_criterion.min_tph,
                weekend_criterion.min_total,
            ),
        ));
    }

    for (criterion, stops) in &contributions {
        debug!(level = %level.name, criterion, stops = stops.len(), "Criterion evaluated");
    }

    intersect_all(contributions.into_iter().map(|(_, stops)| stops))
}

/// Stops with at least `min_tph` departures in every listed hour and
/// `min_total` across them.
pub fn stop_level(index: &FrequencyIndex, criterion: &HourCriterion) -> BTreeSet<StopId> {
    index
        .stops
        .iter()
        .filter(|(_, freq)| {
            let every_hour = criterion.hours.iter().all(|&h| freq.in_hour(h) >= criterion.min_tph);
            let total: u32 = criterion.hours.iter().map(|&h| freq.in_hour(h)).sum();
            every_hour && total >= criterion.min_total
        })
        .map(|(&stop_id, _)| stop_id)
        .collect()
}

/// Stops served by a route direction that meets the criterion.
///
/// Each distinct trip counts once, in the first listed hour it appears.
/// A route direction qualifies with at least `min_total` trips across the
/// hours and at least `min_tph` trips in the last listed hour. Earlier
/// hours are not checked against `min_tph`.
pub fn route_level(index: &FrequencyIndex, hours: &[usize], min_tph: u32, min_total: u32) -> BTreeSet<StopId> {
    let mut stops = BTreeSet::new();

    for ((route_id, direction_id), freq) in &index.routes {
        let mut seen: HashSet<TripId> = HashSet::new();
        let mut last_hour_trips = 0u32;
        for &hour in hours {
            let assigned = freq
                .trips_in_hour(hour)
                .into_iter()
                .flatten()
                .filter(|trip| seen.insert(**trip))
                .count() as u32;
            last_hour_trips = assigned;
        }

        let total = seen.len() as u32;
        if total >= min_total && last_hour_trips >= min_tph {
            debug!(
                route = route_id,
                direction = direction_id,
                trips = total,
                "Route direction qualifies"
            );
            stops.extend(freq.stops.iter().copied());
        }
    }

    stops
}

/// Stops meeting every night segment's minimum.
pub fn night_level(index: &FrequencyIndex, segments: &[NightSegment]) -> BTreeSet<StopId> {
    intersect_all(segments.iter().map(|segment| {
        index
            .stops
            .iter()
            .filter(|(_, freq)| segment.hours.iter().map(|&h| freq.in_hour(h)).sum::<u32>() >= segment.min_total)
            .map(|(&stop_id, _)| stop_id)
            .collect()
    }))
}

/// Intersection of all sets; empty if there are none.
fn intersect_all(sets: impl IntoIterator<Item = BTreeSet<StopId>>) -> BTreeSet<StopId> {
    let mut sets = sets.into_iter();
    let Some(first) = sets.next() else {
        return BTreeSet::new();
    };
    sets.fold(first, |acc, set| acc.intersection(&set).copied().collect())
}
