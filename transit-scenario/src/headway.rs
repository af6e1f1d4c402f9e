//! Route headways: how often a route runs.
//!
//! A route's departures are read at one representative stop per direction
//! and date, the stop with the most departures. Headways are the gaps
//! between consecutive departures there.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::departures::RouteDepartureIndex;
use crate::domain::{GtfsTime, RouteId, StopId, Weekday};

/// Headways shorter than this are treated as bunching and ignored.
pub const MIN_HEADWAY_SECS: u32 = 2 * 60;

/// Inclusive time-of-day window, in service-day seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: GtfsTime,
    pub end: GtfsTime,
}

impl TimeWindow {
    pub fn new(start: GtfsTime, end: GtfsTime) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, time: GtfsTime) -> bool {
        time >= self.start && time <= self.end
    }
}

impl Default for TimeWindow {
    /// The whole service day, 00:00:00 to 24:00:00.
    fn default() -> Self {
        Self {
            start: GtfsTime::from_seconds(0),
            end: GtfsTime::from_hms(24, 0, 0),
        }
    }
}

/// Departure times at a direction's representative stop.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectionDepartures {
    /// Representative stop of the most recent date that had one.
    pub stop_id: Option<StopId>,
    /// Seconds since midnight, sorted within each date.
    pub departures: Vec<u32>,
}

/// Both directions of a route.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadwayDirections {
    pub dir0: DirectionDepartures,
    pub dir1: DirectionDepartures,
}

impl HeadwayDirections {
    pub fn direction(&self, direction_id: u8) -> &DirectionDepartures {
        if direction_id == 0 { &self.dir0 } else { &self.dir1 }
    }

    fn direction_mut(&mut self, direction_id: u8) -> &mut DirectionDepartures {
        if direction_id == 0 { &mut self.dir0 } else { &mut self.dir1 }
    }

    pub fn has_service(&self) -> bool {
        !self.dir0.departures.is_empty() || !self.dir1.departures.is_empty()
    }

    /// Departures of the direction with more of them; direction 0 on a tie.
    pub fn busier(&self) -> &[u32] {
        if self.dir1.departures.len() > self.dir0.departures.len() {
            &self.dir1.departures
        } else {
            &self.dir0.departures
        }
    }

    fn push(&mut self, direction_id: u8, stop_id: StopId, departures: &[u32]) {
        let dir = self.direction_mut(direction_id);
        dir.stop_id = Some(stop_id);
        dir.departures.extend_from_slice(departures);
    }
}

/// A route's departures over a date range, overall and per weekday.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteHeadwaySummary {
    pub total: HeadwayDirections,
    pub by_weekday: [HeadwayDirections; 7],
}

impl RouteHeadwaySummary {
    pub fn weekday(&self, day: Weekday) -> &HeadwayDirections {
        &self.by_weekday[day.index()]
    }
}

/// Average, fastest and slowest headway, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeadwayStats {
    pub average: f64,
    pub fastest: u32,
    pub slowest: u32,
}

/// Collect a route's departures at its representative stops.
///
/// For each direction and date, the stop with the most departures is
/// chosen (the lowest stop id wins a tie) and its departures inside
/// `window` are appended, sorted, to the total and to the date's weekday.
pub fn route_headways(
    route_id: RouteId,
    dates: &[NaiveDate],
    window: TimeWindow,
    index: &RouteDepartureIndex,
) -> RouteHeadwaySummary {
    let mut summary = RouteHeadwaySummary::default();

    for direction_id in [0, 1] {
        for &date in dates {
            let stops = index.get_route_date(route_id, direction_id, date);

            let mut best: Option<(StopId, usize)> = None;
            for (&stop_id, departures) in stops {
                if best.is_none_or(|(_, n)| departures.len() > n) {
                    best = Some((stop_id, departures.len()));
                }
            }
            let Some((stop_id, _)) = best else {
                continue;
            };

            let mut secs: Vec<u32> = stops[&stop_id]
                .iter()
                .map(|d| d.departure_time)
                .filter(|t| window.contains(*t))
                .map(|t| t.seconds())
                .collect();
            secs.sort_unstable();

            summary.total.push(direction_id, stop_id, &secs);
            summary.by_weekday[Weekday::of(date).index()].push(direction_id, stop_id, &secs);
        }
    }

    summary
}

/// Headway statistics for a list of departure times in seconds.
///
/// Returns `None` with fewer than two departures or when every gap is
/// shorter than [`MIN_HEADWAY_SECS`].
pub fn headway_stats(departures: &[u32]) -> Option<HeadwayStats> {
    if departures.len() < 2 {
        return None;
    }

    let mut sorted = departures.to_vec();
    sorted.sort_unstable();

    let headways: Vec<u32> = sorted
        .windows(2)
        .map(|w| w[1] - w[0])
        .filter(|h| *h >= MIN_HEADWAY_SECS)
        .collect();

    let fastest = *headways.iter().min()?;
    let slowest = *headways.iter().max()?;
    let sum: u64 = headways.iter().map(|&h| u64::from(h)).sum();

    Some(HeadwayStats {
        average: sum as f64 / headways.len() as f64,
        fastest,
        slowest,
    })
}
