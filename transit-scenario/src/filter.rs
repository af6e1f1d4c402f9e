//! Secondary filtering of a fetched scenario.
//!
//! Every route and stop is kept but marked or unmarked. List criteria follow
//! one convention: `None` means the criterion is not applied, an empty list
//! means nothing passes.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::departures::{DepartureCache, RouteDepartureIndex};
use crate::domain::{Agency, GtfsTime, Route, RouteId, Stop, StopId, Weekday, route_type_name};
use crate::headway::{RouteHeadwaySummary, TimeWindow, headway_stats, route_headways};
use crate::scenario::{ScenarioConfig, ScenarioSnapshot};

/// How selected weekdays combine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum WeekdayMode {
    /// Service on at least one selected weekday.
    #[default]
    Any,
    /// Service on every selected weekday.
    All,
}

/// User-selected filter criteria.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<GtfsTime>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<GtfsTime>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_weekdays: Option<Vec<Weekday>>,

    #[serde(default)]
    pub selected_weekday_mode: WeekdayMode,

    /// GTFS route type codes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_route_types: Option<Vec<i32>>,

    /// Agency names.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_agencies: Option<Vec<String>>,

    /// Maximum average headway, in minutes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_under: Option<f64>,

    /// Minimum average headway, in minutes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_over: Option<f64>,
}

impl ScenarioFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_time_window(mut self, start: GtfsTime, end: GtfsTime) -> Self {
        self.start_time = Some(start);
        self.end_time = Some(end);
        self
    }

    pub fn with_weekdays(mut self, days: Vec<Weekday>, mode: WeekdayMode) -> Self {
        self.selected_weekdays = Some(days);
        self.selected_weekday_mode = mode;
        self
    }

    pub fn with_route_types(mut self, route_types: Vec<i32>) -> Self {
        self.selected_route_types = Some(route_types);
        self
    }

    pub fn with_agencies(mut self, agencies: Vec<String>) -> Self {
        self.selected_agencies = Some(agencies);
        self
    }

    pub fn with_frequency_under(mut self, minutes: f64) -> Self {
        self.frequency_under = Some(minutes);
        self
    }

    pub fn with_frequency_over(mut self, minutes: f64) -> Self {
        self.frequency_over = Some(minutes);
        self
    }

    /// The time-of-day window; the whole day where unset.
    pub fn window(&self) -> TimeWindow {
        let whole_day = TimeWindow::default();
        TimeWindow::new(
            self.start_time.unwrap_or(whole_day.start),
            self.end_time.unwrap_or(whole_day.end),
        )
    }

    /// True if any criterion that marks routes is set.
    pub fn has_route_filters(&self) -> bool {
        self.selected_route_types.is_some()
            || self.selected_agencies.is_some()
            || self.frequency_under.is_some()
            || self.frequency_over.is_some()
    }

    fn weekdays_pass(&self, mut served: impl FnMut(Weekday) -> (bool, bool)) -> bool {
        let Some(days) = &self.selected_weekdays else {
            return true;
        };
        if days.is_empty() {
            return false;
        }
        let mut any = false;
        let mut all = true;
        for &day in days {
            let (some, every) = served(day);
            any |= some;
            all &= every;
        }
        match self.selected_weekday_mode {
            WeekdayMode::Any => any,
            WeekdayMode::All => all,
        }
    }
}

/// A route with its derived frequency and filter mark.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteSummary {
    pub id: RouteId,
    pub route_id: String,
    pub route_name: String,
    pub route_mode: String,
    pub route_type: i32,
    pub agency_name: String,
    pub marked: bool,
    /// Average headway of the busier direction, in seconds.
    pub average_frequency: Option<f64>,
    pub fastest_frequency: Option<u32>,
    pub slowest_frequency: Option<u32>,
    pub headways: RouteHeadwaySummary,
}

/// Visits to a stop over some set of dates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StopVisitCounts {
    pub visit_count: u32,
    pub date_count: u32,
    pub visit_average: Option<f64>,
    /// False if any counted date had no visit.
    pub all_date_service: bool,
}

impl Default for StopVisitCounts {
    fn default() -> Self {
        Self {
            visit_count: 0,
            date_count: 0,
            visit_average: None,
            all_date_service: true,
        }
    }
}

impl StopVisitCounts {
    fn record(&mut self, visits: u32) {
        self.date_count += 1;
        self.visit_count += visits;
        self.visit_average = Some(f64::from(self.visit_count) / f64::from(self.date_count));
        if visits == 0 {
            self.all_date_service = false;
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StopVisitSummary {
    pub total: StopVisitCounts,
    pub by_weekday: [StopVisitCounts; 7],
}

impl StopVisitSummary {
    pub fn weekday(&self, day: Weekday) -> &StopVisitCounts {
        &self.by_weekday[day.index()]
    }
}

/// A stop with its visit counts and filter mark.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopSummary {
    pub id: StopId,
    pub stop_id: String,
    pub stop_name: Option<String>,
    pub marked: bool,
    pub visits: StopVisitSummary,
}

/// An agency seen at the scenario's stops.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgencySummary {
    pub id: i64,
    pub agency_id: String,
    pub agency_name: String,
    pub routes_count: usize,
    /// Comma-separated mode names of the agency's routes.
    pub routes_modes: String,
    pub stops_count: usize,
    /// Serves a marked stop or operates a marked route.
    pub marked: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterResult {
    pub routes: Vec<RouteSummary>,
    pub stops: Vec<StopSummary>,
    pub agencies: Vec<AgencySummary>,
    pub marked_route_ids: BTreeSet<RouteId>,
    pub marked_stop_ids: BTreeSet<StopId>,
}

/// Mark the routes and stops of `snapshot` against `filter`.
///
/// Routes are marked first; with route-level criteria set, a stop must also
/// serve at least one marked route.
pub fn apply(snapshot: &ScenarioSnapshot, config: &ScenarioConfig, filter: &ScenarioFilter) -> FilterResult {
    let dates = config.dates();
    let window = filter.window();
    let index = snapshot.route_index();

    let routes: Vec<RouteSummary> = snapshot
        .routes
        .iter()
        .map(|route| summarize_route(route, &dates, window, &index, filter))
        .collect();
    let marked_route_ids: BTreeSet<RouteId> = routes.iter().filter(|r| r.marked).map(|r| r.id).collect();

    let stops: Vec<StopSummary> = snapshot
        .stops
        .iter()
        .map(|stop| summarize_stop(stop, &dates, window, &snapshot.departure_cache, filter, &marked_route_ids))
        .collect();
    let marked_stop_ids: BTreeSet<StopId> = stops.iter().filter(|s| s.marked).map(|s| s.id).collect();

    let agencies = summarize_agencies(snapshot, &routes, &marked_stop_ids);

    debug!(
        routes = routes.len(),
        marked_routes = marked_route_ids.len(),
        stops = stops.len(),
        marked_stops = marked_stop_ids.len(),
        "Applied scenario filter"
    );

    FilterResult {
        routes,
        stops,
        agencies,
        marked_route_ids,
        marked_stop_ids,
    }
}

fn summarize_route(
    route: &Route,
    dates: &[NaiveDate],
    window: TimeWindow,
    index: &RouteDepartureIndex,
    filter: &ScenarioFilter,
) -> RouteSummary {
    let headways = route_headways(route.id, dates, window, index);
    let stats = headway_stats(headways.total.busier());
    let average = stats.map(|s| s.average);

    let marked = route_marked(route, &headways, average, filter);

    RouteSummary {
        id: route.id,
        route_id: route.route_id.clone(),
        route_name: route.display_name().to_string(),
        route_mode: route.mode().to_string(),
        route_type: route.route_type,
        agency_name: agency_name(&route.agency).to_string(),
        marked,
        average_frequency: average,
        fastest_frequency: stats.map(|s| s.fastest),
        slowest_frequency: stats.map(|s| s.slowest),
        headways,
    }
}

fn route_marked(route: &Route, headways: &RouteHeadwaySummary, average: Option<f64>, filter: &ScenarioFilter) -> bool {
    if !filter.weekdays_pass(|day| {
        let served = headways.weekday(day).has_service();
        (served, served)
    }) {
        return false;
    }

    if let Some(types) = &filter.selected_route_types {
        if !types.contains(&route.route_type) {
            return false;
        }
    }

    if let Some(agencies) = &filter.selected_agencies {
        if !agencies.iter().any(|a| *a == route.agency.agency_name) {
            return false;
        }
    }

    // Routes without a measurable headway fail either threshold.
    if let Some(over) = filter.frequency_over {
        if average.is_none_or(|avg| avg < over * 60.0) {
            return false;
        }
    }
    if let Some(under) = filter.frequency_under {
        if average.is_none_or(|avg| avg > under * 60.0) {
            return false;
        }
    }

    true
}

fn summarize_stop(
    stop: &Stop,
    dates: &[NaiveDate],
    window: TimeWindow,
    cache: &DepartureCache,
    filter: &ScenarioFilter,
    marked_routes: &BTreeSet<RouteId>,
) -> StopSummary {
    let visits = stop_visits(stop.id, dates, window, cache, filter.selected_weekdays.as_deref());

    let mut marked = filter.weekdays_pass(|day| {
        let counts = visits.weekday(day);
        (counts.visit_count > 0, counts.all_date_service)
    });
    if marked && filter.has_route_filters() {
        marked = stop.route_ids().any(|id| marked_routes.contains(&id));
    }

    StopSummary {
        id: stop.id,
        stop_id: stop.stop_id.clone(),
        stop_name: stop.stop_name.clone(),
        marked,
        visits,
    }
}

/// Count departures inside `window` on each date whose weekday is selected.
fn stop_visits(
    stop_id: StopId,
    dates: &[NaiveDate],
    window: TimeWindow,
    cache: &DepartureCache,
    weekdays: Option<&[Weekday]>,
) -> StopVisitSummary {
    let mut summary = StopVisitSummary::default();
    let Some(weekdays) = weekdays else {
        return summary;
    };

    for &date in dates {
        let day = Weekday::of(date);
        if !weekdays.contains(&day) {
            continue;
        }
        let visits = cache
            .get(stop_id, date)
            .iter()
            .filter(|d| window.contains(d.departure_time))
            .count() as u32;
        summary.total.record(visits);
        summary.by_weekday[day.index()].record(visits);
    }

    summary
}

#[derive(Default)]
struct AgencyTally<'a> {
    agency: Option<&'a Agency>,
    routes: HashSet<RouteId>,
    route_types: BTreeSet<i32>,
    stops: HashSet<StopId>,
}

fn summarize_agencies(
    snapshot: &ScenarioSnapshot,
    routes: &[RouteSummary],
    marked_stops: &BTreeSet<StopId>,
) -> Vec<AgencySummary> {
    let mut tallies: BTreeMap<&str, AgencyTally<'_>> = BTreeMap::new();
    let mut marked_agencies: HashSet<i64> = HashSet::new();

    for stop in &snapshot.stops {
        for rs in &stop.route_stops {
            let agency = &rs.route.agency;
            if marked_stops.contains(&stop.id) {
                marked_agencies.insert(agency.id);
            }
            if agency.agency_id.is_empty() {
                continue;
            }
            let tally = tallies.entry(agency.agency_id.as_str()).or_default();
            tally.agency = Some(agency);
            tally.routes.insert(rs.route.id);
            tally.route_types.insert(rs.route.route_type);
            tally.stops.insert(stop.id);
        }
    }

    for (summary, route) in routes.iter().zip(&snapshot.routes) {
        if summary.marked {
            marked_agencies.insert(route.agency.id);
        }
    }

    tallies
        .into_values()
        .filter_map(|tally| {
            let agency = tally.agency?;
            let modes: BTreeSet<&str> = tally.route_types.iter().map(|t| route_type_name(*t)).collect();
            Some(AgencySummary {
                id: agency.id,
                agency_id: agency.agency_id.clone(),
                agency_name: agency_name(agency).to_string(),
                routes_count: tally.routes.len(),
                routes_modes: modes.into_iter().collect::<Vec<_>>().join(", "),
                stops_count: tally.stops.len(),
                marked: marked_agencies.contains(&agency.id),
            })
        })
        .collect()
}

fn agency_name(agency: &Agency) -> &str {
    if agency.agency_name.is_empty() {
        "Unknown"
    } else {
        &agency.agency_name
    }
}
