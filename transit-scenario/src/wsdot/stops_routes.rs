//! Flat stop, route and agency tables for exporting a frequency report.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use serde_json::{Value, json};
use tracing::debug;

use crate::domain::{Agency, FeedVersionRef, PointGeometry};
use crate::scenario::ScenarioSnapshot;

use super::report::FrequencyReport;

const UNKNOWN: &str = "unknown";
const NO_AGENCY_NAME: &str = "No Agency Info";

/// One served stop with its tier flags.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StopServiceRow {
    pub stop_id: String,
    pub stop_code: Option<String>,
    pub stop_name: String,
    pub stop_lat: f64,
    pub stop_lon: f64,
    pub location_type: i32,
    /// Key into [`StopsRoutesReport::agencies`]
    pub agency_id: String,
    pub feed_onestop_id: String,
    pub feed_version_sha1: String,
    pub geometry: PointGeometry,
    /// 1 if the stop meets the tier, else 0
    #[serde(flatten)]
    pub levels: BTreeMap<String, u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteRow {
    pub route_id: String,
    pub route_short_name: Option<String>,
    pub route_long_name: Option<String>,
    pub route_type: i32,
    pub route_color: Option<String>,
    pub agency_id: String,
    pub feed_onestop_id: String,
    pub feed_version_sha1: String,
    pub geometry: Value,
}

/// An agency as seen across feeds, with how many rows refer to it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgencyRow {
    /// `{feed onestop id}:{GTFS agency id}`
    pub agency_id: String,
    pub agency_name: String,
    pub feed_onestop_id: String,
    pub stops_count: usize,
    pub routes_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StopsRoutesReport {
    pub stops: Vec<StopServiceRow>,
    pub routes: Vec<RouteRow>,
    /// In order of first appearance, stops before routes
    pub agencies: Vec<AgencyRow>,
}

impl StopsRoutesReport {
    /// Flatten a snapshot and its frequency report into export tables.
    ///
    /// Stops with no routes are left out. Tier flags are looked up by GTFS
    /// stop id, so a stop missing from `report` gets 0 for every tier.
    pub fn build(snapshot: &ScenarioSnapshot, report: &FrequencyReport) -> Self {
        let flags: HashMap<&str, &BTreeMap<String, bool>> =
            report.stops.iter().map(|s| (s.stop_id.as_str(), &s.levels)).collect();
        let mut agencies = AgencyTable::default();

        let stops: Vec<StopServiceRow> = snapshot
            .stops
            .iter()
            .filter_map(|stop| {
                let agency = &stop.route_stops.first()?.route.agency;
                let (feed_onestop_id, feed_version_sha1) = feed_ids(stop.feed_version.as_ref());
                let agency_id = agencies.record(agency, &feed_onestop_id, Count::Stop);
                let stop_flags = flags.get(stop.stop_id.as_str());
                let levels = report
                    .level_stops
                    .keys()
                    .map(|name| {
                        let met = stop_flags.and_then(|f| f.get(name)).copied().unwrap_or(false);
                        (name.clone(), u8::from(met))
                    })
                    .collect();
                let geometry = stop.geometry.unwrap_or(PointGeometry::new(0.0, 0.0));

                Some(StopServiceRow {
                    stop_id: stop.stop_id.clone(),
                    stop_code: stop.stop_code.clone(),
                    stop_name: stop.stop_name.clone().unwrap_or_default(),
                    stop_lat: geometry.lat(),
                    stop_lon: geometry.lon(),
                    location_type: stop.location_type,
                    agency_id,
                    feed_onestop_id,
                    feed_version_sha1,
                    geometry,
                    levels,
                })
            })
            .collect();

        let routes: Vec<RouteRow> = snapshot
            .routes
            .iter()
            .map(|route| {
                let (feed_onestop_id, feed_version_sha1) = feed_ids(route.feed_version.as_ref());
                let agency_id = agencies.record(&route.agency, &feed_onestop_id, Count::Route);
                RouteRow {
                    route_id: route.route_id.clone(),
                    route_short_name: route.route_short_name.clone(),
                    route_long_name: route.route_long_name.clone(),
                    route_type: route.route_type,
                    route_color: route.route_color.clone(),
                    agency_id,
                    feed_onestop_id,
                    feed_version_sha1,
                    geometry: route
                        .geometry
                        .clone()
                        .unwrap_or_else(|| json!({"type": "MultiLineString", "coordinates": []})),
                }
            })
            .collect();

        let agencies = agencies.rows;
        debug!(
            stops = stops.len(),
            routes = routes.len(),
            agencies = agencies.len(),
            "Built stops and routes tables"
        );

        Self { stops, routes, agencies }
    }
}

fn feed_ids(feed_version: Option<&FeedVersionRef>) -> (String, String) {
    match feed_version {
        Some(fv) => (fv.feed.onestop_id.clone(), fv.sha1.clone()),
        None => (UNKNOWN.to_owned(), UNKNOWN.to_owned()),
    }
}

enum Count {
    Stop,
    Route,
}

#[derive(Default)]
struct AgencyTable {
    rows: Vec<AgencyRow>,
    index: HashMap<String, usize>,
}

impl AgencyTable {
    /// Count one row against an agency and return its table key.
    fn record(&mut self, agency: &Agency, feed_onestop_id: &str, count: Count) -> String {
        let gtfs_id = if agency.agency_id.is_empty() {
            "null"
        } else {
            &agency.agency_id
        };
        let key = format!("{feed_onestop_id}:{gtfs_id}");

        let i = *self.index.entry(key.clone()).or_insert_with(|| {
            let name = [&agency.agency_name, &agency.agency_id]
                .into_iter()
                .find(|s| !s.is_empty())
                .map_or(NO_AGENCY_NAME, |s| s.as_str());
            self.rows.push(AgencyRow {
                agency_id: key.clone(),
                agency_name: name.to_owned(),
                feed_onestop_id: feed_onestop_id.to_owned(),
                stops_count: 0,
                routes_count: 0,
            });
            self.rows.len() - 1
        });

        match count {
            Count::Stop => self.rows[i].stops_count += 1,
            Count::Route => self.rows[i].routes_count += 1,
        }
        key
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wsdot::StopLevelResult;
    use std::collections::BTreeSet;

    fn snapshot() -> ScenarioSnapshot {
        serde_json::from_value(json!({
            "stops": [
                {
                    "id": 1, "stop_id": "S1", "stop_name": "Main St", "stop_code": "101",
                    "geometry": {"type": "Point", "coordinates": [-122.3, 47.6]},
                    "feed_version": {"sha1": "abc", "feed": {"onestop_id": "f-metro"}},
                    "route_stops": [{"route": {"id": 7, "agency": {"id": 1, "agency_id": "KCM", "agency_name": "King County Metro"}}}]
                },
                {
                    "id": 2, "stop_id": "S2",
                    "route_stops": [{"route": {"id": 8, "agency": {"id": 2}}}]
                },
                {"id": 3, "stop_id": "S3", "stop_name": "Unserved"}
            ],
            "routes": [
                {
                    "id": 7, "route_id": "R7", "route_short_name": "7", "route_type": 3,
                    "agency": {"id": 1, "agency_id": "KCM", "agency_name": "King County Metro"},
                    "feed_version": {"sha1": "abc", "feed": {"onestop_id": "f-metro"}}
                },
                {
                    "id": 9, "route_id": "R9", "route_type": 3,
                    "agency": {"id": 1, "agency_id": "KCM", "agency_name": "King County Metro"},
                    "feed_version": {"sha1": "abc", "feed": {"onestop_id": "f-metro"}},
                    "geometry": {"type": "LineString", "coordinates": [[0, 0], [1, 1]]}
                }
            ]
        }))
        .unwrap()
    }

    fn report() -> FrequencyReport {
        FrequencyReport {
            stops: vec![StopLevelResult {
                stop_id: "S1".into(),
                stop_name: "Main St".into(),
                stop_lat: 47.6,
                stop_lon: -122.3,
                levels: BTreeMap::from([("level1".into(), false), ("level4".into(), true)]),
            }],
            level_stops: BTreeMap::from([("level1".into(), BTreeSet::new()), ("level4".into(), BTreeSet::from([1]))]),
            level_layers: Default::default(),
            bbox_intersection: Vec::new(),
        }
    }

    #[test]
    fn served_stops_carry_tier_flags() {
        let tables = StopsRoutesReport::build(&snapshot(), &report());

        let ids: Vec<_> = tables.stops.iter().map(|s| s.stop_id.as_str()).collect();
        assert_eq!(ids, ["S1", "S2"]);

        let main = &tables.stops[0];
        assert_eq!(main.agency_id, "f-metro:KCM");
        assert_eq!(main.stop_code.as_deref(), Some("101"));
        assert_eq!((main.stop_lat, main.stop_lon), (47.6, -122.3));
        assert_eq!(main.levels["level4"], 1);
        assert_eq!(main.levels["level1"], 0);
    }

    #[test]
    fn stop_without_feed_or_geometry_gets_placeholders() {
        let tables = StopsRoutesReport::build(&snapshot(), &report());
        let bare = &tables.stops[1];

        assert_eq!(bare.agency_id, "unknown:null");
        assert_eq!(bare.feed_version_sha1, "unknown");
        assert_eq!(bare.stop_name, "");
        assert_eq!((bare.stop_lat, bare.stop_lon), (0.0, 0.0));
        assert_eq!(bare.levels["level4"], 0);
    }

    #[test]
    fn agencies_count_stops_and_routes() {
        let tables = StopsRoutesReport::build(&snapshot(), &report());

        assert_eq!(tables.agencies.len(), 2);
        let metro = &tables.agencies[0];
        assert_eq!(metro.agency_id, "f-metro:KCM");
        assert_eq!(metro.agency_name, "King County Metro");
        assert_eq!((metro.stops_count, metro.routes_count), (1, 2));

        let anonymous = &tables.agencies[1];
        assert_eq!(anonymous.agency_name, "No Agency Info");
        assert_eq!((anonymous.stops_count, anonymous.routes_count), (1, 0));
    }

    #[test]
    fn route_rows_default_to_empty_geometry() {
        let tables = StopsRoutesReport::build(&snapshot(), &report());

        assert_eq!(tables.routes.len(), 2);
        assert_eq!(tables.routes[0].geometry["coordinates"], json!([]));
        assert_eq!(tables.routes[1].geometry["type"], "LineString");
        assert_eq!(tables.routes[1].agency_id, "f-metro:KCM");
    }

    #[test]
    fn rows_serialize_flat() {
        let tables = StopsRoutesReport::build(&snapshot(), &report());
        let value = serde_json::to_value(&tables).unwrap();

        let row = &value["stops"][0];
        assert_eq!(row["stopId"], "S1");
        assert_eq!(row["feedOnestopId"], "f-metro");
        assert_eq!(row["level4"], 1);
        assert_eq!(value["agencies"][0]["routesCount"], 2);
    }
}
