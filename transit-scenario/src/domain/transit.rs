//! Transit entities as returned by the Transitland GraphQL API.
//!
//! Field names follow the API's snake_case so these types deserialize
//! straight from query responses and round-trip through fixtures.

use serde::{Deserialize, Serialize};

use super::geom::PointGeometry;

/// Numeric database id of a stop.
pub type StopId = i64;

/// Numeric database id of a route.
pub type RouteId = i64;

/// Numeric database id of a trip.
pub type TripId = i64;

/// Parent feed of a feed version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedRef {
    pub id: i64,
    pub onestop_id: String,
}

/// One immutable GTFS dataset, the active version of a feed in the area.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedVersion {
    pub id: i64,
    pub sha1: String,
    pub feed: FeedRef,
}

/// Compact feed-version reference carried on stops and routes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedVersionRef {
    pub sha1: String,
    pub feed: FeedOnestop,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedOnestop {
    pub onestop_id: String,
}

/// Agency operating a route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agency {
    pub id: i64,
    #[serde(default)]
    pub agency_id: String,
    #[serde(default)]
    pub agency_name: String,
}

/// Route summary embedded in a stop's route associations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteStopRoute {
    pub id: RouteId,
    #[serde(default)]
    pub route_id: String,
    #[serde(default)]
    pub route_type: i32,
    #[serde(default)]
    pub route_short_name: Option<String>,
    #[serde(default)]
    pub route_long_name: Option<String>,
    pub agency: Agency,
}

/// Association between a stop and a route serving it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteStop {
    pub route: RouteStopRoute,
}

/// A physical stop (GTFS `location_type = 0`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stop {
    pub id: StopId,
    #[serde(default)]
    pub stop_id: String,
    #[serde(default)]
    pub stop_name: Option<String>,
    #[serde(default)]
    pub stop_code: Option<String>,
    #[serde(default)]
    pub location_type: i32,
    #[serde(default)]
    pub geometry: Option<PointGeometry>,
    #[serde(default)]
    pub feed_version: Option<FeedVersionRef>,
    #[serde(default)]
    pub route_stops: Vec<RouteStop>,
}

impl Stop {
    /// Ids of every route associated with this stop.
    pub fn route_ids(&self) -> impl Iterator<Item = RouteId> + '_ {
        self.route_stops.iter().map(|rs| rs.route.id)
    }
}

/// A GTFS route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub id: RouteId,
    #[serde(default)]
    pub route_id: String,
    #[serde(default)]
    pub route_short_name: Option<String>,
    #[serde(default)]
    pub route_long_name: Option<String>,
    #[serde(default)]
    pub route_type: i32,
    #[serde(default)]
    pub route_color: Option<String>,
    /// Opaque GeoJSON geometry, passed through untouched.
    #[serde(default)]
    pub geometry: Option<serde_json::Value>,
    pub agency: Agency,
    #[serde(default)]
    pub feed_version: Option<FeedVersionRef>,
}

impl Route {
    /// Display name: short name if present, else long name, else the GTFS id.
    pub fn display_name(&self) -> &str {
        self.route_short_name
            .as_deref()
            .filter(|s| !s.is_empty())
            .or_else(|| self.route_long_name.as_deref().filter(|s| !s.is_empty()))
            .unwrap_or(&self.route_id)
    }

    /// Human-readable mode for the GTFS `route_type` code.
    pub fn mode(&self) -> &'static str {
        route_type_name(self.route_type)
    }
}

/// Name of a GTFS route type, including the common extended types.
pub fn route_type_name(route_type: i32) -> &'static str {
    match route_type {
        0 => "Tram",
        1 => "Metro",
        2 => "Rail",
        3 => "Bus",
        4 => "Ferry",
        5 => "Cable tram",
        6 => "Aerial lift",
        7 => "Funicular",
        11 => "Trolleybus",
        12 => "Monorail",
        100..=199 => "Rail",
        200..=299 => "Coach",
        700..=799 => "Bus",
        900..=999 => "Tram",
        1000..=1099 => "Ferry",
        _ => "Other",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STOP_JSON: &str = r#"{
        "id": 101,
        "stop_id": "1_1000",
        "stop_name": "3rd Ave & Pine St",
        "location_type": 0,
        "geometry": {"type": "Point", "coordinates": [-122.338, 47.611]},
        "feed_version": {"sha1": "abc", "feed": {"onestop_id": "f-c23-metro"}},
        "route_stops": [
            {"route": {"id": 7, "route_id": "100001", "route_type": 3,
                       "route_short_name": "1", "agency": {"id": 1, "agency_id": "1", "agency_name": "Metro"}}},
            {"route": {"id": 9, "route_id": "100002", "route_type": 3,
                       "agency": {"id": 1, "agency_id": "1", "agency_name": "Metro"}}}
        ]
    }"#;

    #[test]
    fn stop_deserializes_from_api_shape() {
        let stop: Stop = serde_json::from_str(STOP_JSON).unwrap();
        assert_eq!(stop.id, 101);
        assert_eq!(stop.stop_name.as_deref(), Some("3rd Ave & Pine St"));
        assert_eq!(stop.route_ids().collect::<Vec<_>>(), vec![7, 9]);
        assert_eq!(stop.geometry.unwrap().lat(), 47.611);
    }

    #[test]
    fn stop_tolerates_missing_optional_fields() {
        let stop: Stop = serde_json::from_str(r#"{"id": 5}"#).unwrap();
        assert_eq!(stop.id, 5);
        assert!(stop.route_stops.is_empty());
        assert!(stop.geometry.is_none());
    }

    #[test]
    fn route_display_name_fallbacks() {
        let agency = Agency {
            id: 1,
            agency_id: "1".into(),
            agency_name: "Metro".into(),
        };
        let mut route = Route {
            id: 1,
            route_id: "R1".into(),
            route_short_name: Some("".into()),
            route_long_name: Some("Rapid Ride".into()),
            route_type: 3,
            route_color: None,
            geometry: None,
            agency,
            feed_version: None,
        };
        assert_eq!(route.display_name(), "Rapid Ride");
        route.route_long_name = None;
        assert_eq!(route.display_name(), "R1");
        assert_eq!(route.mode(), "Bus");
    }

    #[test]
    fn extended_route_types() {
        assert_eq!(route_type_name(109), "Rail");
        assert_eq!(route_type_name(715), "Bus");
        assert_eq!(route_type_name(42), "Other");
    }
}
