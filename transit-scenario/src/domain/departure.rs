//! Scheduled departure records.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::time::GtfsTime;
use super::transit::{RouteId, StopId, TripId};

/// One scheduled departure of a trip from a stop on a service date.
///
/// The stop and date are implied by where the record is stored (see
/// [`DepartureCache`](crate::departures::DepartureCache)).
///
/// Serializes to the API's stop-time shape:
/// `{"departure_time": "HH:MM:SS", "trip": {"id", "direction_id", "route": {"id"}}}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "StopTimeWire", into = "StopTimeWire")]
pub struct Departure {
    pub departure_time: GtfsTime,
    pub trip_id: TripId,
    /// GTFS direction, 0 or 1.
    pub direction_id: u8,
    pub route_id: RouteId,
}

impl Departure {
    pub fn new(departure_time: GtfsTime, trip_id: TripId, direction_id: u8, route_id: RouteId) -> Self {
        Self {
            departure_time,
            trip_id,
            direction_id,
            route_id,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct StopTimeWire {
    departure_time: GtfsTime,
    trip: TripWire,
}

#[derive(Serialize, Deserialize)]
struct TripWire {
    id: TripId,
    #[serde(default)]
    direction_id: Option<u8>,
    route: RouteWire,
}

#[derive(Serialize, Deserialize)]
struct RouteWire {
    id: RouteId,
}

impl From<StopTimeWire> for Departure {
    fn from(wire: StopTimeWire) -> Self {
        Self {
            departure_time: wire.departure_time,
            trip_id: wire.trip.id,
            direction_id: wire.trip.direction_id.unwrap_or(0),
            route_id: wire.trip.route.id,
        }
    }
}

impl From<Departure> for StopTimeWire {
    fn from(d: Departure) -> Self {
        Self {
            departure_time: d.departure_time,
            trip: TripWire {
                id: d.trip_id,
                direction_id: Some(d.direction_id),
                route: RouteWire { id: d.route_id },
            },
        }
    }
}

/// Flattened departure used in progress deltas:
/// `[stop_id, date, "HH:MM:SS", trip_id, direction_id, route_id]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopDepartureTuple(
    pub StopId,
    pub NaiveDate,
    pub GtfsTime,
    pub TripId,
    pub u8,
    pub RouteId,
);

impl StopDepartureTuple {
    pub fn new(stop_id: StopId, date: NaiveDate, departure: &Departure) -> Self {
        Self(
            stop_id,
            date,
            departure.departure_time,
            departure.trip_id,
            departure.direction_id,
            departure.route_id,
        )
    }

    pub fn stop_id(&self) -> StopId {
        self.0
    }

    pub fn date(&self) -> NaiveDate {
        self.1
    }

    pub fn departure(&self) -> Departure {
        Departure::new(self.2, self.3, self.4, self.5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_api_stop_time() {
        let json = r#"{"departure_time":"25:10:00","trip":{"id":88,"direction_id":1,"route":{"id":7}}}"#;
        let d: Departure = serde_json::from_str(json).unwrap();
        assert_eq!(d.departure_time.hour_of_day(), 1);
        assert_eq!(d.trip_id, 88);
        assert_eq!(d.direction_id, 1);
        assert_eq!(d.route_id, 7);
    }

    #[test]
    fn missing_direction_defaults_to_zero() {
        let json = r#"{"departure_time":"08:00:00","trip":{"id":1,"direction_id":null,"route":{"id":2}}}"#;
        let d: Departure = serde_json::from_str(json).unwrap();
        assert_eq!(d.direction_id, 0);
    }

    #[test]
    fn tuple_is_a_json_array() {
        let date = NaiveDate::from_ymd_opt(2024, 8, 19).unwrap();
        let d = Departure::new(GtfsTime::from_hms(7, 30, 0), 5, 1, 9);
        let tuple = StopDepartureTuple::new(42, date, &d);
        let json = serde_json::to_string(&tuple).unwrap();
        assert_eq!(json, r#"[42,"2024-08-19","07:30:00",5,1,9]"#);

        let back: StopDepartureTuple = serde_json::from_str(&json).unwrap();
        assert_eq!(back.departure(), d);
        assert_eq!(back.stop_id(), 42);
    }
}
