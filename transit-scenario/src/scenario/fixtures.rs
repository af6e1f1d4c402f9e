//! Saved scenarios for offline tests.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::filter::ScenarioFilter;

use super::config::ScenarioConfig;
use super::snapshot::ScenarioSnapshot;

#[derive(Debug, thiserror::Error)]
pub enum FixtureError {
    #[error("fixture I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("fixture JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A scenario's inputs and fetched data, serialized together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioFixture {
    pub config: ScenarioConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<ScenarioFilter>,
    pub data: ScenarioSnapshot,
}

impl ScenarioFixture {
    pub fn new(config: ScenarioConfig, data: ScenarioSnapshot) -> Self {
        Self {
            config,
            filter: None,
            data,
        }
    }

    pub fn with_filter(mut self, filter: ScenarioFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Write the fixture as pretty-printed JSON, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), FixtureError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_vec_pretty(self)?)?;
        debug!(path = %path.display(), stops = self.data.stops.len(), "Saved scenario fixture");
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, FixtureError> {
        let path = path.as_ref();
        let fixture: Self = serde_json::from_slice(&fs::read(path)?)?;
        debug!(path = %path.display(), stops = fixture.data.stops.len(), "Loaded scenario fixture");
        Ok(fixture)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Bbox, Departure, GtfsTime, Weekday};
    use crate::filter::WeekdayMode;
    use chrono::NaiveDate;
    use serde_json::json;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 7, d).unwrap()
    }

    fn fixture() -> ScenarioFixture {
        let config = ScenarioConfig::for_bbox(Bbox::new(-122.8, 45.4, -122.5, 45.7), date(3), date(10))
            .with_stop_limit(500);
        let mut data: ScenarioSnapshot = serde_json::from_value(json!({
            "routes": [{"id": 1, "route_id": "test-route-1", "route_type": 3,
                        "agency": {"id": 1, "agency_id": "test-agency", "agency_name": "Test Agency"}}],
            "stops": [{"id": 1, "stop_id": "S1", "geometry": {"type": "Point", "coordinates": [-122.6, 45.5]}}],
            "isComplete": true
        }))
        .unwrap();
        data.departure_cache.add(
            1,
            date(3),
            vec![Departure::new(GtfsTime::from_hms(25, 30, 0), 9, 1, 1)],
        );
        let filter = ScenarioFilter::new()
            .with_time_window(GtfsTime::from_hms(6, 0, 0), GtfsTime::from_hms(22, 0, 0))
            .with_weekdays(vec![Weekday::Monday, Weekday::Friday], WeekdayMode::All)
            .with_route_types(vec![3, 1])
            .with_frequency_under(30.0);
        ScenarioFixture::new(config, data).with_filter(filter)
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("fixture.json");
        let original = fixture();

        original.save(&path).unwrap();
        let loaded = ScenarioFixture::load(&path).unwrap();

        assert_eq!(loaded, original);
        assert_eq!(loaded.config.stop_limit, 500);
        assert_eq!(loaded.data.departure_cache.get(1, date(3))[0].departure_time.to_string(), "25:30:00");
    }

    #[test]
    fn dates_are_iso_strings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fixture.json");
        fixture().save(&path).unwrap();

        let raw: serde_json::Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(raw["config"]["startDate"], "2024-07-03");
        assert_eq!(raw["filter"]["selectedWeekdays"], json!(["monday", "friday"]));
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ScenarioFixture::load(dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, FixtureError::Io(_)));
    }

    #[test]
    fn malformed_file_is_json_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{\"config\": 1}").unwrap();
        assert!(matches!(ScenarioFixture::load(&path), Err(FixtureError::Json(_))));
    }
}
