//! Data transfer objects for web requests and responses.

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::domain::{Bbox, Weekday};
use crate::scenario::{DEFAULT_SCHEDULE_CONCURRENCY, DEFAULT_STOP_LIMIT, ScenarioConfig};
use crate::wsdot::{GeographyConfig, ServiceLevelConfig, WsdotReportConfig};

/// Request to stream a scenario.
///
/// Same shape as a scenario config, with every setting optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScenarioRequest {
    pub bbox: Option<Bbox>,

    pub geography_ids: Option<Vec<i64>>,

    /// First service date (defaults to today)
    pub start_date: Option<NaiveDate>,

    /// Last service date (defaults to six days after the start)
    pub end_date: Option<NaiveDate>,

    pub schedule_enabled: Option<bool>,

    pub stop_limit: Option<usize>,

    pub schedule_concurrency: Option<usize>,
}

impl ScenarioRequest {
    /// Fill in defaults, taking missing dates relative to `today`.
    pub fn into_config(self, today: NaiveDate) -> ScenarioConfig {
        let start_date = self.start_date.unwrap_or(today);
        let end_date = self
            .end_date
            .unwrap_or_else(|| start_date.checked_add_days(Days::new(6)).unwrap_or(start_date));

        ScenarioConfig {
            bbox: self.bbox,
            geography_ids: self.geography_ids,
            start_date,
            end_date,
            schedule_enabled: self.schedule_enabled.unwrap_or(true),
            stop_limit: self.stop_limit.unwrap_or(DEFAULT_STOP_LIMIT),
            schedule_concurrency: self.schedule_concurrency.unwrap_or(DEFAULT_SCHEDULE_CONCURRENCY),
        }
    }
}

/// Request to stream a WSDOT frequency report.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WsdotRequest {
    #[serde(flatten)]
    pub scenario: ScenarioRequest,

    /// Weekday to classify (defaults to the first weekday in range)
    #[serde(default)]
    pub weekday_date: Option<NaiveDate>,

    /// Weekend day to classify (defaults to the first weekend day in range)
    #[serde(default)]
    pub weekend_date: Option<NaiveDate>,

    #[serde(flatten)]
    pub geography: GeographyConfig,

    /// Service tiers (defaults to the WSDOT tiers)
    #[serde(default)]
    pub levels: Option<Vec<ServiceLevelConfig>>,
}

fn is_weekend(date: NaiveDate) -> bool {
    matches!(Weekday::of(date), Weekday::Saturday | Weekday::Sunday)
}

impl WsdotRequest {
    /// Fill in defaults. Fails if a sample date is missing and the
    /// scenario's date range has no day of that kind.
    pub fn into_config(self, today: NaiveDate) -> Result<WsdotReportConfig, String> {
        let scenario = self.scenario.into_config(today);
        let dates = scenario.dates();

        let weekday_date = self
            .weekday_date
            .or_else(|| dates.iter().copied().find(|d| !is_weekend(*d)))
            .ok_or("no weekday in the scenario date range")?;
        let weekend_date = self
            .weekend_date
            .or_else(|| dates.iter().copied().find(|d| is_weekend(*d)))
            .ok_or("no weekend day in the scenario date range")?;

        Ok(WsdotReportConfig {
            scenario,
            weekday_date,
            weekend_date,
            geography: self.geography,
            levels: self.levels.unwrap_or_else(ServiceLevelConfig::wsdot_levels),
        })
    }
}

/// Error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 8, d).unwrap()
    }

    #[test]
    fn missing_dates_cover_a_week_from_today() {
        let request: ScenarioRequest = serde_json::from_value(json!({"geographyIds": [5]})).unwrap();
        let config = request.into_config(date(21));

        assert_eq!(config.start_date, date(21));
        assert_eq!(config.end_date, date(27));
        assert_eq!(config.geography_ids, Some(vec![5]));
        assert!(config.schedule_enabled);
        assert_eq!(config.stop_limit, DEFAULT_STOP_LIMIT);
    }

    #[test]
    fn explicit_settings_are_kept() {
        let request: ScenarioRequest = serde_json::from_value(json!({
            "startDate": "2024-08-19",
            "endDate": "2024-08-19",
            "scheduleEnabled": false,
            "stopLimit": 50
        }))
        .unwrap();
        let config = request.into_config(date(1));

        assert_eq!((config.start_date, config.end_date), (date(19), date(19)));
        assert!(!config.schedule_enabled);
        assert_eq!(config.stop_limit, 50);
        assert!(config.bbox.is_none());
    }

    #[test]
    fn wsdot_sample_dates_default_from_range() {
        // 2024-08-21 is a Wednesday.
        let request: WsdotRequest = serde_json::from_value(json!({
            "bbox": {"min_lon": -122.4, "min_lat": 47.5, "max_lon": -122.2, "max_lat": 47.7},
            "stopBufferRadius": 800
        }))
        .unwrap();
        let config = request.into_config(date(21)).unwrap();

        assert_eq!(config.weekday_date, date(21));
        assert_eq!(config.weekend_date, date(24));
        assert_eq!(config.geography.stop_buffer_radius, 800.0);
        assert_eq!(config.levels, ServiceLevelConfig::wsdot_levels());
    }

    #[test]
    fn wsdot_needs_a_weekend_day() {
        let request: WsdotRequest = serde_json::from_value(json!({
            "geographyIds": [1],
            "startDate": "2024-08-19",
            "endDate": "2024-08-20"
        }))
        .unwrap();
        let err = request.into_config(date(1)).unwrap_err();
        assert!(err.contains("weekend"));
    }
}
