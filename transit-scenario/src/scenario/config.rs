//! Scenario configuration.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::domain::{Bbox, date_range};

use super::error::ScenarioError;

/// Default stops per page.
pub const DEFAULT_STOP_LIMIT: usize = 1000;

/// Default number of schedule queries in flight at once.
pub const DEFAULT_SCHEDULE_CONCURRENCY: usize = 8;

/// Default number of stops per schedule query.
pub const DEFAULT_SCHEDULE_BATCH_SIZE: usize = 100;

/// What area a scenario covers.
#[derive(Debug, Clone, PartialEq)]
pub enum GeoFilter {
    Bbox(Bbox),
    GeographyIds(Vec<i64>),
}

impl GeoFilter {
    /// Variables for the feed-version query.
    pub fn feed_variables(&self) -> Value {
        match self {
            GeoFilter::Bbox(bbox) => json!({ "where": { "bbox": bbox } }),
            GeoFilter::GeographyIds(ids) => json!({ "where": { "geography_ids": ids } }),
        }
    }

    /// The `location` member of a stop filter.
    pub fn stop_location(&self) -> Value {
        match self {
            GeoFilter::Bbox(bbox) => json!({ "bbox": bbox }),
            GeoFilter::GeographyIds(ids) => json!({ "geography_ids": ids }),
        }
    }
}

/// Inputs to a scenario run.
///
/// Exactly one geographic filter is used: non-empty `geography_ids` take
/// precedence over `bbox`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<Bbox>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geography_ids: Option<Vec<i64>>,

    /// First service date, inclusive.
    pub start_date: NaiveDate,

    /// Last service date, inclusive.
    pub end_date: NaiveDate,

    /// Fetch departures. When false only stops and routes are loaded.
    #[serde(default = "default_true")]
    pub schedule_enabled: bool,

    /// Stops per page.
    #[serde(default = "default_stop_limit")]
    pub stop_limit: usize,

    /// Maximum schedule queries in flight.
    #[serde(default = "default_schedule_concurrency")]
    pub schedule_concurrency: usize,
}

fn default_true() -> bool {
    true
}

fn default_stop_limit() -> usize {
    DEFAULT_STOP_LIMIT
}

fn default_schedule_concurrency() -> usize {
    DEFAULT_SCHEDULE_CONCURRENCY
}

impl ScenarioConfig {
    /// A config covering a bounding box over a date range, with defaults.
    pub fn for_bbox(bbox: Bbox, start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            bbox: Some(bbox),
            geography_ids: None,
            start_date,
            end_date,
            schedule_enabled: true,
            stop_limit: DEFAULT_STOP_LIMIT,
            schedule_concurrency: DEFAULT_SCHEDULE_CONCURRENCY,
        }
    }

    /// A config covering census geographies over a date range, with defaults.
    pub fn for_geographies(ids: Vec<i64>, start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            bbox: None,
            geography_ids: Some(ids),
            ..Self::for_bbox(Bbox::new(0.0, 0.0, 0.0, 0.0), start_date, end_date)
        }
    }

    pub fn with_schedule(mut self, enabled: bool) -> Self {
        self.schedule_enabled = enabled;
        self
    }

    pub fn with_stop_limit(mut self, limit: usize) -> Self {
        self.stop_limit = limit;
        self
    }

    pub fn with_schedule_concurrency(mut self, n: usize) -> Self {
        self.schedule_concurrency = n;
        self
    }

    /// The geographic filter in effect, if any.
    pub fn geo_filter(&self) -> Option<GeoFilter> {
        match (&self.geography_ids, &self.bbox) {
            (Some(ids), _) if !ids.is_empty() => Some(GeoFilter::GeographyIds(ids.clone())),
            (_, Some(bbox)) => Some(GeoFilter::Bbox(*bbox)),
            _ => None,
        }
    }

    /// Every service date in the range.
    pub fn dates(&self) -> Vec<NaiveDate> {
        date_range(self.start_date, self.end_date)
    }

    /// Check the config and return its geographic filter.
    pub fn validate(&self) -> Result<GeoFilter, ScenarioError> {
        let filter = self.geo_filter().ok_or_else(|| {
            ScenarioError::Validation("either bbox or geographyIds must be provided".to_string())
        })?;
        if let GeoFilter::Bbox(bbox) = &filter {
            if !bbox.is_valid() {
                return Err(ScenarioError::Validation(format!("invalid bbox: {bbox:?}")));
            }
        }
        if self.end_date < self.start_date {
            return Err(ScenarioError::Validation(format!(
                "end date {} is before start date {}",
                self.end_date, self.start_date
            )));
        }
        if self.stop_limit == 0 {
            return Err(ScenarioError::Validation("stopLimit must be positive".to_string()));
        }
        Ok(filter)
    }
}

/// Tuning knobs for the fetcher that are not part of a scenario's identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetcherOptions {
    /// Stops per schedule query.
    pub schedule_batch_size: usize,
}

impl FetcherOptions {
    pub fn new(schedule_batch_size: usize) -> Self {
        Self {
            schedule_batch_size,
        }
    }
}

impl Default for FetcherOptions {
    fn default() -> Self {
        Self {
            schedule_batch_size: DEFAULT_SCHEDULE_BATCH_SIZE,
        }
    }
}
