//! The WSDOT frequency report.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::domain::StopId;
use crate::graphql::{QueryClient, QueryError};
use crate::scenario::{ProgressSink, ScenarioConfig, ScenarioError, ScenarioFetcher, ScenarioProgress, ScenarioSnapshot, Stage};

use super::classify::{Classification, classify};
use super::geography::{GeographyConfig, GeographyEnricher, GeographyFeature, LevelLayers};
use super::levels::ServiceLevelConfig;

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error(transparent)]
    Scenario(#[from] ScenarioError),

    #[error("geography lookup failed: {0}")]
    Geography(#[from] QueryError),

    #[error("report could not be encoded: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Inputs to a report: a scenario, the dates to sample and the census data
/// to enrich with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WsdotReportConfig {
    #[serde(flatten)]
    pub scenario: ScenarioConfig,

    /// Representative weekday.
    pub weekday_date: NaiveDate,

    /// Representative weekend day.
    pub weekend_date: NaiveDate,

    #[serde(flatten)]
    pub geography: GeographyConfig,

    /// Tiers to classify into.
    #[serde(default = "ServiceLevelConfig::wsdot_levels")]
    pub levels: Vec<ServiceLevelConfig>,
}

impl WsdotReportConfig {
    /// A report over `scenario` with the WSDOT tiers and default census
    /// datasets, and no geography lookup.
    pub fn new(scenario: ScenarioConfig, weekday_date: NaiveDate, weekend_date: NaiveDate) -> Self {
        Self {
            scenario,
            weekday_date,
            weekend_date,
            geography: GeographyConfig::default(),
            levels: ServiceLevelConfig::wsdot_levels(),
        }
    }

    pub fn with_stop_buffer_radius(mut self, metres: f64) -> Self {
        self.geography.stop_buffer_radius = metres;
        self
    }

    pub fn with_levels(mut self, levels: Vec<ServiceLevelConfig>) -> Self {
        self.levels = levels;
        self
    }
}

/// One stop's tiers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StopLevelResult {
    pub stop_id: String,
    pub stop_name: String,
    pub stop_lat: f64,
    pub stop_lon: f64,
    #[serde(flatten)]
    pub levels: BTreeMap<String, bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrequencyReport {
    /// Tiers of every stop with a location.
    pub stops: Vec<StopLevelResult>,
    pub level_stops: BTreeMap<String, BTreeSet<StopId>>,
    pub level_layers: LevelLayers,
    pub bbox_intersection: Vec<GeographyFeature>,
}

/// Classify a fetched snapshot and enrich the result with census data.
pub async fn build_report(
    config: &WsdotReportConfig,
    snapshot: &ScenarioSnapshot,
    client: Arc<dyn QueryClient>,
) -> Result<FrequencyReport, ReportError> {
    let classification = classify(snapshot, config.weekday_date, config.weekend_date, &config.levels);
    let enricher = GeographyEnricher::new(client, config.geography.clone());

    let level_layers = enricher.level_layers(&classification.level_stops).await?;
    let bbox_intersection = match config.scenario.geo_filter() {
        Some(filter) => enricher.bbox_intersection(&filter).await?,
        None => Vec::new(),
    };

    let stops = stop_results(snapshot, &classification);
    info!(
        stops = stops.len(),
        levels = classification.level_stops.len(),
        bbox_features = bbox_intersection.len(),
        "Built frequency report"
    );

    Ok(FrequencyReport {
        stops,
        level_stops: classification.level_stops,
        level_layers,
        bbox_intersection,
    })
}

fn stop_results(snapshot: &ScenarioSnapshot, classification: &Classification) -> Vec<StopLevelResult> {
    snapshot
        .stops
        .iter()
        .filter_map(|stop| {
            let geometry = stop.geometry.as_ref()?;
            let levels = classification.per_stop_flags.get(&stop.id)?.clone();
            Some(StopLevelResult {
                stop_id: stop.stop_id.clone(),
                stop_name: stop.stop_name.clone().unwrap_or_default(),
                stop_lat: geometry.lat(),
                stop_lon: geometry.lon(),
                levels,
            })
        })
        .collect()
}

/// Forwards scenario progress, holding back the scenario's own `complete`
/// record so the report can follow it.
struct HoldComplete<'a> {
    inner: &'a dyn ProgressSink,
    held: Mutex<Option<ScenarioProgress>>,
}

impl<'a> HoldComplete<'a> {
    fn new(inner: &'a dyn ProgressSink) -> Self {
        Self {
            inner,
            held: Mutex::new(None),
        }
    }

    fn take(&self) -> Option<ScenarioProgress> {
        self.held.lock().unwrap_or_else(|e| e.into_inner()).take()
    }
}

impl ProgressSink for HoldComplete<'_> {
    fn on_progress(&self, progress: ScenarioProgress) {
        if progress.is_complete() {
            *self.held.lock().unwrap_or_else(|e| e.into_inner()) = Some(progress);
        } else {
            self.inner.on_progress(progress);
        }
    }

    fn on_complete(&self) {}

    fn on_error(&self, error: &ScenarioError) {
        self.inner.on_error(error);
    }
}

/// Fetch a scenario, classify it and report the result through `sink`.
///
/// The sink sees the scenario's progress, then an `extra` record carrying
/// the [`FrequencyReport`], then `complete`. A failure after the fetch is
/// delivered as a terminal failed record.
pub async fn run_wsdot_report(
    config: &WsdotReportConfig,
    client: Arc<dyn QueryClient>,
    sink: &dyn ProgressSink,
) -> Result<FrequencyReport, ReportError> {
    let holder = HoldComplete::new(sink);
    let snapshot = ScenarioFetcher::new(config.scenario.clone(), Arc::clone(&client))
        .run(&holder)
        .await?;

    let result = async {
        let report = build_report(config, &snapshot, client).await?;
        let extra = serde_json::to_value(&report)?;
        Ok::<_, ReportError>((report, extra))
    }
    .await;

    match result {
        Ok((report, extra)) => {
            sink.on_progress(ScenarioProgress::new(Stage::Extra, true).with_extra(extra));
            let complete = holder
                .take()
                .unwrap_or_else(|| ScenarioProgress::new(Stage::Complete, false));
            sink.on_progress(complete);
            sink.on_complete();
            Ok(report)
        }
        Err(e) => {
            warn!(error = %e, "Frequency report failed");
            sink.on_progress(ScenarioProgress::failed(e.to_string()));
            Err(e)
        }
    }
}
