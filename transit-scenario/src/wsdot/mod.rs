//! WSDOT frequency-of-service classification.
//!
//! Stops are sorted into service tiers from one representative weekday and
//! one weekend day, then enriched with the census geographies and population
//! within walking distance of each tier.

mod classify;
mod frequency;
mod geography;
mod levels;
mod report;
mod stops_routes;

pub use classify::{Classification, classify, classify_indexes, evaluate_level, night_level, route_level, stop_level};
pub use frequency::{FrequencyIndex, RouteDirectionFrequency, StopFrequency};
pub use geography::{
    GeographyConfig, GeographyEnricher, GeographyFeature, GeographyProperties, LevelLayers, coverage_ratio,
};
pub use levels::{HourCriterion, NightSegment, ServiceLevelConfig};
pub use report::{FrequencyReport, ReportError, StopLevelResult, WsdotReportConfig, build_report, run_wsdot_report};
pub use stops_routes::{AgencyRow, RouteRow, StopServiceRow, StopsRoutesReport};
