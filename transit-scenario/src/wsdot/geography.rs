//! Population served, from census geographies around qualifying stops.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::domain::StopId;
use crate::graphql::{QueryClient, QueryError, documents, query_as};
use crate::scenario::GeoFilter;

/// Census datasets used for enrichment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GeographyConfig {
    /// Buffer around each stop, in metres. Enrichment is skipped when not
    /// positive.
    pub stop_buffer_radius: f64,
    pub geo_dataset_name: String,
    pub geo_dataset_layers: Vec<String>,
    pub table_dataset_name: String,
    pub table_dataset_table: String,
    /// Column of the table holding total population.
    pub table_dataset_column: String,
}

impl Default for GeographyConfig {
    fn default() -> Self {
        Self {
            stop_buffer_radius: 0.0,
            geo_dataset_name: "tiger2024".to_string(),
            geo_dataset_layers: vec!["tract".to_string()],
            table_dataset_name: "acsdt5y2022".to_string(),
            table_dataset_table: "b01001".to_string(),
            table_dataset_column: "b01001_001".to_string(),
        }
    }
}

/// Properties of one geography feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeographyProperties {
    pub name: String,
    pub dataset_name: String,
    pub layer_name: String,
    pub geoid: String,
    pub total_population: f64,
    /// Population scaled by the share of the geography's area covered.
    pub intersection_population: f64,
    pub adm0_iso: Option<String>,
    pub adm0_name: Option<String>,
    pub adm1_iso: Option<String>,
    pub adm1_name: Option<String>,
}

/// A GeoJSON feature for the covered part of a geography.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeographyFeature {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub properties: GeographyProperties,
    pub geometry: Option<Value>,
}

/// Features per tier, then per layer.
pub type LevelLayers = BTreeMap<String, BTreeMap<String, Vec<GeographyFeature>>>;

#[derive(Debug, Default, Deserialize)]
struct CensusDatasetsResponse {
    #[serde(default)]
    census_datasets: Vec<CensusDataset>,
}

#[derive(Debug, Deserialize)]
struct CensusDataset {
    #[serde(default)]
    name: String,
    #[serde(default)]
    geographies: Vec<GeographyRow>,
}

#[derive(Debug, Deserialize)]
struct GeographyRow {
    #[serde(default)]
    name: String,
    #[serde(default)]
    geoid: String,
    #[serde(default)]
    layer_name: String,
    adm0_iso: Option<String>,
    adm0_name: Option<String>,
    adm1_iso: Option<String>,
    adm1_name: Option<String>,
    geometry_area: Option<f64>,
    intersection_area: Option<f64>,
    intersection_geometry: Option<Value>,
    #[serde(default)]
    values: Vec<TableValues>,
}

#[derive(Debug, Deserialize)]
struct TableValues {
    #[serde(default)]
    dataset_name: String,
    #[serde(default)]
    values: HashMap<String, Value>,
}

/// Share of `total` covered by `intersection`, capped at one.
pub fn coverage_ratio(intersection: f64, total: f64) -> f64 {
    (intersection / total).min(1.0)
}

/// Looks up census geographies and the population they hold.
pub struct GeographyEnricher {
    client: Arc<dyn QueryClient>,
    config: GeographyConfig,
}

impl GeographyEnricher {
    pub fn new(client: Arc<dyn QueryClient>, config: GeographyConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &GeographyConfig {
        &self.config
    }

    /// Features of every configured layer around each tier's stops.
    ///
    /// Tiers with no stops get empty layers. Nothing is queried when the
    /// buffer radius is not positive.
    pub async fn level_layers(&self, level_stops: &BTreeMap<String, BTreeSet<StopId>>) -> Result<LevelLayers, QueryError> {
        let skip = self.config.stop_buffer_radius <= 0.0;
        if skip {
            warn!(
                radius = self.config.stop_buffer_radius,
                "Stop buffer radius is not positive, skipping geography lookup"
            );
        }

        let mut out = LevelLayers::new();
        for (level, stops) in level_stops {
            let mut layers = BTreeMap::new();
            for layer in &self.config.geo_dataset_layers {
                let features = if skip || stops.is_empty() {
                    Vec::new()
                } else {
                    self.stop_buffer_features(stops, layer).await?
                };
                debug!(level = %level, layer = %layer, stops = stops.len(), features = features.len(), "Geography layer");
                layers.insert(layer.clone(), features);
            }
            out.insert(level.clone(), layers);
        }
        Ok(out)
    }

    /// Geographies of `layer` within the buffer around `stop_ids`.
    pub async fn stop_buffer_features(
        &self,
        stop_ids: &BTreeSet<StopId>,
        layer: &str,
    ) -> Result<Vec<GeographyFeature>, QueryError> {
        let variables = json!({
            "geoDatasetName": self.config.geo_dataset_name,
            "tableDatasetName": self.config.table_dataset_name,
            "tableNames": [self.config.table_dataset_table],
            "layer": layer,
            "stopBufferRadius": self.config.stop_buffer_radius,
            "stopIds": stop_ids,
        });
        let response: CensusDatasetsResponse = query_as(&*self.client, documents::GEOGRAPHY_STOP_BUFFER, variables).await?;
        Ok(self.features(response))
    }

    /// Geographies of every configured layer intersecting the scenario area.
    ///
    /// Only a bounding-box area can be intersected; a scenario defined by
    /// geography ids yields no features.
    pub async fn bbox_intersection(&self, filter: &GeoFilter) -> Result<Vec<GeographyFeature>, QueryError> {
        let GeoFilter::Bbox(bbox) = filter else {
            return Ok(Vec::new());
        };

        let mut features = Vec::new();
        for layer in &self.config.geo_dataset_layers {
            let variables = json!({
                "geoDatasetName": self.config.geo_dataset_name,
                "tableDatasetName": self.config.table_dataset_name,
                "tableNames": [self.config.table_dataset_table],
                "layer": layer,
                "bbox": bbox,
            });
            let response: CensusDatasetsResponse = query_as(&*self.client, documents::GEOGRAPHY_BBOX, variables).await?;
            features.extend(self.features(response));
        }
        Ok(features)
    }

    fn features(&self, response: CensusDatasetsResponse) -> Vec<GeographyFeature> {
        let mut features = Vec::new();
        for dataset in response.census_datasets {
            for geo in dataset.geographies {
                let total_area = geo.geometry_area.unwrap_or(0.0);
                if total_area == 0.0 {
                    debug!(geoid = %geo.geoid, "Skipping geography with no area");
                    continue;
                }
                let ratio = coverage_ratio(geo.intersection_area.unwrap_or(0.0), total_area);
                let total_population = self.population(&geo.values);

                features.push(GeographyFeature {
                    id: geo.geoid.clone(),
                    kind: "Feature".to_string(),
                    properties: GeographyProperties {
                        name: geo.name,
                        dataset_name: dataset.name.clone(),
                        layer_name: geo.layer_name,
                        geoid: geo.geoid,
                        total_population,
                        intersection_population: total_population * ratio,
                        adm0_iso: geo.adm0_iso,
                        adm0_name: geo.adm0_name,
                        adm1_iso: geo.adm1_iso,
                        adm1_name: geo.adm1_name,
                    },
                    geometry: geo.intersection_geometry,
                });
            }
        }
        features
    }

    fn population(&self, tables: &[TableValues]) -> f64 {
        tables
            .iter()
            .find(|t| t.dataset_name == self.config.table_dataset_name)
            .and_then(|t| t.values.get(&self.config.table_dataset_column))
            .and_then(Value::as_f64)
            .unwrap_or(0.0)
    }
}
