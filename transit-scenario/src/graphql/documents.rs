//! Transitland GraphQL query documents.

/// Active feed versions of feeds inside a geographic filter.
pub const FEED_VERSIONS: &str = r#"
query FeedVersions($where: FeedFilter) {
  feeds(where: $where) {
    id
    onestop_id
    feed_state {
      feed_version {
        id
        sha1
        feed {
          id
          onestop_id
        }
      }
    }
  }
}"#;

/// One page of stops, cursor-paginated by numeric id.
pub const STOPS: &str = r#"
query Stops($limit: Int, $after: Int, $where: StopFilter) {
  stops(limit: $limit, after: $after, where: $where) {
    id
    stop_id
    stop_name
    stop_code
    location_type
    geometry
    feed_version {
      sha1
      feed {
        onestop_id
      }
    }
    route_stops {
      route {
        id
        route_id
        route_type
        route_short_name
        route_long_name
        agency {
          id
          agency_id
          agency_name
        }
      }
    }
  }
}"#;

/// Routes by numeric id.
pub const ROUTES: &str = r#"
query Routes($ids: [Int!]) {
  routes(limit: 1000, ids: $ids) {
    id
    route_id
    route_short_name
    route_long_name
    route_type
    route_color
    geometry
    feed_version {
      sha1
      feed {
        onestop_id
      }
    }
    agency {
      id
      agency_id
      agency_name
    }
  }
}"#;

/// Departures for up to one week of dates, one aliased field per weekday.
///
/// Each weekday field is only requested when its `include_<day>` variable
/// is true.
pub const STOP_DEPARTURES: &str = r#"
fragment departure on StopTime {
  departure_time
  trip {
    id
    direction_id
    route {
      id
    }
  }
}

query StopDepartures(
  $ids: [Int!],
  $sunday: Date, $monday: Date, $tuesday: Date, $wednesday: Date,
  $thursday: Date, $friday: Date, $saturday: Date,
  $include_sunday: Boolean!, $include_monday: Boolean!, $include_tuesday: Boolean!,
  $include_wednesday: Boolean!, $include_thursday: Boolean!, $include_friday: Boolean!,
  $include_saturday: Boolean!
) {
  stops(ids: $ids) {
    id
    sunday: departures(limit: 1000, where: {date: $sunday, start: "00:00:00", end: "23:59:59"}) @include(if: $include_sunday) {
      ...departure
    }
    monday: departures(limit: 1000, where: {date: $monday, start: "00:00:00", end: "23:59:59"}) @include(if: $include_monday) {
      ...departure
    }
    tuesday: departures(limit: 1000, where: {date: $tuesday, start: "00:00:00", end: "23:59:59"}) @include(if: $include_tuesday) {
      ...departure
    }
    wednesday: departures(limit: 1000, where: {date: $wednesday, start: "00:00:00", end: "23:59:59"}) @include(if: $include_wednesday) {
      ...departure
    }
    thursday: departures(limit: 1000, where: {date: $thursday, start: "00:00:00", end: "23:59:59"}) @include(if: $include_thursday) {
      ...departure
    }
    friday: departures(limit: 1000, where: {date: $friday, start: "00:00:00", end: "23:59:59"}) @include(if: $include_friday) {
      ...departure
    }
    saturday: departures(limit: 1000, where: {date: $saturday, start: "00:00:00", end: "23:59:59"}) @include(if: $include_saturday) {
      ...departure
    }
  }
}"#;

/// Census geographies intersecting buffers around a set of stops.
pub const GEOGRAPHY_STOP_BUFFER: &str = r#"
query GeographyStopBuffer($geoDatasetName: String, $layer: String!, $stopIds: [Int!], $tableNames: [String!]!, $tableDatasetName: String, $stopBufferRadius: Float) {
  census_datasets(limit: 1000, where: {name: $geoDatasetName}) {
    id
    name
    geographies(limit: 1000, where: {layer: $layer, location: {stop_buffer: {stop_ids: $stopIds, radius: $stopBufferRadius}}}) {
      id
      name
      geoid
      layer_name
      adm0_iso
      adm0_name
      adm1_iso
      adm1_name
      geometry_area
      intersection_area
      intersection_geometry
      values(dataset: $tableDatasetName, table_names: $tableNames) {
        dataset_name
        geoid
        values
      }
    }
  }
}"#;

/// Census geographies intersecting a bounding box.
pub const GEOGRAPHY_BBOX: &str = r#"
query GeographyBbox($geoDatasetName: String, $layer: String!, $bbox: BoundingBox, $tableNames: [String!]!, $tableDatasetName: String) {
  census_datasets(limit: 1000, where: {name: $geoDatasetName}) {
    id
    name
    geographies(limit: 1000, where: {layer: $layer, location: {bbox: $bbox}}) {
      id
      name
      geoid
      layer_name
      adm0_iso
      adm0_name
      adm1_iso
      adm1_name
      geometry_area
      intersection_area
      intersection_geometry
      values(dataset: $tableDatasetName, table_names: $tableNames) {
        dataset_name
        geoid
        values
      }
    }
  }
}"#;
