//! HTTP route handlers.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    Json, Router,
    body::Body,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use futures::stream;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::filter::{self, FilterResult, ScenarioFilter};
use crate::scenario::{ChannelSink, ScenarioError, ScenarioFetcher, ScenarioFixture, ScenarioProgress, encode_line};
use crate::wsdot::run_wsdot_report;

use super::dto::*;
use super::state::AppState;

const NDJSON: &str = "application/x-ndjson";

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/scenario", post(stream_scenario))
        .route("/wsdot", post(stream_wsdot))
        .route("/filter", post(filter_fixture))
        .with_state(state)
}

/// Health check endpoint.
async fn health() -> &'static str {
    "ok"
}

/// Stream a scenario's progress as NDJSON.
///
/// The request is validated up front; failures after that arrive as a
/// terminal record in the stream.
async fn stream_scenario(
    State(state): State<AppState>,
    Json(req): Json<ScenarioRequest>,
) -> Result<Response, AppError> {
    let config = req.into_config(state.clock.today());
    config.validate()?;
    info!(start = %config.start_date, end = %config.end_date, "Streaming scenario");

    let (sink, rx) = ChannelSink::channel();
    let fetcher = ScenarioFetcher::new(config, Arc::clone(&state.client));
    tokio::spawn(async move {
        // Failures have already been sent down the stream.
        let _ = fetcher.run(&sink).await;
    });

    Ok(ndjson_response(rx))
}

/// Stream a scenario followed by its WSDOT frequency report.
async fn stream_wsdot(State(state): State<AppState>, Json(req): Json<WsdotRequest>) -> Result<Response, AppError> {
    let config = req
        .into_config(state.clock.today())
        .map_err(|message| AppError::BadRequest { message })?;
    config.scenario.validate()?;
    info!(
        weekday = %config.weekday_date,
        weekend = %config.weekend_date,
        levels = config.levels.len(),
        "Streaming frequency report"
    );

    let (sink, rx) = ChannelSink::channel();
    let client = Arc::clone(&state.client);
    tokio::spawn(async move {
        let _ = run_wsdot_report(&config, client, &sink).await;
    });

    Ok(ndjson_response(rx))
}

/// Apply a filter to a saved scenario.
///
/// A fixture without a filter marks every route and stop.
async fn filter_fixture(Json(fixture): Json<ScenarioFixture>) -> Json<FilterResult> {
    let filter = fixture.filter.unwrap_or_else(ScenarioFilter::new);
    Json(filter::apply(&fixture.data, &fixture.config, &filter))
}

/// A response body with one JSON line per progress record, ending when the
/// sender is dropped.
fn ndjson_response(rx: mpsc::UnboundedReceiver<ScenarioProgress>) -> Response {
    let lines = stream::unfold(rx, |mut rx| async move {
        loop {
            let progress = rx.recv().await?;
            match encode_line(&progress) {
                Ok(line) => return Some((Ok::<_, Infallible>(line), rx)),
                Err(e) => warn!(error = %e, stage = %progress.current_stage, "Dropping unencodable record"),
            }
        }
    });

    ([(header::CONTENT_TYPE, NDJSON)], Body::from_stream(lines)).into_response()
}

/// Application error type.
#[derive(Debug)]
pub enum AppError {
    BadRequest { message: String },
    Internal { message: String },
}

impl From<ScenarioError> for AppError {
    fn from(e: ScenarioError) -> Self {
        let message = e.to_string();
        match e {
            ScenarioError::Validation(_) => AppError::BadRequest { message },
            _ => AppError::Internal { message },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest { message } => (StatusCode::BAD_REQUEST, message),
            AppError::Internal { message } => (StatusCode::INTERNAL_SERVER_ERROR, message),
        };

        warn!(status = %status, error = %message, "Request failed");

        let body = Json(ErrorResponse { error: message });
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphql::MockQueryClient;
    use crate::scenario::{ScenarioReceiver, Stage, read_progress_stream};
    use crate::web::state::FixedClock;
    use chrono::NaiveDate;
    use serde_json::{Value, json};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 8, 19).unwrap()
    }

    /// One feed version with a single stop on route 7 departing hourly.
    fn mock_api() -> MockQueryClient {
        let mock = MockQueryClient::new();
        mock.respond_to("query FeedVersions", |_| {
            Ok(json!({"feeds": [{"feed_state": {"feed_version": {
                "id": 10, "sha1": "abc", "feed": {"id": 1, "onestop_id": "f-test"}
            }}}]}))
        });
        mock.respond_to("query Stops(", |_| {
            Ok(json!({"stops": [{
                "id": 1,
                "stop_id": "S1",
                "stop_name": "Main St",
                "geometry": {"type": "Point", "coordinates": [-122.3, 47.6]},
                "route_stops": [{"route": {"id": 7, "agency": {"id": 1}}}],
            }]}))
        });
        mock.respond_to("query Routes(", |_| {
            Ok(json!({"routes": [{"id": 7, "route_id": "R7", "route_type": 3, "agency": {"id": 1}}]}))
        });
        mock.respond_to("query StopDepartures", |vars| {
            let departures: Vec<Value> = (6..22)
                .map(|h| json!({"departure_time": format!("{h:02}:00:00"),
                                "trip": {"id": h, "direction_id": 0, "route": {"id": 7}}}))
                .collect();
            let mut row = json!({"id": 1});
            for day in crate::domain::Weekday::ALL {
                if vars[format!("include_{day}")] == true {
                    row[day.name()] = json!(departures);
                }
            }
            Ok(json!({"stops": [row]}))
        });
        mock
    }

    async fn serve(mock: MockQueryClient) -> String {
        let state = AppState::new(mock).with_clock(FixedClock(today()));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, create_router(state)).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn health_says_ok() {
        let base = serve(MockQueryClient::new()).await;
        let body = reqwest::get(format!("{base}/health")).await.unwrap().text().await.unwrap();
        assert_eq!(body, "ok");
    }

    #[tokio::test]
    async fn scenario_streams_ndjson() {
        let mock = mock_api();
        let base = serve(mock.clone()).await;

        let response = reqwest::Client::new()
            .post(format!("{base}/scenario"))
            .json(&json!({"geographyIds": [3]}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        assert_eq!(response.headers()[header::CONTENT_TYPE], NDJSON);

        let body = response.text().await.unwrap();
        let receiver = ScenarioReceiver::new();
        read_progress_stream(body.as_bytes(), &receiver).await.unwrap();

        assert!(receiver.is_complete());
        let snapshot = receiver.snapshot();
        assert_eq!(snapshot.stops.len(), 1);
        assert_eq!(snapshot.routes.len(), 1);
        assert_eq!(snapshot.departure_cache.get(1, today()).len(), 16);

        // Dates default to the week starting on the clock's date.
        let schedule_vars = mock.calls_matching("query StopDepartures");
        assert_eq!(schedule_vars[0]["monday"], "2024-08-19");
        assert_eq!(schedule_vars[0]["sunday"], "2024-08-25");
    }

    #[tokio::test]
    async fn scenario_without_area_is_rejected() {
        let mock = mock_api();
        let base = serve(mock.clone()).await;

        let response = reqwest::Client::new()
            .post(format!("{base}/scenario"))
            .json(&json!({"startDate": "2024-08-19"}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 400);
        let body: Value = response.json().await.unwrap();
        assert!(body["error"].as_str().unwrap().contains("invalid scenario config"));
        assert_eq!(mock.call_count(), 0);
    }

    #[test]
    fn validation_error_keeps_its_display_text() {
        let err = AppError::from(ScenarioError::Validation("a bbox or geography ids are required".into()));
        let AppError::BadRequest { message } = err else {
            panic!("expected a bad request, got {err:?}");
        };
        assert_eq!(message, "invalid scenario config: a bbox or geography ids are required");
    }

    #[tokio::test]
    async fn upstream_failure_ends_the_stream() {
        let mock = MockQueryClient::new();
        mock.respond_to("query FeedVersions", |_| Err(crate::graphql::QueryError::Unauthorized));
        let base = serve(mock).await;

        let body = reqwest::Client::new()
            .post(format!("{base}/scenario"))
            .json(&json!({"geographyIds": [3]}))
            .send()
            .await
            .unwrap()
            .text()
            .await
            .unwrap();

        let records: Vec<ScenarioProgress> = body.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
        let last = records.last().unwrap();
        assert!(last.error.is_some());
        assert!(!last.is_loading);
    }

    #[tokio::test]
    async fn wsdot_stream_ends_with_report() {
        let base = serve(mock_api()).await;

        let body = reqwest::Client::new()
            .post(format!("{base}/wsdot"))
            .json(&json!({"geographyIds": [3]}))
            .send()
            .await
            .unwrap()
            .text()
            .await
            .unwrap();

        let records: Vec<ScenarioProgress> = body.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
        let n = records.len();
        assert_eq!(records[n - 1].current_stage, Stage::Complete);
        assert_eq!(records[n - 2].current_stage, Stage::Extra);

        // Hourly all day: level4 needs eight midday trips, level1 does not pass.
        let report = records[n - 2].extra_data.as_ref().unwrap();
        assert_eq!(report["levelStops"]["level4"], json!([1]));
        assert_eq!(report["levelStops"]["level1"], json!([]));
        assert_eq!(report["stops"][0]["stopName"], "Main St");
    }

    #[tokio::test]
    async fn filter_applies_to_posted_fixture() {
        let base = serve(MockQueryClient::new()).await;
        let fixture = json!({
            "config": {"geographyIds": [3], "startDate": "2024-08-19", "endDate": "2024-08-19"},
            "filter": {"selectedRouteTypes": [1]},
            "data": {
                "stops": [{"id": 1, "route_stops": [{"route": {"id": 7, "agency": {"id": 1}}}]}],
                "routes": [{"id": 7, "route_type": 3, "agency": {"id": 1}}]
            }
        });

        let result: Value = reqwest::Client::new()
            .post(format!("{base}/filter"))
            .json(&fixture)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        assert_eq!(result["routes"].as_array().unwrap().len(), 1);
        assert_eq!(result["marked_route_ids"], json!([]));
    }
}
