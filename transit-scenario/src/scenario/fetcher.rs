//! Scenario fetching pipeline.
//!
//! A run has three stages:
//!
//! 1. **Feed discovery**: find the active feed version of every feed in the
//!    area.
//! 2. **Stop and route discovery**: page through each feed version's stops,
//!    one loop per feed version, all loops concurrent. Each page resolves
//!    the routes it references that have not been seen yet and produces
//!    schedule tasks.
//! 3. **Schedule discovery**: schedule tasks start as soon as they are
//!    produced, bounded by a semaphore, and a single consumer writes their
//!    results into the departure cache.
//!
//! Stage 1 and 2 failures abort the run. Stage 3 failures are logged,
//! reported to the sink as a loading `schedules` record carrying the error,
//! and counted; the affected stops and dates are simply missing from the
//! cache.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::NaiveDate;
use futures::future::try_join_all;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::{Mutex, Semaphore, mpsc};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::departures::DepartureCache;
use crate::domain::{FeedVersion, Route, RouteId, Stop, StopDepartureTuple};
use crate::graphql::{QueryClient, QueryError, documents, query_as};

use super::config::{FetcherOptions, GeoFilter, ScenarioConfig};
use super::error::ScenarioError;
use super::progress::{PartialData, ProgressSink, ScenarioProgress, Stage, TaskProgress};
use super::schedule::{ScheduleTask, StopDeparturesResponse, schedule_tasks};
use super::snapshot::ScenarioSnapshot;

#[derive(Debug, Default, Deserialize)]
struct FeedsResponse {
    #[serde(default)]
    feeds: Vec<FeedRow>,
}

#[derive(Debug, Deserialize)]
struct FeedRow {
    #[serde(default)]
    feed_state: Option<FeedState>,
}

#[derive(Debug, Deserialize)]
struct FeedState {
    #[serde(default)]
    feed_version: Option<FeedVersion>,
}

#[derive(Debug, Default, Deserialize)]
struct StopsResponse {
    #[serde(default)]
    stops: Vec<Stop>,
}

#[derive(Debug, Default, Deserialize)]
struct RoutesResponse {
    #[serde(default)]
    routes: Vec<Route>,
}

/// Result of one schedule task, as handed from the task to the consumer.
type ScheduleOutcome = (ScheduleTask, Result<StopDeparturesResponse, QueryError>);

/// State shared by the concurrent parts of one run.
struct RunState<'a> {
    sink: &'a dyn ProgressSink,
    feeds_total: AtomicUsize,
    feeds_completed: AtomicUsize,
    schedules_total: AtomicUsize,
    schedules_completed: AtomicUsize,
    schedules_failed: AtomicUsize,
    resolved_routes: Mutex<HashSet<RouteId>>,
    stops: Mutex<Vec<Stop>>,
    routes: Mutex<Vec<Route>>,
}

impl<'a> RunState<'a> {
    fn new(sink: &'a dyn ProgressSink) -> Self {
        Self {
            sink,
            feeds_total: AtomicUsize::new(0),
            feeds_completed: AtomicUsize::new(0),
            schedules_total: AtomicUsize::new(0),
            schedules_completed: AtomicUsize::new(0),
            schedules_failed: AtomicUsize::new(0),
            resolved_routes: Mutex::new(HashSet::new()),
            stops: Mutex::new(Vec::new()),
            routes: Mutex::new(Vec::new()),
        }
    }

    fn counters(&self) -> (TaskProgress, TaskProgress) {
        (
            TaskProgress {
                total: self.feeds_total.load(Ordering::SeqCst),
                completed: self.feeds_completed.load(Ordering::SeqCst),
                failed: 0,
            },
            TaskProgress {
                total: self.schedules_total.load(Ordering::SeqCst),
                completed: self.schedules_completed.load(Ordering::SeqCst),
                failed: self.schedules_failed.load(Ordering::SeqCst),
            },
        )
    }

    /// Report a failed task without ending the stream.
    fn emit_task_failure(&self, stage: Stage, error: &ScenarioError) {
        let (feeds, schedules) = self.counters();
        self.sink
            .on_progress(ScenarioProgress::task_failed(stage, error.to_string()).with_counters(feeds, schedules));
    }

    fn emit(&self, stage: Stage, data: Option<PartialData>) {
        let (feeds, schedules) = self.counters();
        let mut progress = ScenarioProgress::new(stage, stage != Stage::Complete).with_counters(feeds, schedules);
        progress.partial_data = data;
        self.sink.on_progress(progress);
    }
}

/// Builds a [`ScenarioSnapshot`] from the query API.
///
/// Each call to [`run`](Self::run) starts from fresh state.
pub struct ScenarioFetcher {
    config: ScenarioConfig,
    client: Arc<dyn QueryClient>,
    options: FetcherOptions,
}

impl ScenarioFetcher {
    pub fn new(config: ScenarioConfig, client: Arc<dyn QueryClient>) -> Self {
        Self {
            config,
            client,
            options: FetcherOptions::default(),
        }
    }

    pub fn with_options(mut self, options: FetcherOptions) -> Self {
        self.options = options;
        self
    }

    pub fn config(&self) -> &ScenarioConfig {
        &self.config
    }

    /// Run all stages, reporting progress to `sink`.
    ///
    /// On success the sink has received a final `complete` record and
    /// [`ProgressSink::on_complete`]. On failure it has received
    /// [`ProgressSink::on_error`] and any in-flight schedule queries have
    /// been aborted.
    pub async fn run(&self, sink: &dyn ProgressSink) -> Result<ScenarioSnapshot, ScenarioError> {
        let result = self.run_stages(sink).await;
        match &result {
            Ok(snapshot) => {
                info!(
                    stops = snapshot.stops.len(),
                    routes = snapshot.routes.len(),
                    failed_schedule_tasks = snapshot.failed_schedule_tasks,
                    "Scenario complete"
                );
                sink.on_complete();
            }
            Err(e) => {
                warn!(error = %e, "Scenario failed");
                sink.on_error(e);
            }
        }
        result
    }

    async fn run_stages(&self, sink: &dyn ProgressSink) -> Result<ScenarioSnapshot, ScenarioError> {
        let filter = self.config.validate()?;
        let state = RunState::new(sink);

        // Stage 1
        let feed_versions = self.fetch_feed_versions(&filter, &state).await?;

        // Stages 2 and 3 overlap: tasks flow from discovery to the consumer
        // until discovery drops the sender.
        let (task_tx, task_rx) = mpsc::unbounded_channel();
        let dates = if self.config.schedule_enabled {
            self.config.dates()
        } else {
            Vec::new()
        };

        let ((), departure_cache) = tokio::try_join!(
            self.discover_stops(&feed_versions, &filter, &dates, &state, task_tx),
            self.consume_schedules(task_rx, &state),
        )?;

        let stops = std::mem::take(&mut *state.stops.lock().await);
        let routes = std::mem::take(&mut *state.routes.lock().await);
        let snapshot = ScenarioSnapshot {
            stops,
            routes,
            feed_versions,
            departure_cache,
            is_complete: true,
            failed_schedule_tasks: state.schedules_failed.load(Ordering::SeqCst),
        };

        state.emit(Stage::Complete, None);
        Ok(snapshot)
    }

    async fn fetch_feed_versions(
        &self,
        filter: &GeoFilter,
        state: &RunState<'_>,
    ) -> Result<Vec<FeedVersion>, ScenarioError> {
        let response: FeedsResponse = query_as(&*self.client, documents::FEED_VERSIONS, filter.feed_variables())
            .await
            .map_err(|e| ScenarioError::query(Stage::FeedVersions, e))?;

        let feed_versions: Vec<FeedVersion> = response
            .feeds
            .into_iter()
            .filter_map(|f| f.feed_state.and_then(|s| s.feed_version))
            .collect();

        info!(feed_versions = feed_versions.len(), "Found active feed versions");
        for fv in &feed_versions {
            debug!(feed = %fv.feed.onestop_id, sha1 = %fv.sha1, "Feed version");
        }

        state.feeds_total.store(feed_versions.len(), Ordering::SeqCst);
        state.emit(
            Stage::FeedVersions,
            Some(PartialData::feed_versions(feed_versions.clone())),
        );
        Ok(feed_versions)
    }

    /// Stage 2: one pagination loop per feed version, all concurrent.
    async fn discover_stops(
        &self,
        feed_versions: &[FeedVersion],
        filter: &GeoFilter,
        dates: &[NaiveDate],
        state: &RunState<'_>,
        task_tx: mpsc::UnboundedSender<ScheduleTask>,
    ) -> Result<(), ScenarioError> {
        let loops = feed_versions
            .iter()
            .map(|fv| self.page_feed_version(fv, filter, dates, state, &task_tx));
        try_join_all(loops).await?;
        Ok(())
    }

    async fn page_feed_version(
        &self,
        fv: &FeedVersion,
        filter: &GeoFilter,
        dates: &[NaiveDate],
        state: &RunState<'_>,
        task_tx: &mpsc::UnboundedSender<ScheduleTask>,
    ) -> Result<(), ScenarioError> {
        let limit = self.config.stop_limit;
        let mut after = 0;

        loop {
            let variables = json!({
                "limit": limit,
                "after": after,
                "where": {
                    "location_type": 0,
                    "feed_version_sha1": fv.sha1,
                    "location": filter.stop_location(),
                },
            });
            let page: StopsResponse = query_as(&*self.client, documents::STOPS, variables)
                .await
                .map_err(|e| ScenarioError::query(Stage::Stops, e))?;
            let stops = page.stops;
            debug!(
                feed = %fv.feed.onestop_id,
                sha1 = %fv.sha1,
                after,
                stops = stops.len(),
                "Fetched stop page"
            );

            let stop_ids: Vec<_> = stops.iter().map(|s| s.id).collect();
            let full_page = !stops.is_empty() && stops.len() >= limit;

            // Mark pre-emptively so concurrent pages don't fetch the same route.
            let new_route_ids: Vec<RouteId> = {
                let mut resolved = state.resolved_routes.lock().await;
                stops
                    .iter()
                    .flat_map(Stop::route_ids)
                    .filter(|id| resolved.insert(*id))
                    .collect()
            };

            state.stops.lock().await.extend(stops.iter().cloned());
            state.emit(Stage::Stops, Some(PartialData::stops(stops)));

            if !new_route_ids.is_empty() {
                self.fetch_routes(fv, new_route_ids, state).await?;
            }

            let tasks = schedule_tasks(&stop_ids, dates, self.options.schedule_batch_size);
            state.schedules_total.fetch_add(tasks.len(), Ordering::SeqCst);
            for task in tasks {
                // The consumer only goes away when the run is being torn down.
                if task_tx.send(task).is_err() {
                    break;
                }
            }

            match stop_ids.last() {
                Some(&last) if full_page => after = last,
                _ => break,
            }
        }

        state.feeds_completed.fetch_add(1, Ordering::SeqCst);
        state.emit(Stage::Stops, None);
        Ok(())
    }

    async fn fetch_routes(&self, fv: &FeedVersion, ids: Vec<RouteId>, state: &RunState<'_>) -> Result<(), ScenarioError> {
        let requested = ids.len();
        let response: RoutesResponse = query_as(&*self.client, documents::ROUTES, json!({ "ids": ids }))
            .await
            .map_err(|e| ScenarioError::query(Stage::Routes, e))?;
        let routes = response.routes;

        debug!(
            feed = %fv.feed.onestop_id,
            requested,
            routes = routes.len(),
            "Fetched routes"
        );

        state.routes.lock().await.extend(routes.iter().cloned());
        state.emit(Stage::Routes, Some(PartialData::routes(routes)));
        Ok(())
    }

    /// Stage 3 consumer: spawns tasks as they arrive and is the only writer
    /// of the departure cache.
    async fn consume_schedules(
        &self,
        mut task_rx: mpsc::UnboundedReceiver<ScheduleTask>,
        state: &RunState<'_>,
    ) -> Result<DepartureCache, ScenarioError> {
        let semaphore = Arc::new(Semaphore::new(self.config.schedule_concurrency.max(1)));
        let mut in_flight: JoinSet<ScheduleOutcome> = JoinSet::new();
        let mut cache = DepartureCache::new();
        let mut producing = true;

        loop {
            tokio::select! {
                task = task_rx.recv(), if producing => match task {
                    Some(task) => {
                        let client = Arc::clone(&self.client);
                        let semaphore = Arc::clone(&semaphore);
                        in_flight.spawn(async move {
                            let _permit = semaphore.acquire_owned().await.ok();
                            let result = query_as::<StopDeparturesResponse, _>(
                                &*client,
                                documents::STOP_DEPARTURES,
                                task.variables(),
                            )
                            .await;
                            (task, result)
                        });
                    }
                    None => producing = false,
                },
                Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                    self.record_schedule(joined, &mut cache, state);
                }
                else => break,
            }
        }

        Ok(cache)
    }

    fn record_schedule(
        &self,
        joined: Result<ScheduleOutcome, tokio::task::JoinError>,
        cache: &mut DepartureCache,
        state: &RunState<'_>,
    ) {
        state.schedules_completed.fetch_add(1, Ordering::SeqCst);

        let failure = match joined {
            Ok((task, Ok(response))) => {
                let mut tuples = Vec::new();
                for (stop_id, date, departures) in task.collect(response) {
                    tuples.extend(departures.iter().map(|d| StopDepartureTuple::new(stop_id, date, d)));
                    cache.add(stop_id, date, departures);
                }
                debug!(
                    stops = task.stop_ids.len(),
                    dates = task.dates.len(),
                    departures = tuples.len(),
                    "Fetched departures"
                );
                state.emit(Stage::Schedules, Some(PartialData::stop_departures(tuples)));
                return;
            }
            Ok((task, Err(e))) => {
                warn!(
                    stops = task.stop_ids.len(),
                    dates = task.dates.len(),
                    error = %e,
                    "Schedule query failed, departures will be missing"
                );
                ScenarioError::query(Stage::Schedules, e)
            }
            Err(e) => {
                warn!(error = %e, "Schedule task did not finish");
                ScenarioError::Stream(format!("schedule task did not finish: {e}"))
            }
        };

        state.schedules_failed.fetch_add(1, Ordering::SeqCst);
        state.emit_task_failure(Stage::Schedules, &failure);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    use serde_json::Value;

    use crate::domain::Bbox;
    use crate::graphql::MockQueryClient;
    use crate::scenario::{ChannelSink, ScenarioReceiver, encode_line, read_progress_stream};

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 8, d).unwrap()
    }

    fn config() -> ScenarioConfig {
        ScenarioConfig::for_bbox(Bbox::new(-122.4, 47.5, -122.2, 47.7), date(19), date(20))
    }

    fn stop_json(id: i64, route_ids: &[i64]) -> Value {
        let route_stops: Vec<Value> = route_ids
            .iter()
            .map(|r| json!({"route": {"id": r, "route_id": format!("R{r}"), "route_type": 3, "agency": {"id": 1}}}))
            .collect();
        json!({
            "id": id,
            "stop_id": format!("S{id}"),
            "geometry": {"type": "Point", "coordinates": [-122.3, 47.6]},
            "route_stops": route_stops,
        })
    }

    fn departure_json(time: &str, trip: i64, route: i64) -> Value {
        json!({"departure_time": time, "trip": {"id": trip, "direction_id": 0, "route": {"id": route}}})
    }

    /// One departure per requested stop and weekday, on route 7.
    fn departures_for(vars: &Value) -> Value {
        let stops: Vec<Value> = vars["ids"]
            .as_array()
            .into_iter()
            .flatten()
            .map(|id| {
                let mut row = json!({"id": id});
                for day in crate::domain::Weekday::ALL {
                    if vars[format!("include_{day}")] == true {
                        row[day.name()] = json!([departure_json("08:00:00", 100, 7)]);
                    }
                }
                row
            })
            .collect();
        json!({"stops": stops})
    }

    /// Register a working API: one feed version, `stop_count` stops each
    /// served by route 7, paged by the requested limit. Handlers registered
    /// on `mock` beforehand take precedence.
    fn register_api(mock: &MockQueryClient, stop_count: i64) {
        mock.respond_to("query FeedVersions", |_| {
            Ok(json!({"feeds": [{"id": 1, "onestop_id": "f-test", "feed_state": {"feed_version": {
                "id": 10, "sha1": "abc", "feed": {"id": 1, "onestop_id": "f-test"}
            }}}]}))
        });
        mock.respond_to("query Stops(", move |vars| {
            let after = vars["after"].as_i64().unwrap_or(0);
            let limit = vars["limit"].as_i64().unwrap_or(1000);
            let stops: Vec<Value> = (1..=stop_count)
                .filter(|id| *id > after)
                .take(limit as usize)
                .map(|id| stop_json(id, &[7]))
                .collect();
            Ok(json!({"stops": stops}))
        });
        mock.respond_to("query Routes(", |vars| {
            let routes: Vec<Value> = vars["ids"]
                .as_array()
                .into_iter()
                .flatten()
                .map(|id| json!({"id": id, "route_id": "R", "route_type": 3, "agency": {"id": 1}}))
                .collect();
            Ok(json!({"routes": routes}))
        });
        mock.respond_to("query StopDepartures", |vars| Ok(departures_for(vars)));
    }

    fn mock_api(stop_count: i64) -> MockQueryClient {
        let mock = MockQueryClient::new();
        register_api(&mock, stop_count);
        mock
    }

    #[tokio::test]
    async fn paginates_until_a_short_page() {
        let mock = mock_api(5);
        let fetcher = ScenarioFetcher::new(config().with_stop_limit(2), Arc::new(mock.clone()));

        let snapshot = fetcher.run(&ScenarioReceiver::new()).await.unwrap();

        let pages = mock.calls_matching("query Stops(");
        assert_eq!(pages.len(), 3);
        let cursors: Vec<i64> = pages.iter().map(|v| v["after"].as_i64().unwrap()).collect();
        assert_eq!(cursors, vec![0, 2, 4]);
        assert_eq!(snapshot.stops.len(), 5);
        assert!(snapshot.is_complete);
    }

    #[tokio::test]
    async fn full_last_page_costs_one_empty_page() {
        let mock = mock_api(4);
        let fetcher = ScenarioFetcher::new(config().with_stop_limit(2), Arc::new(mock.clone()));
        fetcher.run(&ScenarioReceiver::new()).await.unwrap();
        assert_eq!(mock.calls_matching("query Stops(").len(), 3);
    }

    #[tokio::test]
    async fn routes_are_fetched_once() {
        let mock = mock_api(5);
        let fetcher = ScenarioFetcher::new(config().with_stop_limit(2), Arc::new(mock.clone()));

        let snapshot = fetcher.run(&ScenarioReceiver::new()).await.unwrap();

        assert_eq!(mock.calls_matching("query Routes(").len(), 1);
        assert_eq!(snapshot.routes.len(), 1);
    }

    #[tokio::test]
    async fn departures_land_in_cache() {
        let mock = mock_api(3);
        let fetcher = ScenarioFetcher::new(config(), Arc::new(mock.clone()));

        let snapshot = fetcher.run(&ScenarioReceiver::new()).await.unwrap();

        for stop in 1..=3 {
            assert_eq!(snapshot.departure_cache.get(stop, date(19)).len(), 1);
            assert_eq!(snapshot.departure_cache.get(stop, date(20)).len(), 1);
        }
        assert_eq!(snapshot.failed_schedule_tasks, 0);
    }

    #[tokio::test]
    async fn schedule_disabled_skips_departures() {
        let mock = mock_api(3);
        let fetcher = ScenarioFetcher::new(config().with_schedule(false), Arc::new(mock.clone()));

        let snapshot = fetcher.run(&ScenarioReceiver::new()).await.unwrap();

        assert!(mock.calls_matching("query StopDepartures").is_empty());
        assert!(snapshot.departure_cache.is_empty());
        assert!(snapshot.is_complete);
    }

    #[tokio::test]
    async fn missing_filter_fails_before_querying() {
        let mock = mock_api(3);
        let mut config = config();
        config.bbox = None;
        let fetcher = ScenarioFetcher::new(config, Arc::new(mock.clone()));
        let receiver = ScenarioReceiver::new();

        let err = fetcher.run(&receiver).await.unwrap_err();

        assert!(matches!(err, ScenarioError::Validation(_)));
        assert_eq!(mock.call_count(), 0);
        assert_eq!(receiver.errors().len(), 1);
    }

    #[tokio::test]
    async fn stop_page_failure_is_fatal() {
        let mock = MockQueryClient::new();
        mock.respond_to("query Stops(", |_| {
            Err(QueryError::Status {
                status: 500,
                message: "boom".into(),
            })
        });
        register_api(&mock, 3);
        let fetcher = ScenarioFetcher::new(config(), Arc::new(mock));
        let receiver = ScenarioReceiver::new();

        let err = fetcher.run(&receiver).await.unwrap_err();

        assert_eq!(err.stage(), Some(Stage::Stops));
        assert!(!receiver.is_complete());
        assert_eq!(receiver.errors().len(), 1);
    }

    #[tokio::test]
    async fn route_batch_failure_is_fatal() {
        let mock = MockQueryClient::new();
        mock.respond_to("query Routes(", |_| Err(QueryError::Unauthorized));
        register_api(&mock, 3);
        let fetcher = ScenarioFetcher::new(config(), Arc::new(mock));

        let err = fetcher.run(&ScenarioReceiver::new()).await.unwrap_err();

        assert_eq!(err.stage(), Some(Stage::Routes));
    }

    #[tokio::test]
    async fn schedule_failure_is_isolated() {
        let mock = MockQueryClient::new();
        // Fail the batch containing stop 1, serve the others.
        mock.respond_to("query StopDepartures", |vars| {
            if vars["ids"][0] == 1 {
                Err(QueryError::Status {
                    status: 502,
                    message: "bad gateway".into(),
                })
            } else {
                Ok(departures_for(vars))
            }
        });
        register_api(&mock, 4);
        let fetcher = ScenarioFetcher::new(config(), Arc::new(mock)).with_options(FetcherOptions::new(2));
        let receiver = ScenarioReceiver::new();

        let snapshot = fetcher.run(&receiver).await.unwrap();

        assert!(snapshot.is_complete);
        assert_eq!(snapshot.failed_schedule_tasks, 1);
        assert!(!snapshot.departure_cache.has_service(1, date(19)));
        assert!(!snapshot.departure_cache.has_service(2, date(19)));
        assert!(snapshot.departure_cache.has_service(3, date(19)));
        assert!(snapshot.departure_cache.has_service(4, date(20)));
        assert_eq!(receiver.errors().len(), 1);
        assert!(receiver.is_complete());
    }

    #[tokio::test]
    async fn schedule_failure_keeps_the_stream_open() {
        let mock = MockQueryClient::new();
        mock.respond_to("query StopDepartures", |vars| {
            if vars["ids"][0] == 1 {
                Err(QueryError::Status {
                    status: 502,
                    message: "bad gateway".into(),
                })
            } else {
                Ok(departures_for(vars))
            }
        });
        register_api(&mock, 4);
        let fetcher = ScenarioFetcher::new(config(), Arc::new(mock)).with_options(FetcherOptions::new(2));
        let (sink, mut rx) = ChannelSink::channel();

        fetcher.run(&sink).await.unwrap();
        drop(sink);

        let mut records = Vec::new();
        while let Some(progress) = rx.recv().await {
            records.push(progress);
        }

        let (last, rest) = records.split_last().unwrap();
        assert!(last.is_complete());
        assert!(rest.iter().all(|r| r.is_loading && !r.is_terminal()));

        let failures: Vec<_> = records.iter().filter(|r| r.error.is_some()).collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].current_stage, Stage::Schedules);
        assert_eq!(failures[0].stop_departure_progress.failed, 1);
        assert!(failures[0].error.as_ref().unwrap().message.contains("bad gateway"));
    }

    #[tokio::test]
    async fn schedule_concurrency_is_bounded() {
        use std::time::Duration;

        struct SlowDepartures {
            inner: MockQueryClient,
            active: AtomicU32,
            peak: AtomicU32,
        }

        #[async_trait::async_trait]
        impl QueryClient for SlowDepartures {
            async fn query(&self, document: &str, variables: Value) -> Result<Value, QueryError> {
                if !document.contains("query StopDepartures") {
                    return self.inner.query(document, variables).await;
                }
                let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
                self.peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                self.active.fetch_sub(1, Ordering::SeqCst);
                self.inner.query(document, variables).await
            }
        }

        let client = Arc::new(SlowDepartures {
            inner: mock_api(10),
            active: AtomicU32::new(0),
            peak: AtomicU32::new(0),
        });
        let fetcher = ScenarioFetcher::new(config().with_schedule_concurrency(2), client.clone())
            .with_options(FetcherOptions::new(1));

        let snapshot = fetcher.run(&ScenarioReceiver::new()).await.unwrap();

        assert_eq!(snapshot.departure_cache.len(), 10);
        assert!(client.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn progress_stream_rebuilds_snapshot() {
        let mock = mock_api(5);
        let fetcher = ScenarioFetcher::new(config().with_stop_limit(2), Arc::new(mock));
        let (sink, mut rx) = ChannelSink::channel();

        let snapshot = fetcher.run(&sink).await.unwrap();
        drop(sink);

        let mut body = String::new();
        while let Some(progress) = rx.recv().await {
            body.push_str(&encode_line(&progress).unwrap());
        }

        let receiver = ScenarioReceiver::new();
        read_progress_stream(body.as_bytes(), &receiver).await.unwrap();
        let rebuilt = receiver.into_snapshot();

        assert!(rebuilt.is_complete);
        assert_eq!(rebuilt.stops, snapshot.stops);
        assert_eq!(rebuilt.routes, snapshot.routes);
        assert_eq!(rebuilt.feed_versions, snapshot.feed_versions);
        assert_eq!(rebuilt.departure_cache, snapshot.departure_cache);
    }

    #[tokio::test]
    async fn progress_counts_feed_versions_and_tasks() {
        let mock = mock_api(3);
        let fetcher = ScenarioFetcher::new(config(), Arc::new(mock));
        let (sink, mut rx) = ChannelSink::channel();

        fetcher.run(&sink).await.unwrap();
        drop(sink);

        let mut records = Vec::new();
        while let Some(progress) = rx.recv().await {
            records.push(progress);
        }

        assert_eq!(records[0].current_stage, Stage::FeedVersions);
        assert_eq!(records[0].feed_version_progress.total, 1);
        let last = records.last().unwrap();
        assert_eq!(last.current_stage, Stage::Complete);
        assert!(!last.is_loading);
        assert_eq!(last.feed_version_progress.completed, 1);
        assert_eq!(last.stop_departure_progress.total, 1);
        assert_eq!(last.stop_departure_progress.completed, 1);
    }
}
