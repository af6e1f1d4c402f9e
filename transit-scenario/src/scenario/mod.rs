//! Scenario acquisition: fetching stops, routes and departures for an area
//! and date range, and reporting progress while doing so.

mod config;
mod error;
mod fetcher;
mod fixtures;
mod progress;
mod receiver;
mod schedule;
mod snapshot;
mod stream;

pub use config::{
    DEFAULT_SCHEDULE_BATCH_SIZE, DEFAULT_SCHEDULE_CONCURRENCY, DEFAULT_STOP_LIMIT, FetcherOptions, GeoFilter,
    ScenarioConfig,
};
pub use error::ScenarioError;
pub use fetcher::ScenarioFetcher;
pub use fixtures::{FixtureError, ScenarioFixture};
pub use progress::{
    ChannelSink, NullSink, PartialData, ProgressError, ProgressSink, ScenarioProgress, Stage, TaskProgress,
};
pub use receiver::ScenarioReceiver;
pub use schedule::{ScheduleTask, StopDeparturesResponse, WeekDates, schedule_tasks};
pub use snapshot::ScenarioSnapshot;
pub use stream::{encode_line, read_progress_stream};
