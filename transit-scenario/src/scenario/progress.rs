//! Progress records and the sinks that consume them.
//!
//! A scenario run reports progress as a sequence of [`ScenarioProgress`]
//! records. Each record carries only the data discovered since the previous
//! record, so a consumer rebuilds the full snapshot by accumulating them.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::domain::{FeedVersion, Route, Stop, StopDepartureTuple};

use super::error::ScenarioError;

/// Pipeline stage a progress record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    FeedVersions,
    Stops,
    Routes,
    Schedules,
    Complete,
    Extra,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::FeedVersions => "feed-versions",
            Stage::Stops => "stops",
            Stage::Routes => "routes",
            Stage::Schedules => "schedules",
            Stage::Complete => "complete",
            Stage::Extra => "extra",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Completed/total counter for a group of tasks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskProgress {
    pub total: usize,
    pub completed: usize,
    /// Tasks counted as completed that failed.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub failed: usize,
}

fn is_zero(n: &usize) -> bool {
    *n == 0
}

/// Items discovered since the previous progress record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PartialData {
    pub stops: Vec<Stop>,
    pub routes: Vec<Route>,
    pub feed_versions: Vec<FeedVersion>,
    pub stop_departures: Vec<StopDepartureTuple>,
}

impl PartialData {
    pub fn stops(stops: Vec<Stop>) -> Self {
        Self {
            stops,
            ..Self::default()
        }
    }

    pub fn routes(routes: Vec<Route>) -> Self {
        Self {
            routes,
            ..Self::default()
        }
    }

    pub fn feed_versions(feed_versions: Vec<FeedVersion>) -> Self {
        Self {
            feed_versions,
            ..Self::default()
        }
    }

    pub fn stop_departures(stop_departures: Vec<StopDepartureTuple>) -> Self {
        Self {
            stop_departures,
            ..Self::default()
        }
    }
}

/// Error payload of a progress record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressError {
    pub message: String,
}

/// One progress record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioProgress {
    pub is_loading: bool,
    pub current_stage: Stage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_stage_message: Option<String>,
    #[serde(default)]
    pub feed_version_progress: TaskProgress,
    #[serde(default)]
    pub stop_departure_progress: TaskProgress,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partial_data: Option<PartialData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ProgressError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra_data: Option<serde_json::Value>,
}

impl ScenarioProgress {
    /// A record with no payload.
    pub fn new(stage: Stage, is_loading: bool) -> Self {
        Self {
            is_loading,
            current_stage: stage,
            current_stage_message: None,
            feed_version_progress: TaskProgress::default(),
            stop_departure_progress: TaskProgress::default(),
            partial_data: None,
            error: None,
            extra_data: None,
        }
    }

    /// The terminal record sent when a run fails.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            error: Some(ProgressError {
                message: message.into(),
            }),
            ..Self::new(Stage::Complete, false)
        }
    }

    /// A mid-run record reporting a failed task. The run carries on.
    pub fn task_failed(stage: Stage, message: impl Into<String>) -> Self {
        Self {
            error: Some(ProgressError {
                message: message.into(),
            }),
            ..Self::new(stage, true)
        }
    }

    /// Whether this record ends the stream: a `complete` record, or any
    /// record that is no longer loading.
    pub fn is_terminal(&self) -> bool {
        self.current_stage == Stage::Complete || !self.is_loading
    }

    pub fn with_counters(mut self, feed_versions: TaskProgress, stop_departures: TaskProgress) -> Self {
        self.feed_version_progress = feed_versions;
        self.stop_departure_progress = stop_departures;
        self
    }

    pub fn with_data(mut self, data: PartialData) -> Self {
        self.partial_data = Some(data);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.current_stage_message = Some(message.into());
        self
    }

    pub fn with_extra(mut self, extra: serde_json::Value) -> Self {
        self.extra_data = Some(extra);
        self
    }

    pub fn is_complete(&self) -> bool {
        self.current_stage == Stage::Complete && self.error.is_none()
    }
}

/// Consumer of progress records.
///
/// Methods are synchronous and must not block; sinks that need to do I/O
/// hand records off to another task.
pub trait ProgressSink: Send + Sync {
    /// Every record, including mid-run task failures.
    fn on_progress(&self, progress: ScenarioProgress);

    fn on_complete(&self) {}

    /// The run failed and no more records follow.
    fn on_error(&self, error: &ScenarioError);
}

/// Sink that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn on_progress(&self, _progress: ScenarioProgress) {}

    fn on_error(&self, _error: &ScenarioError) {}
}

/// Sink that forwards records over a tokio channel.
///
/// Records pass through unchanged, so a failed schedule task arrives as a
/// loading `schedules` record carrying an error and more records follow it.
/// [`ProgressSink::on_error`] is only called for failures that end the run;
/// those are forwarded as a terminal [`ScenarioProgress::failed`] record.
/// A closed receiver is ignored: the run continues without an audience.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<ScenarioProgress>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::UnboundedSender<ScenarioProgress>) -> Self {
        Self { tx }
    }

    /// Create a sink and the receiver for its records.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ScenarioProgress>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }
}

impl ProgressSink for ChannelSink {
    fn on_progress(&self, progress: ScenarioProgress) {
        let _ = self.tx.send(progress);
    }

    fn on_error(&self, error: &ScenarioError) {
        let _ = self.tx.send(ScenarioProgress::failed(error.to_string()));
    }
}

impl<S: ProgressSink + ?Sized> ProgressSink for std::sync::Arc<S> {
    fn on_progress(&self, progress: ScenarioProgress) {
        (**self).on_progress(progress)
    }

    fn on_complete(&self) {
        (**self).on_complete()
    }

    fn on_error(&self, error: &ScenarioError) {
        (**self).on_error(error)
    }
}
