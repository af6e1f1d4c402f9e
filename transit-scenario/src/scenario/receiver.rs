//! Rebuilds a snapshot from progress records.

use std::sync::Mutex;

use serde_json::Value;

use super::error::ScenarioError;
use super::progress::{ProgressSink, ScenarioProgress, Stage};
use super::snapshot::ScenarioSnapshot;

#[derive(Default)]
struct ReceiverState {
    snapshot: ScenarioSnapshot,
    extra: Option<Value>,
    errors: Vec<String>,
    records: usize,
}

/// Sink that accumulates progress deltas into a [`ScenarioSnapshot`].
///
/// Works the same whether records come straight from a fetcher or from a
/// decoded NDJSON stream.
#[derive(Default)]
pub struct ScenarioReceiver {
    state: Mutex<ReceiverState>,
}

impl ScenarioReceiver {
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy of the data accumulated so far.
    pub fn snapshot(&self) -> ScenarioSnapshot {
        self.lock().snapshot.clone()
    }

    /// Consume the receiver, returning the accumulated data.
    pub fn into_snapshot(self) -> ScenarioSnapshot {
        self.state
            .into_inner()
            .unwrap_or_else(|e| e.into_inner())
            .snapshot
    }

    /// The most recent `extraData` payload, if any.
    pub fn extra_data(&self) -> Option<Value> {
        self.lock().extra.clone()
    }

    /// Messages of every error received.
    pub fn errors(&self) -> Vec<String> {
        self.lock().errors.clone()
    }

    /// Number of progress records received.
    pub fn record_count(&self) -> usize {
        self.lock().records
    }

    pub fn is_complete(&self) -> bool {
        self.lock().snapshot.is_complete
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ReceiverState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl ProgressSink for ScenarioReceiver {
    fn on_progress(&self, progress: ScenarioProgress) {
        let mut state = self.lock();
        state.records += 1;

        if let Some(data) = progress.partial_data {
            let snapshot = &mut state.snapshot;
            snapshot.stops.extend(data.stops);
            snapshot.routes.extend(data.routes);
            snapshot.feed_versions.extend(data.feed_versions);
            for tuple in data.stop_departures {
                snapshot
                    .departure_cache
                    .add(tuple.stop_id(), tuple.date(), vec![tuple.departure()]);
            }
        }

        if let Some(extra) = progress.extra_data {
            state.extra = Some(extra);
        }

        state.snapshot.failed_schedule_tasks = progress.stop_departure_progress.failed;

        if let Some(error) = progress.error {
            state.errors.push(error.message);
        } else if progress.current_stage == Stage::Complete {
            state.snapshot.is_complete = true;
        }
    }

    fn on_complete(&self) {
        self.lock().snapshot.is_complete = true;
    }

    fn on_error(&self, error: &ScenarioError) {
        self.lock().errors.push(error.to_string());
    }
}
