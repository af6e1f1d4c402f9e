//! Scenario pipeline errors.

use crate::graphql::QueryError;

use super::progress::Stage;

/// Errors from building or streaming a scenario.
#[derive(Debug, thiserror::Error)]
pub enum ScenarioError {
    /// Configuration rejected before any query was issued
    #[error("invalid scenario config: {0}")]
    Validation(String),

    /// A query failed during a pipeline stage
    #[error("{stage} query failed: {source}")]
    Query {
        stage: Stage,
        #[source]
        source: QueryError,
    },

    /// A query response did not have the expected shape
    #[error("{stage} response could not be decoded: {message}")]
    Decode { stage: Stage, message: String },

    /// A progress stream was malformed or reported a failure
    #[error("progress stream error: {0}")]
    Stream(String),
}

impl ScenarioError {
    /// Attach a stage to a query failure, splitting out decode errors.
    pub(crate) fn query(stage: Stage, source: QueryError) -> Self {
        match source {
            QueryError::Json { message } => ScenarioError::Decode { stage, message },
            source => ScenarioError::Query { stage, source },
        }
    }

    /// Stage the error occurred in, if any.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            ScenarioError::Query { stage, .. } | ScenarioError::Decode { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}
