//! Newline-delimited JSON encoding of progress records.

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::debug;

use super::error::ScenarioError;
use super::progress::{ProgressSink, ScenarioProgress, Stage};

/// Encode one record as a JSON line, including the trailing newline.
pub fn encode_line(progress: &ScenarioProgress) -> Result<String, ScenarioError> {
    let mut line = serde_json::to_string(progress).map_err(|e| ScenarioError::Stream(e.to_string()))?;
    line.push('\n');
    Ok(line)
}

/// Feed every record of an NDJSON progress stream to a sink.
///
/// Blank lines are skipped. A terminal record carrying an error is
/// delivered through [`ProgressSink::on_error`]; a mid-run task failure is
/// an ordinary record. A `complete` record is delivered and followed
/// by [`ProgressSink::on_complete`]. A line that fails to parse stops the
/// read, is reported to the sink and returned as an error.
///
/// Returns the number of records read.
pub async fn read_progress_stream<R>(reader: R, sink: &dyn ProgressSink) -> Result<usize, ScenarioError>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut count = 0;

    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| ScenarioError::Stream(e.to_string()))?
    {
        if line.trim().is_empty() {
            continue;
        }

        let progress: ScenarioProgress = match serde_json::from_str(&line) {
            Ok(p) => p,
            Err(e) => {
                let err = ScenarioError::Stream(format!("invalid progress record: {e}"));
                sink.on_error(&err);
                return Err(err);
            }
        };
        count += 1;

        if let Some(error) = progress.error.as_ref().filter(|_| progress.is_terminal()) {
            sink.on_error(&ScenarioError::Stream(error.message.clone()));
            continue;
        }

        let complete = progress.current_stage == Stage::Complete;
        sink.on_progress(progress);
        if complete {
            sink.on_complete();
        }
    }

    debug!(records = count, "Progress stream finished");
    Ok(count)
}
