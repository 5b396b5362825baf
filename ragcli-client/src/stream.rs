//! Streaming iterator for long-running jobs
//!
//! Consumes zero or more intermediate frames sharing one correlation ID
//! until a terminal job status is observed. The callback sees every frame
//! exactly once, strictly in arrival order.

use tokio::time::Instant;
use tracing::debug;

use ragcli_protocol::types::ReindexRequest;
use ragcli_protocol::{CorrelationId, Frame, JobSnapshot, INDEX_REINDEX_PATH, STATUS_ACCEPTED};
use ragcli_utils::{RagCliError, Result};

use crate::calls::{decode_job, ensure_trace_id, to_body};
use crate::client::{Client, SessionState};

impl Client {
    /// Trigger an index rebuild and stream job snapshots until the job
    /// reaches a terminal status.
    ///
    /// `on_update` is invoked exactly once per received snapshot, in
    /// arrival order; the returned snapshot is the last one observed,
    /// which is the terminal one on success. An end-of-stream before a
    /// terminal snapshot surfaces as [`RagCliError::StreamIncomplete`].
    pub async fn start_reindex_stream<F>(
        &self,
        mut request: ReindexRequest,
        mut on_update: F,
    ) -> Result<JobSnapshot>
    where
        F: FnMut(&JobSnapshot) -> Result<()> + Send,
    {
        request.trace_id = ensure_trace_id(request.trace_id);
        let body = to_body(&request)?;

        let mut conn = self.conn.lock().await;
        conn.ensure_usable()?;

        let deadline = Instant::now() + self.config.stream_timeout;
        let correlation = CorrelationId::generate();
        debug!(correlation_id = %correlation, "Starting reindex stream");

        conn.send_frame(Frame::request(INDEX_REINDEX_PATH, correlation.clone(), body))
            .await?;
        conn.finish_handshake(&self.config, deadline).await?;

        // First frame carries the initial snapshot and the accepted status
        let Some((status, actual, first_body)) =
            conn.read_response(&self.config, deadline).await?
        else {
            conn.state = SessionState::Closed;
            return Err(RagCliError::StreamIncomplete);
        };
        conn.check_correlation(&correlation, &actual)?;
        if status != STATUS_ACCEPTED {
            return Err(RagCliError::UnexpectedStatus {
                path: INDEX_REINDEX_PATH.to_string(),
                status,
            });
        }

        let mut job = decode_job(first_body)?;
        on_update(&job)?;

        loop {
            if job.status.is_terminal() {
                debug!(job_id = %job.job_id, status = ?job.status, "Stream complete");
                return Ok(job);
            }

            let Some((_, actual, next_body)) =
                conn.read_response(&self.config, deadline).await?
            else {
                return Err(RagCliError::StreamIncomplete);
            };
            conn.check_correlation(&correlation, &actual)?;

            job = decode_job(next_body)?;
            on_update(&job)?;
        }
    }
}
