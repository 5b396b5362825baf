//! Producer/consumer plumbing for job snapshot streams
//!
//! The worker computing progress publishes snapshots into a bounded
//! channel; a single writer per connection drains it strictly in publish
//! order, which preserves the total order of response frames without a
//! mutex around the socket write path.

use tokio::sync::mpsc;
use tracing::{debug, warn};

use ragcli_protocol::{JobSnapshot, JobStatus};

/// Create a bounded snapshot channel for one job.
pub fn snapshot_channel(capacity: usize) -> (SnapshotPublisher, JobStream) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        SnapshotPublisher {
            tx,
            last_status: None,
        },
        JobStream { rx },
    )
}

/// Producer half held by the background worker.
pub struct SnapshotPublisher {
    tx: mpsc::Sender<JobSnapshot>,
    last_status: Option<JobStatus>,
}

impl SnapshotPublisher {
    /// Publish one snapshot.
    ///
    /// Enforces forward-only status transitions: a snapshot that would move
    /// the job backward (or past a terminal status) is suppressed. Returns
    /// whether the snapshot was delivered to a subscriber; a closed channel
    /// means the client went away, and the job simply keeps running without
    /// an audience.
    pub async fn publish(&mut self, snapshot: JobSnapshot) -> bool {
        if let Some(last) = self.last_status {
            if !last.can_transition_to(snapshot.status) {
                warn!(
                    job_id = %snapshot.job_id,
                    from = ?last,
                    to = ?snapshot.status,
                    "Suppressing out-of-order job snapshot"
                );
                return false;
            }
        }
        self.last_status = Some(snapshot.status);

        let delivered = self.tx.send(snapshot).await.is_ok();
        if !delivered {
            debug!("No subscriber for job snapshot; continuing without delivery");
        }
        delivered
    }

    /// Status of the most recently published snapshot.
    pub fn last_status(&self) -> Option<JobStatus> {
        self.last_status
    }
}

/// Consumer half drained by the connection's writer.
pub struct JobStream {
    rx: mpsc::Receiver<JobSnapshot>,
}

impl JobStream {
    /// Next snapshot in publish order; `None` once the worker is done and
    /// the channel has drained.
    pub async fn recv(&mut self) -> Option<JobSnapshot> {
        self.rx.recv().await
    }
}
