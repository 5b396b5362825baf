//! Retry policy for frame reads
//!
//! Wraps a single frame-read operation: only read timeouts and unexpected
//! end-of-stream are retried, consulting the schedule by attempt index.
//! The request frame is never re-sent; retries only wait longer for a
//! response that has not yet arrived.

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::warn;

use ragcli_protocol::Frame;
use ragcli_utils::{RagCliError, Result};

/// Default backoff delays between frame read retries.
const DEFAULT_DELAYS: [Duration; 3] = [
    Duration::from_millis(250),
    Duration::from_millis(500),
    Duration::from_secs(1),
];

/// Ordered, non-empty list of backoff delays.
#[derive(Debug, Clone)]
pub struct RetrySchedule {
    delays: Vec<Duration>,
}

impl Default for RetrySchedule {
    fn default() -> Self {
        Self {
            delays: DEFAULT_DELAYS.to_vec(),
        }
    }
}

impl RetrySchedule {
    /// Build a schedule from custom delays, dropping non-positive entries.
    /// An empty result falls back to the default schedule.
    pub fn new(delays: Vec<Duration>) -> Self {
        let delays: Vec<Duration> = delays.into_iter().filter(|d| !d.is_zero()).collect();
        if delays.is_empty() {
            Self::default()
        } else {
            Self { delays }
        }
    }

    /// The configured delays, in order.
    pub fn delays(&self) -> &[Duration] {
        &self.delays
    }

    /// Delay before retry number `attempt` (0-based), if attempts remain.
    pub fn delay_for_attempt(&self, attempt: usize) -> Option<Duration> {
        self.delays.get(attempt).copied()
    }
}

/// A source of frames with per-attempt read timeouts.
///
/// `Ok(None)` signals a clean end-of-stream at a frame boundary; errors
/// carry the retryability classification via [`RagCliError::is_retryable`].
#[async_trait]
pub trait FrameSource {
    async fn next_frame(&mut self, timeout: Duration) -> Result<Option<Frame>>;
}

/// Read one frame, retrying transient failures per the schedule.
///
/// Every attempt and every backoff sleep is bounded by `deadline`; hitting
/// it surfaces [`RagCliError::DeadlineExceeded`]. Non-retryable errors and
/// schedule exhaustion propagate the underlying error immediately.
pub async fn read_frame_with_retry<S>(
    source: &mut S,
    schedule: &RetrySchedule,
    read_timeout: Duration,
    deadline: Instant,
) -> Result<Option<Frame>>
where
    S: FrameSource + Send,
{
    let mut attempt = 0usize;
    loop {
        let now = Instant::now();
        if now >= deadline {
            return Err(RagCliError::DeadlineExceeded);
        }
        let budget = read_timeout.min(deadline - now);

        match source.next_frame(budget).await {
            Ok(frame) => return Ok(frame),
            Err(err) if err.is_retryable() => {
                let Some(delay) = schedule.delay_for_attempt(attempt) else {
                    return Err(err);
                };
                attempt += 1;
                warn!(error = %err, attempt, delay_ms = delay.as_millis() as u64,
                      "Retrying frame read");
                sleep_until_bounded(delay, deadline).await?;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Sleep for `delay`, but never past `deadline`.
async fn sleep_until_bounded(delay: Duration, deadline: Instant) -> Result<()> {
    let wake = Instant::now() + delay;
    if wake >= deadline {
        tokio::time::sleep_until(deadline).await;
        return Err(RagCliError::DeadlineExceeded);
    }
    tokio::time::sleep_until(wake).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    struct ScriptedSource {
        script: VecDeque<Result<Option<Frame>>>,
        attempts: usize,
    }

    impl ScriptedSource {
        fn new(script: Vec<Result<Option<Frame>>>) -> Self {
            Self {
                script: script.into(),
                attempts: 0,
            }
        }
    }

    #[async_trait]
    impl FrameSource for ScriptedSource {
        async fn next_frame(&mut self, _timeout: Duration) -> Result<Option<Frame>> {
            self.attempts += 1;
            self.script
                .pop_front()
                .unwrap_or(Err(RagCliError::ConnectionClosed))
        }
    }

    fn far_deadline() -> Instant {
        Instant::now() + Duration::from_secs(60)
    }

    fn fast_schedule() -> RetrySchedule {
        RetrySchedule::new(vec![
            Duration::from_millis(1),
            Duration::from_millis(1),
            Duration::from_millis(1),
        ])
    }

    #[test]
    fn test_schedule_default() {
        let schedule = RetrySchedule::default();
        assert_eq!(
            schedule.delays(),
            &[
                Duration::from_millis(250),
                Duration::from_millis(500),
                Duration::from_secs(1),
            ]
        );
    }

    #[test]
    fn test_schedule_normalization() {
        let schedule = RetrySchedule::new(vec![
            Duration::ZERO,
            Duration::from_millis(100),
            Duration::ZERO,
        ]);
        assert_eq!(schedule.delays(), &[Duration::from_millis(100)]);

        // All-invalid input falls back to the default
        let schedule = RetrySchedule::new(vec![Duration::ZERO]);
        assert_eq!(schedule.delays().len(), 3);
    }

    #[tokio::test]
    async fn test_success_without_retry() {
        let mut source = ScriptedSource::new(vec![Ok(Some(Frame::handshake_ack("rag-backend")))]);

        let frame = read_frame_with_retry(
            &mut source,
            &fast_schedule(),
            Duration::from_secs(1),
            far_deadline(),
        )
        .await
        .unwrap();

        assert!(frame.is_some());
        assert_eq!(source.attempts, 1);
    }

    #[tokio::test]
    async fn test_retries_timeouts_then_succeeds() {
        // Fails with a timeout exactly k=2 < 3 times, then succeeds
        let mut source = ScriptedSource::new(vec![
            Err(RagCliError::ReadTimeout),
            Err(RagCliError::ReadTimeout),
            Ok(Some(Frame::handshake_ack("rag-backend"))),
        ]);

        let frame = read_frame_with_retry(
            &mut source,
            &fast_schedule(),
            Duration::from_secs(1),
            far_deadline(),
        )
        .await
        .unwrap();

        assert!(frame.is_some());
        assert_eq!(source.attempts, 3);
    }

    #[tokio::test]
    async fn test_retries_unexpected_eof() {
        let mut source = ScriptedSource::new(vec![
            Err(RagCliError::UnexpectedEof),
            Ok(Some(Frame::handshake_ack("rag-backend"))),
        ]);

        let frame = read_frame_with_retry(
            &mut source,
            &fast_schedule(),
            Duration::from_secs(1),
            far_deadline(),
        )
        .await
        .unwrap();

        assert!(frame.is_some());
        assert_eq!(source.attempts, 2);
    }

    #[tokio::test]
    async fn test_schedule_exhaustion_propagates_error() {
        // k = 4 >= len(schedule) = 3: one initial attempt plus three retries
        let mut source = ScriptedSource::new(vec![
            Err(RagCliError::ReadTimeout),
            Err(RagCliError::ReadTimeout),
            Err(RagCliError::ReadTimeout),
            Err(RagCliError::ReadTimeout),
        ]);

        let err = read_frame_with_retry(
            &mut source,
            &fast_schedule(),
            Duration::from_secs(1),
            far_deadline(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, RagCliError::ReadTimeout));
        assert_eq!(source.attempts, 4);
    }

    #[tokio::test]
    async fn test_non_retryable_error_propagates_immediately() {
        let mut source = ScriptedSource::new(vec![
            Err(RagCliError::Protocol("bad frame".into())),
            Ok(Some(Frame::handshake_ack("rag-backend"))),
        ]);

        let err = read_frame_with_retry(
            &mut source,
            &fast_schedule(),
            Duration::from_secs(1),
            far_deadline(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, RagCliError::Protocol(_)));
        assert_eq!(source.attempts, 1);
    }

    #[tokio::test]
    async fn test_clean_eof_is_not_retried() {
        let mut source = ScriptedSource::new(vec![Ok(None)]);

        let frame = read_frame_with_retry(
            &mut source,
            &fast_schedule(),
            Duration::from_secs(1),
            far_deadline(),
        )
        .await
        .unwrap();

        assert!(frame.is_none());
        assert_eq!(source.attempts, 1);
    }

    #[tokio::test]
    async fn test_backoff_sleep_respects_deadline() {
        // Schedule wants a long sleep but the deadline arrives first
        let mut source = ScriptedSource::new(vec![
            Err(RagCliError::ReadTimeout),
            Ok(Some(Frame::handshake_ack("rag-backend"))),
        ]);
        let schedule = RetrySchedule::new(vec![Duration::from_secs(60)]);
        let deadline = Instant::now() + Duration::from_millis(20);

        let err = read_frame_with_retry(&mut source, &schedule, Duration::from_secs(1), deadline)
            .await
            .unwrap_err();

        assert!(matches!(err, RagCliError::DeadlineExceeded));
        assert_eq!(source.attempts, 1);
    }

    #[tokio::test]
    async fn test_expired_deadline_fails_before_reading() {
        let mut source = ScriptedSource::new(vec![Ok(Some(Frame::handshake_ack("rag-backend")))]);
        let deadline = Instant::now() - Duration::from_millis(1);

        let err = read_frame_with_retry(
            &mut source,
            &fast_schedule(),
            Duration::from_secs(1),
            deadline,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, RagCliError::DeadlineExceeded));
        assert_eq!(source.attempts, 0);
    }
}
