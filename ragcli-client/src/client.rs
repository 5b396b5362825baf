//! Connection client for the backend Unix socket
//!
//! One connection carries one logical request at a time: every call locks
//! the connection for its whole round trip, and concurrency across
//! independent operations is achieved by opening additional connections.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::UnixStream;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::codec::Framed;
use tracing::{debug, info};

use async_trait::async_trait;
use ragcli_protocol::codec::CodecError;
use ragcli_protocol::{CorrelationId, Frame, FrameCodec, PROTOCOL_NAME, PROTOCOL_VERSION};
use ragcli_utils::{RagCliError, Result};

use crate::config::ClientConfig;
use crate::retry::{read_frame_with_retry, FrameSource};

/// Per-connection session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Socket connected, handshake not yet written.
    Connected,
    /// Handshake written; the ack must be consumed before any frame is
    /// trusted as an application response.
    HandshakeSent,
    /// Handshake acknowledged; application traffic may flow.
    Active,
    /// Unusable: closed locally or poisoned by a fatal protocol error.
    Closed,
}

/// Client connection to the backend.
pub struct Client {
    pub(crate) config: ClientConfig,
    pub(crate) conn: Mutex<Conn>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

pub(crate) struct Conn {
    pub(crate) framed: Framed<UnixStream, FrameCodec>,
    pub(crate) state: SessionState,
}

impl Client {
    /// Establish a socket connection and send the handshake.
    ///
    /// The handshake is pipelined: the ack is consumed (and validated)
    /// lazily, before the first response frame is interpreted.
    pub async fn connect(config: ClientConfig) -> Result<Self> {
        if !config.socket_path.exists() {
            return Err(RagCliError::BackendNotRunning {
                path: config.socket_path.clone(),
            });
        }

        info!(
            socket = %config.socket_path.display(),
            client = %config.client_id,
            "Connecting to backend"
        );

        let stream = tokio::time::timeout(
            config.dial_timeout,
            UnixStream::connect(&config.socket_path),
        )
        .await
        .map_err(|_| RagCliError::DialTimeout {
            millis: config.dial_timeout.as_millis() as u64,
        })?
        .map_err(|e| {
            RagCliError::connection(format!(
                "Failed to connect to {}: {}",
                config.socket_path.display(),
                e
            ))
        })?;

        let mut conn = Conn {
            framed: Framed::new(stream, FrameCodec::new()),
            state: SessionState::Connected,
        };

        conn.send_frame(Frame::handshake(config.client_id.clone()))
            .await?;
        conn.state = SessionState::HandshakeSent;

        Ok(Self {
            config,
            conn: Mutex::new(conn),
        })
    }

    /// Current session state.
    pub async fn state(&self) -> SessionState {
        self.conn.lock().await.state
    }

    /// Close the connection; subsequent calls fail with `ClientClosed`.
    pub async fn close(&self) {
        let mut conn = self.conn.lock().await;
        if conn.state != SessionState::Closed {
            conn.state = SessionState::Closed;
            let _ = conn.framed.get_mut().shutdown().await;
        }
    }

    /// One request/response round trip: send the frame, consume a pending
    /// handshake ack, read the response with retries, validate correlation
    /// and the expected status, return the response body.
    pub(crate) async fn call(&self, path: &str, body: Value, expected_status: u16) -> Result<Value> {
        let mut conn = self.conn.lock().await;
        conn.ensure_usable()?;

        let deadline = Instant::now() + self.config.call_timeout;
        let correlation = CorrelationId::generate();
        debug!(path, correlation_id = %correlation, "Sending request");

        conn.send_frame(Frame::request(path, correlation.clone(), body))
            .await?;
        conn.finish_handshake(&self.config, deadline).await?;

        let Some((status, actual, response_body)) =
            conn.read_response(&self.config, deadline).await?
        else {
            conn.state = SessionState::Closed;
            return Err(RagCliError::ConnectionClosed);
        };

        conn.check_correlation(&correlation, &actual)?;
        if status != expected_status {
            return Err(RagCliError::UnexpectedStatus {
                path: path.to_string(),
                status,
            });
        }

        Ok(response_body)
    }
}

impl Conn {
    pub(crate) fn ensure_usable(&self) -> Result<()> {
        if self.state == SessionState::Closed {
            return Err(RagCliError::ClientClosed);
        }
        Ok(())
    }

    /// Write one frame; write failures poison the connection.
    pub(crate) async fn send_frame(&mut self, frame: Frame) -> Result<()> {
        match self.framed.send(frame).await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.state = SessionState::Closed;
                Err(map_codec_error(e))
            }
        }
    }

    /// Consume and validate the handshake ack if it is still pending.
    ///
    /// Any mismatch renders the connection unusable.
    pub(crate) async fn finish_handshake(
        &mut self,
        config: &ClientConfig,
        deadline: Instant,
    ) -> Result<()> {
        if self.state != SessionState::HandshakeSent {
            return Ok(());
        }

        let frame = read_frame_with_retry(
            &mut self.framed,
            &config.retry_schedule,
            config.read_timeout,
            deadline,
        )
        .await
        .map_err(|e| {
            self.state = SessionState::Closed;
            e
        })?;

        let Some(frame) = frame else {
            self.state = SessionState::Closed;
            return Err(RagCliError::ConnectionClosed);
        };

        match frame {
            Frame::HandshakeAck {
                protocol,
                version,
                server,
            } => {
                if protocol != PROTOCOL_NAME {
                    self.state = SessionState::Closed;
                    return Err(RagCliError::ProtocolMismatch {
                        expected: PROTOCOL_NAME.to_string(),
                        actual: protocol,
                    });
                }
                if version != PROTOCOL_VERSION {
                    self.state = SessionState::Closed;
                    return Err(RagCliError::VersionMismatch {
                        client: PROTOCOL_VERSION,
                        server: version,
                    });
                }
                debug!(server = %server, "Handshake acknowledged");
                self.state = SessionState::Active;
                Ok(())
            }
            other => {
                self.state = SessionState::Closed;
                Err(RagCliError::protocol(format!(
                    "expected handshake ack, got {:?}",
                    frame_kind(&other)
                )))
            }
        }
    }

    /// Read one response frame with retries.
    ///
    /// Returns `None` on a clean end-of-stream; any non-response frame is
    /// a fatal protocol error.
    pub(crate) async fn read_response(
        &mut self,
        config: &ClientConfig,
        deadline: Instant,
    ) -> Result<Option<(u16, CorrelationId, Value)>> {
        let frame = read_frame_with_retry(
            &mut self.framed,
            &config.retry_schedule,
            config.read_timeout,
            deadline,
        )
        .await?;

        match frame {
            None => Ok(None),
            Some(Frame::Response {
                status,
                correlation_id,
                body,
            }) => Ok(Some((status, correlation_id, body))),
            Some(other) => {
                self.state = SessionState::Closed;
                Err(RagCliError::protocol(format!(
                    "expected response frame, got {:?}",
                    frame_kind(&other)
                )))
            }
        }
    }

    /// Validate that a response echoes the request token.
    ///
    /// A mismatch means the connection is desynchronized and must be
    /// discarded.
    pub(crate) fn check_correlation(
        &mut self,
        expected: &CorrelationId,
        actual: &CorrelationId,
    ) -> Result<()> {
        if actual != expected {
            self.state = SessionState::Closed;
            return Err(RagCliError::CorrelationMismatch {
                expected: expected.to_string(),
                actual: actual.to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl<S> FrameSource for Framed<S, FrameCodec>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn next_frame(&mut self, timeout: Duration) -> Result<Option<Frame>> {
        match tokio::time::timeout(timeout, self.next()).await {
            Err(_) => Err(RagCliError::ReadTimeout),
            Ok(None) => Ok(None),
            Ok(Some(Ok(frame))) => Ok(Some(frame)),
            Ok(Some(Err(e))) => Err(map_codec_error(e)),
        }
    }
}

/// Classify codec failures into the unified error taxonomy.
pub(crate) fn map_codec_error(err: CodecError) -> RagCliError {
    match err {
        CodecError::UnexpectedEof => RagCliError::UnexpectedEof,
        CodecError::Io(e) => match e.kind() {
            std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock => {
                RagCliError::ReadTimeout
            }
            std::io::ErrorKind::UnexpectedEof => RagCliError::UnexpectedEof,
            _ => RagCliError::Io(e),
        },
        other => RagCliError::protocol(other.to_string()),
    }
}

fn frame_kind(frame: &Frame) -> &'static str {
    match frame {
        Frame::Handshake { .. } => "handshake",
        Frame::HandshakeAck { .. } => "handshake_ack",
        Frame::Request { .. } => "request",
        Frame::Response { .. } => "response",
    }
}
