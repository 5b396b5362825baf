//! Per-connection protocol handling
//!
//! Each accepted connection is gated on a handshake, then serves one
//! request at a time. Long-running operations stream their snapshots
//! through this task, which is the single writer for the connection and
//! therefore defines the total order of response frames.

use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use tokio::net::UnixStream;
use tokio_util::codec::Framed;
use tracing::{debug, info, warn};

use ragcli_protocol::{
    Frame, FrameCodec, JobEnvelope, CorrelationId, PROTOCOL_NAME, PROTOCOL_VERSION, SERVER_ID,
    STATUS_ACCEPTED,
};
use ragcli_utils::{RagCliError, Result};

use crate::router::{Dispatch, Router};
use crate::stream::JobStream;

/// Handle one client connection to completion.
///
/// Protocol violations (bad handshake, malformed frames) terminate the
/// connection; routed errors are answered with error-status response
/// frames and the connection stays usable.
pub async fn handle_connection(stream: UnixStream, router: Arc<Router>) -> Result<()> {
    let mut framed = Framed::new(stream, FrameCodec::new());

    // Handshake gate: the first frame must identify the exact protocol
    let Some(first) = framed.next().await else {
        debug!("Connection closed before handshake");
        return Ok(());
    };
    let first = first.map_err(|e| RagCliError::protocol(e.to_string()))?;

    match first {
        Frame::Handshake {
            protocol,
            version,
            client,
        } => {
            if protocol != PROTOCOL_NAME {
                return Err(RagCliError::ProtocolMismatch {
                    expected: PROTOCOL_NAME.to_string(),
                    actual: protocol,
                });
            }
            if version != PROTOCOL_VERSION {
                return Err(RagCliError::VersionMismatch {
                    client: version,
                    server: PROTOCOL_VERSION,
                });
            }
            info!(client = %client, "Handshake accepted");
        }
        other => {
            return Err(RagCliError::protocol(format!(
                "first frame must be a handshake, got {:?}",
                frame_name(&other)
            )));
        }
    }

    framed
        .send(Frame::handshake_ack(SERVER_ID))
        .await
        .map_err(|e| RagCliError::protocol(e.to_string()))?;

    // One request at a time until the client goes away
    while let Some(next) = framed.next().await {
        let frame = next.map_err(|e| RagCliError::protocol(e.to_string()))?;

        let Frame::Request {
            path,
            correlation_id,
            body,
        } = frame
        else {
            return Err(RagCliError::protocol(format!(
                "expected request frame, got {:?}",
                frame_name(&frame)
            )));
        };

        debug!(path = %path, correlation_id = %correlation_id, "Dispatching request");

        match router.dispatch(&path, body).await {
            Ok(Dispatch::Single { status, body }) => {
                framed
                    .send(Frame::response(status, correlation_id, body))
                    .await
                    .map_err(|e| RagCliError::protocol(e.to_string()))?;
            }
            Ok(Dispatch::Stream {
                status,
                first,
                stream,
            }) => {
                framed
                    .send(Frame::response(status, correlation_id.clone(), first))
                    .await
                    .map_err(|e| RagCliError::protocol(e.to_string()))?;

                if !drain_stream(&mut framed, stream, &correlation_id).await? {
                    // Client disconnected mid-stream; the job keeps
                    // running on its worker without delivery.
                    return Ok(());
                }
            }
            Err(transport_err) => {
                warn!(
                    path = %path,
                    status = transport_err.status,
                    code = %transport_err.code,
                    "Request failed"
                );
                let body = transport_err.to_body();
                framed
                    .send(Frame::response(transport_err.status, correlation_id, body))
                    .await
                    .map_err(|e| RagCliError::protocol(e.to_string()))?;
            }
        }
    }

    debug!("Connection closed");
    Ok(())
}

/// Write streamed snapshots in publish order until the terminal one.
///
/// Returns `false` when the client disappeared before the stream ended.
async fn drain_stream(
    framed: &mut Framed<UnixStream, FrameCodec>,
    mut stream: JobStream,
    correlation_id: &CorrelationId,
) -> Result<bool> {
    while let Some(snapshot) = stream.recv().await {
        let terminal = snapshot.status.is_terminal();
        let body = serde_json::to_value(JobEnvelope { job: snapshot })
            .map_err(|e| RagCliError::internal(e.to_string()))?;

        if framed
            .send(Frame::response(
                STATUS_ACCEPTED,
                correlation_id.clone(),
                body,
            ))
            .await
            .is_err()
        {
            debug!("Client disconnected mid-stream; job continues unobserved");
            return Ok(false);
        }

        if terminal {
            break;
        }
    }
    Ok(true)
}

fn frame_name(frame: &Frame) -> &'static str {
    match frame {
        Frame::Handshake { .. } => "handshake",
        Frame::HandshakeAck { .. } => "handshake_ack",
        Frame::Request { .. } => "request",
        Frame::Response { .. } => "response",
    }
}
