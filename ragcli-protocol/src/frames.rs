//! Transport frame envelopes
//!
//! Every message on the socket is one of four frame shapes, discriminated
//! by the `type` field of the JSON payload.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::correlation::CorrelationId;
use crate::{PROTOCOL_NAME, PROTOCOL_VERSION};

/// One length-prefixed JSON message on the socket stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Frame {
    /// Client -> server, once per connection.
    Handshake {
        protocol: String,
        version: u32,
        client: String,
    },
    /// Server -> client, once per connection.
    HandshakeAck {
        protocol: String,
        version: u32,
        server: String,
    },
    /// Client -> server application request.
    Request {
        path: String,
        correlation_id: CorrelationId,
        body: Value,
    },
    /// Server -> client response; one or more per request.
    Response {
        status: u16,
        correlation_id: CorrelationId,
        body: Value,
    },
}

impl Frame {
    /// Build the client handshake frame for the current protocol version.
    pub fn handshake(client: impl Into<String>) -> Self {
        Self::Handshake {
            protocol: PROTOCOL_NAME.to_string(),
            version: PROTOCOL_VERSION,
            client: client.into(),
        }
    }

    /// Build the server handshake acknowledgement.
    pub fn handshake_ack(server: impl Into<String>) -> Self {
        Self::HandshakeAck {
            protocol: PROTOCOL_NAME.to_string(),
            version: PROTOCOL_VERSION,
            server: server.into(),
        }
    }

    /// Build a request frame.
    pub fn request(path: impl Into<String>, correlation_id: CorrelationId, body: Value) -> Self {
        Self::Request {
            path: path.into(),
            correlation_id,
            body,
        }
    }

    /// Build a response frame.
    pub fn response(status: u16, correlation_id: CorrelationId, body: Value) -> Self {
        Self::Response {
            status,
            correlation_id,
            body,
        }
    }
}
