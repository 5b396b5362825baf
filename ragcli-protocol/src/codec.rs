//! Frame codec for IPC framing
//!
//! Wire format per frame:
//!
//! ```text
//! <ASCII decimal length>\n
//! <length bytes of UTF-8 JSON payload>\n
//! ```
//!
//! The codec is transport-agnostic: it runs over any byte stream a
//! `Framed` can wrap, and callers apply read deadlines around it.

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::frames::Frame;
use crate::MAX_FRAME_SIZE;

/// Upper bound on the length line itself; a decimal length for a 16 MiB
/// frame needs 8 digits, so anything past this is a malformed prefix.
const MAX_LENGTH_LINE: usize = 20;

/// Protocol codec error
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid length prefix: {0}")]
    InvalidLength(String),

    #[error("Frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },

    #[error("Expected newline terminator, got byte 0x{byte:02x}")]
    MissingTerminator { byte: u8 },

    #[error("Unexpected end of stream mid-frame")]
    UnexpectedEof,
}

impl CodecError {
    /// Protocol violations are fatal for the connection; only a mid-frame
    /// EOF (and IO timeouts classified by the caller) may be retried.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            Self::InvalidLength(_)
                | Self::FrameTooLarge { .. }
                | Self::MissingTerminator { .. }
                | Self::Json(_)
        )
    }
}

/// Codec encoding and decoding [`Frame`] values in both directions.
pub struct FrameCodec;

impl FrameCodec {
    pub fn new() -> Self {
        Self
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        // Wait for the full length line
        let Some(newline) = src.iter().position(|&b| b == b'\n') else {
            if src.len() > MAX_LENGTH_LINE {
                return Err(CodecError::InvalidLength(
                    "length line exceeds maximum prefix size".into(),
                ));
            }
            return Ok(None);
        };

        let length = parse_length_line(&src[..newline])?;

        // Wait for payload plus the trailing newline sentinel
        let total = newline + 1 + length + 1;
        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }

        // Consume length line
        src.advance(newline + 1);

        // Extract payload bytes
        let payload = src.split_to(length);

        let terminator = src[0];
        src.advance(1);
        if terminator != b'\n' {
            return Err(CodecError::MissingTerminator { byte: terminator });
        }

        let frame: Frame = serde_json::from_slice(&payload)?;
        Ok(Some(frame))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(src)? {
            Some(frame) => Ok(Some(frame)),
            None if src.is_empty() => Ok(None),
            None => Err(CodecError::UnexpectedEof),
        }
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = CodecError;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let payload = serde_json::to_vec(&item)?;

        if payload.len() > MAX_FRAME_SIZE {
            return Err(CodecError::FrameTooLarge {
                size: payload.len(),
                max: MAX_FRAME_SIZE,
            });
        }

        let header = format!("{}\n", payload.len());
        dst.reserve(header.len() + payload.len() + 1);
        dst.put_slice(header.as_bytes());
        dst.put_slice(&payload);
        dst.put_u8(b'\n');
        Ok(())
    }
}

/// Parse and validate the ASCII decimal length prefix.
fn parse_length_line(line: &[u8]) -> Result<usize, CodecError> {
    let text = std::str::from_utf8(line)
        .map_err(|_| CodecError::InvalidLength("length line is not UTF-8".into()))?
        .trim();

    let length: i64 = text
        .parse()
        .map_err(|_| CodecError::InvalidLength(format!("malformed length line {:?}", text)))?;

    if length < 0 {
        return Err(CodecError::InvalidLength(format!(
            "negative length {}",
            length
        )));
    }

    let length = length as usize;
    if length > MAX_FRAME_SIZE {
        return Err(CodecError::FrameTooLarge {
            size: length,
            max: MAX_FRAME_SIZE,
        });
    }

    Ok(length)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correlation::CorrelationId;
    use serde_json::json;

    fn encode_frame(frame: Frame) -> BytesMut {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();
        codec.encode(frame, &mut buf).unwrap();
        buf
    }

    #[test]
    fn test_frame_roundtrip() {
        let mut codec = FrameCodec::new();

        let frame = Frame::request(
            "/v1/query",
            CorrelationId::generate(),
            json!({"question": "How do I change file permissions?"}),
        );

        let mut buf = encode_frame(frame.clone());
        let decoded = codec.decode(&mut buf).unwrap().unwrap();

        assert_eq!(frame, decoded);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_wire_layout() {
        let buf = encode_frame(Frame::handshake("test"));

        // "<len>\n<payload>\n"
        let newline = buf.iter().position(|&b| b == b'\n').unwrap();
        let length: usize = std::str::from_utf8(&buf[..newline])
            .unwrap()
            .parse()
            .unwrap();
        assert_eq!(buf.len(), newline + 1 + length + 1);
        assert_eq!(buf[buf.len() - 1], b'\n');
    }

    #[test]
    fn test_partial_frame_returns_none() {
        let mut codec = FrameCodec::new();
        let buf = encode_frame(Frame::handshake_ack("rag-backend"));

        // Length line only
        let mut partial = BytesMut::from(&buf[..3]);
        assert!(codec.decode(&mut partial).unwrap().is_none());

        // Everything but the final newline
        let mut partial = BytesMut::from(&buf[..buf.len() - 1]);
        assert!(codec.decode(&mut partial).unwrap().is_none());

        // Full frame decodes
        let mut full = buf.clone();
        assert!(codec.decode(&mut full).unwrap().is_some());
    }

    #[test]
    fn test_multiple_frames_in_buffer() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();

        let first = Frame::handshake("client-a");
        let second = Frame::handshake_ack("rag-backend");
        codec.encode(first.clone(), &mut buf).unwrap();
        codec.encode(second.clone(), &mut buf).unwrap();

        assert_eq!(codec.decode(&mut buf).unwrap().unwrap(), first);
        assert_eq!(codec.decode(&mut buf).unwrap().unwrap(), second);
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_negative_length_rejected() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::from(&b"-5\n{}\n"[..]);

        let err = codec.decode(&mut buf).unwrap_err();
        assert!(matches!(err, CodecError::InvalidLength(_)));
        assert!(err.is_protocol_violation());
    }

    #[test]
    fn test_malformed_length_line_rejected() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::from(&b"abc\n{}\n"[..]);

        assert!(matches!(
            codec.decode(&mut buf).unwrap_err(),
            CodecError::InvalidLength(_)
        ));
    }

    #[test]
    fn test_oversized_length_rejected() {
        let mut codec = FrameCodec::new();
        let huge = MAX_FRAME_SIZE + 1;
        let mut buf = BytesMut::from(format!("{}\n", huge).as_bytes());

        assert!(matches!(
            codec.decode(&mut buf).unwrap_err(),
            CodecError::FrameTooLarge { .. }
        ));
    }

    #[test]
    fn test_unterminated_length_line_rejected() {
        let mut codec = FrameCodec::new();
        // No newline within the maximum prefix length
        let mut buf = BytesMut::from(&b"111111111111111111111111111111"[..]);

        assert!(matches!(
            codec.decode(&mut buf).unwrap_err(),
            CodecError::InvalidLength(_)
        ));
    }

    #[test]
    fn test_missing_terminator_rejected() {
        let mut codec = FrameCodec::new();
        let mut buf = encode_frame(Frame::handshake("test"));

        // Corrupt the trailing newline
        let last = buf.len() - 1;
        buf[last] = b'X';

        assert!(matches!(
            codec.decode(&mut buf).unwrap_err(),
            CodecError::MissingTerminator { byte: b'X' }
        ));
    }

    #[test]
    fn test_invalid_json_payload_rejected() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::from(&b"9\nnot json!\n"[..]);

        assert!(matches!(
            codec.decode(&mut buf).unwrap_err(),
            CodecError::Json(_)
        ));
    }

    #[test]
    fn test_decode_eof_mid_frame() {
        let mut codec = FrameCodec::new();
        let buf = encode_frame(Frame::handshake("test"));

        let mut truncated = BytesMut::from(&buf[..buf.len() / 2]);
        assert!(matches!(
            codec.decode_eof(&mut truncated).unwrap_err(),
            CodecError::UnexpectedEof
        ));

        let mut empty = BytesMut::new();
        assert!(codec.decode_eof(&mut empty).unwrap().is_none());
    }

    #[test]
    fn test_encode_rejects_oversized_payload() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();

        let body = json!({"blob": "x".repeat(MAX_FRAME_SIZE)});
        let frame = Frame::request("/v1/query", CorrelationId::generate(), body);

        assert!(matches!(
            codec.encode(frame, &mut buf).unwrap_err(),
            CodecError::FrameTooLarge { .. }
        ));
    }
}
