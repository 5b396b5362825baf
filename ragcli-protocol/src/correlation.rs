//! Correlation tokens binding requests to their responses
//!
//! Every request carries a fresh opaque token; every response frame for
//! that request (including all frames of a stream) must echo it exactly.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Number of random bytes in a token (hex-encodes to 32 characters).
const TOKEN_BYTES: usize = 16;

/// Tie-breaker for fallback tokens generated within the same clock reading.
static FALLBACK_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Opaque unique token generated per request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Generate a fresh token from the OS entropy source.
    ///
    /// If the entropy source fails, falls back to a deterministic token
    /// derived from the clock and a process-wide counter so a request is
    /// never sent unlabeled and tokens never silently collide.
    pub fn generate() -> Self {
        Self::from_entropy(|buf| getrandom::getrandom(buf))
    }

    /// Generate with an explicit entropy source (injectable for tests).
    pub fn from_entropy<F>(fill: F) -> Self
    where
        F: FnOnce(&mut [u8]) -> Result<(), getrandom::Error>,
    {
        let mut buf = [0u8; TOKEN_BYTES];
        match fill(&mut buf) {
            Ok(()) => Self(hex::encode(buf)),
            Err(_) => Self::fallback(),
        }
    }

    /// Deterministic fallback token: clock nanoseconds plus an atomic
    /// counter, hex-encoded to the same fixed width as random tokens.
    fn fallback() -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);
        let seq = FALLBACK_COUNTER.fetch_add(1, Ordering::SeqCst);

        let mut buf = [0u8; TOKEN_BYTES];
        buf[..8].copy_from_slice(&nanos.to_be_bytes());
        buf[8..].copy_from_slice(&seq.to_be_bytes());
        Self(hex::encode(buf))
    }

    /// View the token as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CorrelationId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Generate a trace identifier shared across commands.
///
/// Trace IDs use the same token shape as correlation IDs.
pub fn new_trace_id() -> String {
    CorrelationId::generate().0
}
