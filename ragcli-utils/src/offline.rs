//! Offline network guard
//!
//! Process-wide interceptor restricting outbound HTTP to loopback
//! destinations, so adapters that talk to local services (vector store,
//! LLM runtime) can never leak traffic off the machine.
//!
//! Adapters must receive their [`GuardedHttpClient`] through a constructor
//! parameter; the install counter below is the only global state.

use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;
use url::Url;

use crate::{RagCliError, Result};

/// Default timeout for probe-style requests through the guarded client.
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(5);

/// Nested installs are counted; the guard stays active until every handle
/// has been restored.
static INSTALL_COUNT: AtomicUsize = AtomicUsize::new(0);

/// Process-wide offline enforcement switch.
pub struct OfflineGuard;

impl OfflineGuard {
    /// Activate offline enforcement for every [`GuardedHttpClient`] in the
    /// process. The returned handle scopes the installation; dropping it
    /// (or calling [`GuardHandle::restore`]) deactivates the guard once all
    /// nested installs are released.
    pub fn install() -> GuardHandle {
        INSTALL_COUNT.fetch_add(1, Ordering::SeqCst);
        GuardHandle { active: true }
    }

    /// Whether offline enforcement is currently active.
    pub fn is_installed() -> bool {
        INSTALL_COUNT.load(Ordering::SeqCst) > 0
    }
}

/// Restore handle returned by [`OfflineGuard::install`].
#[must_use = "dropping the handle restores the previous network policy"]
pub struct GuardHandle {
    active: bool,
}

impl GuardHandle {
    /// Explicitly release this installation.
    pub fn restore(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if self.active {
            self.active = false;
            INSTALL_COUNT.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

impl Drop for GuardHandle {
    fn drop(&mut self) {
        self.release();
    }
}

/// Minimal response surface the adapters need from a probe request.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    /// Whether the status code is in the 2xx range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Underlying HTTP transport, injectable so tests can observe call counts.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn get(&self, url: &Url) -> Result<HttpResponse>;
}

/// Production transport backed by reqwest.
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| RagCliError::config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, url: &Url) -> Result<HttpResponse> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| RagCliError::connection(format!("HTTP request failed: {}", e)))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| RagCliError::connection(format!("HTTP body read failed: {}", e)))?;

        Ok(HttpResponse { status, body })
    }
}

/// HTTP client that consults the offline guard before touching the network.
///
/// While the guard is installed, any request whose destination host is not
/// a loopback address fails with [`RagCliError::ExternalNetworkBlocked`]
/// before the underlying transport is invoked.
#[derive(Clone)]
pub struct GuardedHttpClient {
    transport: Arc<dyn HttpTransport>,
}

impl GuardedHttpClient {
    /// Build a client over the production reqwest transport.
    pub fn new() -> Result<Self> {
        Ok(Self {
            transport: Arc::new(ReqwestTransport::new()?),
        })
    }

    /// Build a client over a custom transport (used by tests and fakes).
    pub fn with_transport(transport: Arc<dyn HttpTransport>) -> Self {
        Self { transport }
    }

    /// Issue a GET request, enforcing loopback-only destinations while the
    /// offline guard is installed.
    pub async fn get(&self, url: &str) -> Result<HttpResponse> {
        let parsed = Url::parse(url)
            .map_err(|e| RagCliError::invalid_request(format!("Invalid URL {:?}: {}", url, e)))?;

        let host = parsed.host_str().unwrap_or("");
        if OfflineGuard::is_installed() && is_remote_host(host) {
            warn!(%url, "Offline guard blocked outbound HTTP request");
            return Err(RagCliError::ExternalNetworkBlocked {
                host: host.to_string(),
            });
        }

        self.transport.get(&parsed).await
    }
}

/// Report whether the host lies outside the loopback range.
///
/// Non-IP hostnames other than "localhost" are treated as remote: name
/// resolution happens after this check, so a DNS name pointing at loopback
/// still counts as external.
fn is_remote_host(host: &str) -> bool {
    if host.is_empty() {
        return false;
    }

    if host.eq_ignore_ascii_case("localhost") {
        return false;
    }

    // Url::host_str keeps the brackets around IPv6 literals
    let bare = host.trim_start_matches('[').trim_end_matches(']');
    match bare.parse::<IpAddr>() {
        Ok(ip) => !ip.is_loopback(),
        Err(_) => true,
    }
}
