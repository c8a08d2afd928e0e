//! Octocrab-backed transport to the GitHub REST API.
//!
//! Requests go through octocrab's raw `_get`/`_post`/`_patch` methods, which
//! return the response untouched for every status code. Octocrab's own retry
//! layer is disabled so [`UpstreamClient`](super::UpstreamClient) is the only
//! place attempts are counted.

use std::time::Duration;

use http::header::HeaderName;
use http::{Method, Uri};
use http_body_util::BodyExt;
use octocrab::Octocrab;
use octocrab::service::middleware::retry::RetryConfig as OctocrabRetryConfig;
use tracing::trace;

use super::transport::{
    RawResponse, Transport, TransportError, TransportErrorKind, UpstreamRequest,
};

/// GitHub REST API version pinned on every request.
pub const API_VERSION: &str = "2022-11-28";

/// Default base URL of the GitHub REST API.
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// A GitHub API transport.
///
/// Not tied to a repository: callers pass full API paths.
#[derive(Clone)]
pub struct OctocrabTransport {
    client: Octocrab,
    api_url: String,
}

impl OctocrabTransport {
    /// Creates a transport from a pre-configured Octocrab instance.
    pub fn new(client: Octocrab, api_url: impl Into<String>) -> Self {
        Self {
            client,
            api_url: api_url.into(),
        }
    }

    /// Creates a transport authenticated with a personal access token.
    ///
    /// `timeout` bounds both connecting and waiting for a response.
    pub fn from_token(
        token: impl Into<String>,
        api_url: &str,
        timeout: Duration,
    ) -> Result<Self, octocrab::Error> {
        let client = Octocrab::builder()
            .personal_token(token.into())
            .base_uri(api_url)?
            .add_header(
                HeaderName::from_static("x-github-api-version"),
                API_VERSION.to_string(),
            )
            .add_retry_config(OctocrabRetryConfig::None)
            .set_connect_timeout(Some(timeout))
            .set_read_timeout(Some(timeout))
            .build()?;
        Ok(Self::new(client, api_url))
    }

    async fn execute(&self, request: &UpstreamRequest) -> Result<RawResponse, TransportError> {
        let uri = request.path.clone();
        let body = request.body.as_ref();

        let response = match request.method {
            Method::GET => self.client._get(uri).await,
            Method::POST => self.client._post(uri, body).await,
            Method::PATCH => self.client._patch(uri, body).await,
            Method::PUT => self.client._put(uri, body).await,
            Method::DELETE => self.client._delete(uri, body).await,
            ref other => {
                return Err(TransportError::new(
                    TransportErrorKind::InvalidRequest,
                    format!("unsupported method {other}"),
                ));
            }
        }
        .map_err(|e| classify_octocrab_error(&e.to_string()))?;

        let (parts, body) = response.into_parts();
        let body = body
            .collect()
            .await
            .map_err(|e| classify_octocrab_error(&e.to_string()))?
            .to_bytes();
        Ok(RawResponse {
            status: parts.status,
            headers: parts.headers,
            body,
        })
    }
}

impl Transport for OctocrabTransport {
    async fn send(&self, request: &UpstreamRequest) -> Result<RawResponse, TransportError> {
        if request.path.parse::<Uri>().is_err() {
            return Err(TransportError::new(
                TransportErrorKind::InvalidRequest,
                format!("invalid request path: {}", request.path),
            ));
        }

        trace!(method = %request.method, path = %request.path, "Sending GitHub request");
        self.execute(request).await
    }
}

impl std::fmt::Debug for OctocrabTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OctocrabTransport")
            .field("api_url", &self.api_url)
            .finish_non_exhaustive()
    }
}

/// Classifies an octocrab failure by its message.
///
/// Octocrab does not expose a structured cause for network failures, so the
/// message is matched against the patterns hyper and tower produce. Anything
/// unrecognized is treated as a broken exchange, which is never assumed to
/// have left GitHub untouched.
fn classify_octocrab_error(message: &str) -> TransportError {
    let lower = message.to_lowercase();

    let kind = if lower.contains("(connect)")
        || lower.contains("error trying to connect")
        || lower.contains("connection refused")
        || lower.contains("dns")
        || lower.contains("failed to lookup")
    {
        TransportErrorKind::Connect
    } else if lower.contains("timeout") || lower.contains("timed out") || lower.contains("elapsed")
    {
        TransportErrorKind::Timeout
    } else {
        TransportErrorKind::Io
    };

    TransportError::new(kind, message)
}
