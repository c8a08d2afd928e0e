//! Retrying GitHub client with error normalization.
//!
//! [`UpstreamClient::call`] sends one logical request, retrying it through a
//! [`RetryState`] when that is safe, and reduces every failure to an
//! [`UpstreamError`]:
//!
//! | outcome                                   | retried            | result                 |
//! |-------------------------------------------|--------------------|------------------------|
//! | 2xx, 304                                  | -                  | `Ok`                   |
//! | 429, or 403 with rate-limit headers       | yes, after hint    | `rate_limited`         |
//! | other 4xx                                 | no                 | per status             |
//! | 5xx                                       | idempotent only    | `upstream_unavailable` |
//! | connect failure                           | yes                | `upstream_unavailable` |
//! | timeout or broken connection              | idempotent only    | `upstream_unavailable` |
//! | request could not be built                | no                 | `upstream_unavailable` |
//! | 5xx/timeout on a non-idempotent request   | no                 | `ambiguous_failure`    |
//!
//! Waits between attempts end early when the client's cancellation token is
//! cancelled, returning the last failure. A caller that stops polling the
//! future (for instance because its HTTP client disconnected) drops the wait
//! along with it.

use std::time::Duration;

use chrono::{DateTime, Utc};
use http::{HeaderMap, StatusCode};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::error::{UpstreamError, upstream_message};
use super::retry::{RetryConfig, RetryDecision, RetryState, RetryableFailure};
use super::transport::{
    RawResponse, Transport, TransportError, TransportErrorKind, UpstreamRequest,
};

/// Wait used when GitHub rate-limits without saying for how long.
pub const DEFAULT_RATE_LIMIT_WAIT: Duration = Duration::from_secs(60);

/// A successful GitHub response.
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub etag: Option<String>,
    /// Parsed JSON body; `Null` when the body was empty.
    pub body: Value,
}

/// Result of one logical upstream call.
pub type UpstreamCallOutcome = Result<UpstreamResponse, UpstreamError>;

/// What a single attempt amounted to.
#[derive(Debug)]
enum Attempt {
    Success(UpstreamResponse),
    Fatal(UpstreamError),
    Retryable(RetryableFailure, UpstreamError),
}

/// GitHub client that retries with backoff and normalizes errors.
#[derive(Debug, Clone)]
pub struct UpstreamClient<T> {
    transport: T,
    retry: RetryConfig,
    cancel: CancellationToken,
}

impl<T: Transport> UpstreamClient<T> {
    pub fn new(transport: T) -> Self {
        UpstreamClient {
            transport,
            retry: RetryConfig::DEFAULT,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Ends any in-progress backoff once `cancel` is cancelled.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Performs a request, retrying where safe, and normalizes the outcome.
    pub async fn call(&self, request: UpstreamRequest) -> UpstreamCallOutcome {
        let mut state = RetryState::new(self.retry);

        loop {
            let result = self.transport.send(&request).await;
            let (failure, error) = match classify_attempt(&request, result, Utc::now()) {
                Attempt::Success(response) => return Ok(response),
                Attempt::Fatal(error) => {
                    debug!(
                        method = %request.method,
                        path = %request.path,
                        kind = %error.kind,
                        "GitHub request failed"
                    );
                    return Err(error);
                }
                Attempt::Retryable(failure, error) => (failure, error),
            };

            match state.on_failure(failure) {
                RetryDecision::GiveUp(reason) => {
                    warn!(
                        method = %request.method,
                        path = %request.path,
                        attempts = state.attempts(),
                        ?reason,
                        error = %error,
                        "Giving up on GitHub request"
                    );
                    return Err(error);
                }
                RetryDecision::RetryAfter(delay) => {
                    debug!(
                        method = %request.method,
                        path = %request.path,
                        attempt = state.attempts(),
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "Retrying GitHub request"
                    );
                    tokio::select! {
                        _ = self.cancel.cancelled() => {
                            debug!(path = %request.path, "Retry wait cancelled");
                            return Err(error);
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }
}

fn classify_attempt(
    request: &UpstreamRequest,
    result: Result<RawResponse, TransportError>,
    now: DateTime<Utc>,
) -> Attempt {
    match result {
        Ok(response) => classify_response(request, response, now),
        Err(e) => classify_transport_error(request, e),
    }
}

fn classify_response(
    request: &UpstreamRequest,
    response: RawResponse,
    now: DateTime<Utc>,
) -> Attempt {
    let status = response.status;

    if status.is_success() || status == StatusCode::NOT_MODIFIED {
        let body = if response.body.is_empty() {
            Value::Null
        } else {
            match serde_json::from_slice(&response.body) {
                Ok(v) => v,
                Err(e) => {
                    return Attempt::Fatal(
                        UpstreamError::unavailable(format!("invalid JSON from GitHub: {e}"))
                            .with_status(status),
                    );
                }
            }
        };
        let etag = response
            .headers
            .get(http::header::ETAG)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        return Attempt::Success(UpstreamResponse { status, etag, body });
    }

    let message = upstream_message(&response.body, status);

    if is_rate_limited(status, &response.headers) {
        let wait = retry_after_hint(&response.headers, now);
        let error = UpstreamError::rate_limited(status, wait.as_secs(), message);
        return Attempt::Retryable(RetryableFailure::RateLimited { retry_after: wait }, error);
    }

    if status.is_client_error() {
        return Attempt::Fatal(UpstreamError::from_client_status(status, message));
    }

    if request.idempotent {
        Attempt::Retryable(
            RetryableFailure::Transient,
            UpstreamError::unavailable(message).with_status(status),
        )
    } else {
        Attempt::Fatal(UpstreamError::ambiguous(message).with_status(status))
    }
}

fn classify_transport_error(request: &UpstreamRequest, error: TransportError) -> Attempt {
    if error.kind == TransportErrorKind::InvalidRequest {
        return Attempt::Fatal(UpstreamError::unavailable(error.to_string()));
    }
    if error.request_not_sent() || request.idempotent {
        Attempt::Retryable(
            RetryableFailure::Transient,
            UpstreamError::unavailable(error.to_string()),
        )
    } else {
        Attempt::Fatal(UpstreamError::ambiguous(error.to_string()))
    }
}

/// 429 always; 403 only when GitHub marks it as a rate limit.
fn is_rate_limited(status: StatusCode, headers: &HeaderMap) -> bool {
    match status {
        StatusCode::TOO_MANY_REQUESTS => true,
        StatusCode::FORBIDDEN => {
            header_str(headers, "x-ratelimit-remaining") == Some("0")
                || headers.contains_key(http::header::RETRY_AFTER)
        }
        _ => false,
    }
}

/// How long GitHub asked us to wait.
///
/// Prefers `Retry-After` (seconds), then `X-RateLimit-Reset` (epoch seconds)
/// relative to `now`, then [`DEFAULT_RATE_LIMIT_WAIT`].
pub fn retry_after_hint(headers: &HeaderMap, now: DateTime<Utc>) -> Duration {
    let parse = |name| header_str(headers, name).map(str::trim);

    if let Some(secs) = parse("retry-after").and_then(|v| v.parse::<u64>().ok()) {
        return Duration::from_secs(secs);
    }

    if let Some(reset) = parse("x-ratelimit-reset").and_then(|v| v.parse::<i64>().ok()) {
        let remaining = reset.saturating_sub(now.timestamp()).max(1);
        return Duration::from_secs(remaining.unsigned_abs());
    }

    DEFAULT_RATE_LIMIT_WAIT
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}
