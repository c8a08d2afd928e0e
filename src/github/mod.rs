//! GitHub API access for the issue proxy.
//!
//! Key features:
//! - Exponential backoff retry for transient failures
//! - Rate-limit waits that honor GitHub's `Retry-After` hint
//! - Non-idempotent requests are never repeated once they may have applied
//! - Every failure normalized to an [`UpstreamError`]

mod client;
mod error;
mod retry;
mod transport;
mod upstream;

pub use client::{API_VERSION, DEFAULT_API_URL, OctocrabTransport};
pub use error::UpstreamError;
pub use retry::{GiveUpReason, RetryConfig, RetryDecision, RetryState, RetryableFailure};
pub use transport::{RawResponse, Transport, TransportError, TransportErrorKind, UpstreamRequest};
pub use upstream::{
    DEFAULT_RATE_LIMIT_WAIT, UpstreamCallOutcome, UpstreamClient, UpstreamResponse,
    retry_after_hint,
};
