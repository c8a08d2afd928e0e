//! Normalized upstream errors.
//!
//! Every failed call to GitHub is reduced to an [`UpstreamError`] whose kind
//! tells the HTTP layer what to report and whether the caller may retry:
//!
//! - 400/422 (and other unrecognized 4xx) are `invalid_payload`
//! - 401/403 without rate-limit headers are `unauthorized`
//! - 404/410 are `not_found`
//! - 429, or 403 with rate-limit headers, are `rate_limited`
//! - network failures and 5xx on idempotent calls are `upstream_unavailable`
//! - timeouts and 5xx on non-idempotent calls are `ambiguous_failure`

use std::fmt;

use http::StatusCode;
use thiserror::Error;

use crate::error::ErrorKind;

/// A normalized GitHub API failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct UpstreamError {
    /// What went wrong, from the caller's point of view.
    pub kind: ErrorKind,

    /// The HTTP status GitHub returned, if a response was received.
    pub upstream_status: Option<u16>,

    /// How long GitHub asked us to wait, for rate-limited calls.
    pub retry_after_seconds: Option<u64>,

    /// A human-readable description of the error.
    pub message: String,
}

impl fmt::Display for UpstreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.upstream_status {
            Some(code) => write!(f, "GitHub API error (HTTP {}): {}", code, self.message),
            None => write!(f, "GitHub API error: {}", self.message),
        }
    }
}

impl UpstreamError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            upstream_status: None,
            retry_after_seconds: None,
            message: message.into(),
        }
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.upstream_status = Some(status.as_u16());
        self
    }

    pub fn rate_limited(
        status: StatusCode,
        retry_after_seconds: u64,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind: ErrorKind::RateLimited,
            upstream_status: Some(status.as_u16()),
            retry_after_seconds: Some(retry_after_seconds),
            message: message.into(),
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::UpstreamUnavailable, message)
    }

    pub fn ambiguous(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AmbiguousFailure, message)
    }

    /// Maps a non-rate-limited 4xx status to its error kind.
    pub fn from_client_status(status: StatusCode, message: impl Into<String>) -> Self {
        let kind = match status.as_u16() {
            401 | 403 => ErrorKind::Unauthorized,
            404 | 410 => ErrorKind::NotFound,
            _ => ErrorKind::InvalidPayload,
        };
        Self::new(kind, message).with_status(status)
    }
}

/// Extracts GitHub's `message` field from an error body, if there is one.
pub(crate) fn upstream_message(body: &[u8], status: StatusCode) -> String {
    serde_json::from_slice::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("unexpected response")
                .to_string()
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_status_mapping() {
        let cases = [
            (400, ErrorKind::InvalidPayload),
            (422, ErrorKind::InvalidPayload),
            (401, ErrorKind::Unauthorized),
            (403, ErrorKind::Unauthorized),
            (404, ErrorKind::NotFound),
            (410, ErrorKind::NotFound),
            (409, ErrorKind::InvalidPayload),
        ];
        for (code, kind) in cases {
            let status = StatusCode::from_u16(code).unwrap();
            let err = UpstreamError::from_client_status(status, "x");
            assert_eq!(err.kind, kind, "status {code}");
            assert_eq!(err.upstream_status, Some(code));
        }
    }

    #[test]
    fn display_includes_status() {
        let err = UpstreamError::from_client_status(StatusCode::NOT_FOUND, "Not Found");
        assert_eq!(err.to_string(), "GitHub API error (HTTP 404): Not Found");

        let err = UpstreamError::unavailable("connection refused");
        assert_eq!(err.to_string(), "GitHub API error: connection refused");
    }

    #[test]
    fn upstream_message_prefers_github_message() {
        let body = br#"{"message": "Validation Failed", "errors": []}"#;
        assert_eq!(
            upstream_message(body, StatusCode::UNPROCESSABLE_ENTITY),
            "Validation Failed"
        );
        assert_eq!(
            upstream_message(b"<html>", StatusCode::BAD_GATEWAY),
            "Bad Gateway"
        );
    }
}
