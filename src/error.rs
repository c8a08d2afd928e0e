//! The service-wide error taxonomy.
//!
//! Every user-visible failure, from the webhook path or the issue proxy, is
//! reported as one of these kinds in a JSON body of the form
//! `{"error": "<kind>", "message": "<cause>"}`.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The kind of a user-visible failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The request body was rejected, locally or by GitHub (400/422).
    InvalidPayload,
    /// GitHub rejected our credential (401/403).
    Unauthorized,
    /// The upstream resource does not exist.
    NotFound,
    /// GitHub's rate limit was hit and retries were exhausted.
    RateLimited,
    /// GitHub could not be reached or kept failing.
    UpstreamUnavailable,
    /// A non-idempotent call failed after it may have been applied upstream.
    AmbiguousFailure,
    /// A webhook for an event type we don't record.
    UnknownEvent,
    /// A webhook with a missing or wrong signature.
    BadSignature,
    /// A webhook with missing headers, invalid JSON, or missing fields.
    MalformedDelivery,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidPayload => "invalid_payload",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::NotFound => "not_found",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::UpstreamUnavailable => "upstream_unavailable",
            ErrorKind::AmbiguousFailure => "ambiguous_failure",
            ErrorKind::UnknownEvent => "unknown_event",
            ErrorKind::BadSignature => "bad_signature",
            ErrorKind::MalformedDelivery => "malformed_delivery",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// JSON body of an error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorKind,
    pub message: String,
}

impl ErrorBody {
    pub fn new(error: ErrorKind, message: impl Into<String>) -> Self {
        ErrorBody {
            error,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serde_name_matches_as_str() {
        let kinds = [
            ErrorKind::InvalidPayload,
            ErrorKind::Unauthorized,
            ErrorKind::NotFound,
            ErrorKind::RateLimited,
            ErrorKind::UpstreamUnavailable,
            ErrorKind::AmbiguousFailure,
            ErrorKind::UnknownEvent,
            ErrorKind::BadSignature,
            ErrorKind::MalformedDelivery,
        ];
        for kind in kinds {
            let json = serde_json::to_value(kind).unwrap();
            assert_eq!(json, kind.as_str());
        }
    }

    #[test]
    fn error_body_shape() {
        let body = ErrorBody::new(ErrorKind::BadSignature, "invalid signature");
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"error": "bad_signature", "message": "invalid signature"})
        );
    }
}
