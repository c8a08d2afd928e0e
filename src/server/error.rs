//! Error responses of the issue proxy and the event log endpoints.

use axum::Json;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::warn;

use crate::error::{ErrorBody, ErrorKind};
use crate::github::UpstreamError;
use crate::issues::ValidationError;

/// A failed API request.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request body or query failed local validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The request body or query could not be parsed.
    #[error("{0}")]
    BadRequest(String),

    /// GitHub refused or failed the call.
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    /// GitHub answered 2xx with a body we could not interpret.
    #[error("unexpected response from GitHub: {0}")]
    UnexpectedUpstream(String),
}

impl ApiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Validation(_) | ApiError::BadRequest(_) => ErrorKind::InvalidPayload,
            ApiError::Upstream(e) => e.kind,
            ApiError::UnexpectedUpstream(_) => ErrorKind::UpstreamUnavailable,
        }
    }

    pub fn status(&self) -> StatusCode {
        let upstream_status = match self {
            ApiError::Upstream(e) => e.upstream_status,
            _ => None,
        };

        match self.kind() {
            ErrorKind::InvalidPayload if upstream_status == Some(422) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ErrorKind::InvalidPayload
            | ErrorKind::UnknownEvent
            | ErrorKind::MalformedDelivery => StatusCode::BAD_REQUEST,
            ErrorKind::Unauthorized => match upstream_status {
                Some(403) => StatusCode::FORBIDDEN,
                _ => StatusCode::UNAUTHORIZED,
            },
            ErrorKind::BadSignature => StatusCode::UNAUTHORIZED,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ErrorKind::UpstreamUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::AmbiguousFailure => StatusCode::CONFLICT,
        }
    }

    fn retry_after_seconds(&self) -> Option<u64> {
        match self {
            ApiError::Upstream(e) => e.retry_after_seconds,
            _ => None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let kind = self.kind();

        if status.is_server_error() || kind == ErrorKind::AmbiguousFailure {
            warn!(error = %self, kind = %kind, "Upstream call failed");
        }

        let retry_after = self.retry_after_seconds();
        let mut response = (status, Json(ErrorBody::new(kind, self.to_string()))).into_response();
        if let Some(secs) = retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}
