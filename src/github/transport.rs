//! The seam between the upstream client and the network.
//!
//! [`UpstreamClient`](super::UpstreamClient) owns all retry and error
//! normalization logic, and talks to GitHub only through [`Transport`]. The
//! production implementation is [`OctocrabTransport`](super::OctocrabTransport);
//! tests substitute a scripted fake so retry behavior can be exercised
//! without a network.

use std::future::Future;
use std::sync::Arc;

use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode};
use serde_json::Value;
use thiserror::Error;

/// One request to the GitHub REST API.
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamRequest {
    pub method: Method,
    /// Path and query relative to the API base, e.g. `/repos/o/r/issues?page=2`.
    pub path: String,
    pub body: Option<Value>,
    /// Whether repeating the request cannot apply it twice.
    pub idempotent: bool,
}

impl UpstreamRequest {
    /// Builds a request whose idempotency follows the HTTP method.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        let idempotent = method.is_idempotent();
        UpstreamRequest {
            method,
            path: path.into(),
            body: None,
            idempotent,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::POST, path).with_body(body)
    }

    /// PATCH is not idempotent per HTTP, but an issue update sends the full
    /// set of changed fields, so repeating it converges on the same state.
    pub fn patch(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::PATCH, path).with_body(body).idempotent(true)
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn idempotent(mut self, idempotent: bool) -> Self {
        self.idempotent = idempotent;
        self
    }
}

/// A response from GitHub, whatever its status.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl RawResponse {
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        RawResponse {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }
}

/// How a request failed before a response arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// The connection was never established, so the request was not sent.
    Connect,
    /// No response arrived in time. The request may have been applied.
    Timeout,
    /// The connection broke mid-exchange. The request may have been applied.
    Io,
    /// The request could not be built, so it was never sent. Retrying won't help.
    InvalidRequest,
}

/// A network-level failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind:?} error: {message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        TransportError {
            kind,
            message: message.into(),
        }
    }

    /// Returns true if GitHub certainly never saw the request.
    pub fn request_not_sent(&self) -> bool {
        matches!(
            self.kind,
            TransportErrorKind::Connect | TransportErrorKind::InvalidRequest
        )
    }
}

/// Sends requests to GitHub.
///
/// Implementations perform exactly one attempt per call. A non-2xx response
/// is `Ok`; only failures to get any response are `Err`.
pub trait Transport: Send + Sync {
    fn send(
        &self,
        request: &UpstreamRequest,
    ) -> impl Future<Output = Result<RawResponse, TransportError>> + Send;
}

impl<T: Transport> Transport for Arc<T> {
    fn send(
        &self,
        request: &UpstreamRequest,
    ) -> impl Future<Output = Result<RawResponse, TransportError>> + Send {
        (**self).send(request)
    }
}
