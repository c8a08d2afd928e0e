//! Shared test utilities: a scripted GitHub transport and proptest generators.

use std::collections::VecDeque;
use std::sync::Mutex;

use http::{HeaderName, HeaderValue, StatusCode};
use proptest::prelude::*;
use serde_json::Value;

use crate::github::{RawResponse, Transport, TransportError, UpstreamRequest};
use crate::types::{DeliveryId, IssueNumber};

pub fn arb_delivery_id() -> impl Strategy<Value = DeliveryId> {
    "[a-f0-9-]{1,36}".prop_map(DeliveryId::from)
}

pub fn arb_issue_number() -> impl Strategy<Value = IssueNumber> {
    (1u64..1_000_000).prop_map(IssueNumber)
}

/// A JSON response with the given status.
pub fn json_response(status: u16, body: Value) -> Result<RawResponse, TransportError> {
    let status = StatusCode::from_u16(status).unwrap();
    let mut response = RawResponse::new(status, serde_json::to_vec(&body).unwrap());
    response.headers.insert(
        http::header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    Ok(response)
}

/// Adds a header to a scripted response.
pub fn with_header(
    response: Result<RawResponse, TransportError>,
    name: &'static str,
    value: &str,
) -> Result<RawResponse, TransportError> {
    response.map(|mut r| {
        r.headers.insert(
            HeaderName::from_static(name),
            HeaderValue::from_str(value).unwrap(),
        );
        r
    })
}

/// A [`Transport`] that replays a fixed script of outcomes and records
/// every request it receives.
///
/// Panics if called more times than it has scripted outcomes, which makes
/// unexpected retries fail loudly.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Result<RawResponse, TransportError>>>,
    requests: Mutex<Vec<UpstreamRequest>>,
}

impl ScriptedTransport {
    pub fn new(script: impl IntoIterator<Item = Result<RawResponse, TransportError>>) -> Self {
        ScriptedTransport {
            script: Mutex::new(script.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Every request sent so far, in order.
    pub fn requests(&self) -> Vec<UpstreamRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl Transport for ScriptedTransport {
    async fn send(&self, request: &UpstreamRequest) -> Result<RawResponse, TransportError> {
        self.requests.lock().unwrap().push(request.clone());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| panic!("unscripted request: {} {}", request.method, request.path))
    }
}
