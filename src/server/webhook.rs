//! Webhook endpoint handler.
//!
//! Accepts GitHub webhook deliveries, validates signatures, classifies them
//! and records the ones we keep before returning 204 No Content. Newly
//! recorded deliveries are then handed to the automation sink without
//! waiting for it.

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, warn};

use super::AppState;
use crate::error::{ErrorBody, ErrorKind};
use crate::github::Transport;
use crate::types::{DeliveryId, WebhookDelivery};
use crate::webhooks::{Classification, RejectReason, classify, verify_signature};

/// Header name for GitHub event type.
const HEADER_EVENT: &str = "x-github-event";
/// Header name for GitHub delivery ID.
const HEADER_DELIVERY: &str = "x-github-delivery";
/// Header name for GitHub signature.
const HEADER_SIGNATURE: &str = "x-hub-signature-256";

/// Largest webhook body accepted. GitHub caps payloads at 25 MB.
pub const MAX_WEBHOOK_BODY: usize = 25 * 1024 * 1024;

/// Errors that can occur when processing a webhook.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// No signature header.
    #[error("missing signature")]
    MissingSignature,

    /// Invalid signature.
    #[error("invalid signature")]
    InvalidSignature,

    /// Missing required header.
    #[error("missing required header: {0}")]
    MissingHeader(&'static str),

    /// Invalid JSON body.
    #[error("invalid JSON body: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// An event type we don't record.
    #[error("unsupported event type: {0}")]
    UnknownEvent(String),

    /// A recorded event type without the fields we need.
    #[error("malformed {0} payload")]
    MalformedPayload(String),
}

impl WebhookError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            WebhookError::MissingSignature | WebhookError::InvalidSignature => {
                ErrorKind::BadSignature
            }
            WebhookError::UnknownEvent(_) => ErrorKind::UnknownEvent,
            WebhookError::MissingHeader(_)
            | WebhookError::InvalidJson(_)
            | WebhookError::MalformedPayload(_) => ErrorKind::MalformedDelivery,
        }
    }
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let status = match self.kind() {
            ErrorKind::BadSignature => StatusCode::UNAUTHORIZED,
            _ => StatusCode::BAD_REQUEST,
        };

        (status, Json(ErrorBody::new(self.kind(), self.to_string()))).into_response()
    }
}

/// Webhook handler.
///
/// # Request
///
/// - Method: POST
/// - Headers:
///   - `X-Hub-Signature-256`: HMAC-SHA256 signature of the payload (required)
///   - `X-GitHub-Event`: Event type, e.g. "issues" (required)
///   - `X-GitHub-Delivery`: Unique delivery ID (a fresh UUID is used if absent)
/// - Body: JSON webhook payload
///
/// # Response
///
/// - 204 No Content: recorded, duplicate, or ping
/// - 400 Bad Request: missing event header, invalid JSON, unknown event type,
///   or missing fields
/// - 401 Unauthorized: missing or invalid signature
pub async fn webhook_handler<T: Transport>(
    State(app_state): State<AppState<T>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, WebhookError> {
    // Verify the signature before looking at anything else in the request.
    let signature_header =
        header_str(&headers, HEADER_SIGNATURE).ok_or(WebhookError::MissingSignature)?;
    if !verify_signature(&body, signature_header, app_state.webhook_secret()) {
        warn!("Invalid webhook signature");
        return Err(WebhookError::InvalidSignature);
    }

    let event_type =
        header_str(&headers, HEADER_EVENT).ok_or(WebhookError::MissingHeader(HEADER_EVENT))?;
    let delivery_id = header_str(&headers, HEADER_DELIVERY)
        .filter(|id| !id.is_empty())
        .map(DeliveryId::from)
        .unwrap_or_else(DeliveryId::generate);

    debug!(
        delivery_id = %delivery_id,
        event_type = %event_type,
        "Received webhook"
    );

    let payload: serde_json::Value = serde_json::from_slice(&body)?;

    let (event_type, action, issue_number) = match classify(event_type, &payload) {
        Classification::Ping => {
            info!(delivery_id = %delivery_id, "Received ping");
            return Ok(StatusCode::NO_CONTENT);
        }
        Classification::Rejected(RejectReason::UnknownEventType) => {
            warn!(delivery_id = %delivery_id, event_type = %event_type, "Unsupported event type");
            return Err(WebhookError::UnknownEvent(event_type.to_string()));
        }
        Classification::Rejected(RejectReason::MalformedPayload) => {
            warn!(delivery_id = %delivery_id, event_type = %event_type, "Malformed payload");
            return Err(WebhookError::MalformedPayload(event_type.to_string()));
        }
        Classification::Accepted {
            event_type,
            action,
            issue_number,
        } => (event_type, action, issue_number),
    };

    let delivery = WebhookDelivery::verified(delivery_id, event_type, action, issue_number);
    let outcome = app_state.store().append(delivery.clone());

    if !outcome.inserted {
        debug!(
            delivery_id = %delivery.delivery_id,
            "Duplicate webhook delivery (idempotent)"
        );
        return Ok(StatusCode::NO_CONTENT);
    }

    info!(
        delivery_id = %delivery.delivery_id,
        event_type = %delivery.event_type,
        action = %delivery.action,
        issue_number = ?delivery.issue_number.map(|n| n.0),
        "Recorded webhook"
    );

    if let Some(sink) = app_state.automation() {
        hand_off(sink, delivery);
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Queues a delivery for automation without blocking the acknowledgment.
fn hand_off(sink: &tokio::sync::mpsc::Sender<WebhookDelivery>, delivery: WebhookDelivery) {
    match sink.try_send(delivery) {
        Ok(()) => {}
        Err(TrySendError::Full(delivery)) => {
            warn!(
                delivery_id = %delivery.delivery_id,
                "Automation queue full, dropping hand-off"
            );
        }
        Err(TrySendError::Closed(delivery)) => {
            warn!(
                delivery_id = %delivery.delivery_id,
                "Automation consumer stopped, dropping hand-off"
            );
        }
    }
}

/// Extracts a header value as a string.
fn header_str<'a>(headers: &'a HeaderMap, name: &'static str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}
