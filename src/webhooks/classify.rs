//! Webhook event classification.
//!
//! Maps an `X-GitHub-Event` type plus its parsed payload to one of three
//! outcomes: a delivery worth recording, a ping, or a rejection. This is a
//! pure function over already-parsed JSON; verification and parsing happen in
//! the handler beforehand.
//!
//! # Recorded Events
//!
//! - `issues` - issue lifecycle (`opened`, `closed`, `edited`, ...)
//! - `issue_comment` - comments on issues and pull requests
//!
//! Both must carry a string `action`; `issue.number` is picked up when present.

use std::fmt;

use serde::Deserialize;

use crate::types::IssueNumber;

/// Event types that are recorded in the event log.
pub const RECORDED_EVENT_TYPES: [&str; 2] = ["issues", "issue_comment"];

/// The outcome of classifying a webhook delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// A recordable event.
    Accepted {
        event_type: String,
        action: String,
        issue_number: Option<IssueNumber>,
    },

    /// GitHub's hook-configuration ping. Acknowledged but never stored.
    Ping,

    /// The delivery is not something this service records.
    Rejected(RejectReason),
}

/// Why a delivery was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// The event type is not one we record.
    UnknownEventType,

    /// A known event type was missing required fields.
    MalformedPayload,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::UnknownEventType => write!(f, "unknown event type"),
            RejectReason::MalformedPayload => write!(f, "malformed payload"),
        }
    }
}

/// The fields of `issues` and `issue_comment` payloads we care about.
#[derive(Debug, Deserialize)]
struct RawIssueEvent {
    action: String,
    #[serde(default)]
    issue: Option<RawIssue>,
}

#[derive(Debug, Deserialize)]
struct RawIssue {
    #[serde(default)]
    number: Option<u64>,
}

/// Classifies a webhook delivery.
///
/// # Examples
///
/// ```
/// use issue_relay::types::IssueNumber;
/// use issue_relay::webhooks::{Classification, classify};
///
/// let payload = serde_json::json!({ "action": "opened", "issue": { "number": 5 } });
///
/// assert_eq!(
///     classify("issues", &payload),
///     Classification::Accepted {
///         event_type: "issues".to_string(),
///         action: "opened".to_string(),
///         issue_number: Some(IssueNumber(5)),
///     }
/// );
/// ```
pub fn classify(event_type: &str, payload: &serde_json::Value) -> Classification {
    match event_type {
        "ping" => Classification::Ping,
        "issues" | "issue_comment" => match RawIssueEvent::deserialize(payload) {
            Ok(raw) => Classification::Accepted {
                event_type: event_type.to_string(),
                action: raw.action,
                issue_number: raw.issue.and_then(|i| i.number).map(IssueNumber),
            },
            Err(_) => Classification::Rejected(RejectReason::MalformedPayload),
        },
        _ => Classification::Rejected(RejectReason::UnknownEventType),
    }
}
