//! The stored record of one processed webhook delivery.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{DeliveryId, IssueNumber};

/// One webhook delivery that passed verification and classification.
///
/// Records are created by the webhook handler and never mutated afterwards.
/// `received_at` is stamped on ingestion rather than taken from the sender.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookDelivery {
    pub delivery_id: DeliveryId,
    pub event_type: String,
    pub action: String,
    pub issue_number: Option<IssueNumber>,
    pub received_at: DateTime<Utc>,
    /// Always `true`: deliveries with bad signatures are never stored.
    pub raw_signature_valid: bool,
}

impl WebhookDelivery {
    /// Builds a record for a verified delivery, stamped with the current time.
    pub fn verified(
        delivery_id: DeliveryId,
        event_type: impl Into<String>,
        action: impl Into<String>,
        issue_number: Option<IssueNumber>,
    ) -> Self {
        WebhookDelivery {
            delivery_id,
            event_type: event_type.into(),
            action: action.into(),
            issue_number,
            received_at: Utc::now(),
            raw_signature_valid: true,
        }
    }
}

/// The public shape of a delivery in `GET /events`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSummary {
    pub id: String,
    pub event: String,
    pub action: String,
    pub issue_number: Option<u64>,
    pub timestamp: DateTime<Utc>,
}

impl From<&WebhookDelivery> for EventSummary {
    fn from(d: &WebhookDelivery) -> Self {
        EventSummary {
            id: d.delivery_id.to_string(),
            event: d.event_type.clone(),
            action: d.action.clone(),
            issue_number: d.issue_number.map(|n| n.0),
            timestamp: d.received_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verified_marks_signature_valid() {
        let d = WebhookDelivery::verified(
            DeliveryId::new("d-1"),
            "issues",
            "opened",
            Some(IssueNumber(5)),
        );
        assert!(d.raw_signature_valid);
        assert_eq!(d.issue_number, Some(IssueNumber(5)));
    }

    #[test]
    fn summary_uses_public_field_names() {
        let d = WebhookDelivery::verified(DeliveryId::new("d-2"), "issue_comment", "created", None);
        let json = serde_json::to_value(EventSummary::from(&d)).unwrap();

        assert_eq!(json["id"], "d-2");
        assert_eq!(json["event"], "issue_comment");
        assert_eq!(json["action"], "created");
        assert!(json["issue_number"].is_null());
        assert!(json["timestamp"].is_string());
    }
}
