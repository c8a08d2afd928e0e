//! Core domain types shared by the webhook pipeline and the issue proxy.

pub mod delivery;
pub mod ids;

pub use delivery::{EventSummary, WebhookDelivery};
pub use ids::{DeliveryId, IssueNumber, RepoId};
