//! Webhook handling for GitHub events.
//!
//! This module provides:
//! - Signature verification for webhook payloads (HMAC-SHA256)
//! - Classification of verified payloads into recorded events, pings and rejections

pub mod classify;
pub mod signature;

pub use classify::{Classification, RECORDED_EVENT_TYPES, RejectReason, classify};
pub use signature::{
    compute_signature, format_signature_header, parse_signature_header, sign, verify_signature,
};
