//! Issue Relay - a GitHub issue proxy and webhook receiver for one repository.
//!
//! This library provides the webhook ingestion pipeline (signature
//! verification, classification, and a bounded idempotent event log) and the
//! retrying GitHub client behind the issue proxy endpoints.

pub mod config;
pub mod error;
pub mod github;
pub mod issues;
pub mod server;
pub mod store;
pub mod types;
pub mod webhooks;

#[cfg(test)]
pub(crate) mod test_utils;
