//! HTTP server for the issue relay.
//!
//! This module implements the HTTP server that:
//! - Accepts webhooks from GitHub, validates signatures, and records them
//! - Proxies issue operations to the configured GitHub repository
//! - Exposes the recent event log and a health check
//!
//! # Endpoints
//!
//! - `POST /webhook` - Accepts GitHub webhook deliveries up to 25 MB (returns 204)
//! - `GET /events?limit=N` - Most recent recorded deliveries, newest first
//! - `POST /issues`, `GET /issues` - Create and list issues
//! - `GET /issues/{number}`, `PATCH /issues/{number}` - Read and update an issue
//! - `POST /issues/{number}/comments` - Comment on an issue
//! - `GET /health` - Returns `{"status":"ok"}`
//! - `GET /` - Service banner

use std::sync::Arc;

use tokio::sync::mpsc;
use tower_http::trace::TraceLayer;

use crate::github::{Transport, UpstreamClient};
use crate::issues::EtagCache;
use crate::store::EventStore;
use crate::types::{RepoId, WebhookDelivery};

pub mod error;
pub mod events;
pub mod health;
pub mod issues;
pub mod webhook;

pub use error::ApiError;
pub use events::events_handler;
pub use health::{health_handler, root_handler};
pub use webhook::{WebhookError, webhook_handler};

/// Shared application state.
///
/// This is passed to all handlers via Axum's `State` extractor.
pub struct AppState<T> {
    inner: Arc<AppStateInner<T>>,
}

struct AppStateInner<T> {
    /// The bounded log of recorded deliveries.
    store: Arc<EventStore>,

    /// Webhook secret for HMAC-SHA256 signature verification.
    webhook_secret: Vec<u8>,

    /// Client for the proxied repository.
    upstream: UpstreamClient<T>,

    /// The repository issue operations target.
    repo: RepoId,

    /// Last-seen ETags of proxied GETs.
    etags: EtagCache,

    /// Receives every newly recorded delivery.
    automation: Option<mpsc::Sender<WebhookDelivery>>,
}

impl<T> Clone for AppState<T> {
    fn clone(&self) -> Self {
        AppState {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Transport> AppState<T> {
    /// Creates a new `AppState`.
    ///
    /// # Arguments
    ///
    /// * `store` - The event store shared with the rest of the process
    /// * `webhook_secret` - Secret for verifying webhook signatures
    /// * `upstream` - GitHub client used by the issue proxy
    /// * `repo` - The repository the issue proxy targets
    pub fn new(
        store: Arc<EventStore>,
        webhook_secret: impl Into<Vec<u8>>,
        upstream: UpstreamClient<T>,
        repo: RepoId,
    ) -> Self {
        Self::with_automation(store, webhook_secret, upstream, repo, None)
    }

    /// Like [`AppState::new`], additionally handing every newly recorded
    /// delivery to `automation`.
    pub fn with_automation(
        store: Arc<EventStore>,
        webhook_secret: impl Into<Vec<u8>>,
        upstream: UpstreamClient<T>,
        repo: RepoId,
        automation: Option<mpsc::Sender<WebhookDelivery>>,
    ) -> Self {
        AppState {
            inner: Arc::new(AppStateInner {
                store,
                webhook_secret: webhook_secret.into(),
                upstream,
                repo,
                etags: EtagCache::new(),
                automation,
            }),
        }
    }

    pub fn store(&self) -> &EventStore {
        &self.inner.store
    }

    /// Returns the webhook secret.
    pub fn webhook_secret(&self) -> &[u8] {
        &self.inner.webhook_secret
    }

    pub fn upstream(&self) -> &UpstreamClient<T> {
        &self.inner.upstream
    }

    pub fn repo(&self) -> &RepoId {
        &self.inner.repo
    }

    pub fn etags(&self) -> &EtagCache {
        &self.inner.etags
    }

    pub fn automation(&self) -> Option<&mpsc::Sender<WebhookDelivery>> {
        self.inner.automation.as_ref()
    }
}

/// Builds the axum Router with all endpoints.
pub fn build_router<T: Transport + 'static>(app_state: AppState<T>) -> axum::Router {
    use axum::extract::DefaultBodyLimit;
    use axum::routing::{get, post};

    axum::Router::new()
        .route(
            "/webhook",
            post(webhook_handler::<T>)
                .layer(DefaultBodyLimit::max(webhook::MAX_WEBHOOK_BODY)),
        )
        .route("/events", get(events_handler::<T>))
        .route(
            "/issues",
            post(issues::create_issue::<T>).get(issues::list_issues::<T>),
        )
        .route(
            "/issues/{number}",
            get(issues::get_issue::<T>).patch(issues::update_issue::<T>),
        )
        .route("/issues/{number}/comments", post(issues::create_comment::<T>))
        .route("/health", get(health_handler))
        .route("/", get(root_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::test_utils::ScriptedTransport;

    #[test]
    fn app_state_accessors_work() {
        let state = test_app_state(Arc::new(ScriptedTransport::default()));

        assert_eq!(state.webhook_secret(), SECRET);
        assert_eq!(state.repo(), &RepoId::new("octo", "hello"));
        assert!(state.store().is_empty());
        assert!(state.automation().is_none());
    }

    #[test]
    fn app_state_clones_share_the_store() {
        let state = test_app_state(Arc::new(ScriptedTransport::default()));
        let cloned = state.clone();

        state.store().append(WebhookDelivery::verified(
            crate::types::DeliveryId::new("d-1"),
            "issues",
            "opened",
            None,
        ));
        assert_eq!(cloned.store().len(), 1);
    }
}
