//! Recent event log endpoint.

use axum::Json;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use serde::Deserialize;

use super::{ApiError, AppState};
use crate::github::Transport;
use crate::types::EventSummary;

/// Number of events returned when no limit is given.
pub const DEFAULT_LIMIT: usize = 50;

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    pub limit: Option<usize>,
}

/// Returns the most recently recorded deliveries, newest first.
///
/// `limit` defaults to 50 and is capped at the store's capacity. A limit
/// that is not a non-negative integer is rejected with 400.
pub async fn events_handler<T: Transport>(
    State(app_state): State<AppState<T>>,
    query: Result<Query<EventsQuery>, QueryRejection>,
) -> Result<Json<Vec<EventSummary>>, ApiError> {
    let Query(query) = query.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let store = app_state.store();
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).min(store.capacity());

    let events = store
        .list_recent(limit)
        .iter()
        .map(EventSummary::from)
        .collect();
    Ok(Json(events))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::build_router;
    use crate::server::testing::*;
    use crate::test_utils::ScriptedTransport;
    use crate::types::{DeliveryId, IssueNumber, WebhookDelivery};
    use axum::http::StatusCode;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn seeded(count: usize) -> AppState<Arc<ScriptedTransport>> {
        let state = test_app_state(Arc::new(ScriptedTransport::default()));
        for i in 0..count {
            state.store().append(WebhookDelivery::verified(
                DeliveryId::new(format!("d{i}")),
                "issues",
                "opened",
                Some(IssueNumber(i as u64)),
            ));
        }
        state
    }

    #[tokio::test]
    async fn default_limit_returns_everything_retained() {
        let app = build_router(seeded(3));

        let response = app.oneshot(get("/events")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let events = body_json(response).await;
        let ids: Vec<_> = events
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["id"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(ids, ["d2", "d1", "d0"]);
    }

    #[tokio::test]
    async fn limit_is_capped_at_capacity() {
        let app = build_router(seeded(15));

        let response = app.oneshot(get("/events?limit=1000")).await.unwrap();
        let events = body_json(response).await;
        assert_eq!(events.as_array().unwrap().len(), 10);
    }

    #[tokio::test]
    async fn zero_limit_is_empty() {
        let app = build_router(seeded(3));

        let response = app.oneshot(get("/events?limit=0")).await.unwrap();
        assert_eq!(body_json(response).await, serde_json::json!([]));
    }

    #[tokio::test]
    async fn non_numeric_limit_is_400() {
        let app = build_router(seeded(1));

        let response = app.oneshot(get("/events?limit=lots")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "invalid_payload");
    }

    #[tokio::test]
    async fn empty_store_lists_nothing() {
        let app = build_router(seeded(0));

        let response = app.oneshot(get("/events")).await.unwrap();
        assert_eq!(body_json(response).await, serde_json::json!([]));
    }
}
