//! Issue proxy handlers.
//!
//! Each handler validates its input, makes one logical call through the
//! [`UpstreamClient`](crate::github::UpstreamClient) and normalizes the
//! response. GETs honor `If-None-Match` against the last ETag seen for the
//! same upstream path.

use axum::Json;
use axum::body::Bytes;
use axum::extract::rejection::{PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info};

use super::{ApiError, AppState};
use crate::github::{Transport, UpstreamRequest};
use crate::issues::{
    CommentResponse, CreateCommentRequest, CreateIssueRequest, IssueResponse, ListIssuesQuery,
    UpdateIssueRequest, comments_path, issue_path, issues_path,
};
use crate::types::IssueNumber;

/// `POST /issues`
pub async fn create_issue<T: Transport>(
    State(app_state): State<AppState<T>>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let request: CreateIssueRequest = parse_json(&body)?;
    request.validate()?;

    let path = issues_path(app_state.repo());
    let response = app_state
        .upstream()
        .call(UpstreamRequest::post(&path, to_value(&request)?))
        .await?;
    let issue = IssueResponse::from_upstream(response.body).map_err(unexpected)?;

    app_state.etags().invalidate_prefix(&format!("{path}?"));
    info!(number = issue.number, "Created issue");

    let location = format!("/issues/{}", issue.number);
    Ok((StatusCode::CREATED, [(header::LOCATION, location)], Json(issue)).into_response())
}

/// `GET /issues`
pub async fn list_issues<T: Transport>(
    State(app_state): State<AppState<T>>,
    headers: HeaderMap,
    query: Result<Query<ListIssuesQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(query) = query.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let path = query.upstream_path(app_state.repo())?;

    conditional_get(&app_state, path, &headers, IssueResponse::list_from_upstream).await
}

/// `GET /issues/{number}`
pub async fn get_issue<T: Transport>(
    State(app_state): State<AppState<T>>,
    headers: HeaderMap,
    number: Result<Path<u64>, PathRejection>,
) -> Result<Response, ApiError> {
    let number = issue_number(number)?;
    let path = issue_path(app_state.repo(), number);

    conditional_get(&app_state, path, &headers, IssueResponse::from_upstream).await
}

/// `PATCH /issues/{number}`
pub async fn update_issue<T: Transport>(
    State(app_state): State<AppState<T>>,
    number: Result<Path<u64>, PathRejection>,
    body: Bytes,
) -> Result<Json<IssueResponse>, ApiError> {
    let number = issue_number(number)?;
    let request: UpdateIssueRequest = parse_json(&body)?;
    request.validate()?;

    let path = issue_path(app_state.repo(), number);
    let response = app_state
        .upstream()
        .call(UpstreamRequest::patch(&path, to_value(&request)?))
        .await?;
    let issue = IssueResponse::from_upstream(response.body).map_err(unexpected)?;

    app_state.etags().invalidate(&path);
    app_state
        .etags()
        .invalidate_prefix(&format!("{}?", issues_path(app_state.repo())));
    info!(number = issue.number, "Updated issue");

    Ok(Json(issue))
}

/// `POST /issues/{number}/comments`
pub async fn create_comment<T: Transport>(
    State(app_state): State<AppState<T>>,
    number: Result<Path<u64>, PathRejection>,
    body: Bytes,
) -> Result<(StatusCode, Json<CommentResponse>), ApiError> {
    let number = issue_number(number)?;
    let request: CreateCommentRequest = parse_json(&body)?;
    request.validate()?;

    let response = app_state
        .upstream()
        .call(UpstreamRequest::post(
            comments_path(app_state.repo(), number),
            to_value(&request)?,
        ))
        .await?;
    let comment = CommentResponse::from_upstream(response.body).map_err(unexpected)?;

    app_state.etags().invalidate(&issue_path(app_state.repo(), number));
    info!(issue = %number, comment_id = comment.id, "Created comment");

    Ok((StatusCode::CREATED, Json(comment)))
}

/// Serves a GET from the ETag cache when the caller already has the
/// current version, otherwise fetches and normalizes it.
async fn conditional_get<T, R, F>(
    app_state: &AppState<T>,
    path: String,
    headers: &HeaderMap,
    normalize: F,
) -> Result<Response, ApiError>
where
    T: Transport,
    R: Serialize,
    F: FnOnce(Value) -> Result<R, serde_json::Error> + Send,
{
    let if_none_match = headers
        .get(header::IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok());

    if let Some(candidates) = if_none_match {
        if app_state.etags().matches(&path, candidates) {
            debug!(path = %path, "Not modified");
            let mut response = StatusCode::NOT_MODIFIED.into_response();
            if let Some(tag) = app_state.etags().get(&path) {
                set_etag(&mut response, &tag);
            }
            return Ok(response);
        }
    }

    let upstream = app_state.upstream().call(UpstreamRequest::get(&path)).await?;
    let body = normalize(upstream.body).map_err(unexpected)?;

    let mut response = Json(body).into_response();
    if let Some(tag) = upstream.etag {
        app_state.etags().store(&path, &tag);
        set_etag(&mut response, &tag);
    }
    Ok(response)
}

fn set_etag(response: &mut Response, tag: &str) {
    if let Ok(value) = HeaderValue::from_str(tag) {
        response.headers_mut().insert(header::ETAG, value);
    }
}

fn issue_number(number: Result<Path<u64>, PathRejection>) -> Result<IssueNumber, ApiError> {
    let Path(number) = number.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    Ok(IssueNumber(number))
}

fn parse_json<R: DeserializeOwned>(body: &[u8]) -> Result<R, ApiError> {
    if body.is_empty() {
        return Err(ApiError::BadRequest("request body is empty".to_string()));
    }
    serde_json::from_slice(body)
        .map_err(|e| ApiError::BadRequest(format!("invalid JSON body: {e}")))
}

fn to_value<R: Serialize>(request: &R) -> Result<Value, ApiError> {
    serde_json::to_value(request).map_err(|e| ApiError::BadRequest(e.to_string()))
}

fn unexpected(e: serde_json::Error) -> ApiError {
    ApiError::UnexpectedUpstream(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::{TransportError, TransportErrorKind};
    use crate::server::build_router;
    use crate::server::testing::*;
    use crate::test_utils::{ScriptedTransport, json_response, with_header};
    use axum::body::Body;
    use axum::http::{Method, Request};
    use serde_json::json;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn github_issue(number: u64, state: &str) -> Value {
        json!({
            "number": number,
            "html_url": format!("https://github.com/octo/hello/issues/{number}"),
            "state": state,
            "title": "Crash on start",
            "body": "It crashes.",
            "labels": [{"name": "bug"}],
            "created_at": "2024-01-02T03:04:05Z",
            "updated_at": "2024-01-03T03:04:05Z"
        })
    }

    fn setup(
        script: Vec<Result<crate::github::RawResponse, TransportError>>,
    ) -> (axum::Router, Arc<ScriptedTransport>) {
        let transport = Arc::new(ScriptedTransport::new(script));
        let app = build_router(test_app_state(Arc::clone(&transport)));
        (app, transport)
    }

    #[tokio::test]
    async fn create_issue_returns_201_with_location() {
        let (app, transport) = setup(vec![json_response(201, github_issue(12, "open"))]);

        let response = app
            .oneshot(json_request(
                "POST",
                "/issues",
                &json!({"title": "Crash on start", "labels": ["bug"]}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers()[header::LOCATION], "/issues/12");
        let issue = body_json(response).await;
        assert_eq!(issue["number"], 12);
        assert_eq!(issue["labels"], json!(["bug"]));

        let sent = transport.requests();
        assert_eq!(sent[0].method, Method::POST);
        assert_eq!(sent[0].path, "/repos/octo/hello/issues");
        assert_eq!(
            sent[0].body,
            Some(json!({"title": "Crash on start", "labels": ["bug"]}))
        );
        assert!(!sent[0].idempotent);
    }

    #[tokio::test]
    async fn create_issue_without_title_never_reaches_github() {
        let (app, transport) = setup(vec![]);

        for body in [json!({"title": ""}), json!({"body": "no title"})] {
            let response = app
                .clone()
                .oneshot(json_request("POST", "/issues", &body))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            assert_eq!(body_json(response).await["error"], "invalid_payload");
        }
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn upstream_validation_failure_is_422() {
        let (app, _) = setup(vec![json_response(
            422,
            json!({"message": "Validation Failed"}),
        )]);

        let response = app
            .oneshot(json_request("POST", "/issues", &json!({"title": "t", "labels": ["nope"]})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body_json(response).await["error"], "invalid_payload");
    }

    #[tokio::test]
    async fn post_timeout_is_ambiguous_409() {
        let (app, transport) = setup(vec![Err(TransportError::new(
            TransportErrorKind::Timeout,
            "operation timed out",
        ))]);

        let response = app
            .oneshot(json_request("POST", "/issues", &json!({"title": "t"})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(body_json(response).await["error"], "ambiguous_failure");
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test]
    async fn list_issues_applies_defaults_and_clamps() {
        let (app, transport) = setup(vec![
            json_response(200, json!([github_issue(1, "open"), github_issue(2, "closed")])),
            json_response(200, json!([])),
        ]);

        let response = app.clone().oneshot(get("/issues")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await.as_array().unwrap().len(), 2);

        let response = app
            .oneshot(get("/issues?state=closed&per_page=1000&page=3"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let sent = transport.requests();
        assert_eq!(sent[0].path, "/repos/octo/hello/issues?per_page=30&page=1");
        assert_eq!(
            sent[1].path,
            "/repos/octo/hello/issues?state=closed&per_page=100&page=3"
        );
    }

    #[tokio::test]
    async fn list_issues_rejects_bad_query() {
        let (app, transport) = setup(vec![]);

        let response = app.clone().oneshot(get("/issues?state=merged")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app.oneshot(get("/issues?per_page=many")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn get_missing_issue_is_404() {
        let (app, _) = setup(vec![json_response(404, json!({"message": "Not Found"}))]);

        let response = app.oneshot(get("/issues/999")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            body_json(response).await,
            json!({"error": "not_found", "message": "GitHub API error (HTTP 404): Not Found"})
        );
    }

    #[tokio::test]
    async fn non_numeric_issue_number_is_400() {
        let (app, transport) = setup(vec![]);

        let response = app.oneshot(get("/issues/abc")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn matching_if_none_match_is_served_from_cache() {
        let (app, transport) = setup(vec![with_header(
            json_response(200, github_issue(5, "open")),
            "etag",
            "\"v1\"",
        )]);

        let response = app.clone().oneshot(get("/issues/5")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::ETAG], "\"v1\"");

        let request = Request::builder()
            .uri("/issues/5")
            .header(header::IF_NONE_MATCH, "\"v1\"")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
        assert_eq!(response.headers()[header::ETAG], "\"v1\"");
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cached_tag_expires_so_external_edits_show_up() {
        let (app, transport) = setup(vec![
            with_header(json_response(200, github_issue(5, "open")), "etag", "\"v1\""),
            with_header(json_response(200, github_issue(5, "closed")), "etag", "\"v2\""),
        ]);
        let conditional = || {
            Request::builder()
                .uri("/issues/5")
                .header(header::IF_NONE_MATCH, "\"v1\"")
                .body(Body::empty())
                .unwrap()
        };

        app.clone().oneshot(get("/issues/5")).await.unwrap();
        let response = app.clone().oneshot(conditional()).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_MODIFIED);

        tokio::time::advance(crate::issues::etag::DEFAULT_TTL).await;

        let response = app.oneshot(conditional()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::ETAG], "\"v2\"");
        assert_eq!(body_json(response).await["state"], "closed");
        assert_eq!(transport.call_count(), 2);
    }

    #[tokio::test]
    async fn stale_if_none_match_goes_upstream() {
        let (app, transport) = setup(vec![
            with_header(json_response(200, github_issue(5, "open")), "etag", "\"v1\""),
            with_header(json_response(200, github_issue(5, "open")), "etag", "\"v2\""),
        ]);

        app.clone().oneshot(get("/issues/5")).await.unwrap();
        let request = Request::builder()
            .uri("/issues/5")
            .header(header::IF_NONE_MATCH, "\"v0\"")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::ETAG], "\"v2\"");
        assert_eq!(transport.call_count(), 2);
    }

    #[tokio::test]
    async fn update_issue_patches_and_invalidates_cache() {
        let (app, transport) = setup(vec![
            with_header(json_response(200, github_issue(5, "open")), "etag", "\"v1\""),
            json_response(200, github_issue(5, "closed")),
            json_response(200, github_issue(5, "closed")),
        ]);

        app.clone().oneshot(get("/issues/5")).await.unwrap();

        let response = app
            .clone()
            .oneshot(json_request("PATCH", "/issues/5", &json!({"state": "closed"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["state"], "closed");

        let request = Request::builder()
            .uri("/issues/5")
            .header(header::IF_NONE_MATCH, "\"v1\"")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let sent = transport.requests();
        assert_eq!(sent[1].method, Method::PATCH);
        assert_eq!(sent[1].path, "/repos/octo/hello/issues/5");
        assert_eq!(sent[1].body, Some(json!({"state": "closed"})));
        assert!(sent[1].idempotent);
        assert_eq!(transport.call_count(), 3);
    }

    #[tokio::test]
    async fn update_issue_validation() {
        let (app, transport) = setup(vec![]);

        for body in [
            json!({}),
            json!({"state": "merged"}),
            json!({"title": ""}),
        ] {
            let response = app
                .clone()
                .oneshot(json_request("PATCH", "/issues/5", &body))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{body}");
        }

        let request = Request::builder()
            .method("PATCH")
            .uri("/issues/5")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn create_comment_returns_201() {
        let (app, transport) = setup(vec![json_response(
            201,
            json!({
                "id": 77,
                "body": "Thanks!",
                "user": {"login": "octocat", "id": 1},
                "created_at": "2024-01-02T03:04:05Z",
                "html_url": "https://github.com/octo/hello/issues/5#issuecomment-77"
            }),
        )]);

        let response = app
            .oneshot(json_request("POST", "/issues/5/comments", &json!({"body": "Thanks!"})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        let comment = body_json(response).await;
        assert_eq!(comment["id"], 77);
        assert_eq!(comment["user"]["login"], "octocat");
        assert_eq!(transport.requests()[0].path, "/repos/octo/hello/issues/5/comments");
    }

    #[tokio::test]
    async fn empty_comment_is_rejected() {
        let (app, transport) = setup(vec![]);

        let response = app
            .oneshot(json_request("POST", "/issues/5/comments", &json!({"body": " "})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn rate_limit_surfaces_429_with_retry_after() {
        let (app, _) = setup(vec![with_header(
            json_response(429, json!({"message": "API rate limit exceeded"})),
            "retry-after",
            "3600",
        )]);

        let response = app.oneshot(get("/issues/5")).await.unwrap();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "3600");
        assert_eq!(body_json(response).await["error"], "rate_limited");
    }

    #[tokio::test]
    async fn unexpected_success_body_is_503() {
        let (app, _) = setup(vec![json_response(200, json!({"unexpected": true}))]);

        let response = app.oneshot(get("/issues/5")).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body_json(response).await["error"], "upstream_unavailable");
    }
}
