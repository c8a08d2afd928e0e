//! Request and response shapes of the issue proxy.
//!
//! Requests are validated before anything is sent upstream. Responses are
//! normalized from GitHub's issue and comment objects down to the fields the
//! proxy exposes, with labels flattened to their names.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// A request that failed local validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("title must not be empty")]
    EmptyTitle,

    #[error("comment body must not be empty")]
    EmptyComment,

    #[error("state must be 'open' or 'closed', got '{0}'")]
    InvalidState(String),

    #[error("at least one of title, body or state must be provided")]
    EmptyUpdate,

    #[error("invalid value '{value}' for {field}")]
    InvalidQuery { field: &'static str, value: String },
}

/// Body of `POST /issues`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateIssueRequest {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<String>>,
}

impl CreateIssueRequest {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::EmptyTitle);
        }
        Ok(())
    }
}

/// Body of `PATCH /issues/{number}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateIssueRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

impl UpdateIssueRequest {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.title.is_none() && self.body.is_none() && self.state.is_none() {
            return Err(ValidationError::EmptyUpdate);
        }
        if self.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
            return Err(ValidationError::EmptyTitle);
        }
        if let Some(state) = &self.state {
            if state != "open" && state != "closed" {
                return Err(ValidationError::InvalidState(state.clone()));
            }
        }
        Ok(())
    }
}

/// Body of `POST /issues/{number}/comments`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateCommentRequest {
    pub body: String,
}

impl CreateCommentRequest {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.body.trim().is_empty() {
            return Err(ValidationError::EmptyComment);
        }
        Ok(())
    }
}

/// An issue as returned by the proxy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueResponse {
    pub number: u64,
    pub html_url: String,
    pub state: String,
    pub title: String,
    pub body: Option<String>,
    pub labels: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// GitHub returns labels as objects, but accepts and sometimes echoes plain names.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum UpstreamLabel {
    Name(String),
    Object { name: String },
}

impl UpstreamLabel {
    fn into_name(self) -> String {
        match self {
            UpstreamLabel::Name(name) | UpstreamLabel::Object { name } => name,
        }
    }
}

#[derive(Debug, Deserialize)]
struct UpstreamIssue {
    number: u64,
    html_url: String,
    state: String,
    title: String,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    labels: Vec<UpstreamLabel>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl IssueResponse {
    /// Normalizes one GitHub issue object.
    pub fn from_upstream(value: Value) -> Result<Self, serde_json::Error> {
        let issue: UpstreamIssue = serde_json::from_value(value)?;
        Ok(IssueResponse {
            number: issue.number,
            html_url: issue.html_url,
            state: issue.state,
            title: issue.title,
            body: issue.body,
            labels: issue.labels.into_iter().map(UpstreamLabel::into_name).collect(),
            created_at: issue.created_at,
            updated_at: issue.updated_at,
        })
    }

    /// Normalizes a GitHub issue list.
    pub fn list_from_upstream(value: Value) -> Result<Vec<Self>, serde_json::Error> {
        let items: Vec<Value> = serde_json::from_value(value)?;
        items.into_iter().map(Self::from_upstream).collect()
    }
}

/// The author of a comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentUser {
    pub login: String,
    pub id: u64,
    #[serde(default)]
    pub html_url: Option<String>,
}

/// A comment as returned by the proxy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentResponse {
    pub id: u64,
    pub body: String,
    /// `None` for comments by deleted accounts.
    pub user: Option<CommentUser>,
    pub created_at: DateTime<Utc>,
    pub html_url: String,
}

impl CommentResponse {
    /// Normalizes a GitHub comment object, dropping fields we don't expose.
    pub fn from_upstream(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }
}
