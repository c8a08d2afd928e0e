//! Issue proxy domain: request validation, response normalization, upstream
//! paths and the conditional-GET cache.
//!
//! The HTTP handlers live in [`crate::server::issues`].

pub mod etag;
pub mod models;
pub mod query;

pub use etag::EtagCache;
pub use models::{
    CommentResponse, CommentUser, CreateCommentRequest, CreateIssueRequest, IssueResponse,
    UpdateIssueRequest, ValidationError,
};
pub use query::{ListIssuesQuery, comments_path, issue_path, issues_path};
