//! Query parameters of `GET /issues` and the upstream paths they map to.

use serde::Deserialize;

use crate::types::{IssueNumber, RepoId};

use super::models::ValidationError;

pub const DEFAULT_PER_PAGE: u32 = 30;
pub const MAX_PER_PAGE: u32 = 100;

const STATES: [&str; 3] = ["open", "closed", "all"];
const SORTS: [&str; 3] = ["created", "updated", "comments"];
const DIRECTIONS: [&str; 2] = ["asc", "desc"];

/// Filters and paging for listing issues.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ListIssuesQuery {
    pub state: Option<String>,
    pub sort: Option<String>,
    pub direction: Option<String>,
    pub per_page: Option<u32>,
    pub page: Option<u32>,
}

impl ListIssuesQuery {
    /// Builds the upstream list path.
    ///
    /// `per_page` is clamped to `1..=100` and `page` to at least 1. Enum-like
    /// filters are checked against GitHub's accepted values so nothing
    /// unescaped reaches the query string.
    pub fn upstream_path(&self, repo: &RepoId) -> Result<String, ValidationError> {
        let mut params = Vec::new();

        for (field, value, allowed) in [
            ("state", &self.state, &STATES[..]),
            ("sort", &self.sort, &SORTS[..]),
            ("direction", &self.direction, &DIRECTIONS[..]),
        ] {
            if let Some(value) = value {
                if !allowed.contains(&value.as_str()) {
                    return Err(ValidationError::InvalidQuery {
                        field,
                        value: value.clone(),
                    });
                }
                params.push(format!("{field}={value}"));
            }
        }

        let per_page = self.per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE);
        let page = self.page.unwrap_or(1).max(1);
        params.push(format!("per_page={per_page}"));
        params.push(format!("page={page}"));

        Ok(format!("{}?{}", issues_path(repo), params.join("&")))
    }
}

/// `/repos/{owner}/{repo}/issues`
pub fn issues_path(repo: &RepoId) -> String {
    format!("{}/issues", repo.api_path())
}

/// `/repos/{owner}/{repo}/issues/{number}`
pub fn issue_path(repo: &RepoId, number: IssueNumber) -> String {
    format!("{}/issues/{}", repo.api_path(), number.0)
}

/// `/repos/{owner}/{repo}/issues/{number}/comments`
pub fn comments_path(repo: &RepoId, number: IssueNumber) -> String {
    format!("{}/comments", issue_path(repo, number))
}
