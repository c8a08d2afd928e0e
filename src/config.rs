//! Process configuration, read once at startup from flags or the environment.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use thiserror::Error;

use crate::github::DEFAULT_API_URL;
use crate::types::RepoId;

/// Configuration error types.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("GITHUB_TOKEN cannot be empty")]
    EmptyToken,

    #[error("WEBHOOK_SECRET cannot be empty")]
    EmptyWebhookSecret,

    #[error("Invalid repository: {0:?}. Owner and name must be non-empty and contain no '/'")]
    InvalidRepository(String),

    #[error("Invalid event capacity: {0}. Must be at least 1")]
    InvalidCapacity(usize),

    #[error("Invalid upstream timeout: {0}s. Must be at least 1")]
    InvalidTimeout(u64),

    #[error("Invalid automation queue size: {0}. Must be at least 1")]
    InvalidQueueSize(usize),

    #[error("Invalid GitHub API URL: {0:?}")]
    InvalidApiUrl(String),
}

#[derive(Parser, Clone)]
#[command(name = "issue-relay")]
#[command(about = "GitHub issue proxy and webhook receiver for a single repository")]
#[command(version)]
pub struct Config {
    /// Token used to authenticate GitHub API calls
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub github_token: String,

    /// Owner of the proxied repository
    #[arg(long, env = "GITHUB_OWNER", default_value = "ESP-2025")]
    pub github_owner: String,

    /// Name of the proxied repository
    #[arg(long, env = "GITHUB_REPO", default_value = "github_service")]
    pub github_repo: String,

    /// Shared secret for webhook signatures
    #[arg(long, env = "WEBHOOK_SECRET", hide_env_values = true)]
    pub webhook_secret: String,

    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 8000)]
    pub port: u16,

    /// Address to bind
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0")]
    pub bind_addr: IpAddr,

    /// Number of webhook deliveries retained in the event log
    #[arg(long, env = "EVENT_CAPACITY", default_value_t = crate::store::DEFAULT_CAPACITY)]
    pub event_capacity: usize,

    /// Optional JSON Lines file persisting the event log across restarts
    #[arg(long, env = "EVENT_JOURNAL")]
    pub event_journal: Option<PathBuf>,

    /// Base URL of the GitHub REST API
    #[arg(long, env = "GITHUB_API_URL", default_value = DEFAULT_API_URL)]
    pub github_api_url: String,

    /// Per-attempt timeout for GitHub calls, in seconds
    #[arg(long, env = "UPSTREAM_TIMEOUT_SECS", default_value_t = 10)]
    pub upstream_timeout_secs: u64,

    /// Capacity of the queue feeding newly recorded deliveries to automation
    #[arg(long, env = "AUTOMATION_QUEUE", default_value_t = 256)]
    pub automation_queue: usize,
}

impl Config {
    /// Checks values clap cannot check on its own.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.github_token.trim().is_empty() {
            return Err(ConfigError::EmptyToken);
        }
        if self.webhook_secret.is_empty() {
            return Err(ConfigError::EmptyWebhookSecret);
        }
        for part in [&self.github_owner, &self.github_repo] {
            if part.trim().is_empty() || part.contains('/') {
                return Err(ConfigError::InvalidRepository(format!(
                    "{}/{}",
                    self.github_owner, self.github_repo
                )));
            }
        }
        if self.event_capacity == 0 {
            return Err(ConfigError::InvalidCapacity(self.event_capacity));
        }
        if self.upstream_timeout_secs == 0 {
            return Err(ConfigError::InvalidTimeout(self.upstream_timeout_secs));
        }
        if self.automation_queue == 0 {
            return Err(ConfigError::InvalidQueueSize(self.automation_queue));
        }
        let url = &self.github_api_url;
        if !(url.starts_with("https://") || url.starts_with("http://")) {
            return Err(ConfigError::InvalidApiUrl(self.github_api_url.clone()));
        }
        Ok(())
    }

    pub fn repo(&self) -> RepoId {
        RepoId::new(&self.github_owner, &self.github_repo)
    }

    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.port)
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_secs)
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("github_owner", &self.github_owner)
            .field("github_repo", &self.github_repo)
            .field("port", &self.port)
            .field("bind_addr", &self.bind_addr)
            .field("event_capacity", &self.event_capacity)
            .field("event_journal", &self.event_journal)
            .field("github_api_url", &self.github_api_url)
            .field("upstream_timeout_secs", &self.upstream_timeout_secs)
            .field("automation_queue", &self.automation_queue)
            .finish_non_exhaustive()
    }
}
