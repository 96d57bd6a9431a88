// Error types for ghpick.
// Covers GitHub API failures, pagination limits, cache I/O and early exits.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GhpickError {
    #[error("GitHub API error: {0}")]
    Api(#[from] reqwest::Error),

    #[error("Authentication failed: invalid or expired token")]
    Unauthorized,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Rate limit exceeded, resets at {reset_at}")]
    RateLimited { reset_at: String },

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("failed to fetch page {page} for {owner}: {source}")]
    Page {
        owner: String,
        page: u32,
        #[source]
        source: Box<GhpickError>,
    },

    #[error("invalid Link header: {0}")]
    InvalidLinkHeader(String),

    #[error("{owner} reports {last_page} pages, more than the limit of {max_pages}")]
    PageLimitExceeded {
        owner: String,
        last_page: u32,
        max_pages: u32,
    },

    #[error("no authenticated hosts: set GITHUB_TOKEN or configure [[hosts]]")]
    NoHosts,

    #[error("organization name cannot be empty")]
    EmptyOrganizationName,

    #[error("repository group cannot be empty")]
    EmptyGroup,

    #[error("repository {repository} does not belong to group {expected}")]
    GroupMismatch {
        expected: String,
        repository: String,
    },

    #[error("cannot derive host and organization from {0}")]
    InvalidRepositoryUrl(String),

    #[error("cache I/O error at {}: {source}", .path.display())]
    CacheIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt cache file {}: {source}", .path.display())]
    CacheDecode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("refresh failed for every owner:\n{}", format_failures(.0))]
    RefreshFailed(Vec<OwnerFailure>),

    #[error("`{program}` failed: {message}")]
    Command { program: String, message: String },

    #[error("repository not selected")]
    NotSelected,

    #[error("selected line does not match any repository: {0}")]
    UnknownSelection(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl GhpickError {
    /// True when the error is, or wraps, a cancellation.
    pub fn is_cancelled(&self) -> bool {
        match self {
            GhpickError::Cancelled => true,
            GhpickError::Page { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }

    /// Early exits that are not failures: user cancelled or picked nothing.
    pub fn is_silent_exit(&self) -> bool {
        self.is_cancelled() || matches!(self, GhpickError::NotSelected)
    }
}

/// One owner's failure inside an aggregated refresh report.
#[derive(Debug)]
pub struct OwnerFailure {
    pub owner: String,
    pub error: GhpickError,
}

impl fmt::Display for OwnerFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.owner, self.error)
    }
}

fn format_failures(failures: &[OwnerFailure]) -> String {
    failures
        .iter()
        .map(|failure| format!("  - {}", failure))
        .collect::<Vec<_>>()
        .join("\n")
}

pub type Result<T> = std::result::Result<T, GhpickError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancellation_seen_through_page_context() {
        let err = GhpickError::Page {
            owner: "github.com/rust-lang".to_string(),
            page: 3,
            source: Box::new(GhpickError::Cancelled),
        };
        assert!(err.is_cancelled());
        assert!(err.is_silent_exit());
    }

    #[test]
    fn test_page_error_names_owner_and_page() {
        let err = GhpickError::Page {
            owner: "github.com/rust-lang".to_string(),
            page: 7,
            source: Box::new(GhpickError::Unauthorized),
        };
        let message = err.to_string();
        assert!(message.contains("github.com/rust-lang"));
        assert!(message.contains("page 7"));
        assert!(!err.is_cancelled());
    }

    #[test]
    fn test_refresh_failed_lists_every_owner() {
        let err = GhpickError::RefreshFailed(vec![
            OwnerFailure {
                owner: "github.com/a".to_string(),
                error: GhpickError::NoHosts,
            },
            OwnerFailure {
                owner: "github.com/b".to_string(),
                error: GhpickError::EmptyGroup,
            },
        ]);
        let message = err.to_string();
        assert!(message.contains("github.com/a"));
        assert!(message.contains("github.com/b"));
        assert!(!err.is_silent_exit());
    }
}
