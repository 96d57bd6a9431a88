// GitHub API response types.
// Only the fields needed to list repositories and identify their owners.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::repository::Repository;

/// GitHub user or organization, as returned by `/user` and `/user/orgs`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Owner {
    pub login: String,
}

/// Repository entry of a listing endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiRepository {
    pub name: String,
    pub html_url: String,
}

impl ApiRepository {
    pub fn into_domain(self) -> Result<Repository> {
        Repository::from_html_url(&self.name, &self.html_url)
    }
}

/// Which `/user/repos` slice to list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Affiliation {
    Owner,
    Collaborator,
}

impl Affiliation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Affiliation::Owner => "owner",
            Affiliation::Collaborator => "collaborator",
        }
    }
}

/// An owner-scoped repository listing endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Endpoint {
    UserRepos { affiliation: Affiliation },
    OrgRepos { org: String },
}

impl Endpoint {
    pub fn path(&self) -> String {
        match self {
            Endpoint::UserRepos { .. } => "/user/repos".to_string(),
            Endpoint::OrgRepos { org } => format!("/orgs/{}/repos", org),
        }
    }

    /// Query parameters for one page, `per_page` fixed at 100.
    pub fn query(&self, page: u32) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("per_page", PER_PAGE.to_string()),
            ("page", page.to_string()),
        ];
        if let Endpoint::UserRepos { affiliation } = self {
            params.push(("affiliation", affiliation.as_str().to_string()));
        }
        params
    }

    /// Label used in errors and logs, e.g. `github.com/rust-lang`.
    pub fn describe(&self, host: &str) -> String {
        match self {
            Endpoint::UserRepos { affiliation } => {
                format!("{}/@me ({})", host, affiliation.as_str())
            }
            Endpoint::OrgRepos { org } => format!("{}/{}", host, org),
        }
    }
}

pub const PER_PAGE: u32 = 100;

/// One decoded page plus its cursors; 0 means "absent".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Page {
    pub repositories: Vec<Repository>,
    pub next_page: u32,
    pub last_page: u32,
}

/// One page of `/user/orgs` logins plus its `rel="next"` cursor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrganizationPage {
    pub organizations: Vec<String>,
    pub next_page: u32,
}

/// Rate limit information from response headers.
#[derive(Debug, Clone, Default)]
pub struct RateLimit {
    pub limit: u64,
    pub remaining: u64,
    pub reset: u64,
}
