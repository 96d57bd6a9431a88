// Repository domain model.
// Identity, display formatting and per-namespace grouping used as the cache unit.

use std::fmt;
use std::path::{Path, PathBuf};

use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::error::{GhpickError, Result};

/// Deduplication key: (host, organization, name).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RepositoryId {
    pub host: String,
    pub organization: String,
    pub name: String,
}

impl fmt::Display for RepositoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.host, self.organization, self.name)
    }
}

/// A repository on some host, remote or locally cloned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub name: String,
    pub organization: String,
    pub host: String,
    pub html_url: String,
    /// Set by the merge pass, never persisted.
    #[serde(skip)]
    pub cloned: bool,
}

impl Repository {
    pub fn new(
        host: impl Into<String>,
        organization: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        let host = host.into();
        let organization = organization.into();
        let name = name.into();
        Self {
            html_url: format!("https://{}/{}/{}", host, organization, name),
            name,
            organization,
            host,
            cloned: false,
        }
    }

    /// Build a repository from its API name and canonical URL.
    ///
    /// Host is the URL authority, organization the first path segment.
    pub fn from_html_url(name: &str, html_url: &str) -> Result<Self> {
        let invalid = || GhpickError::InvalidRepositoryUrl(html_url.to_string());

        let url = Url::parse(html_url).map_err(|_| invalid())?;
        let host = match (url.host_str(), url.port()) {
            (Some(host), Some(port)) => format!("{}:{}", host, port),
            (Some(host), None) => host.to_string(),
            (None, _) => return Err(invalid()),
        };
        let organization = url
            .path_segments()
            .and_then(|mut segments| segments.next())
            .filter(|segment| !segment.is_empty())
            .ok_or_else(invalid)?;

        Ok(Self {
            name: name.to_string(),
            organization: organization.to_string(),
            host,
            html_url: html_url.to_string(),
            cloned: false,
        })
    }

    pub fn id(&self) -> RepositoryId {
        RepositoryId {
            host: self.host.clone(),
            organization: self.organization.clone(),
            name: self.name.clone(),
        }
    }

    /// `host/organization/name`, the sort and match key.
    pub fn full_path(&self) -> String {
        format!("{}/{}/{}", self.host, self.organization, self.name)
    }

    /// Where ghq puts this repository under its root.
    pub fn clone_path(&self, root: &Path) -> PathBuf {
        root.join(&self.host).join(&self.organization).join(&self.name)
    }

    /// SSH URL handed to the clone tool.
    pub fn git_url(&self) -> String {
        format!("git@{}:{}/{}", self.host, self.organization, self.name)
    }

    /// Selector line, prefixed with a check mark when cloned.
    pub fn formatted_line(&self) -> String {
        let status = if self.cloned { "✓" } else { " " };
        format!("{} {}", status, self.full_path())
    }
}

/// Non-empty set of repositories sharing one (host, organization).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryGroup {
    host: String,
    organization: String,
    repositories: Vec<Repository>,
}

impl RepositoryGroup {
    /// The first repository fixes the group's namespace.
    pub fn new(repositories: Vec<Repository>) -> Result<Self> {
        let mut iter = repositories.into_iter();
        let first = iter.next().ok_or(GhpickError::EmptyGroup)?;
        let mut group = Self {
            host: first.host.clone(),
            organization: first.organization.clone(),
            repositories: vec![first],
        };
        for repository in iter {
            group.add(repository)?;
        }
        Ok(group)
    }

    pub fn add(&mut self, repository: Repository) -> Result<()> {
        if repository.host != self.host || repository.organization != self.organization {
            return Err(GhpickError::GroupMismatch {
                expected: format!("{}/{}", self.host, self.organization),
                repository: repository.full_path(),
            });
        }
        self.repositories.push(repository);
        Ok(())
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn organization(&self) -> &str {
        &self.organization
    }

    pub fn repositories(&self) -> &[Repository] {
        &self.repositories
    }

    pub fn into_repositories(self) -> Vec<Repository> {
        self.repositories
    }

    pub fn len(&self) -> usize {
        self.repositories.len()
    }
}

/// Regroup repositories by their own (host, organization), keeping first-seen order.
pub fn group_by_namespace(repositories: Vec<Repository>) -> Result<Vec<RepositoryGroup>> {
    let mut groups: Vec<RepositoryGroup> = Vec::new();
    for repository in repositories {
        match groups.iter_mut().find(|group| {
            group.host == repository.host && group.organization == repository.organization
        }) {
            Some(group) => group.add(repository)?,
            None => groups.push(RepositoryGroup::new(vec![repository])?),
        }
    }
    Ok(groups)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_html_url_splits_host_and_organization() {
        let repo = Repository::from_html_url("tokio", "https://github.com/tokio-rs/tokio").unwrap();
        assert_eq!(repo.host, "github.com");
        assert_eq!(repo.organization, "tokio-rs");
        assert_eq!(repo.name, "tokio");
        assert!(!repo.cloned);
    }

    #[test]
    fn test_from_html_url_keeps_enterprise_port() {
        let repo =
            Repository::from_html_url("svc", "https://ghe.example.com:8443/platform/svc").unwrap();
        assert_eq!(repo.host, "ghe.example.com:8443");
        assert_eq!(repo.organization, "platform");
    }

    #[test]
    fn test_from_html_url_rejects_missing_organization() {
        assert!(matches!(
            Repository::from_html_url("x", "https://github.com/"),
            Err(GhpickError::InvalidRepositoryUrl(_))
        ));
        assert!(Repository::from_html_url("x", "not a url").is_err());
    }

    #[test]
    fn test_display_helpers() {
        let mut repo = Repository::new("github.com", "octocat", "hello");
        assert_eq!(repo.full_path(), "github.com/octocat/hello");
        assert_eq!(repo.git_url(), "git@github.com:octocat/hello");
        assert_eq!(repo.html_url, "https://github.com/octocat/hello");
        assert_eq!(repo.formatted_line(), "  github.com/octocat/hello");
        repo.cloned = true;
        assert_eq!(repo.formatted_line(), "✓ github.com/octocat/hello");
        assert_eq!(
            repo.clone_path(Path::new("/src")),
            PathBuf::from("/src/github.com/octocat/hello")
        );
    }

    #[test]
    fn test_identity_ignores_url_and_clone_flag() {
        let a = Repository::new("github.com", "o", "a");
        let mut b = a.clone();
        b.html_url = "https://elsewhere".to_string();
        b.cloned = true;
        assert_eq!(a.id(), b.id());
    }

    #[test]
    fn test_group_rejects_empty() {
        assert!(matches!(
            RepositoryGroup::new(Vec::new()),
            Err(GhpickError::EmptyGroup)
        ));
    }

    #[test]
    fn test_group_rejects_foreign_namespace() {
        let mut group = RepositoryGroup::new(vec![Repository::new("github.com", "o", "a")]).unwrap();
        let err = group
            .add(Repository::new("github.com", "other", "b"))
            .unwrap_err();
        assert!(matches!(err, GhpickError::GroupMismatch { .. }));

        let err = group
            .add(Repository::new("ghe.example.com", "o", "b"))
            .unwrap_err();
        assert!(matches!(err, GhpickError::GroupMismatch { .. }));
        assert_eq!(group.len(), 1);
    }

    #[test]
    fn test_group_new_validates_every_member() {
        let result = RepositoryGroup::new(vec![
            Repository::new("github.com", "o", "a"),
            Repository::new("github.com", "p", "b"),
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_group_by_namespace() {
        let groups = group_by_namespace(vec![
            Repository::new("github.com", "a", "1"),
            Repository::new("github.com", "b", "2"),
            Repository::new("github.com", "a", "3"),
            Repository::new("ghe.example.com", "a", "4"),
        ])
        .unwrap();

        assert_eq!(groups.len(), 3);
        assert_eq!(groups[0].organization(), "a");
        assert_eq!(groups[0].host(), "github.com");
        assert_eq!(groups[0].len(), 2);
        assert_eq!(groups[1].organization(), "b");
        assert_eq!(groups[2].host(), "ghe.example.com");
    }

    #[test]
    fn test_group_by_namespace_empty_input() {
        assert!(group_by_namespace(Vec::new()).unwrap().is_empty());
    }
}
