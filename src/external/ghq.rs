// ghq integration.
// Clone root lookup, local clone inventory and cloning through the ghq CLI.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::Result;
use crate::repository::Repository;

use super::command::{run, stdout_of};
use super::{CloneExecutor, LocalInventory};

const PROGRAM: &str = "ghq";

/// The `ghq` command line tool.
#[derive(Debug, Clone)]
pub struct Ghq {
    program: String,
}

impl Default for Ghq {
    fn default() -> Self {
        Self {
            program: PROGRAM.to_string(),
        }
    }
}

impl Ghq {
    async fn output(&self, args: &[&str], cancel: &CancellationToken) -> Result<String> {
        let mut command = Command::new(&self.program);
        command.args(args).stderr(Stdio::piped());
        let output = run(command, None, cancel).await?;
        stdout_of(&self.program, output)
    }
}

#[async_trait]
impl LocalInventory for Ghq {
    async fn root(&self, cancel: &CancellationToken) -> Result<PathBuf> {
        Ok(PathBuf::from(self.output(&["root"], cancel).await?))
    }

    async fn list(&self, cancel: &CancellationToken) -> Result<Vec<Repository>> {
        let listing = self.output(&["list", "--full-path"], cancel).await?;
        let repos = parse_list(&listing);
        debug!(count = repos.len(), "local clones");
        Ok(repos)
    }
}

#[async_trait]
impl CloneExecutor for Ghq {
    async fn clone_repository(&self, repo: &Repository, cancel: &CancellationToken) -> Result<()> {
        let url = repo.git_url();
        info!(%url, "cloning");
        self.output(&["get", &url], cancel).await?;
        Ok(())
    }
}

/// Map `ghq list --full-path` output to cloned repositories.
pub fn parse_list(listing: &str) -> Vec<Repository> {
    listing
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| {
            let repo = parse_clone_path(line);
            if repo.is_none() {
                debug!(path = line, "skipping unrecognised clone path");
            }
            repo
        })
        .collect()
}

/// `<root>/<host>/<org>/<name>` to a cloned repository.
pub fn parse_clone_path(path: &str) -> Option<Repository> {
    let parts: Vec<&str> = path.split('/').collect();
    if parts.len() < 4 {
        return None;
    }
    let &[host, organization, name] = &parts[parts.len() - 3..] else {
        return None;
    };
    if host.is_empty() || organization.is_empty() || name.is_empty() {
        return None;
    }

    let mut repo = Repository::new(host, organization, name);
    repo.cloned = true;
    Some(repo)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_clone_path() {
        let repo = parse_clone_path("/home/me/ghq/github.com/rust-lang/cargo").unwrap();
        assert_eq!(repo.full_path(), "github.com/rust-lang/cargo");
        assert_eq!(repo.html_url, "https://github.com/rust-lang/cargo");
        assert!(repo.cloned);
    }

    #[test]
    fn test_parse_clone_path_too_short() {
        assert!(parse_clone_path("github.com/cargo").is_none());
        assert!(parse_clone_path("a/b/c").is_none());
        assert!(parse_clone_path("/ghq/github.com//cargo").is_none());
    }

    #[test]
    fn test_parse_list_skips_blank_and_short_lines() {
        let listing = "\
/home/me/ghq/github.com/a/one

short/path
/home/me/ghq/ghe.example.com/b/two
";
        let repos = parse_list(listing);
        let paths: Vec<_> = repos.iter().map(Repository::full_path).collect();
        assert_eq!(paths, ["github.com/a/one", "ghe.example.com/b/two"]);
    }
}
