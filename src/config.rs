// Configuration for ghpick.
// `GHPICK_` environment variables override the config file, which overrides built-in defaults.

use std::path::PathBuf;
use std::time::Duration;

use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use directories::ProjectDirs;
use serde::Deserialize;

use crate::cache::{DEFAULT_STALE_AFTER, default_cache_dir};
use crate::error::{GhpickError, Result};
use crate::github::PaginationLimits;
use crate::github::pagination::{DEFAULT_MAX_PAGES, DEFAULT_PAGE_CONCURRENCY};
use crate::sync::DEFAULT_SHUTDOWN_GRACE;

/// Host used when authenticating from the environment alone.
pub const DEFAULT_HOST: &str = "github.com";

/// Environment variables checked for a github.com token, in order.
pub const TOKEN_ENV_VARS: [&str; 2] = ["GITHUB_TOKEN", "GH_TOKEN"];

/// Top-level configuration.
///
/// Example `~/.config/ghpick/config.toml`:
/// ```toml
/// stale_after_secs = 3600
/// selector = "fzf"
///
/// [[hosts]]
/// host = "github.com"
/// token = "ghp_..."
///
/// [[hosts]]
/// host = "ghe.example.com"
/// token = "..."
/// ```
///
/// Without `[[hosts]]`, `GITHUB_TOKEN` or `GH_TOKEN` authenticates github.com.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Cache root; defaults to the platform cache directory.
    pub cache_dir: Option<PathBuf>,
    pub stale_after_secs: u64,
    pub shutdown_grace_secs: u64,
    pub page_concurrency: usize,
    pub max_pages: u32,
    /// Selector command; defaults to the first of peco, fzf on PATH.
    pub selector: Option<String>,
    pub hosts: Vec<HostConfig>,
}

/// A GitHub or GitHub Enterprise host and its token.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HostConfig {
    pub host: String,
    pub token: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_dir: None,
            stale_after_secs: DEFAULT_STALE_AFTER.as_secs(),
            shutdown_grace_secs: DEFAULT_SHUTDOWN_GRACE.as_secs(),
            page_concurrency: DEFAULT_PAGE_CONCURRENCY,
            max_pages: DEFAULT_MAX_PAGES,
            selector: None,
            hosts: Vec::new(),
        }
    }
}

impl Config {
    /// Load from the config file and `GHPICK_` environment variables.
    pub fn load() -> Result<Self> {
        Self::load_from(Self::config_path())
    }

    /// Load with `path` as the config file; a missing file means defaults.
    fn load_from(path: Option<PathBuf>) -> Result<Self> {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = path {
            tracing::debug!("Loading config from {:?}", path);
            builder = builder.add_source(
                File::from(path)
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }

        builder = builder.add_source(
            Environment::with_prefix("GHPICK")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        Ok(builder.build()?.try_deserialize()?)
    }

    pub fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "ghpick").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    pub fn cache_root(&self) -> Result<PathBuf> {
        self.cache_dir
            .clone()
            .or_else(default_cache_dir)
            .ok_or_else(|| GhpickError::Other("cannot determine a cache directory".to_string()))
    }

    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.stale_after_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }

    pub fn pagination(&self) -> PaginationLimits {
        PaginationLimits {
            concurrency: self.page_concurrency.max(1),
            max_pages: self.max_pages.max(1),
        }
    }

    /// Hosts to authenticate against.
    ///
    /// Configured hosts win. Otherwise the first non-empty token variable
    /// named in [`TOKEN_ENV_VARS`] yields github.com. Hosts with an empty
    /// token are dropped.
    pub fn resolve_hosts(&self, env: impl Fn(&str) -> Option<String>) -> Vec<HostConfig> {
        let configured: Vec<HostConfig> = self
            .hosts
            .iter()
            .filter(|h| !h.host.trim().is_empty() && !h.token.trim().is_empty())
            .cloned()
            .collect();
        if !configured.is_empty() {
            return configured;
        }

        TOKEN_ENV_VARS
            .iter()
            .filter_map(|var| env(var))
            .map(|token| token.trim().to_string())
            .find(|token| !token.is_empty())
            .map(|token| {
                vec![HostConfig {
                    host: DEFAULT_HOST.to_string(),
                    token,
                }]
            })
            .unwrap_or_default()
    }
}
