// External tools module.
// Local clone inventory, interactive selector and clone executor behind small traits.

pub mod command;
pub mod ghq;
pub mod selector;

use std::path::PathBuf;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::repository::Repository;

pub use ghq::Ghq;
pub use selector::{CommandSelector, resolve_selection};

/// Repositories already cloned on this machine.
#[async_trait]
pub trait LocalInventory: Send + Sync {
    /// Directory clones live under, as `<root>/<host>/<org>/<name>`.
    async fn root(&self, cancel: &CancellationToken) -> Result<PathBuf>;

    /// Every local clone, flagged `cloned`.
    async fn list(&self, cancel: &CancellationToken) -> Result<Vec<Repository>>;
}

/// Picks one line out of many, usually with the user's help.
#[async_trait]
pub trait Selector: Send + Sync {
    /// The chosen line, or `NotSelected` when nothing was picked.
    async fn select(&self, lines: Vec<String>, cancel: &CancellationToken) -> Result<String>;
}

#[async_trait]
pub trait CloneExecutor: Send + Sync {
    async fn clone_repository(&self, repo: &Repository, cancel: &CancellationToken) -> Result<()>;
}
