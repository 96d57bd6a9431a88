// Application flows.
// Wires cache, refresh scheduling, merge, selector and ghq into the CLI modes.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cache::CacheStore;
use crate::config::Config;
use crate::error::{GhpickError, Result};
use crate::external::{CloneExecutor, Ghq, LocalInventory, Selector, resolve_selection};
use crate::github::{GitHubClient, RepositoryApi};
use crate::merge::merge_and_rank;
use crate::owners::OwnerResolver;
use crate::repository::Repository;
use crate::sync::{BackgroundRefresh, RefreshPipeline, RefreshReport, RefreshScheduler};

/// Main application state.
pub struct App {
    store: CacheStore,
    pipeline: RefreshPipeline,
    scheduler: RefreshScheduler,
    inventory: Arc<dyn LocalInventory>,
    shutdown_grace: Duration,
}

impl App {
    pub fn new(
        pipeline: RefreshPipeline,
        stale_after: Duration,
        shutdown_grace: Duration,
        inventory: Arc<dyn LocalInventory>,
    ) -> Self {
        let store = pipeline.store().clone();
        Self {
            scheduler: RefreshScheduler::new(store.clone(), stale_after),
            store,
            pipeline,
            inventory,
            shutdown_grace,
        }
    }

    /// Build the app for the configured hosts, cache root and ghq.
    ///
    /// No authenticated host is not an error here; it surfaces as
    /// `NoHosts` only when a refresh actually has to run.
    pub fn from_config(config: &Config) -> Result<Self> {
        let store = CacheStore::new(config.cache_root()?);
        let apis = config
            .resolve_hosts(|var| std::env::var(var).ok())
            .into_iter()
            .map(|host| {
                let client = GitHubClient::new(&host.host, &host.token)?;
                Ok(Arc::new(client) as Arc<dyn RepositoryApi>)
            })
            .collect::<Result<Vec<_>>>()?;
        info!(hosts = apis.len(), cache = %store.root().display(), "configured");

        let pipeline = RefreshPipeline::new(OwnerResolver::new(apis), store, config.pagination());
        Ok(Self::new(
            pipeline,
            config.stale_after(),
            config.shutdown_grace(),
            Arc::new(Ghq::default()),
        ))
    }

    #[cfg(test)]
    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    /// Synchronous full refresh.
    pub async fn sync(&self, cancel: &CancellationToken) -> Result<RefreshReport> {
        let report = self.pipeline.run(cancel).await?;
        for failure in &report.failures {
            warn!("{}", failure);
        }
        if let Some(metadata) = &report.metadata {
            info!(
                updated = %metadata.last_updated,
                hosts = metadata.identities.len(),
                "sync complete"
            );
        }
        Ok(report)
    }

    pub fn clear(&self) -> Result<()> {
        self.store.clear_all()?;
        info!(cache = %self.store.root().display(), "cache cleared");
        Ok(())
    }

    /// Merged, ranked selector lines without selecting.
    pub async fn list(&self, force: bool, cancel: &CancellationToken) -> Result<Vec<String>> {
        let root = self.inventory.root(cancel).await?;
        let background = self.scheduler.prepare(&self.pipeline, force, cancel).await?;
        let result = self.candidates(&root, cancel).await;
        self.finish(background).await;

        Ok(result?.iter().map(Repository::formatted_line).collect())
    }

    /// Select a repository, clone it if needed and return its local path.
    pub async fn pick(
        &self,
        selector: &dyn Selector,
        cloner: &dyn CloneExecutor,
        force: bool,
        cancel: &CancellationToken,
    ) -> Result<PathBuf> {
        let root = self.inventory.root(cancel).await?;
        let background = self.scheduler.prepare(&self.pipeline, force, cancel).await?;
        let result = self.select_and_clone(&root, selector, cloner, cancel).await;
        self.finish(background).await;
        result
    }

    async fn select_and_clone(
        &self,
        root: &Path,
        selector: &dyn Selector,
        cloner: &dyn CloneExecutor,
        cancel: &CancellationToken,
    ) -> Result<PathBuf> {
        let repos = self.candidates(root, cancel).await?;
        if repos.is_empty() {
            warn!("no repositories to choose from");
            return Err(GhpickError::NotSelected);
        }

        let lines = repos.iter().map(Repository::formatted_line).collect();
        let selected = selector.select(lines, cancel).await?;
        let repo = resolve_selection(&selected, &repos)?;

        if !repo.cloned {
            cloner.clone_repository(repo, cancel).await?;
        }
        Ok(repo.clone_path(root))
    }

    /// Cached and local repositories, merged and ranked.
    async fn candidates(&self, root: &Path, cancel: &CancellationToken) -> Result<Vec<Repository>> {
        let store = self.store.clone();
        let loaded = tokio::task::spawn_blocking(move || store.load_all())
            .await
            .map_err(|e| GhpickError::Other(format!("cache load task failed: {e}")))??;
        for (path, error) in &loaded.failures {
            warn!(path = %path.display(), %error, "skipping unreadable cache partition");
        }

        let metadata = self.store.load_metadata()?;
        let local = self.inventory.list(cancel).await?;

        Ok(merge_and_rank(
            loaded.into_repositories(),
            local,
            metadata.as_ref(),
            Some(root),
        ))
    }

    async fn finish(&self, background: Option<BackgroundRefresh>) {
        if let Some(background) = background {
            background.shutdown(self.shutdown_grace).await;
        }
    }
}
