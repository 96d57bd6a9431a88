// Refresh scheduling.
// Chooses between a blocking refresh, a background refresh and none, and owns the background task.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::cache::{CacheMetadata, CacheStore, is_stale};
use crate::error::{GhpickError, Result};

use super::refresh::{RefreshPipeline, RefreshReport};

/// Default wait for a cancelled background refresh to wind down.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Cache state as seen by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    /// No refresh ever completed.
    Uninitialized,
    /// Refreshed within the threshold.
    Fresh,
    /// Refreshed, but longer ago than the threshold.
    Stale,
}

impl CacheStatus {
    pub fn of(metadata: Option<&CacheMetadata>, threshold: Duration, now: DateTime<Utc>) -> Self {
        match metadata {
            None => CacheStatus::Uninitialized,
            Some(md) if is_stale(Some(md.last_updated), threshold, now) => CacheStatus::Stale,
            Some(_) => CacheStatus::Fresh,
        }
    }
}

/// How a background refresh ended.
#[derive(Debug)]
pub enum BackgroundOutcome {
    Completed(RefreshReport),
    Cancelled,
    Failed(GhpickError),
    /// Did not stop within the grace period and was aborted.
    TimedOut,
}

/// A refresh running on its own task with its own cancellation token.
pub struct BackgroundRefresh {
    cancel: CancellationToken,
    handle: JoinHandle<Result<RefreshReport>>,
}

impl BackgroundRefresh {
    /// Spawn `pipeline` under a child of `parent`, so a process-wide
    /// cancellation also stops it.
    pub fn spawn(pipeline: RefreshPipeline, parent: &CancellationToken) -> Self {
        let cancel = parent.child_token();
        let task_cancel = cancel.clone();
        let handle = tokio::spawn(async move { pipeline.run(&task_cancel).await });
        debug!("background refresh started");
        Self { cancel, handle }
    }

    /// Wait for the refresh to finish on its own.
    #[cfg(test)]
    pub async fn join(self) -> BackgroundOutcome {
        Self::outcome(self.handle.await)
    }

    /// Cancel the refresh and wait up to `grace` for it to stop.
    pub async fn shutdown(mut self, grace: Duration) -> BackgroundOutcome {
        self.cancel.cancel();
        debug!("waiting for background refresh to stop");
        match tokio::time::timeout(grace, &mut self.handle).await {
            Ok(joined) => Self::outcome(joined),
            Err(_) => {
                self.handle.abort();
                warn!(?grace, "background refresh did not stop in time, aborted");
                BackgroundOutcome::TimedOut
            }
        }
    }

    fn outcome(
        joined: std::result::Result<Result<RefreshReport>, tokio::task::JoinError>,
    ) -> BackgroundOutcome {
        let outcome = match joined {
            Ok(Ok(report)) => BackgroundOutcome::Completed(report),
            Ok(Err(e)) if e.is_cancelled() => BackgroundOutcome::Cancelled,
            Ok(Err(e)) => BackgroundOutcome::Failed(e),
            Err(e) if e.is_cancelled() => BackgroundOutcome::Cancelled,
            Err(e) => BackgroundOutcome::Failed(GhpickError::Other(format!(
                "background refresh panicked: {e}"
            ))),
        };
        match &outcome {
            BackgroundOutcome::Completed(report) => debug!(
                partitions = report.saved.len(),
                failed = report.failures.len(),
                "background refresh completed"
            ),
            BackgroundOutcome::Cancelled => debug!("background refresh cancelled"),
            BackgroundOutcome::Failed(e) => error!(error = %e, "background refresh failed"),
            BackgroundOutcome::TimedOut => {}
        }
        outcome
    }
}

/// Decides when the cache is refreshed.
pub struct RefreshScheduler {
    store: CacheStore,
    stale_after: Duration,
}

impl RefreshScheduler {
    pub fn new(store: CacheStore, stale_after: Duration) -> Self {
        Self { store, stale_after }
    }

    pub fn status(&self) -> Result<CacheStatus> {
        if !self.store.exists() {
            return Ok(CacheStatus::Uninitialized);
        }
        let metadata = self.store.load_metadata()?;
        Ok(CacheStatus::of(metadata.as_ref(), self.stale_after, Utc::now()))
    }

    /// Bring the cache to a loadable state.
    ///
    /// Uninitialized (or `force`): refresh synchronously and propagate a
    /// total failure. Stale: start a background refresh and return its
    /// handle. Fresh: nothing to do.
    pub async fn prepare(
        &self,
        pipeline: &RefreshPipeline,
        force: bool,
        cancel: &CancellationToken,
    ) -> Result<Option<BackgroundRefresh>> {
        let status = self.status()?;
        debug!(?status, force, "cache status");

        if force || status == CacheStatus::Uninitialized {
            pipeline.run(cancel).await?;
            return Ok(None);
        }

        match status {
            CacheStatus::Stale => Ok(Some(BackgroundRefresh::spawn(pipeline.clone(), cancel))),
            _ => Ok(None),
        }
    }
}
