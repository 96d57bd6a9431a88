// Cache refresh pipeline.
// Owners are fetched concurrently and saved as they arrive; metadata is written only after a usable refresh.

use chrono::Utc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::{CacheMetadata, CacheStore, PartitionKey};
use crate::error::{GhpickError, OwnerFailure, Result};
use crate::github::PaginationLimits;
use crate::owners::{Owner, OwnerResolver};

/// Result of fetching and saving one owner.
#[derive(Debug)]
pub struct OwnerOutcome {
    pub owner: String,
    /// Partition identifiers written for this owner.
    pub saved: Vec<String>,
    pub error: Option<GhpickError>,
}

/// Aggregate of a refresh cycle that wrote at least one partition, or found nothing to write.
#[derive(Debug, Default)]
pub struct RefreshReport {
    pub saved: Vec<String>,
    pub failures: Vec<OwnerFailure>,
    /// Metadata written by this refresh; None when no partition was saved.
    pub metadata: Option<CacheMetadata>,
}

/// Resolve owners, fetch them and persist the result.
#[derive(Clone)]
pub struct RefreshPipeline {
    resolver: OwnerResolver,
    store: CacheStore,
    limits: PaginationLimits,
}

impl RefreshPipeline {
    pub fn new(resolver: OwnerResolver, store: CacheStore, limits: PaginationLimits) -> Self {
        Self {
            resolver: resolver.with_max_pages(limits.max_pages),
            store,
            limits,
        }
    }

    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    /// Run one refresh cycle.
    ///
    /// Fails with `RefreshFailed` when owners failed and none saved anything,
    /// and with `Cancelled` when `cancel` fired; metadata is left untouched in
    /// both cases.
    pub async fn run(&self, cancel: &CancellationToken) -> Result<RefreshReport> {
        let resolved = self.resolver.resolve(cancel).await?;
        info!(owners = resolved.owners.len(), "refreshing repository cache");

        let outcomes = refresh_owners(resolved.owners, &self.store, self.limits, cancel).await;
        if cancel.is_cancelled() {
            return Err(GhpickError::Cancelled);
        }

        let mut report = RefreshReport::default();
        for outcome in outcomes {
            report.saved.extend(outcome.saved);
            if let Some(error) = outcome.error {
                warn!(owner = %outcome.owner, %error, "owner refresh failed");
                report.failures.push(OwnerFailure {
                    owner: outcome.owner,
                    error,
                });
            }
        }

        if report.saved.is_empty() {
            if report.failures.is_empty() {
                info!("no repositories found for any owner");
                return Ok(report);
            }
            return Err(GhpickError::RefreshFailed(report.failures));
        }

        let metadata = CacheMetadata::new(Utc::now(), resolved.identities);
        self.store.save_metadata(&metadata)?;
        report.metadata = Some(metadata);

        info!(
            partitions = report.saved.len(),
            failed = report.failures.len(),
            "repository cache refreshed"
        );
        Ok(report)
    }
}

/// Fetch and save every owner concurrently; one outcome per owner.
///
/// Cancelled owners produce no error entry.
pub async fn refresh_owners(
    owners: Vec<Owner>,
    store: &CacheStore,
    limits: PaginationLimits,
    cancel: &CancellationToken,
) -> Vec<OwnerOutcome> {
    let mut tasks = JoinSet::new();
    for owner in owners {
        let store = store.clone();
        let cancel = cancel.clone();
        tasks.spawn(async move { refresh_owner(owner, store, limits, cancel).await });
    }

    let mut outcomes = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(outcome) => outcomes.push(outcome),
            Err(e) => outcomes.push(OwnerOutcome {
                owner: "unknown".to_string(),
                saved: Vec::new(),
                error: Some(GhpickError::Other(format!("owner task failed: {e}"))),
            }),
        }
    }
    outcomes.sort_by(|a, b| a.owner.cmp(&b.owner));
    outcomes
}

async fn refresh_owner(
    owner: Owner,
    store: CacheStore,
    limits: PaginationLimits,
    cancel: CancellationToken,
) -> OwnerOutcome {
    let id = owner.id();
    debug!(owner = %id, "fetching owner");

    let mut outcome = OwnerOutcome {
        owner: id,
        saved: Vec::new(),
        error: None,
    };

    let groups = match owner.fetch_all(limits, &cancel).await {
        Ok(groups) => groups,
        Err(error) if error.is_cancelled() => return outcome,
        Err(error) => {
            outcome.error = Some(error);
            return outcome;
        }
    };

    let source = owner.partition_source();
    for group in groups {
        if cancel.is_cancelled() {
            return outcome;
        }
        let store = store.clone();
        let key = PartitionKey::for_group(&group, source).id();
        let saved = tokio::task::spawn_blocking(move || store.save(&group, source)).await;
        match saved {
            Ok(Ok(_)) => outcome.saved.push(key),
            Ok(Err(error)) => {
                outcome.error = Some(error);
                return outcome;
            }
            Err(e) => {
                outcome.error = Some(GhpickError::Other(format!("save task failed: {e}")));
                return outcome;
            }
        }
    }
    debug!(owner = %outcome.owner, partitions = outcome.saved.len(), "owner saved");
    outcome
}
