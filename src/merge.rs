// Merge of cached remote repositories with the local clone inventory.
// Deduplicates by identity, marks clone status and produces the display order.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::path::Path;

use crate::cache::CacheMetadata;
use crate::repository::{Repository, RepositoryId};

/// Union `remote` and `local`, dedupe and rank for display.
///
/// The first occurrence of each (host, organization, name) wins, remote
/// entries before local ones. An entry is cloned when the local inventory
/// lists it or its clone path exists under `clone_root`. Repositories in
/// the caller's own namespace (per the identities in `metadata`) sort after
/// everything else; ties break on the full path.
pub fn merge_and_rank(
    remote: Vec<Repository>,
    local: Vec<Repository>,
    metadata: Option<&CacheMetadata>,
    clone_root: Option<&Path>,
) -> Vec<Repository> {
    let local_ids: HashSet<RepositoryId> = local.iter().map(Repository::id).collect();

    let mut seen = HashSet::new();
    let mut merged: Vec<Repository> = remote
        .into_iter()
        .chain(local)
        .filter(|repo| seen.insert(repo.id()))
        .collect();

    for repo in &mut merged {
        repo.cloned = local_ids.contains(&repo.id())
            || clone_root.is_some_and(|root| repo.clone_path(root).exists());
    }

    merged.sort_by(|a, b| compare(a, b, metadata));
    merged
}

fn compare(a: &Repository, b: &Repository, metadata: Option<&CacheMetadata>) -> Ordering {
    let is_self = |repo: &Repository| {
        metadata.is_some_and(|md| md.is_self(&repo.host, &repo.organization))
    };
    is_self(a)
        .cmp(&is_self(b))
        .then_with(|| a.full_path().cmp(&b.full_path()))
}
