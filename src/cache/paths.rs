// Cache path utilities.
// One file per (host, organization) partition under a host directory, plus metadata.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;

use crate::repository::RepositoryGroup;

const METADATA_FILE: &str = "_md.json";
const JSON_SUFFIX: &str = ".json";
const COLLABORATOR_SUFFIX: &str = ".collaborator.json";

/// Default cache directory (~/.cache/ghpick on Linux).
pub fn default_cache_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "ghpick").map(|dirs| dirs.cache_dir().to_path_buf())
}

/// Where a partition's repositories came from.
///
/// Collaborator partitions live beside owned ones so the two sources never
/// write the same file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PartitionSource {
    Owned,
    Collaborator,
}

/// Identifies one partition file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PartitionKey {
    pub host: String,
    pub organization: String,
    pub source: PartitionSource,
}

impl PartitionKey {
    pub fn for_group(group: &RepositoryGroup, source: PartitionSource) -> Self {
        Self {
            host: group.host().to_string(),
            organization: group.organization().to_string(),
            source,
        }
    }

    /// Owner identifier used in logs and reports.
    pub fn id(&self) -> String {
        match self.source {
            PartitionSource::Owned => format!("{}/{}", self.host, self.organization),
            PartitionSource::Collaborator => {
                format!("{}/{} (collaborator)", self.host, self.organization)
            }
        }
    }

    pub fn file_name(&self) -> String {
        match self.source {
            PartitionSource::Owned => format!("{}{}", self.organization, JSON_SUFFIX),
            PartitionSource::Collaborator => {
                format!("{}{}", self.organization, COLLABORATOR_SUFFIX)
            }
        }
    }

    pub fn path(&self, root: &Path) -> PathBuf {
        host_dir(root, &self.host).join(self.file_name())
    }

    /// Recover a key from `<root>/<host>/<file>`; None for non-partition files.
    pub fn from_file(host: &str, file_name: &str) -> Option<Self> {
        let (organization, source) = if let Some(org) = file_name.strip_suffix(COLLABORATOR_SUFFIX)
        {
            (org, PartitionSource::Collaborator)
        } else {
            (file_name.strip_suffix(JSON_SUFFIX)?, PartitionSource::Owned)
        };
        if organization.is_empty() {
            return None;
        }
        Some(Self {
            host: host.to_string(),
            organization: organization.to_string(),
            source,
        })
    }
}

/// Path to a host's partition directory.
pub fn host_dir(root: &Path, host: &str) -> PathBuf {
    root.join(sanitize_name(host))
}

/// Path to the metadata file.
pub fn metadata_path(root: &Path) -> PathBuf {
    root.join(METADATA_FILE)
}

/// Sanitize a name for use as a filesystem path component.
fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '_',
            c => c,
        })
        .collect()
}
