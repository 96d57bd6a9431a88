// Cache store for repository partitions and refresh metadata.
// Handles JSON serialization, staleness checks, and atomic filesystem writes.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tracing::debug;

use crate::error::{GhpickError, Result};
use crate::repository::{Repository, RepositoryGroup};

use super::paths::{PartitionKey, PartitionSource, metadata_path};

/// Default age after which a cache is refreshed in the background: 1 hour.
pub const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(60 * 60);

const READ_ATTEMPTS: usize = 3;
const READ_RETRY_DELAY: Duration = Duration::from_millis(20);

/// On-disk shape of one partition.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PartitionFile {
    repositories: Vec<Repository>,
    last_updated: DateTime<Utc>,
}

/// Record of the last refresh that saved at least one partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheMetadata {
    pub last_updated: DateTime<Utc>,
    /// host -> login of the authenticated identity on that host.
    #[serde(default)]
    pub identities: BTreeMap<String, String>,
}

impl CacheMetadata {
    pub fn new(last_updated: DateTime<Utc>, identities: BTreeMap<String, String>) -> Self {
        Self {
            last_updated,
            identities,
        }
    }

    /// Whether `organization` on `host` is the caller's own namespace.
    pub fn is_self(&self, host: &str, organization: &str) -> bool {
        self.identities
            .get(host)
            .is_some_and(|login| login == organization)
    }
}

/// True for a missing timestamp or one older than `threshold` at `now`.
pub fn is_stale(last_updated: Option<DateTime<Utc>>, threshold: Duration, now: DateTime<Utc>) -> bool {
    let Some(last_updated) = last_updated else {
        return true;
    };
    match now.signed_duration_since(last_updated).to_std() {
        Ok(elapsed) => elapsed > threshold,
        // Timestamp in the future: clock moved backwards, treat as fresh.
        Err(_) => false,
    }
}

/// Everything `load_all` could read.
///
/// Loading is best-effort: a corrupt partition is reported in `failures` and
/// skipped, the rest still load. A partition that vanishes mid-read is
/// skipped silently.
#[derive(Debug, Default)]
pub struct LoadedCache {
    pub groups: Vec<RepositoryGroup>,
    pub failures: Vec<(PathBuf, GhpickError)>,
}

impl LoadedCache {
    pub fn into_repositories(self) -> Vec<Repository> {
        self.groups
            .into_iter()
            .flat_map(RepositoryGroup::into_repositories)
            .collect()
    }
}

/// Repository cache rooted at an explicit directory.
#[derive(Debug, Clone)]
pub struct CacheStore {
    root: PathBuf,
}

impl CacheStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Overwrite the partition of `group`.
    pub fn save(&self, group: &RepositoryGroup, source: PartitionSource) -> Result<PathBuf> {
        let path = PartitionKey::for_group(group, source).path(&self.root);
        let file = PartitionFile {
            repositories: group.repositories().to_vec(),
            last_updated: Utc::now(),
        };
        write_json(&path, &file)?;
        debug!(path = %path.display(), count = group.len(), "saved partition");
        Ok(path)
    }

    /// Load one partition; Ok(None) if it does not exist.
    pub fn load_partition(&self, key: &PartitionKey) -> Result<Option<RepositoryGroup>> {
        let path = key.path(&self.root);
        let Some(file) = read_json::<PartitionFile>(&path)? else {
            return Ok(None);
        };
        RepositoryGroup::new(file.repositories).map(Some)
    }

    /// Load every partition on disk.
    pub fn load_all(&self) -> Result<LoadedCache> {
        let mut loaded = LoadedCache::default();

        let hosts = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(loaded),
            Err(source) => {
                return Err(GhpickError::CacheIo {
                    path: self.root.clone(),
                    source,
                });
            }
        };

        let mut keys = Vec::new();
        for entry in hosts {
            let entry = entry.map_err(|source| GhpickError::CacheIo {
                path: self.root.clone(),
                source,
            })?;
            if !entry.file_type().is_ok_and(|t| t.is_dir()) {
                continue;
            }
            let host = entry.file_name().to_string_lossy().into_owned();
            let files = match fs::read_dir(entry.path()) {
                Ok(files) => files,
                // Host directory removed by a concurrent clear.
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(source) => {
                    loaded.failures.push((
                        entry.path(),
                        GhpickError::CacheIo {
                            path: entry.path(),
                            source,
                        },
                    ));
                    continue;
                }
            };
            for file in files.flatten() {
                let name = file.file_name().to_string_lossy().into_owned();
                if let Some(key) = PartitionKey::from_file(&host, &name) {
                    keys.push(key);
                }
            }
        }
        keys.sort_by(|a, b| (&a.host, &a.organization).cmp(&(&b.host, &b.organization)));

        for key in keys {
            let path = key.path(&self.root);
            match self.load_partition_with_retry(&key) {
                Ok(Some(group)) => loaded.groups.push(group),
                Ok(None) => debug!(path = %path.display(), "partition vanished during load"),
                Err(error) => loaded.failures.push((path, error)),
            }
        }

        Ok(loaded)
    }

    fn load_partition_with_retry(&self, key: &PartitionKey) -> Result<Option<RepositoryGroup>> {
        read_with_retry(|| self.load_partition(key))
    }

    /// Ok(None) means the cache was never initialized.
    pub fn load_metadata(&self) -> Result<Option<CacheMetadata>> {
        read_json(&metadata_path(&self.root))
    }

    pub fn save_metadata(&self, metadata: &CacheMetadata) -> Result<()> {
        write_json(&metadata_path(&self.root), metadata)
    }

    /// Remove the whole cache root.
    pub fn clear_all(&self) -> Result<()> {
        match fs::remove_dir_all(&self.root) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(GhpickError::CacheIo {
                path: self.root.clone(),
                source,
            }),
        }
    }

    /// Whether a refresh has ever completed.
    pub fn exists(&self) -> bool {
        metadata_path(&self.root).is_file()
    }

    /// Partition directory for `host`.
    #[cfg(test)]
    pub fn host_dir(&self, host: &str) -> PathBuf {
        super::paths::host_dir(&self.root, host)
    }
}

/// Reads racing a background writer may see a missing or torn file; retry briefly.
///
/// Returns the first `Some`, or the last result after `READ_ATTEMPTS` tries.
fn read_with_retry<T>(mut read: impl FnMut() -> Result<Option<T>>) -> Result<Option<T>> {
    let mut attempt = 1;
    loop {
        match read() {
            Ok(Some(value)) => return Ok(Some(value)),
            result if attempt >= READ_ATTEMPTS => return result,
            _ => {
                attempt += 1;
                std::thread::sleep(READ_RETRY_DELAY);
            }
        }
    }
}

/// Read JSON from a file; Ok(None) if the file does not exist.
fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(GhpickError::CacheIo {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    serde_json::from_str(&contents)
        .map(Some)
        .map_err(|source| GhpickError::CacheDecode {
            path: path.to_path_buf(),
            source,
        })
}

/// Write JSON atomically via a temp file in the same directory.
fn write_json<T: Serialize>(path: &Path, data: &T) -> Result<()> {
    let io_err = |source| GhpickError::CacheIo {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_err)?;
    }

    let json = serde_json::to_string_pretty(data)?;

    let temp_path = path.with_extension("tmp");
    let mut file = fs::File::create(&temp_path).map_err(io_err)?;
    file.write_all(json.as_bytes()).map_err(io_err)?;
    file.sync_all().map_err(io_err)?;
    fs::rename(&temp_path, path).map_err(io_err)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::fake::repos;
    use tempfile::TempDir;

    fn group(host: &str, org: &str, names: &[&str]) -> RepositoryGroup {
        RepositoryGroup::new(repos(host, org, names)).unwrap()
    }

    #[test]
    fn test_save_and_load_partition() {
        let temp_dir = TempDir::new().unwrap();
        let store = CacheStore::new(temp_dir.path().join("nested/cache"));
        let saved = group("github.com", "rust-lang", &["rust", "cargo"]);

        let path = store.save(&saved, PartitionSource::Owned).unwrap();
        assert!(path.ends_with("github.com/rust-lang.json"));

        let key = PartitionKey::for_group(&saved, PartitionSource::Owned);
        let loaded = store.load_partition(&key).unwrap().unwrap();
        assert_eq!(loaded, saved);
    }

    #[test]
    fn test_partition_file_layout() {
        let temp_dir = TempDir::new().unwrap();
        let store = CacheStore::new(temp_dir.path());
        let path = store
            .save(&group("github.com", "o", &["a"]), PartitionSource::Owned)
            .unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        assert!(raw["last_updated"].is_string());
        assert_eq!(raw["repositories"][0]["name"], "a");
        assert_eq!(raw["repositories"][0]["organization"], "o");
        assert!(raw["repositories"][0].get("cloned").is_none());
    }

    #[test]
    fn test_save_overwrites() {
        let temp_dir = TempDir::new().unwrap();
        let store = CacheStore::new(temp_dir.path());
        store
            .save(&group("github.com", "o", &["a", "b"]), PartitionSource::Owned)
            .unwrap();
        store
            .save(&group("github.com", "o", &["c"]), PartitionSource::Owned)
            .unwrap();

        let loaded = store.load_all().unwrap().into_repositories();
        let names: Vec<_> = loaded.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["c"]);
        assert!(!store.host_dir("github.com").join("o.tmp").exists());
    }

    #[test]
    fn test_load_all_reads_every_partition() {
        let temp_dir = TempDir::new().unwrap();
        let store = CacheStore::new(temp_dir.path());
        store
            .save(&group("github.com", "b", &["2"]), PartitionSource::Owned)
            .unwrap();
        store
            .save(&group("github.com", "a", &["1"]), PartitionSource::Owned)
            .unwrap();
        store
            .save(&group("github.com", "a", &["3"]), PartitionSource::Collaborator)
            .unwrap();
        store
            .save(&group("ghe.example.com", "a", &["4"]), PartitionSource::Owned)
            .unwrap();
        store
            .save_metadata(&CacheMetadata::new(Utc::now(), BTreeMap::new()))
            .unwrap();

        let loaded = store.load_all().unwrap();
        assert!(loaded.failures.is_empty());
        assert_eq!(loaded.groups.len(), 4);
        assert_eq!(loaded.into_repositories().len(), 4);
    }

    #[test]
    fn test_load_all_skips_corrupt_partition() {
        let temp_dir = TempDir::new().unwrap();
        let store = CacheStore::new(temp_dir.path());
        store
            .save(&group("github.com", "good", &["a"]), PartitionSource::Owned)
            .unwrap();
        fs::write(store.host_dir("github.com").join("bad.json"), "{not json").unwrap();
        fs::write(store.host_dir("github.com").join("notes.txt"), "ignored").unwrap();

        let loaded = store.load_all().unwrap();
        assert_eq!(loaded.groups.len(), 1);
        assert_eq!(loaded.groups[0].organization(), "good");
        assert_eq!(loaded.failures.len(), 1);
        assert!(loaded.failures[0].0.ends_with("bad.json"));
        assert!(matches!(
            loaded.failures[0].1,
            GhpickError::CacheDecode { .. }
        ));
    }

    #[test]
    fn test_load_all_rejects_empty_partition() {
        let temp_dir = TempDir::new().unwrap();
        let store = CacheStore::new(temp_dir.path());
        fs::create_dir_all(store.host_dir("github.com")).unwrap();
        fs::write(
            store.host_dir("github.com").join("empty.json"),
            r#"{"repositories": [], "last_updated": "2025-01-01T00:00:00Z"}"#,
        )
        .unwrap();

        let loaded = store.load_all().unwrap();
        assert!(loaded.groups.is_empty());
        assert!(matches!(loaded.failures[0].1, GhpickError::EmptyGroup));
    }

    #[test]
    fn test_vanished_partition_is_retried_then_skipped() {
        let temp_dir = TempDir::new().unwrap();
        let store = CacheStore::new(temp_dir.path());
        let key = PartitionKey::for_group(&group("github.com", "gone", &["a"]), PartitionSource::Owned);

        let mut reads = 0;
        let result = read_with_retry(|| {
            reads += 1;
            store.load_partition(&key)
        });

        assert!(matches!(result, Ok(None)));
        assert_eq!(reads, READ_ATTEMPTS);
    }

    #[test]
    fn test_torn_partition_recovers_once_rewritten() {
        let temp_dir = TempDir::new().unwrap();
        let store = CacheStore::new(temp_dir.path());
        let saved = group("github.com", "o", &["a", "b"]);
        let key = PartitionKey::for_group(&saved, PartitionSource::Owned);
        fs::create_dir_all(store.host_dir("github.com")).unwrap();
        fs::write(key.path(store.root()), r#"{"repositories": [{"name""#).unwrap();

        let mut reads = 0;
        let result = read_with_retry(|| {
            reads += 1;
            let read = store.load_partition(&key);
            if reads == 1 {
                // The writer's rename lands between the first and second read.
                store.save(&saved, PartitionSource::Owned).unwrap();
            }
            read
        });

        assert_eq!(result.unwrap(), Some(saved));
        assert_eq!(reads, 2);
    }

    #[test]
    fn test_persistently_corrupt_partition_fails_after_retries() {
        let temp_dir = TempDir::new().unwrap();
        let store = CacheStore::new(temp_dir.path());
        let key = PartitionKey::for_group(&group("github.com", "o", &["a"]), PartitionSource::Owned);
        fs::create_dir_all(store.host_dir("github.com")).unwrap();
        fs::write(key.path(store.root()), "{not json").unwrap();

        let mut reads = 0;
        let result = read_with_retry(|| {
            reads += 1;
            store.load_partition(&key)
        });

        assert!(matches!(result, Err(GhpickError::CacheDecode { .. })));
        assert_eq!(reads, READ_ATTEMPTS);
    }

    #[test]
    fn test_load_all_without_cache_dir() {
        let temp_dir = TempDir::new().unwrap();
        let store = CacheStore::new(temp_dir.path().join("missing"));
        let loaded = store.load_all().unwrap();
        assert!(loaded.groups.is_empty());
        assert!(loaded.failures.is_empty());
    }

    #[test]
    fn test_metadata_uninitialized_then_saved() {
        let temp_dir = TempDir::new().unwrap();
        let store = CacheStore::new(temp_dir.path());
        assert!(!store.exists());
        assert_eq!(store.load_metadata().unwrap(), None);

        let mut identities = BTreeMap::new();
        identities.insert("github.com".to_string(), "octocat".to_string());
        let metadata = CacheMetadata::new(Utc::now(), identities);
        store.save_metadata(&metadata).unwrap();

        assert!(store.exists());
        let loaded = store.load_metadata().unwrap().unwrap();
        assert_eq!(loaded, metadata);
        assert!(loaded.is_self("github.com", "octocat"));
        assert!(!loaded.is_self("github.com", "rust-lang"));
        assert!(!loaded.is_self("ghe.example.com", "octocat"));
    }

    #[test]
    fn test_corrupt_metadata_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let store = CacheStore::new(temp_dir.path());
        fs::write(metadata_path(temp_dir.path()), "garbage").unwrap();
        assert!(matches!(
            store.load_metadata(),
            Err(GhpickError::CacheDecode { .. })
        ));
    }

    #[test]
    fn test_clear_all() {
        let temp_dir = TempDir::new().unwrap();
        let store = CacheStore::new(temp_dir.path().join("cache"));
        store
            .save(&group("github.com", "o", &["a"]), PartitionSource::Owned)
            .unwrap();
        store
            .save_metadata(&CacheMetadata::new(Utc::now(), BTreeMap::new()))
            .unwrap();

        store.clear_all().unwrap();
        assert!(!store.root().exists());
        assert!(!store.exists());
        // Clearing twice is fine.
        store.clear_all().unwrap();
    }

    #[test]
    fn test_is_stale() {
        let now = Utc::now();
        let hour = Duration::from_secs(3600);

        assert!(is_stale(None, hour, now));
        assert!(is_stale(Some(now - chrono::Duration::seconds(3601)), hour, now));
        assert!(!is_stale(Some(now - chrono::Duration::seconds(60)), hour, now));
        assert!(!is_stale(Some(now), hour, now));
        assert!(!is_stale(Some(now + chrono::Duration::seconds(60)), hour, now));
        assert!(is_stale(
            Some(now - chrono::Duration::milliseconds(5)),
            Duration::ZERO,
            now
        ));
    }
}
