pub mod models;

use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use anyhow::{bail, Context, Result};
use chrono::Utc;
use log::{info, warn};

pub use models::LockedAppRecord;
use models::{apply_delta, clamp_seconds, LockFile};

type LockMap = HashMap<String, LockedAppRecord>;

struct StoreInner {
    path: Option<PathBuf>,
    data: RwLock<LockMap>,
}

/// Durable keyed record of lock configuration and remaining time.
///
/// Every mutation runs its read-modify-write and the file write under one
/// write guard, so concurrent callers never interleave on a record and the
/// file always reflects a state that existed in memory.
#[derive(Clone)]
pub struct LockStore {
    inner: Arc<StoreInner>,
}

impl LockStore {
    /// Opens the store backed by `path`. A missing or corrupt file yields an
    /// empty store.
    pub fn open(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("failed to create lock store directory {}", parent.display())
                })?;
            }
        }

        let data = load_locks(&path);
        info!("Loaded {} lock record(s) from {}", data.len(), path.display());

        Ok(Self {
            inner: Arc::new(StoreInner {
                path: Some(path),
                data: RwLock::new(data),
            }),
        })
    }

    /// Store without a backing file.
    pub fn in_memory() -> Self {
        Self {
            inner: Arc::new(StoreInner {
                path: None,
                data: RwLock::new(HashMap::new()),
            }),
        }
    }

    pub fn get(&self, package: &str) -> Option<LockedAppRecord> {
        self.read().get(package).cloned()
    }

    pub fn list(&self) -> Vec<LockedAppRecord> {
        let mut records: Vec<_> = self.read().values().cloned().collect();
        records.sort_by(|a, b| a.package.cmp(&b.package));
        records
    }

    /// Creates the lock or updates its rate, preserving any remaining time.
    pub fn set_lock(&self, package: &str, minutes_per_rep: u32) -> Result<LockedAppRecord> {
        if minutes_per_rep < 1 {
            bail!("minutes per rep must be at least 1 (got {minutes_per_rep})");
        }

        let mut guard = self.write();
        let record = guard
            .entry(package.to_string())
            .and_modify(|existing| {
                existing.minutes_per_rep = minutes_per_rep;
                existing.updated_at = Utc::now();
            })
            .or_insert_with(|| LockedAppRecord::new(package, minutes_per_rep))
            .clone();
        self.persist(&guard)?;
        Ok(record)
    }

    /// Removes the lock. Absent packages are a no-op.
    pub fn remove_lock(&self, package: &str) -> Result<()> {
        let mut guard = self.write();
        if guard.remove(package).is_none() {
            return Ok(());
        }
        self.persist(&guard)
    }

    /// Adds `seconds` (which may be negative) to the remaining time, clamping
    /// at zero. Returns the new value, or `None` when the package is not locked.
    pub fn grant_seconds(&self, package: &str, seconds: i64) -> Result<Option<u32>> {
        self.mutate_remaining(package, |current| apply_delta(current, seconds))
    }

    pub fn set_remaining_seconds(&self, package: &str, seconds: i64) -> Result<Option<u32>> {
        self.mutate_remaining(package, |_| clamp_seconds(seconds))
    }

    fn mutate_remaining(
        &self,
        package: &str,
        update: impl FnOnce(u32) -> u32,
    ) -> Result<Option<u32>> {
        let mut guard = self.write();
        let Some(record) = guard.get_mut(package) else {
            return Ok(None);
        };
        record.remaining_seconds = update(record.remaining_seconds);
        record.updated_at = Utc::now();
        let remaining = record.remaining_seconds;
        self.persist(&guard)?;
        Ok(Some(remaining))
    }

    fn persist(&self, data: &LockMap) -> Result<()> {
        let Some(path) = self.inner.path.as_deref() else {
            return Ok(());
        };

        let mut locks: Vec<_> = data.values().cloned().collect();
        locks.sort_by(|a, b| a.package.cmp(&b.package));
        let serialized = serde_json::to_string_pretty(&LockFile { locks })?;

        // Write beside the target and rename over it, so a crash mid-write
        // leaves either the old file or the new one.
        let staging = staging_path(path);
        fs::write(&staging, serialized)
            .with_context(|| format!("Failed to write lock store to {}", staging.display()))?;
        fs::rename(&staging, path)
            .with_context(|| format!("Failed to replace lock store at {}", path.display()))
    }

    fn read(&self) -> RwLockReadGuard<'_, LockMap> {
        self.inner
            .data
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, LockMap> {
        self.inner
            .data
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

fn load_locks(path: &Path) -> LockMap {
    if !path.exists() {
        return HashMap::new();
    }

    let parsed = fs::read_to_string(path)
        .map_err(anyhow::Error::from)
        .and_then(|contents| serde_json::from_str::<LockFile>(&contents).map_err(Into::into));

    match parsed {
        Ok(file) => file
            .locks
            .into_iter()
            .filter(|record| record.minutes_per_rep >= 1)
            .map(|record| (record.package.clone(), record))
            .collect(),
        Err(err) => {
            warn!(
                "Lock store at {} is unreadable, starting empty: {err}",
                path.display()
            );
            HashMap::new()
        }
    }
}
