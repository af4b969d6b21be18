//! Checksummed backup creation, validation, restore and retention.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::backup::BackupError;

/// Backup file suffix inside the backup directory.
const BACKUP_SUFFIX: &str = ".backup";
/// Sidecar file carrying metadata the filesystem cannot.
const INDEX_FILE: &str = "index.json";

/// Metadata for one backup. Immutable after creation except for deletion,
/// which removes the whole record and the underlying file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupInfo {
    pub id: String,
    pub name: String,
    pub path: PathBuf,
    pub original_path: PathBuf,
    pub created_at: DateTime<Utc>,
    pub size: u64,
    /// SHA-256 over the backup file's bytes, computed once at create time.
    pub checksum: String,
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub automatic: bool,
}

/// Aggregates derived from the current index; no side effects.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BackupStats {
    pub total_backups: usize,
    pub total_size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oldest_backup: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub newest_backup: Option<DateTime<Utc>>,
    pub automatic_backups: usize,
    pub manual_backups: usize,
}

/// Integrity-checked backup registry over one backup directory.
///
/// Reads vastly outnumber writes, so the index sits behind a
/// reader/writer lock.
pub struct BackupManager {
    backup_dir: PathBuf,
    max_backups: usize,
    index: RwLock<HashMap<String, BackupInfo>>,
}

impl BackupManager {
    /// Open the backup directory, creating it if needed, and rebuild the
    /// index by scanning it.
    pub fn new(backup_dir: impl Into<PathBuf>, max_backups: usize) -> Result<Self, BackupError> {
        let backup_dir = backup_dir.into();
        fs::create_dir_all(&backup_dir)
            .map_err(|e| BackupError::io("failed to create backup directory", e))?;

        let manager = Self {
            backup_dir,
            max_backups: max_backups.max(1),
            index: RwLock::new(HashMap::new()),
        };
        manager.rebuild_index()?;
        Ok(manager)
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    /// Create a backup of `source`.
    ///
    /// Identical inputs within the same second resolve to the same id and
    /// return the existing record instead of duplicating the file.
    pub fn create_backup(
        &self,
        source: &Path,
        name: Option<&str>,
        description: &str,
        tags: Vec<String>,
        automatic: bool,
    ) -> Result<BackupInfo, BackupError> {
        if !source.is_file() {
            return Err(BackupError::FileNotFound(source.to_path_buf()));
        }

        let created_at = Utc::now();
        let id = generate_backup_id(source, name, created_at);

        let mut index = self.index.write().expect("backup index lock poisoned");
        if let Some(existing) = index.get(&id) {
            tracing::info!(id = %id, path = %existing.path.display(), "backup already exists");
            return Ok(existing.clone());
        }

        let backup_path = self.backup_dir.join(format!("{}{}", id, BACKUP_SUFFIX));
        copy_file(source, &backup_path)
            .map_err(|e| BackupError::io("failed to copy file for backup", e))?;

        let checksum = compute_checksum(&backup_path)
            .map_err(|e| BackupError::io("failed to checksum backup", e))?;
        let size = fs::metadata(&backup_path)
            .map_err(|e| BackupError::io("failed to stat backup file", e))?
            .len();

        let info = BackupInfo {
            id: id.clone(),
            name: name
                .map(str::to_string)
                .unwrap_or_else(|| file_base_name(source)),
            path: backup_path,
            original_path: source.to_path_buf(),
            created_at,
            size,
            checksum,
            description: description.to_string(),
            tags,
            automatic,
        };

        index.insert(id.clone(), info.clone());
        self.enforce_retention(&mut index);
        self.persist_index(&index);

        tracing::info!(
            id = %info.id,
            path = %info.path.display(),
            size = info.size,
            automatic = info.automatic,
            "backup created"
        );
        Ok(info)
    }

    /// Restore a backup to `target`, defaulting to the recorded original
    /// path. The checksum is verified before anything touches the target.
    pub fn restore_backup(
        &self,
        backup_id: &str,
        target: Option<&Path>,
    ) -> Result<PathBuf, BackupError> {
        let info = self
            .get_backup(backup_id)
            .ok_or_else(|| BackupError::NotFound(backup_id.to_string()))?;

        if !info.path.is_file() {
            return Err(BackupError::FileNotFound(info.path.clone()));
        }

        if !info.checksum.is_empty() {
            let actual = compute_checksum(&info.path)
                .map_err(|e| BackupError::io("failed to checksum backup", e))?;
            if actual != info.checksum {
                tracing::error!(
                    id = %info.id,
                    expected = %info.checksum,
                    actual = %actual,
                    "backup corrupted, refusing to restore"
                );
                return Err(BackupError::ChecksumMismatch {
                    expected: info.checksum.clone(),
                    actual,
                });
            }
        }

        let target = match target {
            Some(path) => path.to_path_buf(),
            None if info.original_path.as_os_str().is_empty() => {
                return Err(BackupError::NoTargetPath(info.id.clone()))
            }
            None => info.original_path.clone(),
        };

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| BackupError::io("failed to create target directory", e))?;
        }
        copy_file(&info.path, &target).map_err(|e| BackupError::io("failed to restore file", e))?;

        tracing::info!(id = %info.id, target = %target.display(), "backup restored");
        Ok(target)
    }

    /// Remove the backup file (tolerating one already gone) and drop the
    /// index entry.
    pub fn delete_backup(&self, backup_id: &str) -> Result<(), BackupError> {
        let mut index = self.index.write().expect("backup index lock poisoned");
        let info = index
            .remove(backup_id)
            .ok_or_else(|| BackupError::NotFound(backup_id.to_string()))?;

        if let Err(e) = fs::remove_file(&info.path) {
            if e.kind() != io::ErrorKind::NotFound {
                tracing::warn!(path = %info.path.display(), error = %e, "failed to delete backup file");
            }
        }
        self.persist_index(&index);

        tracing::info!(id = %backup_id, "backup deleted");
        Ok(())
    }

    /// Snapshot ordered newest-first. Recomputed on each call.
    pub fn list_backups(&self) -> Vec<BackupInfo> {
        let index = self.index.read().expect("backup index lock poisoned");
        let mut backups: Vec<BackupInfo> = index.values().cloned().collect();
        backups.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        backups
    }

    pub fn get_backup(&self, backup_id: &str) -> Option<BackupInfo> {
        self.index
            .read()
            .expect("backup index lock poisoned")
            .get(backup_id)
            .cloned()
    }

    /// Check existence, exact size, and checksum against recorded values.
    pub fn validate_backup(&self, backup_id: &str) -> Result<(), BackupError> {
        let info = self
            .get_backup(backup_id)
            .ok_or_else(|| BackupError::NotFound(backup_id.to_string()))?;

        let metadata = match fs::metadata(&info.path) {
            Ok(m) => m,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(BackupError::FileNotFound(info.path.clone()))
            }
            Err(e) => return Err(BackupError::io("failed to access backup file", e)),
        };

        if metadata.len() != info.size {
            return Err(BackupError::SizeMismatch {
                expected: info.size,
                actual: metadata.len(),
            });
        }

        if !info.checksum.is_empty() {
            let actual = compute_checksum(&info.path)
                .map_err(|e| BackupError::io("failed to checksum backup", e))?;
            if actual != info.checksum {
                return Err(BackupError::ChecksumMismatch {
                    expected: info.checksum,
                    actual,
                });
            }
        }

        Ok(())
    }

    /// Aggregate counters derived from the current index.
    pub fn backup_stats(&self) -> BackupStats {
        let index = self.index.read().expect("backup index lock poisoned");
        let mut stats = BackupStats {
            total_backups: index.len(),
            ..BackupStats::default()
        };

        for info in index.values() {
            stats.total_size += info.size;
            if info.automatic {
                stats.automatic_backups += 1;
            } else {
                stats.manual_backups += 1;
            }
            if stats.oldest_backup.map_or(true, |t| info.created_at < t) {
                stats.oldest_backup = Some(info.created_at);
            }
            if stats.newest_backup.map_or(true, |t| info.created_at > t) {
                stats.newest_backup = Some(info.created_at);
            }
        }

        stats
    }

    /// Evict oldest-first until the count is back at the limit. Caller
    /// holds the write lock.
    fn enforce_retention(&self, index: &mut HashMap<String, BackupInfo>) {
        while index.len() > self.max_backups {
            let oldest = index
                .values()
                .min_by_key(|info| info.created_at)
                .map(|info| info.id.clone());
            let Some(id) = oldest else { break };
            if let Some(info) = index.remove(&id) {
                tracing::info!(id = %id, created_at = %info.created_at, "evicting old backup");
                if let Err(e) = fs::remove_file(&info.path) {
                    if e.kind() != io::ErrorKind::NotFound {
                        tracing::warn!(path = %info.path.display(), error = %e, "failed to delete evicted backup");
                    }
                }
            }
        }
    }

    /// Write the sidecar index. Failures are logged, not fatal: the scan
    /// can always rebuild everything except the sidecar-only metadata.
    fn persist_index(&self, index: &HashMap<String, BackupInfo>) {
        let entries: Vec<&BackupInfo> = index.values().collect();
        let payload = match serde_json::to_string_pretty(&entries) {
            Ok(p) => p,
            Err(e) => {
                tracing::error!(error = %e, "failed to encode backup index");
                return;
            }
        };
        let path = self.backup_dir.join(INDEX_FILE);
        if let Err(e) = fs::write(&path, payload) {
            tracing::warn!(path = %path.display(), error = %e, "failed to persist backup index");
        }
    }

    /// Rebuild the index from a directory scan. The sidecar supplies
    /// metadata for files it knows; unknown files get entries derived
    /// from the filesystem; sidecar entries whose files vanished are
    /// dropped.
    fn rebuild_index(&self) -> Result<(), BackupError> {
        let mut sidecar: HashMap<String, BackupInfo> = HashMap::new();
        let index_path = self.backup_dir.join(INDEX_FILE);
        if index_path.is_file() {
            match fs::read_to_string(&index_path) {
                Ok(content) => match serde_json::from_str::<Vec<BackupInfo>>(&content) {
                    Ok(entries) => {
                        sidecar = entries.into_iter().map(|e| (e.id.clone(), e)).collect();
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "backup index unreadable, rebuilding from scan")
                    }
                },
                Err(e) => tracing::warn!(error = %e, "failed to read backup index"),
            }
        }

        let mut index = self.index.write().expect("backup index lock poisoned");
        let entries = fs::read_dir(&self.backup_dir)
            .map_err(|e| BackupError::io("failed to scan backup directory", e))?;

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(error = %e, "failed to read backup directory entry");
                    continue;
                }
            };
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            let Some(id) = name.strip_suffix(BACKUP_SUFFIX) else {
                continue;
            };

            if let Some(info) = sidecar.remove(id) {
                index.insert(id.to_string(), info);
                continue;
            }

            // No sidecar metadata: derive what the filesystem can tell us.
            let path = entry.path();
            let metadata = match fs::metadata(&path) {
                Ok(m) => m,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "failed to stat backup file");
                    continue;
                }
            };
            let checksum = match compute_checksum(&path) {
                Ok(c) => c,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "failed to checksum existing backup");
                    String::new()
                }
            };
            let created_at = metadata
                .modified()
                .map(DateTime::<Utc>::from)
                .unwrap_or_else(|_| Utc::now());

            index.insert(
                id.to_string(),
                BackupInfo {
                    id: id.to_string(),
                    name: name_from_id(id),
                    path,
                    original_path: PathBuf::new(),
                    created_at,
                    size: metadata.len(),
                    checksum,
                    description: String::new(),
                    tags: Vec::new(),
                    automatic: false,
                },
            );
        }

        tracing::info!(count = index.len(), "backup index loaded");
        Ok(())
    }
}

/// `{name|basename}-{YYYYMMDD-HHMMSS}-{sha256(source path)[..8]}`.
///
/// Content-derived id: identical inputs within the same second collide on
/// purpose, making create idempotent for them.
fn generate_backup_id(source: &Path, name: Option<&str>, created_at: DateTime<Utc>) -> String {
    let base = match name {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => file_base_name(source),
    };
    let timestamp = created_at.format("%Y%m%d-%H%M%S");
    let digest = Sha256::digest(source.as_os_str().as_encoded_bytes());
    let short_hash = &hex::encode(digest)[..8];
    format!("{}-{}-{}", base, timestamp, short_hash)
}

fn file_base_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "backup".to_string())
}

/// First id segment, mirroring how ids are generated.
fn name_from_id(id: &str) -> String {
    id.split('-').next().unwrap_or(id).to_string()
}

/// Byte-for-byte copy, synced to disk before returning.
fn copy_file(src: &Path, dst: &Path) -> io::Result<u64> {
    let mut reader = File::open(src)?;
    let mut writer = File::create(dst)?;
    let written = io::copy(&mut reader, &mut writer)?;
    writer.sync_all()?;
    Ok(written)
}

/// SHA-256 over the file's bytes, hex encoded.
fn compute_checksum(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backup_id_prefers_explicit_name() {
        let at = Utc::now();
        let id = generate_backup_id(Path::new("/etc/hosts"), Some("nightly"), at);
        assert!(id.starts_with("nightly-"));

        let id = generate_backup_id(Path::new("/etc/hosts"), None, at);
        assert!(id.starts_with("hosts-"));
    }

    #[test]
    fn backup_id_is_stable_within_a_second() {
        let at = Utc::now();
        let a = generate_backup_id(Path::new("/etc/hosts"), Some("n"), at);
        let b = generate_backup_id(Path::new("/etc/hosts"), Some("n"), at);
        assert_eq!(a, b);

        let c = generate_backup_id(Path::new("/etc/hosts"), Some("n"), at + chrono::Duration::seconds(1));
        assert_ne!(a, c);
    }

    #[test]
    fn stats_distinguish_automatic_and_manual() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("hosts");
        fs::write(&source, "127.0.0.1 localhost\n").unwrap();

        let manager = BackupManager::new(dir.path().join("backups"), 10).unwrap();
        manager
            .create_backup(&source, Some("auto"), "", Vec::new(), true)
            .unwrap();
        manager
            .create_backup(&source, Some("manual"), "", Vec::new(), false)
            .unwrap();

        let stats = manager.backup_stats();
        assert_eq!(stats.total_backups, 2);
        assert_eq!(stats.automatic_backups, 1);
        assert_eq!(stats.manual_backups, 1);
        assert!(stats.total_size > 0);
        assert!(stats.oldest_backup.is_some());
    }
}
