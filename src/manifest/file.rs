//! File-based manifest store.
//!
//! The manifest lives in a single YAML file. A run keeps a `.bak` copy
//! beside it, saving replaces the file atomically, and a `.lock` file guards
//! against concurrent runs.

use async_trait::async_trait;
use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::error::{ManifestError, Result, TopoError};

use super::lock::{generate_holder_id, LockInfo, LOCK_EXPIRY};
use super::parser::ManifestParser;
use super::spec::Manifest;
use super::store::ManifestStore;

/// File-based manifest store.
#[derive(Debug, Clone)]
pub struct FileManifestStore {
    /// Path to the manifest file.
    path: PathBuf,
    /// Path to the backup copy.
    backup_path: PathBuf,
    /// Path to the lock file.
    lock_path: PathBuf,
    /// How long a lock stays valid without a refresh.
    lock_ttl: Duration,
    /// YAML parser.
    parser: ManifestParser,
}

impl FileManifestStore {
    /// Creates a store for the manifest at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let backup_path = sibling(&path, ".bak");
        let lock_path = sibling(&path, ".lock");

        Self {
            path,
            backup_path,
            lock_path,
            lock_ttl: LOCK_EXPIRY,
            parser: ManifestParser::new(),
        }
    }

    /// Sets how long a lock stays valid without a refresh.
    #[must_use]
    pub const fn with_lock_ttl(mut self, ttl: Duration) -> Self {
        self.lock_ttl = ttl;
        self
    }

    /// Path to the manifest file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path to the backup copy written by [`ManifestStore::backup`].
    #[must_use]
    pub fn backup_path(&self) -> &Path {
        &self.backup_path
    }

    /// Path to the lock file.
    #[must_use]
    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    /// Reads the lock file if it exists.
    async fn read_lock_file(&self) -> Result<Option<LockInfo>> {
        let content = match fs::read_to_string(&self.lock_path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(TopoError::Manifest(ManifestError::LockFailed {
                    message: format!("Failed to read lock file: {e}"),
                }));
            }
        };

        let lock_info: LockInfo = serde_json::from_str(&content).map_err(|e| {
            TopoError::Manifest(ManifestError::LockFailed {
                message: format!("Failed to parse lock file: {e}"),
            })
        })?;

        Ok(Some(lock_info))
    }

    fn serialize_lock(lock_info: &LockInfo) -> Result<String> {
        serde_json::to_string_pretty(lock_info).map_err(|e| {
            TopoError::Manifest(ManifestError::LockFailed {
                message: format!("Failed to serialize lock: {e}"),
            })
        })
    }

    /// Writes `lock_info` to a private staging file next to the lock.
    async fn stage_lock_file(&self, lock_info: &LockInfo) -> Result<PathBuf> {
        let content = Self::serialize_lock(lock_info)?;
        let staging = sibling(&self.lock_path, &format!(".{}", lock_info.lock_id));

        fs::write(&staging, content).await.map_err(|e| {
            TopoError::Manifest(ManifestError::LockFailed {
                message: format!("Failed to write lock file: {e}"),
            })
        })?;
        Ok(staging)
    }

    /// Publishes `lock_info` only if no lock file exists.
    ///
    /// The complete file is hard-linked into place, so readers never see a
    /// partial lock. Returns `false` if another lock is already there.
    async fn create_lock_file(&self, lock_info: &LockInfo) -> Result<bool> {
        let staging = self.stage_lock_file(lock_info).await?;
        let linked = fs::hard_link(&staging, &self.lock_path).await;

        if let Err(e) = fs::remove_file(&staging).await {
            warn!("Failed to remove {}: {e}", staging.display());
        }

        match linked {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(TopoError::Manifest(ManifestError::LockFailed {
                message: format!("Failed to create lock file: {e}"),
            })),
        }
    }

    /// Replaces the existing lock file with `lock_info`.
    async fn replace_lock_file(&self, lock_info: &LockInfo) -> Result<()> {
        let staging = self.stage_lock_file(lock_info).await?;
        fs::rename(&staging, &self.lock_path).await.map_err(|e| {
            TopoError::Manifest(ManifestError::LockFailed {
                message: format!("Failed to replace lock file: {e}"),
            })
        })
    }

    /// Deletes the lock file.
    async fn delete_lock_file(&self) -> Result<()> {
        match fs::remove_file(&self.lock_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(TopoError::Manifest(ManifestError::LockFailed {
                message: format!("Failed to delete lock file: {e}"),
            })),
        }
    }

    fn write_error(&self, message: String) -> TopoError {
        TopoError::Manifest(ManifestError::WriteFailed {
            path: self.path.clone(),
            message,
        })
    }
}

fn locked_by(existing: &LockInfo) -> TopoError {
    TopoError::Manifest(ManifestError::LockedByOther {
        holder: existing.holder.clone(),
        since: existing.acquired_at.to_rfc3339(),
    })
}

/// Returns `path` with `suffix` appended to its file name.
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

#[async_trait]
impl ManifestStore for FileManifestStore {
    async fn load(&self) -> Result<Manifest> {
        if !self.path.exists() {
            return Err(TopoError::Manifest(ManifestError::FileNotFound {
                path: self.path.clone(),
            }));
        }

        info!("Loading manifest from: {}", self.path.display());

        let content = fs::read_to_string(&self.path).await.map_err(|e| {
            TopoError::Manifest(ManifestError::ParseError {
                message: format!("Failed to read file: {e}"),
                location: Some(self.path.display().to_string()),
            })
        })?;

        self.parser.parse_yaml(&content, Some(&self.path))
    }

    async fn backup(&self) -> Result<()> {
        if !self.path.exists() {
            return Err(TopoError::Manifest(ManifestError::FileNotFound {
                path: self.path.clone(),
            }));
        }

        fs::copy(&self.path, &self.backup_path).await?;
        debug!("Manifest backed up to: {}", self.backup_path.display());
        Ok(())
    }

    async fn save(&self, manifest: &Manifest) -> Result<()> {
        info!("Saving manifest to: {}", self.path.display());

        let content = self.parser.to_yaml(manifest)?;

        // Write to a temporary file first, then rename for atomicity
        let temp_path = sibling(&self.path, ".tmp");

        let mut file = fs::File::create(&temp_path)
            .await
            .map_err(|e| self.write_error(format!("Failed to create temp file: {e}")))?;

        file.write_all(content.as_bytes())
            .await
            .map_err(|e| self.write_error(format!("Failed to write temp file: {e}")))?;

        file.sync_all()
            .await
            .map_err(|e| self.write_error(format!("Failed to sync temp file: {e}")))?;

        fs::rename(&temp_path, &self.path)
            .await
            .map_err(|e| self.write_error(format!("Failed to replace manifest: {e}")))?;

        debug!("Manifest saved:\n{content}");
        Ok(())
    }

    async fn acquire_lock(&self, holder: &str) -> Result<LockInfo> {
        let holder_id = if holder.is_empty() {
            generate_holder_id()
        } else {
            holder.to_string()
        };

        let lock_info = LockInfo::new(&holder_id, self.lock_ttl);

        // One retry, after clearing away an expired lock.
        for attempt in 0..2 {
            if self.create_lock_file(&lock_info).await? {
                info!(
                    "Acquired manifest lock: {} (expires in {}s)",
                    lock_info.lock_id,
                    lock_info.remaining_secs()
                );
                return Ok(lock_info);
            }

            match self.read_lock_file().await? {
                Some(existing) if attempt > 0 || !existing.is_expired() => {
                    return Err(locked_by(&existing));
                }
                Some(existing) => {
                    debug!("Expired lock {} found, taking over", existing.lock_id);
                    self.delete_lock_file().await?;
                }
                None => debug!("Lock released while acquiring, retrying"),
            }
        }

        Err(TopoError::Manifest(ManifestError::LockFailed {
            message: String::from("lock file changed hands while acquiring"),
        }))
    }

    async fn refresh_lock(&self, lock: &LockInfo) -> Result<LockInfo> {
        match self.read_lock_file().await? {
            Some(existing) if existing.lock_id == lock.lock_id => {
                let mut refreshed = existing;
                refreshed.refresh(self.lock_ttl);
                self.replace_lock_file(&refreshed).await?;
                debug!(
                    "Refreshed manifest lock {} (expires in {}s)",
                    refreshed.lock_id,
                    refreshed.remaining_secs()
                );
                Ok(refreshed)
            }
            Some(existing) => Err(locked_by(&existing)),
            None => Err(TopoError::Manifest(ManifestError::LockFailed {
                message: format!("lock {} is no longer held", lock.lock_id),
            })),
        }
    }

    async fn release_lock(&self, lock_id: &str) -> Result<()> {
        if let Some(existing) = self.read_lock_file().await? {
            if existing.lock_id == lock_id {
                self.delete_lock_file().await?;
                debug!("Released manifest lock: {lock_id}");
            } else {
                debug!(
                    "Lock ID mismatch: expected {lock_id}, found {}",
                    existing.lock_id
                );
            }
        }
        Ok(())
    }

    async fn force_unlock(&self) -> Result<Option<LockInfo>> {
        let existing = self.read_lock_file().await?;
        self.delete_lock_file().await?;
        Ok(existing)
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}
