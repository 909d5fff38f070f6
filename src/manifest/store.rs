//! Manifest store trait definition.
//!
//! This module defines the interface the reconciler uses to read, back up,
//! lock and persist a manifest.

use async_trait::async_trait;

use crate::error::Result;

use super::lock::LockInfo;
use super::spec::Manifest;

/// Trait for manifest storage backends.
#[async_trait]
pub trait ManifestStore: Send + Sync {
    /// Loads and parses the manifest.
    async fn load(&self) -> Result<Manifest>;

    /// Keeps a copy of the manifest as it is before the run touches it.
    async fn backup(&self) -> Result<()>;

    /// Replaces the stored manifest with `manifest`.
    async fn save(&self, manifest: &Manifest) -> Result<()>;

    /// Acquires the run lock.
    ///
    /// Returns lock information if successful.
    async fn acquire_lock(&self, holder: &str) -> Result<LockInfo>;

    /// Extends a held lock's expiry, returning the refreshed lock.
    ///
    /// Fails if `lock` no longer owns the manifest.
    async fn refresh_lock(&self, lock: &LockInfo) -> Result<LockInfo>;

    /// Releases the run lock if `lock_id` still owns it.
    async fn release_lock(&self, lock_id: &str) -> Result<()>;

    /// Removes any lock regardless of owner, returning what was removed.
    async fn force_unlock(&self) -> Result<Option<LockInfo>>;

    /// Human-readable location of the manifest.
    fn location(&self) -> String;
}
