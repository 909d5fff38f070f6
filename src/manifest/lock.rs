//! Manifest locking.
//!
//! A run rewrites the whole manifest at the end, so two runs against the same
//! file would silently drop each other's state updates. The lock file next to
//! the manifest keeps them apart.
//!
//! A lock only lives for [`LOCK_EXPIRY`] unless its holder keeps refreshing
//! it, so a crashed run cannot block the manifest forever while a long one
//! keeps it for as long as it needs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// How long a lock stays valid without a refresh.
pub const LOCK_EXPIRY: Duration = Duration::from_secs(300); // 5 minutes

/// How often a running reconciliation refreshes its lock.
pub const LOCK_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

/// Information about a manifest lock.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LockInfo {
    /// Unique lock identifier.
    pub lock_id: String,
    /// Who holds the lock.
    pub holder: String,
    /// When the lock was acquired.
    pub acquired_at: DateTime<Utc>,
    /// When the lock expires.
    pub expires_at: DateTime<Utc>,
}

impl LockInfo {
    /// Creates a new lock info valid for `ttl`.
    #[must_use]
    pub fn new(holder: &str, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            lock_id: Uuid::new_v4().to_string(),
            holder: holder.to_string(),
            acquired_at: now,
            expires_at: now + to_chrono(ttl),
        }
    }

    /// Checks if the lock has expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }

    /// Pushes the expiry time to `ttl` from now.
    pub fn refresh(&mut self, ttl: Duration) {
        self.expires_at = Utc::now() + to_chrono(ttl);
    }

    /// Returns the remaining time until expiry in seconds.
    #[must_use]
    pub fn remaining_secs(&self) -> i64 {
        let remaining = self.expires_at - Utc::now();
        remaining.num_seconds().max(0)
    }
}

fn to_chrono(ttl: Duration) -> chrono::Duration {
    chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::days(365))
}

/// Generates a unique holder identifier for the current process.
#[must_use]
pub fn generate_holder_id() -> String {
    let hostname = hostname::get()
        .map_or_else(|_| String::from("unknown"), |h| h.to_string_lossy().to_string());

    let pid = std::process::id();
    let uuid = &Uuid::new_v4().to_string()[..8];

    format!("{hostname}-{pid}-{uuid}")
}
