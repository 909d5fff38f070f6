//! Reconciler for provisioning runs.
//!
//! This module drives a complete run: it locks and loads the manifest,
//! prepares workspaces, qualifies provisions, executes the eligible ones and
//! writes every provision back with its new state.

use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::executor::{aggregate, ExecutionOutcome, FailurePolicy, FanOut, ProvisioningTool};
use crate::manifest::{ManifestStore, ManifestValidator, Provisions, LOCK_REFRESH_INTERVAL};
use crate::planner::{qualification, qualify, Qualification, SkipReason};
use crate::workspace::{configure_remote_states, WorkspaceProvider, WorkspaceReport};

/// Drives a provisioning run against a manifest store.
pub struct Reconciler<'a, S: ManifestStore, W: WorkspaceProvider> {
    /// Manifest store.
    store: &'a S,
    /// Working directory provider.
    workspace: &'a W,
    /// Provisioning tool.
    tool: Arc<dyn ProvisioningTool>,
    /// Failure handling.
    policy: FailurePolicy,
    /// Lock holder identifier.
    holder: String,
    /// How often the manifest lock is refreshed during a run.
    lock_refresh: Duration,
}

/// A provision left untouched by a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedProvision {
    /// Provision name.
    pub name: String,
    /// Why it was skipped.
    pub reason: SkipReason,
}

/// Result of a provisioning run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    /// Where the manifest was saved.
    pub manifest: String,
    /// Workspace preparation summary.
    pub workspace: WorkspaceReport,
    /// One outcome per executed provision.
    pub executed: Vec<ExecutionOutcome>,
    /// Provisions that were not executed.
    pub skipped: Vec<SkippedProvision>,
    /// Failed provisions whose state was held back.
    pub held: Vec<String>,
    /// Provisions whose remote state could not be configured.
    pub remote_state_failures: Vec<String>,
    /// Whether the run counts as successful.
    pub success: bool,
}

impl<'a, S: ManifestStore, W: WorkspaceProvider> Reconciler<'a, S, W> {
    /// Creates a new reconciler.
    #[must_use]
    pub fn new(store: &'a S, workspace: &'a W, tool: Arc<dyn ProvisioningTool>) -> Self {
        Self {
            store,
            workspace,
            tool,
            policy: FailurePolicy::default(),
            holder: String::new(),
            lock_refresh: LOCK_REFRESH_INTERVAL,
        }
    }

    /// Sets the failure policy.
    #[must_use]
    pub const fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Sets the identifier written into the manifest lock.
    #[must_use]
    pub fn with_holder(mut self, holder: impl Into<String>) -> Self {
        self.holder = holder.into();
        self
    }

    /// Sets how often the manifest lock is refreshed during a run.
    #[must_use]
    pub const fn with_lock_refresh(mut self, interval: Duration) -> Self {
        self.lock_refresh = interval;
        self
    }

    /// Performs a full run under the manifest lock.
    ///
    /// The lock is refreshed for as long as the run takes and released
    /// whether or not the run succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is held elsewhere, the manifest cannot be
    /// loaded or saved, or a workspace cannot be prepared.
    pub async fn run(&self) -> Result<RunReport> {
        let mut lock = self.store.acquire_lock(&self.holder).await?;

        let result = {
            let work = self.run_locked();
            tokio::pin!(work);

            let period = self.lock_refresh.max(Duration::from_millis(1));
            let mut heartbeat = tokio::time::interval(period);
            heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            heartbeat.tick().await;

            loop {
                tokio::select! {
                    result = &mut work => break result,
                    _ = heartbeat.tick() => match self.store.refresh_lock(&lock).await {
                        Ok(refreshed) => lock = refreshed,
                        Err(e) => warn!("Failed to refresh manifest lock {}: {e}", lock.lock_id),
                    },
                }
            }
        };

        if let Err(e) = self.store.release_lock(&lock.lock_id).await {
            warn!("Failed to release manifest lock {}: {e}", lock.lock_id);
        }

        result
    }

    async fn run_locked(&self) -> Result<RunReport> {
        info!("Starting provisioning run for {}", self.store.location());

        self.store.backup().await?;
        let mut manifest = self.store.load().await?;

        let validation = ManifestValidator::new()
            .validate(&manifest)
            .into_result()?;
        for warning in &validation.warnings {
            warn!("{warning}");
        }

        let workspace = self.workspace.prepare(&manifest).await?;

        let partition = qualify(std::mem::take(&mut manifest.provisions));
        info!(
            "{} provision(s) eligible, {} skipped",
            partition.eligible.len(),
            partition.skipped.len()
        );
        let skipped = skipped_provisions(&partition.skipped);

        let remote_state_failures = match manifest.remote_bucket() {
            Some(bucket) if !partition.eligible.is_empty() => {
                let targets: Vec<(String, PathBuf)> = partition
                    .eligible
                    .keys()
                    .map(|name| (name.clone(), self.workspace.provision_dir(name)))
                    .collect();
                configure_remote_states(Arc::clone(&self.tool), bucket, targets).await
            }
            _ => Vec::new(),
        };

        let stream =
            FanOut::new(Arc::clone(&self.tool)).execute(&partition.eligible, self.workspace)?;
        let aggregation = aggregate(stream, partition.eligible, self.policy).await?;

        manifest.provisions = merge(aggregation.provisions, partition.skipped);
        self.store.save(&manifest).await?;

        let failed = aggregation
            .outcomes
            .iter()
            .filter(|o| !o.status.is_success())
            .count();
        if failed > 0 {
            warn!("{failed} invocation(s) failed");
        }
        info!("Provisioning run complete");

        Ok(RunReport {
            manifest: self.store.location(),
            workspace,
            executed: aggregation.outcomes,
            skipped,
            success: aggregation.held.is_empty(),
            held: aggregation.held,
            remote_state_failures,
        })
    }
}

/// Joins updated eligible provisions with the skipped ones.
///
/// The two inputs come from one partition, so their names never overlap and
/// the result has exactly the original name set.
#[must_use]
pub fn merge(updated: Provisions, skipped: Provisions) -> Provisions {
    debug_assert!(
        updated.keys().all(|name| !skipped.contains_key(name)),
        "eligible and skipped provisions overlap"
    );

    let mut merged = updated;
    merged.extend(skipped);
    debug!("Merged {} provision(s)", merged.len());
    merged
}

fn skipped_provisions(skipped: &Provisions) -> Vec<SkippedProvision> {
    skipped
        .iter()
        .filter_map(|(name, provision)| match qualification(provision) {
            Qualification::Skipped(reason) => Some(SkippedProvision {
                name: name.clone(),
                reason,
            }),
            Qualification::Eligible => None,
        })
        .collect()
}

impl RunReport {
    /// Number of executed provisions whose invocation failed.
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.executed
            .iter()
            .filter(|o| !o.status.is_success())
            .count()
    }
}
