//! Provisioning plan preview.
//!
//! A plan is what a run would do with the manifest as it is now, without
//! cloning, spawning or writing anything.

use serde::Serialize;

use crate::manifest::{Action, Manifest, ProvisionState};

use super::args::tool_args;
use super::qualify::{qualification, Qualification};

/// What a run would do with a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProvisionPlan {
    /// Template repository the workspaces are built from.
    pub source_repo: String,
    /// Remote state bucket, if configured.
    pub remote_bucket: Option<String>,
    /// One entry per provision, in name order.
    pub entries: Vec<PlanEntry>,
}

/// A single provision in a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanEntry {
    /// Provision name.
    pub name: String,
    /// Requested action.
    pub action: Action,
    /// Recorded state.
    pub state: ProvisionState,
    /// Qualification decision.
    pub qualification: Qualification,
    /// Tool arguments for eligible provisions.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
}

impl ProvisionPlan {
    /// Builds the plan for `manifest`.
    #[must_use]
    pub fn from_manifest(manifest: &Manifest) -> Self {
        let entries = manifest
            .provisions
            .iter()
            .map(|(name, provision)| {
                let qualification = qualification(provision);
                let args = match (qualification, provision.action.executable()) {
                    (Qualification::Eligible, Some(action)) => {
                        tool_args(action, &provision.parameters)
                    }
                    _ => Vec::new(),
                };

                PlanEntry {
                    name: name.clone(),
                    action: provision.action.clone(),
                    state: provision.state,
                    qualification,
                    args,
                }
            })
            .collect();

        Self {
            source_repo: manifest.source_repo.clone(),
            remote_bucket: manifest.remote_bucket().map(str::to_string),
            entries,
        }
    }

    /// Number of provisions a run would execute.
    #[must_use]
    pub fn eligible_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.qualification == Qualification::Eligible)
            .count()
    }

    /// Number of provisions a run would leave untouched.
    #[must_use]
    pub fn skipped_count(&self) -> usize {
        self.entries.len() - self.eligible_count()
    }

    /// Returns true if a run would not execute anything.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.eligible_count() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::Provision;
    use crate::planner::SkipReason;

    #[test]
    fn test_plan_from_manifest() {
        let mut manifest = Manifest {
            source_repo: String::from("git@example.com:infra/ecs.git"),
            remote_backend_bucket: Some(String::from("bucket-topo")),
            ..Manifest::default()
        };
        manifest.provisions.insert(
            String::from("x"),
            Provision::new(Action::Apply).with_parameter("count", "2"),
        );
        manifest.provisions.insert(
            String::from("y"),
            Provision::new(Action::Destroy).with_state(ProvisionState::Destroyed),
        );

        let plan = ProvisionPlan::from_manifest(&manifest);

        assert_eq!(plan.eligible_count(), 1);
        assert_eq!(plan.skipped_count(), 1);
        assert!(!plan.is_noop());
        assert_eq!(plan.remote_bucket.as_deref(), Some("bucket-topo"));
        assert_eq!(plan.entries[0].args, ["apply", "-var", "count=2"]);
        assert_eq!(
            plan.entries[1].qualification,
            Qualification::Skipped(SkipReason::AlreadyDestroyed)
        );
        assert!(plan.entries[1].args.is_empty());
    }

    #[test]
    fn test_empty_plan_is_noop() {
        let plan = ProvisionPlan::from_manifest(&Manifest::default());
        assert!(plan.is_noop());
        assert!(plan.entries.is_empty());
    }
}
