//! Qualification filter.
//!
//! Decides which provisions are acted upon in the current run. The input
//! mapping is consumed and split into two fresh mappings, so every name ends
//! up in exactly one of them.

use serde::Serialize;
use std::fmt;
use tracing::{debug, warn};

use crate::manifest::{Action, Provision, ProvisionState, Provisions};

/// Outcome of qualifying a single provision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "decision", content = "reason")]
pub enum Qualification {
    /// The provision is executed this run.
    Eligible,
    /// The provision is left untouched this run.
    Skipped(SkipReason),
}

/// Why a provision was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// `apply` requested and already applied.
    AlreadyApplied,
    /// `destroy` requested and already destroyed.
    AlreadyDestroyed,
    /// `destroy` requested on a resource marked changed; it needs a fresh apply first.
    ChangedResource,
    /// The action is neither `apply` nor `destroy`.
    UnrecognizedAction,
}

/// Provisions split by qualification.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Partition {
    /// Provisions to execute.
    pub eligible: Provisions,
    /// Provisions carried through unchanged.
    pub skipped: Provisions,
}

/// Qualifies a single provision.
#[must_use]
pub fn qualification(provision: &Provision) -> Qualification {
    use ProvisionState::{Applied, Changed, Destroyed, Unset};

    match (&provision.action, provision.state) {
        (Action::Unrecognized(_), _) => Qualification::Skipped(SkipReason::UnrecognizedAction),
        (Action::Apply | Action::Destroy, Unset) => Qualification::Eligible,
        (Action::Apply, Applied) => Qualification::Skipped(SkipReason::AlreadyApplied),
        (Action::Destroy, Destroyed) => Qualification::Skipped(SkipReason::AlreadyDestroyed),
        (Action::Destroy, Changed) => Qualification::Skipped(SkipReason::ChangedResource),
        (Action::Apply, Destroyed | Changed) | (Action::Destroy, Applied) => {
            Qualification::Eligible
        }
    }
}

/// Splits `provisions` into those to execute and those to skip.
#[must_use]
pub fn qualify(provisions: Provisions) -> Partition {
    let mut partition = Partition::default();

    for (name, provision) in provisions {
        match qualification(&provision) {
            Qualification::Eligible => {
                debug!(
                    "Provision {name} is eligible ({} from {})",
                    provision.action, provision.state
                );
                partition.eligible.insert(name, provision);
            }
            Qualification::Skipped(reason) => {
                if reason == SkipReason::UnrecognizedAction {
                    warn!("Skipping {name}: unrecognized action {}", provision.action);
                } else {
                    debug!("Skipping {name}: {reason}");
                }
                partition.skipped.insert(name, provision);
            }
        }
    }

    partition
}

impl Partition {
    /// Total number of provisions in both halves.
    #[must_use]
    pub fn len(&self) -> usize {
        self.eligible.len() + self.skipped.len()
    }

    /// Returns true if there are no provisions at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.eligible.is_empty() && self.skipped.is_empty()
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyApplied => write!(f, "already applied"),
            Self::AlreadyDestroyed => write!(f, "already destroyed"),
            Self::ChangedResource => {
                write!(f, "changed resource must be re-applied before destroy")
            }
            Self::UnrecognizedAction => write!(f, "unrecognized action"),
        }
    }
}

impl fmt::Display for Qualification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Eligible => write!(f, "execute"),
            Self::Skipped(reason) => write!(f, "skip ({reason})"),
        }
    }
}
