//! Planning module for provisioning runs.
//!
//! This module decides which provisions run this time and what the
//! provisioning tool is asked to do for each of them.

mod args;
mod plan;
mod qualify;

pub use args::{remote_state_args, tool_args, ToolInvocation};
pub use plan::{PlanEntry, ProvisionPlan};
pub use qualify::{qualification, qualify, Partition, Qualification, SkipReason};
