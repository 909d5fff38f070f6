//! Execution of the provisioning tool.
//!
//! This module provides:
//! - The [`ProvisioningTool`] seam and its command-line implementation
//! - The concurrent fan-out over eligible provisions
//! - Aggregation of outcomes back into provision states

mod fanout;
mod tool;

pub use fanout::{aggregate, Aggregation, ExecutionOutcome, FailurePolicy, FanOut, OutcomeStream};
pub use tool::{InvocationStatus, ProvisioningTool, TerraformCli, DEFAULT_TOOL};

#[cfg(test)]
pub use tool::MockProvisioningTool;
