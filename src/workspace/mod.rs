//! Per-provision working directories.
//!
//! Every provision runs the tool in its own copy of a shared template
//! project, so concurrent invocations never touch each other's files.

mod provider;
mod remote;
mod template;

pub use provider::{WorkspaceProvider, WorkspaceReport};
pub use remote::configure_remote_states;
pub use template::{TemplateWorkspace, DEFAULT_WORKSPACE_ROOT};
