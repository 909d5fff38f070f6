//! Provisioning tool invocation.
//!
//! The tool is only ever spawned and waited on. Its output goes straight to
//! the terminal and is never parsed; the exit status is the only thing
//! recorded.

use async_trait::async_trait;
use serde::Serialize;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info};

/// Default provisioning tool binary.
pub const DEFAULT_TOOL: &str = "terraform";

/// How a single tool invocation ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum InvocationStatus {
    /// Exited with status zero.
    Succeeded,
    /// Exited with a non-zero status, or was killed by a signal (`code` is `None`).
    Failed {
        /// Exit code, if any.
        code: Option<i32>,
    },
    /// The process could not be started or waited on.
    SpawnFailed {
        /// OS error description.
        message: String,
    },
    /// The invocation ran past its time limit and was killed.
    TimedOut {
        /// The limit that was exceeded.
        after_secs: u64,
    },
}

/// Something that can run the provisioning tool in a working directory.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProvisioningTool: Send + Sync {
    /// Runs the tool with `args` inside `workdir` and waits for it to finish.
    async fn run(&self, workdir: &Path, args: &[String]) -> InvocationStatus;
}

/// Runs a Terraform-compatible command-line binary.
#[derive(Debug, Clone)]
pub struct TerraformCli {
    /// Binary name or path.
    binary: String,
    /// Optional per-invocation time limit.
    timeout: Option<Duration>,
}

impl TerraformCli {
    /// Creates a runner for `binary` with no time limit.
    #[must_use]
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            timeout: None,
        }
    }

    /// Sets the per-invocation time limit.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for TerraformCli {
    fn default() -> Self {
        Self::new(DEFAULT_TOOL)
    }
}

#[async_trait]
impl ProvisioningTool for TerraformCli {
    async fn run(&self, workdir: &Path, args: &[String]) -> InvocationStatus {
        info!("{} {} (in {})", self.binary, args.join(" "), workdir.display());

        let spawned = Command::new(&self.binary)
            .args(args)
            .current_dir(workdir)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .spawn();

        let mut child = match spawned {
            Ok(child) => child,
            Err(e) => {
                return InvocationStatus::SpawnFailed {
                    message: format!("failed to spawn '{}': {e}", self.binary),
                };
            }
        };

        let waited = match self.timeout {
            Some(limit) => {
                let bounded = tokio::time::timeout(limit, child.wait()).await;
                let Ok(waited) = bounded else {
                    if let Err(e) = child.kill().await {
                        debug!("Failed to kill timed out process: {e}");
                    }
                    return InvocationStatus::TimedOut {
                        after_secs: limit.as_secs(),
                    };
                };
                waited
            }
            None => child.wait().await,
        };

        match waited {
            Ok(status) if status.success() => InvocationStatus::Succeeded,
            Ok(status) => InvocationStatus::Failed {
                code: status.code(),
            },
            Err(e) => InvocationStatus::SpawnFailed {
                message: format!("wait failed: {e}"),
            },
        }
    }
}

impl InvocationStatus {
    /// Returns true if the tool exited successfully.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }
}

impl std::fmt::Display for InvocationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed { code: Some(code) } => write!(f, "exited with status {code}"),
            Self::Failed { code: None } => write!(f, "terminated by signal"),
            Self::SpawnFailed { message } => write!(f, "{message}"),
            Self::TimedOut { after_secs } => write!(f, "timed out after {after_secs}s"),
        }
    }
}
