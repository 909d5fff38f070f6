//! Remote state backend configuration.

use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::executor::ProvisioningTool;
use crate::planner::remote_state_args;

/// Points each target's working directory at its remote state in `bucket`.
///
/// Runs concurrently. Failures are logged and returned by name, never fatal.
pub async fn configure_remote_states(
    tool: Arc<dyn ProvisioningTool>,
    bucket: &str,
    targets: Vec<(String, PathBuf)>,
) -> Vec<String> {
    let mut tasks = JoinSet::new();

    for (name, workdir) in targets {
        let tool = Arc::clone(&tool);
        let args = remote_state_args(bucket, &name);
        tasks.spawn(async move {
            info!("Configuring remote state for: {name}");
            let status = tool.run(&workdir, &args).await;
            (name, status)
        });
    }

    let mut failed = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((_, status)) if status.is_success() => {}
            Ok((name, status)) => {
                warn!("Remote state configuration failed for {name}: {status}");
                failed.push(name);
            }
            Err(e) => warn!("Remote state task failed: {e}"),
        }
    }

    failed.sort();
    failed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{InvocationStatus, MockProvisioningTool};

    #[tokio::test]
    async fn test_failures_are_reported_not_fatal() {
        let mut tool = MockProvisioningTool::new();
        tool.expect_run()
            .times(2)
            .returning(|workdir, args| {
                assert_eq!(args[..2], ["remote", "config"]);
                if workdir.ends_with("b") {
                    InvocationStatus::Failed { code: Some(1) }
                } else {
                    InvocationStatus::Succeeded
                }
            });

        let failed = configure_remote_states(
            Arc::new(tool),
            "bucket-topo",
            vec![
                (String::from("a"), PathBuf::from("/w/a")),
                (String::from("b"), PathBuf::from("/w/b")),
            ],
        )
        .await;

        assert_eq!(failed, vec![String::from("b")]);
    }

    #[tokio::test]
    async fn test_no_targets() {
        let mut tool = MockProvisioningTool::new();
        tool.expect_run().never();
        let failed = configure_remote_states(Arc::new(tool), "bucket", Vec::new()).await;
        assert!(failed.is_empty());
    }
}
