//! Concurrent execution of eligible provisions and aggregation of outcomes.
//!
//! [`FanOut::execute`] dispatches one task per eligible provision and hands
//! back an [`OutcomeStream`]. [`aggregate`] is the only join point: it
//! receives exactly one outcome per dispatched provision and moves each
//! provision to its new state.

use serde::{Serialize, Serializer};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::error::{ExecutionError, Result, TopoError};
use crate::manifest::{ExecutableAction, Provisions};
use crate::planner::ToolInvocation;
use crate::workspace::WorkspaceProvider;

use super::tool::{InvocationStatus, ProvisioningTool};

/// What happens to a provision whose invocation did not succeed.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, serde::Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Advance the state anyway and report the failure.
    #[default]
    Record,
    /// Keep the state the provision had before the run and fail the run.
    Hold,
}

/// The result of running the tool for one provision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionOutcome {
    /// Provision name.
    pub name: String,
    /// Action that was executed.
    pub action: ExecutableAction,
    /// How the invocation ended.
    pub status: InvocationStatus,
    /// Wall-clock time of the invocation.
    #[serde(rename = "duration_ms", serialize_with = "serialize_millis")]
    pub duration: Duration,
}

/// Outcomes of a dispatched fan-out, in arrival order.
#[derive(Debug)]
pub struct OutcomeStream {
    receiver: mpsc::Receiver<ExecutionOutcome>,
    expected: usize,
    workers: JoinSet<()>,
}

/// Updated eligible provisions plus everything needed to report on them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aggregation {
    /// Eligible provisions with their post-run states.
    pub provisions: Provisions,
    /// One outcome per dispatched provision, sorted by name.
    pub outcomes: Vec<ExecutionOutcome>,
    /// Failed provisions whose state was held back.
    pub held: Vec<String>,
}

/// Dispatches tool invocations, one task per eligible provision.
#[derive(Clone)]
pub struct FanOut {
    tool: Arc<dyn ProvisioningTool>,
}

impl FanOut {
    /// Creates a fan-out over `tool`.
    #[must_use]
    pub fn new(tool: Arc<dyn ProvisioningTool>) -> Self {
        Self { tool }
    }

    /// Starts one invocation per eligible provision and returns immediately.
    ///
    /// Every invocation is planned before anything is spawned. Must be
    /// called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if an eligible provision's action is not executable.
    pub fn execute(
        &self,
        eligible: &Provisions,
        workspace: &dyn WorkspaceProvider,
    ) -> Result<OutcomeStream> {
        let invocations = eligible
            .iter()
            .map(|(name, provision)| ToolInvocation::for_provision(name, provision))
            .collect::<Result<Vec<_>>>()?;

        let expected = invocations.len();
        // tokio rejects a zero-capacity channel.
        let (sender, receiver) = mpsc::channel(expected.max(1));
        let mut workers = JoinSet::new();

        info!("Dispatching {expected} provisioning invocation(s)");

        for invocation in invocations {
            let tool = Arc::clone(&self.tool);
            let sender = sender.clone();
            let workdir = workspace.provision_dir(&invocation.name);

            workers.spawn(async move {
                let started = Instant::now();
                let status = tool.run(&workdir, &invocation.args).await;
                let outcome = ExecutionOutcome {
                    name: invocation.name,
                    action: invocation.action,
                    status,
                    duration: started.elapsed(),
                };
                if sender.send(outcome).await.is_err() {
                    debug!("Outcome receiver dropped");
                }
            });
        }
        drop(sender);

        Ok(OutcomeStream {
            receiver,
            expected,
            workers,
        })
    }
}

impl std::fmt::Debug for FanOut {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FanOut").finish_non_exhaustive()
    }
}

impl OutcomeStream {
    /// Number of outcomes this stream will deliver.
    #[must_use]
    pub const fn expected(&self) -> usize {
        self.expected
    }
}

/// Collects exactly one outcome per dispatched provision and updates `eligible`.
///
/// A successful `Apply` moves the provision to `Applied`, a successful
/// `Destroy` to `Destroyed`. Failures are handled per `policy`.
///
/// # Errors
///
/// Returns an error if workers stop reporting before every outcome arrived.
pub async fn aggregate(
    mut stream: OutcomeStream,
    mut eligible: Provisions,
    policy: FailurePolicy,
) -> Result<Aggregation> {
    let expected = stream.expected;
    let mut outcomes = Vec::with_capacity(expected);
    let mut held = Vec::new();

    while outcomes.len() < expected {
        let Some(outcome) = stream.receiver.recv().await else {
            return Err(TopoError::Execution(ExecutionError::WorkerLost {
                expected,
                missing: expected - outcomes.len(),
            }));
        };

        match eligible.get_mut(&outcome.name) {
            Some(provision) => {
                if outcome.status.is_success() {
                    info!("Done: {} {}", outcome.action, outcome.name);
                    provision.state = outcome.action.target_state();
                } else if policy == FailurePolicy::Hold {
                    warn!(
                        "{} {} failed ({}), keeping state {}",
                        outcome.action, outcome.name, outcome.status, provision.state
                    );
                    held.push(outcome.name.clone());
                } else {
                    warn!("{} {} failed: {}", outcome.action, outcome.name, outcome.status);
                    provision.state = outcome.action.target_state();
                }
            }
            None => warn!("Ignoring outcome for unknown provision: {}", outcome.name),
        }

        outcomes.push(outcome);
    }

    while let Some(joined) = stream.workers.join_next().await {
        if let Err(e) = joined {
            debug!("Worker finished abnormally after reporting: {e}");
        }
    }

    outcomes.sort_by(|a, b| a.name.cmp(&b.name));
    held.sort();

    Ok(Aggregation {
        provisions: eligible,
        outcomes,
        held,
    })
}

fn serialize_millis<S: Serializer>(
    duration: &Duration,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::MockProvisioningTool;
    use crate::manifest::{Action, Manifest, Provision, ProvisionState};
    use crate::workspace::WorkspaceReport;
    use async_trait::async_trait;
    use std::path::PathBuf;

    struct FixedWorkspace;

    #[async_trait]
    impl WorkspaceProvider for FixedWorkspace {
        async fn prepare(&self, _manifest: &Manifest) -> Result<WorkspaceReport> {
            Ok(WorkspaceReport::default())
        }

        fn provision_dir(&self, name: &str) -> PathBuf {
            PathBuf::from("/work").join(name)
        }
    }

    fn succeeding_tool(times: usize) -> Arc<dyn ProvisioningTool> {
        let mut tool = MockProvisioningTool::new();
        tool.expect_run()
            .times(times)
            .returning(|_, _| InvocationStatus::Succeeded);
        Arc::new(tool)
    }

    fn provisions(entries: &[(&str, Action, ProvisionState)]) -> Provisions {
        entries
            .iter()
            .map(|(name, action, state)| {
                ((*name).to_string(), Provision::new(action.clone()).with_state(*state))
            })
            .collect()
    }

    async fn run(
        tool: Arc<dyn ProvisioningTool>,
        eligible: Provisions,
        policy: FailurePolicy,
    ) -> Aggregation {
        let stream = FanOut::new(tool).execute(&eligible, &FixedWorkspace).unwrap();
        aggregate(stream, eligible, policy).await.unwrap()
    }

    #[tokio::test]
    async fn test_one_invocation_per_eligible() {
        let eligible = provisions(&[
            ("a", Action::Apply, ProvisionState::Unset),
            ("b", Action::Destroy, ProvisionState::Applied),
            ("c", Action::Apply, ProvisionState::Changed),
        ]);

        let aggregation = run(succeeding_tool(3), eligible, FailurePolicy::Record).await;

        let names: Vec<_> = aggregation.outcomes.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, ["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_empty_eligible_returns_immediately() {
        let stream = FanOut::new(succeeding_tool(0))
            .execute(&Provisions::new(), &FixedWorkspace)
            .unwrap();
        assert_eq!(stream.expected(), 0);

        let aggregation = tokio::time::timeout(
            Duration::from_secs(5),
            aggregate(stream, Provisions::new(), FailurePolicy::Record),
        )
        .await
        .unwrap()
        .unwrap();

        assert!(aggregation.provisions.is_empty());
        assert!(aggregation.outcomes.is_empty());
    }

    #[tokio::test]
    async fn test_state_transitions() {
        let eligible = provisions(&[
            ("a", Action::Apply, ProvisionState::Changed),
            ("b", Action::Destroy, ProvisionState::Unset),
        ]);

        let aggregation = run(succeeding_tool(2), eligible, FailurePolicy::Record).await;

        assert_eq!(aggregation.provisions["a"].state, ProvisionState::Applied);
        assert_eq!(aggregation.provisions["b"].state, ProvisionState::Destroyed);
        assert_eq!(aggregation.provisions["a"].action, Action::Apply);
        assert!(aggregation.held.is_empty());
    }

    #[tokio::test]
    async fn test_invocation_uses_provision_dir_and_args() {
        let mut tool = MockProvisioningTool::new();
        tool.expect_run()
            .withf(|workdir, args| {
                workdir == PathBuf::from("/work/p").as_path()
                    && args.first().map(String::as_str) == Some("destroy")
                    && args.contains(&String::from("a=1"))
            })
            .times(1)
            .returning(|_, _| InvocationStatus::Succeeded);

        let eligible: Provisions = [(
            String::from("p"),
            Provision::new(Action::Destroy).with_parameter("a", "1"),
        )]
        .into_iter()
        .collect();

        let aggregation = run(Arc::new(tool), eligible, FailurePolicy::Record).await;
        assert_eq!(aggregation.outcomes[0].action, ExecutableAction::Destroy);
    }

    fn failing_b_tool() -> Arc<dyn ProvisioningTool> {
        let mut tool = MockProvisioningTool::new();
        tool.expect_run().times(2).returning(|workdir, _| {
            if workdir.ends_with("b") {
                InvocationStatus::Failed { code: Some(1) }
            } else {
                InvocationStatus::Succeeded
            }
        });
        Arc::new(tool)
    }

    #[tokio::test]
    async fn test_record_policy_advances_failed() {
        let eligible = provisions(&[
            ("a", Action::Apply, ProvisionState::Unset),
            ("b", Action::Apply, ProvisionState::Changed),
        ]);

        let aggregation = run(failing_b_tool(), eligible, FailurePolicy::Record).await;

        assert_eq!(aggregation.provisions["b"].state, ProvisionState::Applied);
        assert!(aggregation.held.is_empty());
        assert!(!aggregation.outcomes[1].status.is_success());
    }

    #[tokio::test]
    async fn test_hold_policy_keeps_failed_state() {
        let eligible = provisions(&[
            ("a", Action::Apply, ProvisionState::Unset),
            ("b", Action::Apply, ProvisionState::Changed),
        ]);

        let aggregation = run(failing_b_tool(), eligible, FailurePolicy::Hold).await;

        assert_eq!(aggregation.provisions["a"].state, ProvisionState::Applied);
        assert_eq!(aggregation.provisions["b"].state, ProvisionState::Changed);
        assert_eq!(aggregation.held, vec![String::from("b")]);
    }

    #[tokio::test]
    async fn test_unrecognized_action_fails_before_spawning() {
        let mut tool = MockProvisioningTool::new();
        tool.expect_run().never();

        let eligible = provisions(&[
            ("a", Action::Apply, ProvisionState::Unset),
            ("z", Action::Unrecognized(String::from("plan")), ProvisionState::Unset),
        ]);

        let err = FanOut::new(Arc::new(tool))
            .execute(&eligible, &FixedWorkspace)
            .unwrap_err();
        assert!(matches!(
            err,
            TopoError::Execution(ExecutionError::NotExecutable { .. })
        ));
    }

    #[tokio::test]
    async fn test_lost_worker_is_an_error() {
        let (sender, receiver) = mpsc::channel(2);
        drop(sender);
        let stream = OutcomeStream {
            receiver,
            expected: 2,
            workers: JoinSet::new(),
        };

        let err = aggregate(stream, Provisions::new(), FailurePolicy::Record)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TopoError::Execution(ExecutionError::WorkerLost { expected: 2, missing: 2 })
        ));
    }

    fn timing_out_b_tool() -> Arc<dyn ProvisioningTool> {
        let mut tool = MockProvisioningTool::new();
        tool.expect_run().times(2).returning(|workdir, _| {
            if workdir.ends_with("b") {
                InvocationStatus::TimedOut { after_secs: 30 }
            } else {
                InvocationStatus::Succeeded
            }
        });
        Arc::new(tool)
    }

    #[tokio::test]
    async fn test_timed_out_invocation_follows_policy() {
        let eligible = provisions(&[
            ("a", Action::Apply, ProvisionState::Unset),
            ("b", Action::Destroy, ProvisionState::Applied),
        ]);

        let recorded = run(timing_out_b_tool(), eligible.clone(), FailurePolicy::Record).await;
        assert_eq!(recorded.provisions["a"].state, ProvisionState::Applied);
        assert_eq!(recorded.provisions["b"].state, ProvisionState::Destroyed);
        assert!(recorded.held.is_empty());
        assert_eq!(
            recorded.outcomes[1].status,
            InvocationStatus::TimedOut { after_secs: 30 }
        );

        let held = run(timing_out_b_tool(), eligible, FailurePolicy::Hold).await;
        assert_eq!(held.provisions["a"].state, ProvisionState::Applied);
        assert_eq!(held.provisions["b"].state, ProvisionState::Applied);
        assert_eq!(held.held, vec![String::from("b")]);
        assert_eq!(held.outcomes.len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_outcome_counts_but_changes_nothing() {
        let (sender, receiver) = mpsc::channel(2);
        for name in ["ghost", "a"] {
            sender
                .send(ExecutionOutcome {
                    name: String::from(name),
                    action: ExecutableAction::Apply,
                    status: InvocationStatus::Succeeded,
                    duration: Duration::ZERO,
                })
                .await
                .unwrap();
        }
        let stream = OutcomeStream {
            receiver,
            expected: 2,
            workers: JoinSet::new(),
        };
        let eligible = provisions(&[
            ("a", Action::Apply, ProvisionState::Unset),
            ("b", Action::Apply, ProvisionState::Changed),
        ]);

        // The sender stays open, so completion relies on the count alone.
        let aggregation = tokio::time::timeout(
            Duration::from_secs(5),
            aggregate(stream, eligible, FailurePolicy::Record),
        )
        .await
        .unwrap()
        .unwrap();
        drop(sender);

        let names: Vec<_> = aggregation.provisions.keys().map(String::as_str).collect();
        assert_eq!(names, ["a", "b"]);
        assert_eq!(aggregation.provisions["a"].state, ProvisionState::Applied);
        assert_eq!(aggregation.provisions["b"].state, ProvisionState::Changed);
        assert_eq!(aggregation.outcomes.len(), 2);
        assert_eq!(aggregation.outcomes[1].name, "ghost");
    }

    #[test]
    fn test_outcome_serializes_millis() {
        let outcome = ExecutionOutcome {
            name: String::from("a"),
            action: ExecutableAction::Apply,
            status: InvocationStatus::Succeeded,
            duration: Duration::from_millis(1500),
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["duration_ms"], 1500);
        assert_eq!(json["action"], "apply");
        assert_eq!(json["status"]["status"], "succeeded");
    }
}
