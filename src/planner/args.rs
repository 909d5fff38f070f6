//! Provisioning tool argument construction.

use std::collections::BTreeMap;

use crate::error::{ExecutionError, Result, TopoError};
use crate::manifest::{ExecutableAction, Provision};

/// A fully planned tool invocation for one provision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocation {
    /// Provision name; also the working directory name.
    pub name: String,
    /// Action being executed.
    pub action: ExecutableAction,
    /// Arguments passed to the tool.
    pub args: Vec<String>,
}

/// Builds the argument list for `action` with one `-var key=value` pair per parameter.
#[must_use]
pub fn tool_args(action: ExecutableAction, parameters: &BTreeMap<String, String>) -> Vec<String> {
    let subcommand = action.subcommand();
    let mut args = Vec::with_capacity(subcommand.len() + parameters.len() * 2);

    args.extend(subcommand.iter().map(|s| (*s).to_string()));
    for (key, value) in parameters {
        args.push(String::from("-var"));
        args.push(format!("{key}={value}"));
    }

    args
}

/// Arguments pointing the tool at the S3 remote state for `name`.
#[must_use]
pub fn remote_state_args(bucket: &str, name: &str) -> Vec<String> {
    vec![
        String::from("remote"),
        String::from("config"),
        String::from("-backend=s3"),
        String::from("-backend-config"),
        format!("bucket={bucket}"),
        String::from("-backend-config"),
        format!("key={name}/terraform.tfstate"),
    ]
}

impl ToolInvocation {
    /// Plans the invocation for an eligible provision.
    ///
    /// # Errors
    ///
    /// Returns an error if the provision's action cannot be executed.
    pub fn for_provision(name: &str, provision: &Provision) -> Result<Self> {
        let action = provision.action.executable().ok_or_else(|| {
            TopoError::Execution(ExecutionError::NotExecutable {
                name: name.to_string(),
                action: provision.action.to_string(),
            })
        })?;

        Ok(Self {
            name: name.to_string(),
            action,
            args: tool_args(action, &provision.parameters),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::{Action, ProvisionState};

    fn var_pairs(args: &[String]) -> Vec<(String, String)> {
        let mut pairs: Vec<(String, String)> = args
            .windows(2)
            .filter(|w| w[0] == "-var")
            .map(|w| (w[0].clone(), w[1].clone()))
            .collect();
        pairs.sort();
        pairs
    }

    #[test]
    fn test_destroy_args() {
        let provision = Provision::new(Action::Destroy)
            .with_parameter("a", "1")
            .with_parameter("b", "2");

        let invocation = ToolInvocation::for_provision("p", &provision).unwrap();

        assert_eq!(invocation.action, ExecutableAction::Destroy);
        assert_eq!(&invocation.args[..2], ["destroy", "-force"]);
        assert_eq!(invocation.args.len(), 6);
        assert_eq!(
            var_pairs(&invocation.args),
            vec![
                (String::from("-var"), String::from("a=1")),
                (String::from("-var"), String::from("b=2")),
            ]
        );
    }

    #[test]
    fn test_apply_args() {
        let provision = Provision::new(Action::Apply)
            .with_state(ProvisionState::Changed)
            .with_parameter("desired_service_count", "2")
            .with_parameter("desired_instance_capacity", "1")
            .with_parameter("max_instance_size", "1");

        let invocation = ToolInvocation::for_provision("jenkins_2", &provision).unwrap();

        assert_eq!(invocation.args[0], "apply");
        assert_eq!(invocation.args.len(), 7);
        for binding in [
            "desired_service_count=2",
            "desired_instance_capacity=1",
            "max_instance_size=1",
        ] {
            assert_eq!(invocation.args.iter().filter(|a| *a == binding).count(), 1);
        }
    }

    #[test]
    fn test_args_without_parameters() {
        assert_eq!(tool_args(ExecutableAction::Apply, &BTreeMap::new()), ["apply"]);
    }

    #[test]
    fn test_unrecognized_action_not_executable() {
        let provision = Provision::new(Action::Unrecognized(String::from("plan")));
        let err = ToolInvocation::for_provision("p", &provision).unwrap_err();
        assert!(matches!(
            err,
            TopoError::Execution(ExecutionError::NotExecutable { .. })
        ));
    }

    #[test]
    fn test_remote_state_args() {
        let args = remote_state_args("bucket-topo", "jenkins_1");
        assert_eq!(args[..3], ["remote", "config", "-backend=s3"]);
        assert!(args.contains(&String::from("bucket=bucket-topo")));
        assert!(args.contains(&String::from("key=jenkins_1/terraform.tfstate")));
    }
}
