//! Manifest specification types.
//!
//! This module defines the structs that map to a topo manifest file. The
//! manifest is both the desired state (each provision's `action`) and the
//! last recorded outcome (each provision's `state`).

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Provisions keyed by their unique name.
pub type Provisions = BTreeMap<String, Provision>;

/// The root structure of a topo manifest.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Manifest {
    /// URL of the template project repository.
    #[serde(rename = "tf_repo", alias = "source_repo", alias = "git_repo", default)]
    pub source_repo: String,
    /// Bucket holding remote tool state.
    #[serde(
        rename = "s3_bucket",
        alias = "remote_backend_bucket",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub remote_backend_bucket: Option<String>,
    /// Provisions under management.
    #[serde(default)]
    pub provisions: Provisions,
}

/// A single named unit of infrastructure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Provision {
    /// Operation requested for this run.
    #[serde(default)]
    pub action: Action,
    /// Last recorded outcome.
    #[serde(default, skip_serializing_if = "ProvisionState::is_unset")]
    pub state: ProvisionState,
    /// Variables handed verbatim to the provisioning tool.
    #[serde(
        default,
        deserialize_with = "deserialize_parameters",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub parameters: BTreeMap<String, String>,
}

/// Requested operation for a provision.
///
/// Anything other than `apply` or `destroy` is kept verbatim so the manifest
/// round-trips, and is never executed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Action {
    /// Create or update the infrastructure.
    Apply,
    /// Tear the infrastructure down.
    Destroy,
    /// Unrecognized action text.
    Unrecognized(String),
}

/// An action the provisioning tool can actually run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutableAction {
    /// `apply`.
    Apply,
    /// `destroy -force`.
    Destroy,
}

/// Last known outcome of a provision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ProvisionState {
    /// Never reconciled.
    #[default]
    Unset,
    /// Last run applied the provision.
    Applied,
    /// Last run destroyed the provision.
    Destroyed,
    /// Marked as changed outside of a run.
    Changed,
}

impl Default for Action {
    fn default() -> Self {
        Self::Unrecognized(String::new())
    }
}

impl From<String> for Action {
    fn from(s: String) -> Self {
        match s.as_str() {
            "apply" => Self::Apply,
            "destroy" => Self::Destroy,
            _ => Self::Unrecognized(s),
        }
    }
}

impl From<Action> for String {
    fn from(action: Action) -> Self {
        match action {
            Action::Apply => Self::from("apply"),
            Action::Destroy => Self::from("destroy"),
            Action::Unrecognized(raw) => raw,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Apply => write!(f, "apply"),
            Self::Destroy => write!(f, "destroy"),
            Self::Unrecognized(raw) => write!(f, "{raw:?}"),
        }
    }
}

impl Action {
    /// Returns the executable form of this action, if there is one.
    #[must_use]
    pub const fn executable(&self) -> Option<ExecutableAction> {
        match self {
            Self::Apply => Some(ExecutableAction::Apply),
            Self::Destroy => Some(ExecutableAction::Destroy),
            Self::Unrecognized(_) => None,
        }
    }
}

impl ExecutableAction {
    /// State recorded once this action has run.
    #[must_use]
    pub const fn target_state(self) -> ProvisionState {
        match self {
            Self::Apply => ProvisionState::Applied,
            Self::Destroy => ProvisionState::Destroyed,
        }
    }

    /// Leading tool arguments for this action.
    #[must_use]
    pub const fn subcommand(self) -> &'static [&'static str] {
        match self {
            Self::Apply => &["apply"],
            Self::Destroy => &["destroy", "-force"],
        }
    }
}

impl fmt::Display for ExecutableAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Apply => write!(f, "apply"),
            Self::Destroy => write!(f, "destroy"),
        }
    }
}

impl ProvisionState {
    /// Returns true if the provision has never been reconciled.
    #[must_use]
    pub const fn is_unset(&self) -> bool {
        matches!(self, Self::Unset)
    }

    /// Manifest spelling of this state.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unset => "",
            Self::Applied => "applied",
            Self::Destroyed => "destroyed",
            Self::Changed => "changed",
        }
    }
}

impl FromStr for ProvisionState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" => Ok(Self::Unset),
            "applied" => Ok(Self::Applied),
            "destroyed" => Ok(Self::Destroyed),
            "changed" => Ok(Self::Changed),
            other => Err(format!(
                "Invalid state: {other:?}. Expected: applied, destroyed, or changed"
            )),
        }
    }
}

impl fmt::Display for ProvisionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unset => write!(f, "unset"),
            other => write!(f, "{}", other.as_str()),
        }
    }
}

impl Serialize for ProvisionState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ProvisionState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        raw.as_deref()
            .map_or(Ok(Self::Unset), |s| s.parse().map_err(serde::de::Error::custom))
    }
}

/// Reads a parameter table, turning every scalar value into a string.
fn deserialize_parameters<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(mapping) = Option::<serde_yaml::Mapping>::deserialize(deserializer)? else {
        return Ok(BTreeMap::new());
    };

    mapping
        .into_iter()
        .map(|(key, value)| {
            let key = scalar_to_string(key).map_err(serde::de::Error::custom)?;
            let value = scalar_to_string(value)
                .map_err(|e| serde::de::Error::custom(format!("parameter '{key}': {e}")))?;
            Ok((key, value))
        })
        .collect()
}

fn scalar_to_string(value: serde_yaml::Value) -> Result<String, String> {
    match value {
        serde_yaml::Value::String(s) => Ok(s),
        serde_yaml::Value::Number(n) => Ok(n.to_string()),
        serde_yaml::Value::Bool(b) => Ok(b.to_string()),
        serde_yaml::Value::Null => Ok(String::new()),
        serde_yaml::Value::Sequence(_) | serde_yaml::Value::Mapping(_) => {
            Err(String::from("expected a scalar value"))
        }
        serde_yaml::Value::Tagged(tagged) => scalar_to_string(tagged.value),
    }
}

impl Provision {
    /// Creates a provision with the given action and no recorded state.
    #[must_use]
    pub fn new(action: Action) -> Self {
        Self {
            action,
            state: ProvisionState::Unset,
            parameters: BTreeMap::new(),
        }
    }

    /// Sets the recorded state.
    #[must_use]
    pub const fn with_state(mut self, state: ProvisionState) -> Self {
        self.state = state;
        self
    }

    /// Adds a tool variable.
    #[must_use]
    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }
}

impl Manifest {
    /// Returns the remote state bucket, treating an empty value as unset.
    #[must_use]
    pub fn remote_bucket(&self) -> Option<&str> {
        self.remote_backend_bucket
            .as_deref()
            .map(str::trim)
            .filter(|b| !b.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_from_string() {
        assert_eq!(Action::from(String::from("apply")), Action::Apply);
        assert_eq!(Action::from(String::from("destroy")), Action::Destroy);
        assert_eq!(
            Action::from(String::from("plan")),
            Action::Unrecognized(String::from("plan"))
        );
    }

    #[test]
    fn test_action_match_is_exact() {
        assert_eq!(
            Action::from(String::from(" apply")),
            Action::Unrecognized(String::from(" apply"))
        );
        assert_eq!(
            Action::from(String::from("Destroy")),
            Action::Unrecognized(String::from("Destroy"))
        );
    }

    #[test]
    fn test_unrecognized_action_round_trips_verbatim() {
        let raw: String = Action::Unrecognized(String::from("Apply!")).into();
        assert_eq!(raw, "Apply!");
    }

    #[test]
    fn test_executable_action_targets() {
        assert_eq!(ExecutableAction::Apply.target_state(), ProvisionState::Applied);
        assert_eq!(ExecutableAction::Destroy.target_state(), ProvisionState::Destroyed);
        assert_eq!(ExecutableAction::Destroy.subcommand(), &["destroy", "-force"]);
        assert!(Action::Unrecognized(String::new()).executable().is_none());
    }

    #[test]
    fn test_state_parse() {
        assert_eq!("".parse::<ProvisionState>(), Ok(ProvisionState::Unset));
        assert_eq!("applied".parse::<ProvisionState>(), Ok(ProvisionState::Applied));
        assert!("gone".parse::<ProvisionState>().is_err());
        assert!("Applied".parse::<ProvisionState>().is_err());
        assert!(" destroyed".parse::<ProvisionState>().is_err());
    }

    #[test]
    fn test_parameters_read_as_strings() {
        let yaml = r"
action: apply
parameters:
  desired_service_count: 3
  spot: true
  ratio: 0.5
  name: jenkins
";
        let provision: Provision = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(provision.state, ProvisionState::Unset);
        assert_eq!(provision.parameters["desired_service_count"], "3");
        assert_eq!(provision.parameters["spot"], "true");
        assert_eq!(provision.parameters["ratio"], "0.5");
        assert_eq!(provision.parameters["name"], "jenkins");
    }

    #[test]
    fn test_nested_parameter_rejected() {
        let yaml = r"
action: apply
parameters:
  tags: [a, b]
";
        assert!(serde_yaml::from_str::<Provision>(yaml).is_err());
    }

    #[test]
    fn test_unset_state_not_serialized() {
        let provision = Provision::new(Action::Apply);
        let yaml = serde_yaml::to_string(&provision).unwrap();
        assert_eq!(yaml.trim(), "action: apply");
    }

    #[test]
    fn test_remote_bucket_empty_is_none() {
        let manifest = Manifest {
            remote_backend_bucket: Some(String::from("  ")),
            ..Manifest::default()
        };
        assert!(manifest.remote_bucket().is_none());
    }
}
