//! Manifest parser and serializer.
//!
//! This module turns YAML text into a [`Manifest`] and back. Reading and
//! writing files is the job of the store; the parser only deals in text.

use std::path::Path;
use tracing::debug;

use crate::error::{ManifestError, Result, TopoError};

use super::spec::Manifest;

/// Parser for topo manifests.
#[derive(Debug, Default, Clone, Copy)]
pub struct ManifestParser;

impl ManifestParser {
    /// Creates a new manifest parser.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Parses a manifest from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid or does not match the schema.
    pub fn parse_yaml(&self, content: &str, source: Option<&Path>) -> Result<Manifest> {
        debug!("Parsing YAML manifest");

        let manifest: Manifest = serde_yaml::from_str(content).map_err(|e| {
            TopoError::Manifest(ManifestError::ParseError {
                message: format!("YAML parse error: {e}"),
                location: source.map(|p| p.display().to_string()),
            })
        })?;

        debug!(
            "Parsed manifest with {} provisions",
            manifest.provisions.len()
        );
        Ok(manifest)
    }

    /// Serializes a manifest to YAML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_yaml(&self, manifest: &Manifest) -> Result<String> {
        serde_yaml::to_string(manifest).map_err(|e| {
            TopoError::Manifest(ManifestError::serialization(format!(
                "Failed to serialize manifest: {e}"
            )))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::spec::{Action, ProvisionState};

    const JENKINS: &str = r"
tf_repo: https://github.com/shuaibiyy/ecs-jenkins.git
s3_bucket: bucket-topo

provisions:

  jenkins_1:
    action: apply
    parameters:
      desired_service_count: 3
      desired_instance_capacity: 2
      max_instance_size: 2

  jenkins_2:
    action: destroy
    state: changed
";

    #[test]
    fn test_parse_manifest() {
        let manifest = ManifestParser::new().parse_yaml(JENKINS, None).unwrap();

        assert_eq!(
            manifest.source_repo,
            "https://github.com/shuaibiyy/ecs-jenkins.git"
        );
        assert_eq!(manifest.remote_bucket(), Some("bucket-topo"));
        assert_eq!(manifest.provisions.len(), 2);

        let jenkins_1 = &manifest.provisions["jenkins_1"];
        assert_eq!(jenkins_1.action, Action::Apply);
        assert_eq!(jenkins_1.state, ProvisionState::Unset);
        assert_eq!(jenkins_1.parameters["desired_service_count"], "3");
        assert_eq!(jenkins_1.parameters["max_instance_size"], "2");

        let jenkins_2 = &manifest.provisions["jenkins_2"];
        assert_eq!(jenkins_2.action, Action::Destroy);
        assert_eq!(jenkins_2.state, ProvisionState::Changed);
        assert!(jenkins_2.parameters.is_empty());
    }

    #[test]
    fn test_parse_aliases() {
        let yaml = r"
source_repo: https://example.com/template.git
remote_backend_bucket: states
provisions: {}
";
        let manifest = ManifestParser::new().parse_yaml(yaml, None).unwrap();
        assert_eq!(manifest.source_repo, "https://example.com/template.git");
        assert_eq!(manifest.remote_bucket(), Some("states"));
        assert!(manifest.provisions.is_empty());
    }

    #[test]
    fn test_parse_missing_provisions() {
        let manifest = ManifestParser::new()
            .parse_yaml("tf_repo: https://example.com/t.git\n", None)
            .unwrap();
        assert!(manifest.provisions.is_empty());
        assert!(manifest.remote_backend_bucket.is_none());
    }

    #[test]
    fn test_parse_unknown_state_is_error() {
        let yaml = r"
provisions:
  a:
    action: apply
    state: exploded
";
        let err = ManifestParser::new().parse_yaml(yaml, None).unwrap_err();
        assert!(matches!(
            err,
            TopoError::Manifest(ManifestError::ParseError { .. })
        ));
    }

    #[test]
    fn test_parse_unknown_action_is_kept() {
        let yaml = r"
provisions:
  a:
    action: recreate
";
        let manifest = ManifestParser::new().parse_yaml(yaml, None).unwrap();
        assert_eq!(
            manifest.provisions["a"].action,
            Action::Unrecognized(String::from("recreate"))
        );

        let out = ManifestParser::new().to_yaml(&manifest).unwrap();
        assert!(out.contains("action: recreate"));
    }

    #[test]
    fn test_serialize_round_trip() {
        let parser = ManifestParser::new();
        let manifest = parser.parse_yaml(JENKINS, None).unwrap();
        let yaml = parser.to_yaml(&manifest).unwrap();
        let reparsed = parser.parse_yaml(&yaml, None).unwrap();
        assert_eq!(manifest, reparsed);
        assert!(!yaml.contains("state: ''"));
    }
}
