//! Run configuration.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::error::{ManifestError, Result};
use crate::executor::{FailurePolicy, ProvisioningTool, TerraformCli, DEFAULT_TOOL};
use crate::manifest::{generate_holder_id, FileManifestStore};
use crate::workspace::{TemplateWorkspace, DEFAULT_WORKSPACE_ROOT};

/// Environment variable overriding the workspace root.
pub const ENV_PROJECTS_DIR: &str = "TOPO_PROJECTS_DIR";
/// Environment variable overriding the tool binary.
pub const ENV_TOOL: &str = "TOPO_TOOL";
/// Environment variable setting the per-invocation timeout in seconds.
pub const ENV_TIMEOUT_SECS: &str = "TOPO_TIMEOUT_SECS";

/// Everything a run needs to know, resolved once in `main`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    /// Path to the manifest file.
    pub manifest_path: PathBuf,
    /// Root directory for the template and per-provision copies.
    pub workspace_root: PathBuf,
    /// Provisioning tool binary.
    pub tool_binary: String,
    /// Re-fetch the template project.
    pub refresh_template: bool,
    /// Optional per-invocation time limit.
    pub invocation_timeout: Option<Duration>,
    /// How failed invocations affect provision state.
    pub failure_policy: FailurePolicy,
    /// Identifier written into the manifest lock.
    pub lock_holder: String,
}

/// Values given explicitly on the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOverrides {
    /// Workspace root.
    pub workspace_root: Option<PathBuf>,
    /// Tool binary.
    pub tool_binary: Option<String>,
    /// Timeout in seconds.
    pub timeout_secs: Option<u64>,
}

impl RunConfig {
    /// Creates a config for `manifest_path` with default settings.
    #[must_use]
    pub fn new(manifest_path: impl Into<PathBuf>) -> Self {
        Self {
            manifest_path: manifest_path.into(),
            workspace_root: PathBuf::from(DEFAULT_WORKSPACE_ROOT),
            tool_binary: String::from(DEFAULT_TOOL),
            refresh_template: false,
            invocation_timeout: None,
            failure_policy: FailurePolicy::default(),
            lock_holder: generate_holder_id(),
        }
    }

    /// Resolves a config: explicit overrides first, then environment, then defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if an environment value cannot be parsed.
    pub fn resolve(manifest_path: impl Into<PathBuf>, overrides: RunOverrides) -> Result<Self> {
        let mut config = Self::new(manifest_path);

        if let Some(root) = overrides
            .workspace_root
            .or_else(|| env_value(ENV_PROJECTS_DIR).map(PathBuf::from))
        {
            config.workspace_root = root;
        }

        if let Some(tool) = overrides.tool_binary.or_else(|| env_value(ENV_TOOL)) {
            config.tool_binary = tool;
        }

        let timeout_secs = match overrides.timeout_secs {
            Some(secs) => Some(secs),
            None => env_value(ENV_TIMEOUT_SECS)
                .map(|raw| {
                    raw.trim().parse::<u64>().map_err(|e| {
                        ManifestError::validation(
                            format!("invalid {ENV_TIMEOUT_SECS} '{raw}': {e}"),
                            ENV_TIMEOUT_SECS,
                        )
                    })
                })
                .transpose()?,
        };
        config.invocation_timeout = timeout_secs.filter(|s| *s > 0).map(Duration::from_secs);

        Ok(config)
    }

    /// Sets the workspace root.
    #[must_use]
    pub fn with_workspace_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.workspace_root = root.into();
        self
    }

    /// Sets the tool binary.
    #[must_use]
    pub fn with_tool_binary(mut self, binary: impl Into<String>) -> Self {
        self.tool_binary = binary.into();
        self
    }

    /// Sets whether the template is re-fetched.
    #[must_use]
    pub const fn with_refresh_template(mut self, refresh: bool) -> Self {
        self.refresh_template = refresh;
        self
    }

    /// Sets the per-invocation time limit.
    #[must_use]
    pub const fn with_invocation_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.invocation_timeout = timeout;
        self
    }

    /// Sets the failure policy.
    #[must_use]
    pub const fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Directory containing the manifest, used to find `.env`.
    #[must_use]
    pub fn manifest_dir(&self) -> &Path {
        manifest_dir(&self.manifest_path)
    }

    /// Builds the manifest store.
    #[must_use]
    pub fn store(&self) -> FileManifestStore {
        FileManifestStore::new(&self.manifest_path)
    }

    /// Builds the workspace provider.
    #[must_use]
    pub fn workspace(&self) -> TemplateWorkspace {
        TemplateWorkspace::new(&self.workspace_root).with_refresh(self.refresh_template)
    }

    /// Builds the provisioning tool.
    #[must_use]
    pub fn tool(&self) -> Arc<dyn ProvisioningTool> {
        Arc::new(TerraformCli::new(&self.tool_binary).with_timeout(self.invocation_timeout))
    }
}

/// Directory containing `manifest_path`; `.` for a bare file name.
#[must_use]
pub fn manifest_dir(manifest_path: &Path) -> &Path {
    match manifest_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

fn env_value(name: &str) -> Option<String> {
    let value = std::env::var(name).ok().filter(|v| !v.trim().is_empty())?;
    debug!("Using {name} from environment");
    Some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RunConfig::new("topo.yaml");
        assert_eq!(config.workspace_root, PathBuf::from("./projects"));
        assert_eq!(config.tool_binary, "terraform");
        assert!(!config.refresh_template);
        assert_eq!(config.invocation_timeout, None);
        assert_eq!(config.failure_policy, FailurePolicy::Record);
        assert!(!config.lock_holder.is_empty());
    }

    #[test]
    fn test_overrides_win() {
        let config = RunConfig::resolve(
            "topo.yaml",
            RunOverrides {
                workspace_root: Some(PathBuf::from("/srv/projects")),
                tool_binary: Some(String::from("tofu")),
                timeout_secs: Some(30),
            },
        )
        .unwrap();

        assert_eq!(config.workspace_root, PathBuf::from("/srv/projects"));
        assert_eq!(config.tool_binary, "tofu");
        assert_eq!(config.invocation_timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_zero_timeout_means_none() {
        let config = RunConfig::resolve(
            "topo.yaml",
            RunOverrides {
                timeout_secs: Some(0),
                ..RunOverrides::default()
            },
        )
        .unwrap();
        assert_eq!(config.invocation_timeout, None);
    }

    #[test]
    fn test_builders() {
        let config = RunConfig::new("/etc/topo/topo.yaml")
            .with_workspace_root("/tmp/w")
            .with_tool_binary("tofu")
            .with_refresh_template(true)
            .with_invocation_timeout(Some(Duration::from_secs(5)))
            .with_failure_policy(FailurePolicy::Hold);

        assert!(config.refresh_template);
        assert_eq!(config.failure_policy, FailurePolicy::Hold);
        assert_eq!(config.manifest_dir(), Path::new("/etc/topo"));
        assert_eq!(config.store().path(), Path::new("/etc/topo/topo.yaml"));
        assert_eq!(config.workspace().root(), Path::new("/tmp/w"));
    }

    #[test]
    fn test_manifest_dir_for_bare_name() {
        assert_eq!(manifest_dir(Path::new("topo.yaml")), Path::new("."));
    }
}
