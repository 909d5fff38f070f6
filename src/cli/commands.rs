//! CLI command definitions.
//!
//! This module defines all CLI commands and their arguments using clap.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use crate::config::RunOverrides;
use crate::executor::FailurePolicy;

/// Topo - Fan out Terraform over every provision in a manifest.
#[derive(Parser, Debug)]
#[command(name = "topo")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Execute every eligible provision and record the new states.
    Run {
        /// Path to the manifest file.
        manifest: PathBuf,

        /// Re-fetch the template project before copying.
        #[arg(short, long)]
        update: bool,

        /// Directory holding the template and per-provision copies [env: TOPO_PROJECTS_DIR].
        #[arg(long, value_name = "DIR")]
        projects_dir: Option<PathBuf>,

        /// Provisioning tool binary [env: TOPO_TOOL].
        #[arg(long, value_name = "BIN")]
        tool: Option<String>,

        /// Time limit for each invocation in seconds [env: TOPO_TIMEOUT_SECS].
        #[arg(long, value_name = "SECS")]
        timeout_secs: Option<u64>,

        /// What to do with provisions whose invocation fails.
        #[arg(long, value_enum, default_value = "record")]
        on_failure: FailurePolicy,
    },

    /// Show what a run would do without touching anything.
    Plan {
        /// Path to the manifest file.
        manifest: PathBuf,
    },

    /// Validate the manifest.
    Validate {
        /// Path to the manifest file.
        manifest: PathBuf,
    },

    /// Remove a stale manifest lock.
    Unlock {
        /// Path to the manifest file.
        manifest: PathBuf,
    },
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

impl Commands {
    /// Manifest path the command operates on.
    #[must_use]
    pub fn manifest(&self) -> &Path {
        match self {
            Self::Run { manifest, .. }
            | Self::Plan { manifest }
            | Self::Validate { manifest }
            | Self::Unlock { manifest } => manifest.as_path(),
        }
    }

    /// Command-line values that override environment and defaults.
    #[must_use]
    pub fn overrides(&self) -> RunOverrides {
        match self {
            Self::Run {
                projects_dir,
                tool,
                timeout_secs,
                ..
            } => RunOverrides {
                workspace_root: projects_dir.clone(),
                tool_binary: tool.clone(),
                timeout_secs: *timeout_secs,
            },
            _ => RunOverrides::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run() {
        let cli = Cli::try_parse_from([
            "topo",
            "--verbose",
            "run",
            "topo.yaml",
            "--update",
            "--projects-dir",
            "/srv/projects",
            "--timeout-secs",
            "600",
            "--on-failure",
            "hold",
        ])
        .unwrap();

        assert!(cli.verbose);
        assert_eq!(cli.output, OutputFormat::Text);
        assert_eq!(cli.command.manifest(), Path::new("topo.yaml"));

        let Commands::Run {
            update, on_failure, ..
        } = &cli.command
        else {
            panic!("expected run");
        };
        assert!(*update);
        assert_eq!(*on_failure, FailurePolicy::Hold);

        let overrides = cli.command.overrides();
        assert_eq!(overrides.workspace_root, Some(PathBuf::from("/srv/projects")));
        assert_eq!(overrides.tool_binary, None);
        assert_eq!(overrides.timeout_secs, Some(600));
    }

    #[test]
    fn test_parse_plan_json() {
        let cli = Cli::try_parse_from(["topo", "plan", "topo.yaml", "--output", "json"]).unwrap();
        assert_eq!(cli.output, OutputFormat::Json);
        assert!(matches!(cli.command, Commands::Plan { .. }));
        assert_eq!(cli.command.overrides(), RunOverrides::default());
    }

    #[test]
    fn test_manifest_is_required() {
        assert!(Cli::try_parse_from(["topo", "run"]).is_err());
    }
}
