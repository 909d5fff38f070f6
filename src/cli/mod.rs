//! CLI module for the topo provisioning tool.
//!
//! This module provides the command-line interface for running,
//! planning and validating provisioning manifests.

mod commands;
mod output;

pub use commands::{Cli, Commands, OutputFormat};
pub use output::OutputFormatter;
