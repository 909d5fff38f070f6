//! Configuration module for topo.
//!
//! This module handles run-level configuration:
//! - Resolving settings from the command line, environment and defaults
//! - Loading a `.env` file next to the manifest
//! - Building the store, workspace and tool a run uses

mod settings;

pub use settings::{
    manifest_dir, RunConfig, RunOverrides, ENV_PROJECTS_DIR, ENV_TIMEOUT_SECS, ENV_TOOL,
};

use std::path::Path;
use tracing::{debug, info};

use crate::error::{ManifestError, Result, TopoError};

/// Loads `<base>/.env` into the process environment if it exists.
///
/// Variables already set in the environment are left untouched.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be loaded.
pub fn load_dotenv(base: &Path) -> Result<bool> {
    let env_path = base.join(".env");

    if !env_path.exists() {
        debug!(".env file not found at: {}", env_path.display());
        return Ok(false);
    }

    info!("Loading environment from: {}", env_path.display());
    dotenvy::from_path(&env_path).map_err(|e| {
        TopoError::Manifest(ManifestError::ParseError {
            message: format!("Failed to load .env file: {e}"),
            location: Some(env_path.display().to_string()),
        })
    })?;

    Ok(true)
}
