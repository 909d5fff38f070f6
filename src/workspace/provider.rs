//! Workspace provider trait definition.

use async_trait::async_trait;
use serde::Serialize;
use std::path::PathBuf;

use crate::error::Result;
use crate::manifest::Manifest;

/// What [`WorkspaceProvider::prepare`] did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WorkspaceReport {
    /// Whether the template project was (re-)fetched.
    pub template_fetched: bool,
    /// Provisions that received a fresh copy of the template.
    pub copied: Vec<String>,
    /// Provisions whose existing copy was reused.
    pub reused: Vec<String>,
}

/// Trait for anything that gives each provision a ready-to-run working directory.
#[async_trait]
pub trait WorkspaceProvider: Send + Sync {
    /// Makes sure every provision in `manifest` has a working directory.
    async fn prepare(&self, manifest: &Manifest) -> Result<WorkspaceReport>;

    /// Working directory for the provision called `name`.
    fn provision_dir(&self, name: &str) -> PathBuf;
}
