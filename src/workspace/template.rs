//! Template project workspaces.
//!
//! Layout under the workspace root:
//!
//! ```text
//! <root>/original   pristine clone of the template repository
//! <root>/<name>     one private copy per provision
//! ```

use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tokio::task::JoinSet;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::{Result, TopoError, WorkspaceError};
use crate::manifest::{Manifest, TEMPLATE_DIR};

use super::provider::{WorkspaceProvider, WorkspaceReport};

/// Default workspace root.
pub const DEFAULT_WORKSPACE_ROOT: &str = "./projects";

/// Workspaces built from a git-hosted template project.
#[derive(Debug, Clone)]
pub struct TemplateWorkspace {
    /// Root directory holding the template and every copy.
    root: PathBuf,
    /// Re-fetch the template even if a clone already exists.
    refresh: bool,
    /// Git binary.
    git: String,
}

/// Result of preparing one provision's copy.
enum CopyOutcome {
    Copied(String),
    Reused(String),
}

impl TemplateWorkspace {
    /// Creates a workspace rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            refresh: false,
            git: String::from("git"),
        }
    }

    /// Forces the template to be fetched again on the next `prepare`.
    #[must_use]
    pub const fn with_refresh(mut self, refresh: bool) -> Self {
        self.refresh = refresh;
        self
    }

    /// Overrides the git binary.
    #[must_use]
    pub fn with_git(mut self, git: impl Into<String>) -> Self {
        self.git = git.into();
        self
    }

    /// Root directory of the workspace.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding the pristine template.
    #[must_use]
    pub fn template_dir(&self) -> PathBuf {
        self.root.join(TEMPLATE_DIR)
    }

    /// Clones the template unless an existing clone can be reused.
    ///
    /// Returns true if a fresh clone was made.
    async fn fetch_template(&self, repo: &str) -> Result<bool> {
        let original = self.template_dir();

        if original.is_dir() {
            if !self.refresh {
                debug!("Reusing template at: {}", original.display());
                return Ok(false);
            }
            info!("Removing workspace for refresh: {}", self.root.display());
            tokio::fs::remove_dir_all(&self.root).await.map_err(|e| {
                TopoError::Workspace(WorkspaceError::RemoveFailed {
                    path: self.root.clone(),
                    message: e.to_string(),
                })
            })?;
        }

        let clone_failed = |message: String| {
            TopoError::Workspace(WorkspaceError::CloneFailed {
                repo: repo.to_string(),
                message,
            })
        };

        if repo.trim().is_empty() {
            return Err(clone_failed(String::from("tf_repo is not set")));
        }

        tokio::fs::create_dir_all(&self.root).await?;

        info!("git clone: {repo}");
        let status = Command::new(&self.git)
            .arg("clone")
            .arg(repo)
            .arg(&original)
            .status()
            .await
            .map_err(|e| clone_failed(format!("failed to run {}: {e}", self.git)))?;

        if !status.success() {
            return Err(clone_failed(format!("git exited with {status}")));
        }

        Ok(true)
    }
}

#[async_trait]
impl WorkspaceProvider for TemplateWorkspace {
    async fn prepare(&self, manifest: &Manifest) -> Result<WorkspaceReport> {
        let fetched = self.fetch_template(&manifest.source_repo).await?;
        let template = self.template_dir();

        let mut copies = JoinSet::new();
        for name in manifest.provisions.keys() {
            let name = name.clone();
            let source = template.clone();
            let dest = self.provision_dir(&name);
            copies.spawn_blocking(move || {
                // Without a fresh fetch an existing copy is still current.
                if !fetched && dest.is_dir() {
                    return Ok(CopyOutcome::Reused(name));
                }
                info!("Creating copy of project for: {name}");
                replace_tree(&source, &dest)
                    .map(|()| CopyOutcome::Copied(name.clone()))
                    .map_err(|e| WorkspaceError::copy(name, e.to_string()))
            });
        }

        let mut report = WorkspaceReport {
            template_fetched: fetched,
            ..WorkspaceReport::default()
        };

        while let Some(joined) = copies.join_next().await {
            let outcome = joined
                .map_err(|e| TopoError::internal(format!("copy task failed: {e}")))??;
            match outcome {
                CopyOutcome::Copied(name) => {
                    debug!("Done copying: {name}");
                    report.copied.push(name);
                }
                CopyOutcome::Reused(name) => {
                    debug!("Copy already exists for: {name}");
                    report.reused.push(name);
                }
            }
        }

        report.copied.sort();
        report.reused.sort();
        Ok(report)
    }

    fn provision_dir(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

/// Replaces `dest` with a recursive copy of `source`.
fn replace_tree(source: &Path, dest: &Path) -> io::Result<()> {
    if dest.exists() {
        std::fs::remove_dir_all(dest)?;
    }

    for entry in WalkDir::new(source).follow_links(true) {
        let entry = entry?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(io::Error::other)?;
        let target = dest.join(relative);

        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)?;
        } else {
            std::fs::copy(entry.path(), &target)?;
        }
    }

    Ok(())
}
