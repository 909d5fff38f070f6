//! Manifest validation.
//!
//! Checks that every provision name can address its own working directory
//! and that every parameter can be passed as a `-var key=value` binding.

use tracing::debug;

use crate::error::{ManifestError, Result, TopoError};

use super::spec::Manifest;

/// Directory name reserved for the pristine template project.
pub const TEMPLATE_DIR: &str = "original";

/// Validator for topo manifests.
#[derive(Debug, Default, Clone, Copy)]
pub struct ManifestValidator;

/// Validation result containing all problems found.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// List of validation errors.
    pub errors: Vec<ValidationError>,
    /// List of warnings (non-fatal issues).
    pub warnings: Vec<String>,
}

/// A single validation error.
#[derive(Debug)]
pub struct ValidationError {
    /// The field path that failed validation.
    pub field: String,
    /// The error message.
    pub message: String,
}

impl ManifestValidator {
    /// Creates a new validator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Validates a manifest, collecting every error and warning.
    #[must_use]
    pub fn validate(&self, manifest: &Manifest) -> ValidationResult {
        let mut result = ValidationResult::default();

        if manifest.source_repo.trim().is_empty() {
            result
                .warnings
                .push(String::from("tf_repo is empty; the template project cannot be cloned"));
        }

        if manifest.provisions.is_empty() {
            result
                .warnings
                .push(String::from("Manifest declares no provisions"));
        }

        for (name, provision) in &manifest.provisions {
            if let Some(message) = check_provision_name(name) {
                result.errors.push(ValidationError {
                    field: format!("provisions.{name}"),
                    message,
                });
            }

            if provision.action.executable().is_none() {
                result.warnings.push(format!(
                    "Provision '{name}' has unrecognized action {} and will be skipped",
                    provision.action
                ));
            }

            for key in provision.parameters.keys() {
                if key.is_empty() {
                    result.errors.push(ValidationError {
                        field: format!("provisions.{name}.parameters"),
                        message: String::from("Parameter names cannot be empty"),
                    });
                } else if key.contains('=') {
                    result.errors.push(ValidationError {
                        field: format!("provisions.{name}.parameters.{key}"),
                        message: format!("Parameter name '{key}' cannot contain '='"),
                    });
                }
            }
        }

        debug!(
            "Manifest validation found {} error(s), {} warning(s)",
            result.errors.len(),
            result.warnings.len()
        );
        result
    }
}

impl ValidationResult {
    /// Returns true if no errors were found.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Turns the first error, if any, into a hard failure.
    ///
    /// # Errors
    ///
    /// Returns the first validation error if any were found.
    pub fn into_result(self) -> Result<Self> {
        match self.errors.first() {
            None => Ok(self),
            Some(first) => Err(TopoError::Manifest(ManifestError::validation(
                first.message.clone(),
                first.field.clone(),
            ))),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Returns a message if `name` cannot be used as a working directory name.
fn check_provision_name(name: &str) -> Option<String> {
    if name.trim().is_empty() {
        return Some(String::from("Provision name cannot be empty"));
    }
    if name == "." || name == ".." || name.contains(['/', '\\']) {
        return Some(format!(
            "Provision name '{name}' must be a single directory name"
        ));
    }
    if name == TEMPLATE_DIR {
        return Some(format!(
            "Provision name '{TEMPLATE_DIR}' is reserved for the template project"
        ));
    }
    None
}
