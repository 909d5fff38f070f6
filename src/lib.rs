// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(warnings)]                    // All warnings are treated as errors
#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![deny(missing_docs)]                // All public items must be documented
#![deny(dead_code)]                   // Unused code is forbidden
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness - Leave nothing unchecked
#![deny(unused_imports)]              // Unused imports are forbidden
#![deny(unused_variables)]            // Unused variables are forbidden
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::missing_const_for_fn)] // Force const when possible
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::module_inception)]    // Module with same name as crate warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::shadow_unrelated)]    // Shadowing unrelated variables warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # Topo
//!
//! A provisioning orchestrator that fans Terraform out over every provision
//! declared in a YAML manifest and records the resulting state back into it.
//!
//! ## Overview
//!
//! Each run:
//!
//! - Locks, backs up and loads the manifest
//! - Gives every provision its own copy of a shared template project
//! - Skips provisions that are already where their action would take them
//! - Runs the tool concurrently for everything else, one process per provision
//! - Writes every provision back, with updated states for the executed ones
//!
//! ## Modules
//!
//! - [`manifest`]: Manifest model, parsing, validation and storage
//! - [`planner`]: Qualification and tool argument construction
//! - [`workspace`]: Per-provision working directories
//! - [`executor`]: Tool invocation, fan-out and aggregation
//! - [`reconciler`]: The full run pipeline
//! - [`config`]: Run configuration
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```yaml
//! tf_repo: git@github.com:example/ecs-jenkins.git
//! s3_bucket: example-tfstate
//! provisions:
//!   jenkins_1:
//!     action: apply
//!     parameters:
//!       desired_service_count: 1
//!   jenkins_2:
//!     action: destroy
//!     state: applied
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod cli;
pub mod config;
pub mod error;
pub mod executor;
pub mod manifest;
pub mod planner;
pub mod reconciler;
pub mod workspace;

// ============================================================================
// Re-exports
// ============================================================================

pub use cli::{Cli, Commands, OutputFormatter};
pub use config::RunConfig;
pub use error::{Result, TopoError};
pub use executor::{FailurePolicy, FanOut, ProvisioningTool, TerraformCli};
pub use manifest::{FileManifestStore, Manifest, ManifestStore, Provision};
pub use planner::{qualify, Partition, ProvisionPlan};
pub use reconciler::{merge, Reconciler, RunReport};
pub use workspace::{TemplateWorkspace, WorkspaceProvider};
