//! Manifest module for topo.
//!
//! This module handles everything about the manifest file:
//! - The in-memory model of provisions and their recorded state
//! - Parsing and serializing YAML
//! - Validation of provision names and parameters
//! - Loading, backing up, locking and saving the file

mod spec;
mod parser;
mod validator;
mod store;
mod file;
mod lock;

pub use spec::{Action, ExecutableAction, Manifest, Provision, ProvisionState, Provisions};
pub use parser::ManifestParser;
pub use validator::{ManifestValidator, ValidationError, ValidationResult, TEMPLATE_DIR};
pub use store::ManifestStore;
pub use file::FileManifestStore;
pub use lock::{generate_holder_id, LockInfo, LOCK_EXPIRY, LOCK_REFRESH_INTERVAL};
