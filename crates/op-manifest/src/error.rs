// error.rs: Error types for manifest loading.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while loading a manifest.
///
/// Every variant is fatal for a run: without a trustworthy manifest there is
/// no desired state to reconcile against.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// The manifest file does not exist or could not be read.
    #[error("failed to read manifest at {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The manifest is not valid YAML or does not match the expected shape.
    #[error("failed to parse manifest: {0}")]
    ParseError(#[from] serde_yaml::Error),

    /// Two declarations share a policy name.
    #[error("policy '{name}' is declared more than once (entries {first} and {second})")]
    DuplicatePolicy {
        name: String,
        first: usize,
        second: usize,
    },

    /// A declaration is missing a required field value.
    #[error("entry {index}: {field} must not be empty")]
    EmptyField { index: usize, field: &'static str },
}
