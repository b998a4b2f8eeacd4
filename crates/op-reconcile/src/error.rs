// error.rs: Error types for the reconciliation subsystem.
//
// Three layers:
// - DirectoryError: a single backend call failed.
// - ReconcileError: the run cannot proceed at all (fatal).
// - EntryError: one manifest entry was abandoned; the run continues.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors returned by an [`crate::OrgDirectory`] implementation.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// The backend rejected or failed the call.
    #[error("{operation} failed: {message}")]
    Backend { operation: String, message: String },

    /// The backend asked us to slow down (rate limit or concurrent change).
    #[error("{operation} throttled: {message}")]
    Throttled { operation: String, message: String },

    /// The backend answered with something we could not interpret.
    #[error("unexpected response from {operation}: {reason}")]
    InvalidResponse { operation: String, reason: String },

    /// The referenced policy or target does not exist in the backend.
    #[error("not found: {0}")]
    NotFound(String),

    /// Transport-level I/O failure (e.g. the backend process could not start).
    #[error("I/O error talking to backend: {0}")]
    Io(#[from] std::io::Error),
}

impl DirectoryError {
    /// Whether retrying the same call later could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DirectoryError::Throttled { .. })
    }
}

/// Fatal errors that stop a run before any per-policy processing.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The backend reported no organization root.
    #[error("organization root not found")]
    NoRoot,

    /// Enumeration failed while building one of the run's indices.
    #[error("failed to enumerate {what}: {source}")]
    Enumeration {
        what: &'static str,
        source: DirectoryError,
    },
}

/// The per-entry step at which processing stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    ReadDocument,
    ValidateDocument,
    ResolveTargets,
    CreatePolicy,
    UpdatePolicy,
    ListTargets,
    Attach,
    Detach,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Step::ReadDocument => "read document",
            Step::ValidateDocument => "validate document",
            Step::ResolveTargets => "resolve targets",
            Step::CreatePolicy => "create policy",
            Step::UpdatePolicy => "update policy",
            Step::ListTargets => "list targets",
            Step::Attach => "attach",
            Step::Detach => "detach",
        };
        f.write_str(s)
    }
}

/// Errors that abandon a single manifest entry.
#[derive(Debug, Error)]
pub enum EntryError {
    /// The policy document could not be read from disk.
    #[error("failed to read policy document {path}: {source}")]
    DocumentUnreadable {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The policy document is not valid JSON.
    #[error("malformed policy document {path}: {source}")]
    MalformedDocument {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// The canonical (minified) document exceeds the backend's size limit.
    #[error("policy content is {size} bytes, limit is {limit}")]
    SizeExceeded { size: usize, limit: usize },

    /// A declared organizational unit name has no match in the hierarchy.
    #[error("organizational unit '{name}' not found")]
    UnknownTarget { name: String },

    /// A declared organizational unit name matches more than one unit.
    #[error("organizational unit name '{name}' is ambiguous: {}", .ids.join(", "))]
    AmbiguousTarget { name: String, ids: Vec<String> },

    /// A backend call failed during the given step.
    #[error("{step}: {source}")]
    Backend { step: Step, source: DirectoryError },
}

impl EntryError {
    /// The step this error belongs to.
    pub fn step(&self) -> Step {
        match self {
            EntryError::DocumentUnreadable { .. } => Step::ReadDocument,
            EntryError::MalformedDocument { .. } | EntryError::SizeExceeded { .. } => {
                Step::ValidateDocument
            }
            EntryError::UnknownTarget { .. } | EntryError::AmbiguousTarget { .. } => {
                Step::ResolveTargets
            }
            EntryError::Backend { step, .. } => *step,
        }
    }

    pub(crate) fn backend(step: Step) -> impl FnOnce(DirectoryError) -> EntryError {
        move |source| EntryError::Backend { step, source }
    }
}
