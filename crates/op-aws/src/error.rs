// error.rs: Setup errors for the aws CLI backend.
//
// Per-call failures are op_reconcile::DirectoryError; these are the errors
// that prevent the backend from being used at all.

use op_reconcile::DirectoryError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AwsError {
    /// The configured aws CLI executable could not be located.
    #[error("aws CLI '{bin}' not found: {source}")]
    CliNotFound { bin: String, source: which::Error },

    /// `sts get-caller-identity` failed: no usable credentials.
    #[error("no valid AWS session: {0}")]
    NoSession(#[source] DirectoryError),
}
