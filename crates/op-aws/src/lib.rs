//! AWS Organizations backend for orgpolicy
//!
//! Implements [`op_reconcile::OrgDirectory`] over the `aws` CLI, the same
//! way an operator would run the calls by hand. The CLI owns credential
//! resolution (profiles, SSO, environment), so this crate never touches
//! secrets. Throttled calls are retried with exponential backoff.

pub mod config;
pub mod directory;
pub mod error;
pub mod responses;
mod retry;
pub mod runner;

pub use config::{AwsCliConfig, RetryConfig};
pub use directory::AwsCliDirectory;
pub use error::AwsError;
pub use responses::CallerIdentity;
pub use runner::{CommandOutput, CommandRunner, ProcessRunner};
