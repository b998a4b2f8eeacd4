//! # op-manifest
//!
//! The operator-maintained manifest for orgpolicy.
//!
//! A manifest is a YAML list of [`PolicyDeclaration`]s. Each declaration names
//! a policy, points at its JSON document (relative to the config directory),
//! and lists the organizational units and accounts it must be attached to.
//!
//! ## Key invariants
//!
//! - **Names are the identity key**: two declarations with the same name are
//!   rejected at load time.
//! - **Complete desired state**: the targets listed for a policy are *all*
//!   of its targets. Anything else attached to it will be detached.

pub mod declaration;
pub mod error;
pub mod loader;

pub use declaration::{DeploymentTargets, Manifest, PolicyDeclaration};
pub use error::ManifestError;
pub use loader::{load_manifest, parse_manifest};
