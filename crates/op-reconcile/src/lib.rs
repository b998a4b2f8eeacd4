//! # op-reconcile
//!
//! Makes a policy backend match a declared manifest.
//!
//! A [`Reconciler`] snapshots the backend's policies and organizational
//! hierarchy once ([`PolicyIndex`], [`OrgUnitIndex`]), then walks the
//! manifest entry by entry: validate the document ([`ContentValidator`]),
//! create or update the policy, and apply the minimal attach/detach
//! [`AttachmentDiff`]. The backend is reached only through the
//! [`OrgDirectory`] trait; progress is reported only through a [`Reporter`].
//!
//! ## Key invariants
//!
//! - **Size ceiling**: canonical (minified) content above 5120 bytes is never
//!   submitted.
//! - **Entry isolation**: a failing entry is reported and skipped; later
//!   entries still run.
//! - **Idempotence**: a second run over an unchanged manifest attaches and
//!   detaches nothing.
//! - **Dry-run parity**: dry-run issues no mutations but reports the same
//!   errors and the same diff a live run would.

pub mod diff;
pub mod directory;
pub mod document;
pub mod error;
pub mod index;
pub mod memory;
pub mod mode;
pub mod reconciler;
pub mod report;

pub use diff::{desired_targets, AttachmentDiff};
pub use directory::{collect_pages, OrgDirectory, OrgUnit, Page, PolicySummary};
pub use document::{CanonicalDocument, ContentValidator, MAX_POLICY_CONTENT_BYTES};
pub use error::{DirectoryError, EntryError, ReconcileError, Step};
pub use index::{OrgUnitIndex, PolicyIndex, TargetLabel, ROOT_UNIT_NAME};
pub use memory::InMemoryDirectory;
pub use mode::ApplyMode;
pub use reconciler::{EntryOutcome, EntryReport, PolicyAction, Reconciler, RunSummary};
pub use report::{RecordingReporter, ReportEvent, Reporter};
