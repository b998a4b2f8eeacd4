// reconciler.rs: The reconciliation driver.
//
// For each manifest entry, in order:
//
// 1. Read the document, minify it, check the 5120-byte limit → skip entry on failure
// 2. Resolve the declared targets to ids → skip entry on unknown/ambiguous names
// 3. Look the policy up by name in the run's PolicyIndex
// 4. Create it (unknown) or re-submit it (known)
// 5. Fetch its current targets, diff against the desired set
// 6. Attach every missing target, then detach every extra one
//
// Steps 1–2 touch no backend state, so an entry that fails them leaves the
// backend exactly as it was. Any failure abandons the current entry only.
// Under dry-run the same steps run (including the read-only listing) and
// every mutation is reported instead of issued.

use std::collections::BTreeSet;
use std::path::Path;

use chrono::{DateTime, Utc};
use op_manifest::{Manifest, PolicyDeclaration};
use serde::Serialize;
use uuid::Uuid;

use crate::diff::{desired_targets, AttachmentDiff};
use crate::directory::{collect_pages, OrgDirectory};
use crate::document::ContentValidator;
use crate::error::{EntryError, ReconcileError, Step};
use crate::index::{OrgUnitIndex, PolicyIndex};
use crate::mode::ApplyMode;
use crate::report::{ReportEvent, Reporter};

/// Whether the entry's policy was created or re-submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyAction {
    Created,
    Updated,
}

/// What happened to one manifest entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EntryOutcome {
    Applied {
        /// `None` only for a dry-run create.
        policy_id: Option<String>,
        action: PolicyAction,
        size: usize,
        content_sha256: String,
        diff: AttachmentDiff,
    },
    Skipped {
        step: Step,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryReport {
    pub policy: String,
    #[serde(flatten)]
    pub outcome: EntryOutcome,
}

impl EntryReport {
    /// The attachment diff, if the entry got that far.
    pub fn diff(&self) -> Option<&AttachmentDiff> {
        match &self.outcome {
            EntryOutcome::Applied { diff, .. } => Some(diff),
            EntryOutcome::Skipped { .. } => None,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self.outcome, EntryOutcome::Skipped { .. })
    }
}

/// Result of one pass over a manifest.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub mode: ApplyMode,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub entries: Vec<EntryReport>,
}

impl RunSummary {
    pub fn entry(&self, policy: &str) -> Option<&EntryReport> {
        self.entries.iter().find(|e| e.policy == policy)
    }

    pub fn skipped(&self) -> usize {
        self.entries.iter().filter(|e| e.is_skipped()).count()
    }

    pub fn applied(&self) -> usize {
        self.entries.len() - self.skipped()
    }
}

/// Drives one reconciliation run against a directory.
///
/// The policy and unit indices are snapshots taken in [`Reconciler::prepare`]
/// and are never refreshed during the run.
pub struct Reconciler<'a, D: OrgDirectory + ?Sized> {
    directory: &'a mut D,
    mode: ApplyMode,
    validator: ContentValidator,
    policies: PolicyIndex,
    units: OrgUnitIndex,
}

impl<'a, D: OrgDirectory + ?Sized> Reconciler<'a, D> {
    /// Build the run's indices. Fails if the backend has no root or
    /// enumeration fails; nothing has been mutated at that point.
    pub fn prepare(directory: &'a mut D, mode: ApplyMode) -> Result<Self, ReconcileError> {
        let policies = PolicyIndex::build(&*directory)?;
        let units = OrgUnitIndex::build(&*directory)?;
        tracing::info!(
            directory = directory.name(),
            %mode,
            policies = policies.len(),
            units = units.len(),
            "indices built"
        );
        for name in units.ambiguous_names() {
            tracing::warn!(name, "organizational unit name is not unique; it cannot be targeted");
        }
        Ok(Self {
            directory,
            mode,
            validator: ContentValidator::default(),
            policies,
            units,
        })
    }

    pub fn policies(&self) -> &PolicyIndex {
        &self.policies
    }

    pub fn units(&self) -> &OrgUnitIndex {
        &self.units
    }

    /// Reconcile every declaration in manifest order.
    ///
    /// Never fails as a whole: per-entry failures are reported and recorded
    /// as skipped in the summary.
    pub fn run(&mut self, manifest: &Manifest, reporter: &mut dyn Reporter) -> RunSummary {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        tracing::info!(%run_id, entries = manifest.len(), mode = %self.mode, "reconciliation started");

        let mut entries = Vec::with_capacity(manifest.len());
        for decl in &manifest.policies {
            let outcome = match self.reconcile_entry(decl, &manifest.base_dir, reporter) {
                Ok(outcome) => outcome,
                Err(err) => {
                    tracing::warn!(policy = %decl.name, step = %err.step(), "entry skipped: {}", err);
                    reporter.report(ReportEvent::EntrySkipped {
                        policy: decl.name.clone(),
                        step: err.step(),
                        reason: err.to_string(),
                    });
                    EntryOutcome::Skipped {
                        step: err.step(),
                        reason: err.to_string(),
                    }
                }
            };
            entries.push(EntryReport {
                policy: decl.name.clone(),
                outcome,
            });
        }

        let summary = RunSummary {
            run_id,
            mode: self.mode,
            started_at,
            finished_at: Utc::now(),
            entries,
        };
        tracing::info!(
            %run_id,
            applied = summary.applied(),
            skipped = summary.skipped(),
            "reconciliation finished"
        );
        summary
    }

    fn reconcile_entry(
        &mut self,
        decl: &PolicyDeclaration,
        base_dir: &Path,
        reporter: &mut dyn Reporter,
    ) -> Result<EntryOutcome, EntryError> {
        let policy = decl.name.as_str();
        tracing::debug!(policy, "reconciling entry");

        let document = self.validator.read(&decl.document_path(base_dir))?;
        reporter.report(ReportEvent::DocumentValidated {
            policy: policy.to_string(),
            size: document.size(),
            limit: self.validator.limit(),
        });

        let desired = desired_targets(&decl.deployment_targets, &self.units)?;

        let existing = self.policies.resolve(policy).map(str::to_string);
        let (policy_id, action) = match existing {
            Some(id) => {
                if self.mode.is_live() {
                    self.directory
                        .update_policy(&id, policy, &decl.description, document.content())
                        .map_err(EntryError::backend(Step::UpdatePolicy))?;
                }
                reporter.report(ReportEvent::PolicyUpdated {
                    policy: policy.to_string(),
                    id: id.clone(),
                    mode: self.mode,
                });
                (Some(id), PolicyAction::Updated)
            }
            None => {
                let id = if self.mode.is_live() {
                    Some(
                        self.directory
                            .create_policy(policy, &decl.description, document.content())
                            .map_err(EntryError::backend(Step::CreatePolicy))?,
                    )
                } else {
                    None
                };
                reporter.report(ReportEvent::PolicyCreated {
                    policy: policy.to_string(),
                    id: id.clone(),
                    mode: self.mode,
                });
                (id, PolicyAction::Created)
            }
        };

        // A dry-run create has no id yet; it would start with no targets.
        let current = match &policy_id {
            Some(id) => self.current_targets(id)?,
            None => BTreeSet::new(),
        };
        let diff = AttachmentDiff::between(&current, &desired);
        self.apply_diff(policy, policy_id.as_deref(), &diff, reporter)?;

        Ok(EntryOutcome::Applied {
            policy_id,
            action,
            size: document.size(),
            content_sha256: document.sha256(),
            diff,
        })
    }

    fn current_targets(&self, policy_id: &str) -> Result<BTreeSet<String>, EntryError> {
        let targets = collect_pages(|token| self.directory.list_targets_for_policy(policy_id, token))
            .map_err(EntryError::backend(Step::ListTargets))?;
        Ok(targets.into_iter().collect())
    }

    fn apply_diff(
        &mut self,
        policy: &str,
        policy_id: Option<&str>,
        diff: &AttachmentDiff,
        reporter: &mut dyn Reporter,
    ) -> Result<(), EntryError> {
        if diff.is_empty() {
            reporter.report(ReportEvent::AttachmentsInSync {
                policy: policy.to_string(),
            });
            return Ok(());
        }

        // Only a live run has an id, and only a live run mutates.
        let live_id = policy_id.filter(|_| self.mode.is_live());

        for target_id in &diff.to_add {
            if let Some(id) = live_id {
                self.directory
                    .attach_policy(id, target_id)
                    .map_err(EntryError::backend(Step::Attach))?;
            }
            reporter.report(ReportEvent::TargetAttached {
                policy: policy.to_string(),
                target: self.units.label(target_id),
                mode: self.mode,
            });
        }

        for target_id in &diff.to_remove {
            if let Some(id) = live_id {
                self.directory
                    .detach_policy(id, target_id)
                    .map_err(EntryError::backend(Step::Detach))?;
            }
            reporter.report(ReportEvent::TargetDetached {
                policy: policy.to_string(),
                target: self.units.label(target_id),
                mode: self.mode,
            });
        }

        Ok(())
    }
}
