// diff.rs: Attachment set arithmetic.
//
// Targets are opaque ids in unordered sets. BTreeSet is used only so that
// apply order and report output are stable between runs.

use std::collections::BTreeSet;

use op_manifest::DeploymentTargets;
use serde::Serialize;

use crate::error::EntryError;
use crate::index::OrgUnitIndex;

/// The attach/detach delta for one policy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AttachmentDiff {
    /// `desired − current`
    pub to_add: BTreeSet<String>,
    /// `current − desired`
    pub to_remove: BTreeSet<String>,
}

impl AttachmentDiff {
    pub fn between(current: &BTreeSet<String>, desired: &BTreeSet<String>) -> Self {
        Self {
            to_add: desired.difference(current).cloned().collect(),
            to_remove: current.difference(desired).cloned().collect(),
        }
    }

    /// True when the policy is already attached exactly where it should be.
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }
}

/// Resolve declared targets into the desired set of target ids.
///
/// Every OU name must resolve to exactly one unit; account ids pass through.
pub fn desired_targets(
    targets: &DeploymentTargets,
    units: &OrgUnitIndex,
) -> Result<BTreeSet<String>, EntryError> {
    let mut desired = BTreeSet::new();
    for name in &targets.organizational_units {
        desired.insert(units.resolve(name)?.to_string());
    }
    desired.extend(targets.accounts.iter().cloned());
    Ok(desired)
}
